use clap::Parser;
use console::style;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use vaultchat::PluginError;
use vaultchat::config::{CustomCommand, Settings};
use vaultchat::conversation::Conversation;
use vaultchat::features::builtin::CHAT;
use vaultchat::features::{FeatureDispatcher, Invocation, Outcome};
use vaultchat::host::{DocumentEditor, FsVault, Position, TextDocument, Vault};
use vaultchat::providers::ProviderFactory;
use vaultchat::stream::StreamController;

mod cli;
mod display;

use crate::cli::{Args, Command, CommandsAction};
use crate::display::{TerminalNotifier, TerminalPrompter};

#[tokio::main]
async fn main() {
    init_tracing();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("{} {}", style("error:").bold().red(), e.user_message());
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vaultchat=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run(args: Args) -> Result<(), PluginError> {
    let config_path = args.config.unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load(&config_path)?;

    let command = match args.command {
        Command::Commands { action } => {
            return manage_commands(&mut settings, &config_path, action);
        }
        other => other,
    };

    let vault = Arc::new(FsVault::new(&args.vault));
    let provider = ProviderFactory::new().create(&settings)?;
    let (events, rx) = mpsc::unbounded_channel();
    let renderer = tokio::spawn(display::render_events(rx));
    let dispatcher = FeatureDispatcher::new(
        settings,
        provider,
        vault.clone(),
        Arc::new(TerminalNotifier),
        Arc::new(TerminalPrompter),
        events,
    );

    let mut conversation = Conversation::new();
    cancel_on_interrupt(conversation.controller());

    let result = match command {
        Command::Features => {
            display::print_features(dispatcher.registry());
            Ok(())
        }
        Command::Ask {
            feature,
            input,
            selection,
        } => dispatcher
            .execute(&mut conversation, invocation(&feature, input, selection), None)
            .await
            .map(|outcome| report(&outcome)),
        Command::Chat => chat(&dispatcher, &mut conversation).await,
        Command::Write {
            feature,
            note,
            line,
            ch,
            input,
            selection,
        } => {
            write_into_note(
                &dispatcher,
                &mut conversation,
                vault.as_ref(),
                &note,
                Position::new(line, ch),
                invocation(&feature, input, selection),
            )
            .await
        }
        Command::Commands { .. } => Ok(()),
    };

    conversation.settle().await;
    drop(dispatcher);
    let _ = renderer.await;
    result
}

fn invocation(feature: &str, input: Option<String>, selection: Option<String>) -> Invocation {
    Invocation {
        input_text: input,
        selected_text: selection,
        ..Invocation::new(feature)
    }
}

/// First Ctrl+C stops the running answer, a second one while idle exits.
fn cancel_on_interrupt(controller: StreamController) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !controller.cancel() {
                std::process::exit(130);
            }
        }
    });
}

fn report(outcome: &Outcome) {
    match outcome {
        Outcome::Dismissed => eprintln!("{}", style("Dismissed.").dim()),
        Outcome::Cancelled { .. } => eprintln!("{}", style("Stopped.").dim()),
        Outcome::Completed { .. } | Outcome::Failed { .. } => {}
    }
}

async fn chat(
    dispatcher: &FeatureDispatcher,
    conversation: &mut Conversation,
) -> Result<(), PluginError> {
    println!(
        "{}",
        style("Type a message. /new starts a new conversation, /exit quits.").dim()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", style(">").bold().green());
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/exit" | "/quit" => break,
            "/new" => {
                dispatcher.new_conversation(conversation);
                println!("{}", style("Started a new conversation.").dim());
                continue;
            }
            text => {
                let outcome = dispatcher
                    .run(conversation, Invocation::new(CHAT).input(text), None)
                    .await;
                report(&outcome);
            }
        }
    }
    Ok(())
}

async fn write_into_note(
    dispatcher: &FeatureDispatcher,
    conversation: &mut Conversation,
    vault: &FsVault,
    note: &str,
    cursor: Position,
    invocation: Invocation,
) -> Result<(), PluginError> {
    let mut document = TextDocument::new(vault.read(note).await?);
    document.set_cursor(cursor);

    let outcome = dispatcher
        .execute(conversation, invocation, Some(&mut document))
        .await?;
    report(&outcome);

    if !document.insertions().is_empty() {
        vault.write(note, document.text()).await?;
        let end = document.cursor();
        eprintln!(
            "{} {} (cursor now at {}:{})",
            style("Updated").bold().green(),
            note,
            end.line,
            end.ch
        );
    }
    Ok(())
}

fn manage_commands(
    settings: &mut Settings,
    path: &Path,
    action: CommandsAction,
) -> Result<(), PluginError> {
    match action {
        CommandsAction::List => display::print_custom_commands(settings),
        CommandsAction::Add {
            name,
            template,
            destination,
            no_selection,
            prompt,
            model,
        } => {
            let mut command = CustomCommand::new(&name, &template, destination.into());
            command.send_selected_text = !no_selection;
            command.prompt_before_run = prompt;
            command.model_id = model;

            let id = command.feature_id();
            settings.upsert_custom_command(command)?;
            settings.save(path)?;
            println!("{} {}", style("Saved").bold().green(), id);
        }
        CommandsAction::Remove { name } => {
            let removed = settings.remove_custom_command(&name)?;
            settings.save(path)?;
            println!("{} {}", style("Removed").bold().green(), removed.feature_id());
        }
    }
    Ok(())
}
