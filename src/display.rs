use async_trait::async_trait;
use console::{Term, style};
use std::io::{self, Write};
use vaultchat::config::Settings;
use vaultchat::conversation::Role;
use vaultchat::features::{ChatEvent, EventReceiver, FeatureRegistry, StreamStatus};
use vaultchat::host::{Notifier, Prompter};

/// Prints notifications to stderr, like a toast would show them.
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, message: &str) {
        eprintln!("{} {}", style("!").bold().yellow(), style(message).yellow());
    }
}

/// Asks on the terminal. An empty answer dismisses the dialog.
pub struct TerminalPrompter;

async fn read_answer(question: String) -> Option<String> {
    let answer = tokio::task::spawn_blocking(move || {
        let term = Term::stderr();
        term.write_str(&question).ok()?;
        term.read_line().ok()
    })
    .await
    .ok()
    .flatten()?;

    let answer = answer.trim().to_string();
    if answer.is_empty() { None } else { Some(answer) }
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn prompt_for_folder(&self, folders: &[String]) -> Option<String> {
        eprintln!("{}", style("Save conversations in which folder?").bold().cyan());
        eprintln!("  {} {}", style("0").dim(), "(vault root)");
        for (i, folder) in folders.iter().enumerate() {
            eprintln!("  {} {}", style(i + 1).dim(), folder);
        }

        let answer = read_answer("Folder number (empty to skip): ".to_string()).await?;
        match answer.parse::<usize>() {
            Ok(0) => Some(String::new()),
            Ok(n) => folders.get(n - 1).cloned(),
            Err(_) => Some(answer),
        }
    }

    async fn prompt_for_input(&self, title: &str) -> Option<String> {
        read_answer(format!("{} {}: ", style("?").bold().cyan(), title)).await
    }
}

/// Print conversation events until the sender side is dropped.
pub async fn render_events(mut events: EventReceiver) {
    let mut stdout = io::stdout();
    while let Some(event) = events.recv().await {
        match event {
            ChatEvent::MessageAdded(message) => match message.role {
                Role::Assistant => {
                    let model = message.model.unwrap_or_default();
                    println!("\n{}", style(format!("Assistant ({})", model)).bold().blue());
                }
                Role::User | Role::System => {}
            },
            ChatEvent::Delta { text, .. } => {
                print!("{}", text);
                stdout.flush().ok();
            }
            ChatEvent::StreamEnded { status, .. } => {
                println!();
                match status {
                    StreamStatus::Completed => {}
                    StreamStatus::Cancelled => println!("{}", style("[stopped]").dim()),
                    StreamStatus::Failed => println!("{}", style("[failed]").red()),
                }
            }
        }
    }
}

pub fn print_features(registry: &FeatureRegistry) {
    for descriptor in registry.descriptors() {
        println!(
            "{:<32} {}",
            style(&descriptor.id).bold().green(),
            style(&descriptor.title).dim()
        );
    }
}

pub fn print_custom_commands(settings: &Settings) {
    if settings.custom_commands.is_empty() {
        println!("{}", style("No custom commands.").dim());
        return;
    }
    for command in &settings.custom_commands {
        println!(
            "{:<24} {} -> {:?}",
            style(&command.name).bold().green(),
            command.template_path(),
            command.destination
        );
    }
}
