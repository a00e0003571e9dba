use super::Destination;
use chrono::NaiveDate;

const DOCUMENT_GUIDANCE: &str = "Respond with Markdown that can be inserted into the note as is. \
Do not wrap the answer in a code block and do not add commentary about the answer.";

const DOCUMENT_PREAMBLE: &str =
    "You write directly into the user's Markdown note at their cursor.";

/// Pieces of an outgoing user message, in the order they are sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptParts<'a> {
    pub input: Option<&'a str>,
    pub template: Option<&'a str>,
    pub selected: Option<&'a str>,
    pub guidance: Option<&'a str>,
}

fn non_empty(part: Option<&str>) -> Option<&str> {
    part.map(str::trim).filter(|p| !p.is_empty())
}

/// Join the non-empty parts, each under its own label.
///
/// A lone input part is sent as typed, without a label.
pub fn compose_prompt(parts: PromptParts<'_>) -> String {
    let input = non_empty(parts.input);
    let template = non_empty(parts.template);
    let selected = non_empty(parts.selected);
    let guidance = non_empty(parts.guidance);

    if let (Some(input), None, None, None) = (input, template, selected, guidance) {
        return input.to_string();
    }

    let mut sections = Vec::new();
    if let Some(input) = input {
        sections.push(format!("Request:\n{}", input));
    }
    if let Some(template) = template {
        sections.push(format!("Instructions:\n{}", template));
    }
    if let Some(selected) = selected {
        sections.push(format!("Selected text:\n\"\"\"\n{}\n\"\"\"", selected));
    }
    if let Some(guidance) = guidance {
        sections.push(format!("Formatting:\n{}", guidance));
    }
    sections.join("\n\n")
}

/// Formatting guidance appended for a destination.
pub fn guidance_for(destination: Destination) -> Option<&'static str> {
    match destination {
        Destination::ConversationView => None,
        Destination::DocumentEditor => Some(DOCUMENT_GUIDANCE),
    }
}

/// System preamble of a new conversation.
pub fn system_prompt(destination: Destination, persona: Option<&str>, today: NaiveDate) -> String {
    let mut prompt = format!("Current date: {}.", today.format("%Y-%m-%d"));
    let preamble = match destination {
        Destination::ConversationView => non_empty(persona),
        Destination::DocumentEditor => Some(DOCUMENT_PREAMBLE),
    };
    if let Some(preamble) = preamble {
        prompt.push_str("\n\n");
        prompt.push_str(preamble);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_are_labeled_in_fixed_order() {
        let prompt = compose_prompt(PromptParts {
            input: Some("make it shorter"),
            template: Some("You are an editor."),
            selected: Some("A long paragraph."),
            guidance: Some("Plain text only."),
        });

        assert_eq!(
            prompt,
            "Request:\nmake it shorter\n\n\
             Instructions:\nYou are an editor.\n\n\
             Selected text:\n\"\"\"\nA long paragraph.\n\"\"\"\n\n\
             Formatting:\nPlain text only."
        );
    }

    #[test]
    fn empty_parts_are_omitted() {
        let prompt = compose_prompt(PromptParts {
            input: Some("  "),
            template: None,
            selected: Some("text"),
            guidance: Some(""),
        });
        assert_eq!(prompt, "Selected text:\n\"\"\"\ntext\n\"\"\"");
    }

    #[test]
    fn lone_input_is_sent_verbatim() {
        let prompt = compose_prompt(PromptParts {
            input: Some("What is a zettelkasten?"),
            ..PromptParts::default()
        });
        assert_eq!(prompt, "What is a zettelkasten?");
    }

    #[test]
    fn nothing_to_send() {
        assert_eq!(compose_prompt(PromptParts::default()), "");
    }

    #[test]
    fn system_prompt_uses_persona_only_in_the_view() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

        let view = system_prompt(Destination::ConversationView, Some("You are terse."), today);
        assert_eq!(view, "Current date: 2026-10-16.\n\nYou are terse.");

        let editor = system_prompt(Destination::DocumentEditor, Some("You are terse."), today);
        assert!(editor.starts_with("Current date: 2026-10-16."));
        assert!(!editor.contains("terse"));

        let bare = system_prompt(Destination::ConversationView, None, today);
        assert_eq!(bare, "Current date: 2026-10-16.");
    }
}
