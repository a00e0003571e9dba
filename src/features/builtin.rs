use super::{Destination, FeatureDescriptor};

pub const CHAT: &str = "chat";
pub const EXPLAIN_SELECTION: &str = "explain-selection";
pub const SUMMARIZE_SELECTION: &str = "summarize-selection";
pub const CONTINUE_WRITING: &str = "continue-writing";
pub const IMPROVE_WRITING: &str = "improve-writing";
pub const GENERATE_OUTLINE: &str = "generate-outline";

fn with_extra(instruction: &str, input: Option<&str>) -> String {
    match input.map(str::trim).filter(|i| !i.is_empty()) {
        Some(extra) => format!("{}\n\nAdditional instructions: {}", instruction, extra),
        None => instruction.to_string(),
    }
}

pub fn builtin_features() -> Vec<FeatureDescriptor> {
    vec![
        FeatureDescriptor::new(CHAT, "Chat", Destination::ConversationView, |input| {
            input.unwrap_or_default().to_string()
        }),
        FeatureDescriptor::new(
            EXPLAIN_SELECTION,
            "Explain selection",
            Destination::ConversationView,
            |input| {
                with_extra(
                    "Explain the selected text in plain language. Define any jargon it uses.",
                    input,
                )
            },
        ),
        FeatureDescriptor::new(
            SUMMARIZE_SELECTION,
            "Summarize selection",
            Destination::DocumentEditor,
            |input| with_extra("Summarize the selected text in a few sentences.", input),
        )
        .temperature(0.3),
        FeatureDescriptor::new(
            CONTINUE_WRITING,
            "Continue writing",
            Destination::DocumentEditor,
            |input| {
                with_extra(
                    "Continue the selected text from where it stops. Match its tone, tense and formatting. \
                     Do not repeat the selected text.",
                    input,
                )
            },
        ),
        FeatureDescriptor::new(
            IMPROVE_WRITING,
            "Improve writing",
            Destination::DocumentEditor,
            |input| {
                with_extra(
                    "Rewrite the selected text to fix grammar and spelling and to improve clarity. \
                     Keep its meaning and formatting.",
                    input,
                )
            },
        )
        .streaming(false)
        .temperature(0.2),
        FeatureDescriptor::new(
            GENERATE_OUTLINE,
            "Generate outline",
            Destination::DocumentEditor,
            |input| match input.map(str::trim).filter(|i| !i.is_empty()) {
                Some(topic) => format!("Write a Markdown outline with nested bullet points for: {}", topic),
                None => "Write a Markdown outline with nested bullet points for the selected text.".to_string(),
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(id: &str) -> FeatureDescriptor {
        builtin_features().into_iter().find(|f| f.id == id).unwrap()
    }

    #[test]
    fn chat_passes_input_through() {
        assert_eq!(feature(CHAT).build_prompt(Some("hello")), "hello");
        assert_eq!(feature(CHAT).build_prompt(None), "");
    }

    #[test]
    fn extra_instructions_are_appended() {
        let prompt = feature(SUMMARIZE_SELECTION).build_prompt(Some("in French"));
        assert!(prompt.starts_with("Summarize the selected text"));
        assert!(prompt.ends_with("Additional instructions: in French"));
    }

    #[test]
    fn improve_writing_is_not_streamed() {
        let f = feature(IMPROVE_WRITING);
        assert!(!f.streaming);
        assert_eq!(f.temperature, Some(0.2));
    }

    #[test]
    fn ids_are_unique() {
        let mut ids: Vec<String> = builtin_features().into_iter().map(|f| f.id).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }
}
