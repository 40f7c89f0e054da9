//! Prompt rewriting applied before an image-generation call.

use crate::message::{Message, last_user_index};

const GENERATE_FIRST: &str = "Generate an image for the request below. Reply with the generated image itself, not a description of one.\n\n";
const INCLUDE_NEW_IMAGE: &str = "Your reply must include a newly generated image based on the images and instructions above.";
const SAFETY_PREFIX: &str = "Create a safe, family-friendly, non-violent image that follows content policy. Output an image, not text.\nRequest: ";

/// Returned when every stage came back without an image or any text.
pub const PLACEHOLDER_TEXT: &str = "处理完成";

const INTENT_KEYWORDS: &[&str] = &[
    "生成", "画", "绘", "创建", "制作", "generate", "create", "draw", "paint", "render",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVariant {
    Rewritten,
    Strengthened,
}

/// Whether the user is plainly asking for a picture to be made.
pub fn has_generation_intent(text: &str) -> bool {
    let lowered = text.to_lowercase();
    INTENT_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// Text of the last user message before any rewriting.
pub fn original_prompt(messages: &[Message]) -> String {
    last_user_index(messages)
        .map(|index| messages[index].text())
        .unwrap_or_default()
}

/// Returns a copy of `messages` with the last user turn rewritten.
///
/// Without a user turn the conversation is returned untouched.
pub fn apply(messages: &[Message], variant: PromptVariant) -> Vec<Message> {
    let mut out = messages.to_vec();
    let Some(index) = last_user_index(&out) else {
        return out;
    };
    let message = &mut out[index];
    match variant {
        PromptVariant::Rewritten if message.has_image() => message.append_text(INCLUDE_NEW_IMAGE),
        PromptVariant::Rewritten => message.prepend_text(GENERATE_FIRST),
        PromptVariant::Strengthened => {
            let mut text = format!("{SAFETY_PREFIX}{}", message.text().trim());
            if message.has_image() {
                text.push('\n');
                text.push_str(INCLUDE_NEW_IMAGE);
            }
            message.replace_text(text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ContentPart, Role};

    #[test]
    fn intent_keywords_match_in_either_language() {
        assert!(has_generation_intent("帮我生成一只猫"));
        assert!(has_generation_intent("Please DRAW a fox"));
        assert!(!has_generation_intent("what is in this picture?"));
    }

    #[test]
    fn text_only_prompt_gets_instruction_in_front() {
        let messages = vec![Message::user("a lighthouse at dusk", &[] as &[&str])];
        let rewritten = apply(&messages, PromptVariant::Rewritten);
        assert!(rewritten[0].text().starts_with("Generate an image"));
        assert!(rewritten[0].text().ends_with("a lighthouse at dusk"));
        assert_eq!(messages[0].text(), "a lighthouse at dusk");
    }

    #[test]
    fn image_prompt_gets_instruction_appended() {
        let messages = vec![Message::user("make it night", &["data:image/png;base64,AAA="])];
        let rewritten = apply(&messages, PromptVariant::Rewritten);
        let ContentPart::Text(last) = rewritten[0].parts.last().unwrap() else {
            panic!("expected trailing text part");
        };
        assert_eq!(last, INCLUDE_NEW_IMAGE);
        assert!(rewritten[0].has_image());
    }

    #[test]
    fn strengthened_prompt_only_touches_the_last_user_turn() {
        let messages = vec![
            Message::user("first", &[] as &[&str]),
            Message::new(Role::Assistant, vec![ContentPart::Text("ok".to_string())]),
            Message::user("生成 a dragon", &[] as &[&str]),
        ];
        let strengthened = apply(&messages, PromptVariant::Strengthened);
        assert_eq!(strengthened[0].text(), "first");
        assert!(strengthened[2].text().starts_with(SAFETY_PREFIX));
        assert!(strengthened[2].text().ends_with("生成 a dragon"));
        assert_eq!(original_prompt(&messages), "生成 a dragon");
    }
}
