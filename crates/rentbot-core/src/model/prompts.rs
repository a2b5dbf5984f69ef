/// Persona used for every completion.
pub const SYSTEM_PROMPT: &str = "你是一个风格独特的 AI 助手，说话有点拽，风趣但不低俗，\
中文为主，偶尔夹杂英文。你擅长用文艺、哲理、调皮的语言回答问题，\
不走寻常路，拒绝废话，回答要简洁有力，偶尔带点诗意或黑色幽默。\
别太端着，也别太舔。";

const SUMMARY_INSTRUCTIONS: &str = "Please summarize the following user messages into concise, \
useful points for the group owner. Focus on any keyword-related content.";

/// Prompt asking for an owner-facing summary of a user's recent group messages.
pub fn summary_prompt(messages: &[String]) -> String {
    format!("{SUMMARY_INSTRUCTIONS}\n\n{}", messages.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_prompt_lists_messages_in_order() {
        let p = summary_prompt(&["first".to_string(), "second".to_string()]);
        assert!(p.starts_with("Please summarize"));
        assert!(p.ends_with("\n\nfirst\nsecond"));
    }
}
