// Conversation-analysis prompt templates.

pub const ANALYSIS_PROMPT: &str = r#"Analyze this study conversation and extract key learning points.

Conversation:
{conversation}

Return exactly a JSON object with:
1. key_concepts (list of strings)
2. definitions (list of {"term": "...", "definition": "..."})
3. study_tips (list of strings)
4. resources (list of strings)
5. summary (string)"#;

pub fn analysis_prompt(conversation: &str) -> String {
    ANALYSIS_PROMPT.replace("{conversation}", conversation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_conversation() {
        let prompt = analysis_prompt("A: hi\nB: hello");
        assert!(prompt.contains("A: hi\nB: hello"));
        assert!(!prompt.contains("{conversation}"));
    }
}
