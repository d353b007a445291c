// Exam-prep prompt templates.

pub const MATERIALS_SYSTEM: &str = "You are a teacher who only responds in JSON format.";

pub const MATERIALS_PROMPT: &str = r#"Act as an expert tutor. Create a study guide for a {grade} student on {subject}: {topic}.
Difficulty level: {difficulty}.

Return ONLY a JSON object with:
1. keyConcepts: (list of strings)
2. questions: (list of objects with 'id' and 'text')"#;

pub const SOLVE_SYSTEM: &str = "You are an expert tutor. Solve the following exam question \
    clearly, accurately, and step-by-step.";

pub fn materials_prompt(subject: &str, topic: &str, grade: &str, difficulty: &str) -> String {
    MATERIALS_PROMPT
        .replace("{grade}", grade)
        .replace("{subject}", subject)
        .replace("{topic}", topic)
        .replace("{difficulty}", difficulty)
}

pub fn solve_prompt(question: &str) -> String {
    format!("Please solve this question: {question}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_materials_prompt_fills_placeholders() {
        let prompt = materials_prompt("Math", "Calculus", "10th grade", "Intermediate");
        assert!(prompt.contains("10th grade student on Math: Calculus"));
        assert!(prompt.contains("Difficulty level: Intermediate."));
        assert!(!prompt.contains('{'));
    }
}
