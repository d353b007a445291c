// Certificate-extraction prompt templates.

pub const CERTIFICATE_SYSTEM: &str = "You are a helpful assistant that outputs only JSON.";

pub fn certificate_prompt(raw_text: &str) -> String {
    format!("Analyze: '{raw_text}'. Return JSON with 'title', 'issuer', 'skills' (list).")
}
