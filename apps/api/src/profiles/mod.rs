pub mod enrichment;
pub mod handlers;
pub mod prompts;
