pub mod analysis;
pub mod handlers;
pub mod lifecycle;
pub mod prompts;
