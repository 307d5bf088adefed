pub mod cache;
pub mod llm;
pub mod prompts;
pub mod responder;
