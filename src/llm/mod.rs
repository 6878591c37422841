pub mod openai;

pub use openai::{OpenAiCompletionService, OpenAiConfig};
