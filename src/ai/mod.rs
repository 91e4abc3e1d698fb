mod generator;

pub use generator::{ClaudeGenerator, TextGenerator};
