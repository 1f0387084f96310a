pub mod interpreter;
pub mod parser;
pub mod prompt;
pub mod types;
