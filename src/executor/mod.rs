pub mod accessibility;
pub mod backend;
pub mod dispatcher;
pub mod input;
pub mod shell;
pub mod text_input;
