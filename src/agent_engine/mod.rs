pub mod engine;
pub mod event_bus;
pub mod history;
pub mod state;
