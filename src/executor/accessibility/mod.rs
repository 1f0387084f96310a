pub mod executor;
pub mod provider;
pub mod tree;
