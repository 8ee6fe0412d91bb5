pub mod cli;
pub mod error;
pub mod history;
pub mod layout;
pub mod manifest;
pub mod metadata;
pub mod observability;
pub mod orchestrator;
pub mod paths;
pub mod sum;
pub mod traversal;

pub use anyhow::{Context, Result};
