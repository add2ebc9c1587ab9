pub mod chunk;
pub mod cli;
pub mod config;
pub mod embed;
pub mod error;
pub mod keywords;
pub mod metadata_client;
pub mod models;
pub mod object_store;
pub mod ocr;
pub mod orchestrator;
pub mod pdf;
pub mod processor;
pub mod progress;
pub mod repository;

pub use config::Settings;
pub use orchestrator::{Orchestrator, RunSummary};
