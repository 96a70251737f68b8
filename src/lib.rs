//! Keyword localization, classification and validation on top of the Gemini
//! batch API.
//!
//! Keywords are chunked into keyed batch requests, submitted as one job,
//! tracked until the job finishes and merged back into a single CSV.

pub mod ads;
pub mod commands;
pub mod config;
pub mod error;
pub mod gemini;
pub mod jobs;
pub mod requests;
pub mod results;
pub mod state;

pub use config::AppConfig;
pub use error::AppError;
pub use results::merger::{merge_results, MergeMode};
pub use state::AppState;
