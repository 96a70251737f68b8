//! Gemini API access: wire types, HTTP client and the batch capability trait.

pub mod batch;
pub mod client;
pub mod types;

pub use batch::BatchOps;
pub use client::{GeminiClient, GeminiSettings};
pub use types::{BatchRequest, Job, JsonSchema};
