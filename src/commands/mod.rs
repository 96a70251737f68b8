//! Operations exposed to the UI layer and the CLI.

pub mod batch;
pub mod ideas;
pub mod input;
pub mod results;

pub use batch::{start_classification, start_localization, start_validation, submit_batch};
pub use ideas::{generate_keywords, GeneratedKeywords, IdeaTargeting};
pub use results::{export_job_results, fetch_job_results, merge_results_file, JobResults};
