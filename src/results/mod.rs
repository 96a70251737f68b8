//! Result reassembly: fragment extraction, merging and CSV output.

pub mod atomic_writer;
pub mod csv_output;
pub mod fragments;
pub mod merger;

pub use fragments::{parse_batch_output, JobOutput, ResponseFragment};
pub use merger::{merge_fragments, merge_results, MergeMode, MergedTable};
