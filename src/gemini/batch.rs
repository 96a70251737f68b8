//! The batch capability consumed by the job monitor and result commands.

use std::future::Future;
use std::pin::Pin;

use crate::error::AppError;
use crate::gemini::client::GeminiClient;
use crate::gemini::types::{BatchRequest, Job};

type BoxFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, AppError>> + Send + 'a>>;

/// Submit / list / get / cancel / delete / download operations against the
/// batch service, allowing test fakes.
pub trait BatchOps: Send + Sync {
    /// Creates a batch job labelled `display_name`.
    fn submit<'a>(&'a self, requests: &'a [BatchRequest], display_name: &'a str)
        -> BoxFut<'a, Job>;

    /// Lists every known job.
    fn list(&self) -> BoxFut<'_, Vec<Job>>;

    /// Fetches a job with its full response.
    fn get<'a>(&'a self, name: &'a str) -> BoxFut<'a, Job>;

    fn cancel<'a>(&'a self, name: &'a str) -> BoxFut<'a, ()>;

    fn delete<'a>(&'a self, name: &'a str) -> BoxFut<'a, ()>;

    /// Downloads a result file as raw JSONL text.
    fn download_raw<'a>(&'a self, file_name: &'a str) -> BoxFut<'a, String>;
}

impl BatchOps for GeminiClient {
    fn submit<'a>(
        &'a self,
        requests: &'a [BatchRequest],
        display_name: &'a str,
    ) -> BoxFut<'a, Job> {
        Box::pin(self.batch_generate_content(requests, display_name))
    }

    fn list(&self) -> BoxFut<'_, Vec<Job>> {
        Box::pin(self.list_batches())
    }

    fn get<'a>(&'a self, name: &'a str) -> BoxFut<'a, Job> {
        Box::pin(self.get_batch(name))
    }

    fn cancel<'a>(&'a self, name: &'a str) -> BoxFut<'a, ()> {
        Box::pin(self.cancel_batch(name))
    }

    fn delete<'a>(&'a self, name: &'a str) -> BoxFut<'a, ()> {
        Box::pin(self.delete_batch(name))
    }

    fn download_raw<'a>(&'a self, file_name: &'a str) -> BoxFut<'a, String> {
        Box::pin(self.download_batch_results(file_name))
    }
}
