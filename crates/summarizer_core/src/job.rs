use std::time::Duration;

/// Unit of work processing exactly one URL through fetch and summarize.
///
/// Created at batch submission and owned exclusively by one execution task
/// until its outcome is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub url: String,
    pub title: Option<String>,
    /// Per-attempt timeout for this job's fetch and summarize calls.
    pub timeout: Duration,
}

impl Job {
    pub fn new(url: String, title: Option<String>, timeout: Duration) -> Self {
        Self {
            url,
            title,
            timeout,
        }
    }
}
