//! Job, priority and result types for the Concurrency Manager.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::{CdpError, Result};

/// Higher runs first; within a priority, arrival order is preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    Low = 0,
    Normal = 1,
    High = 2,
    Critical = 3,
}

pub type JobFuture = Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send>>;

/// One unit of work the Concurrency Manager schedules. `target_id` is the
/// serialization key: at most one job per target id runs at a time.
pub struct Job {
    pub id: String,
    pub target_id: String,
    pub priority: JobPriority,
    pub run: Box<dyn FnOnce() -> JobFuture + Send>,
}

impl Job {
    pub fn new(
        id: impl Into<String>,
        target_id: impl Into<String>,
        priority: JobPriority,
        run: impl FnOnce() -> JobFuture + Send + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            target_id: target_id.into(),
            priority,
            run: Box::new(run),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: String,
    pub success: bool,
    pub value: Option<serde_json::Value>,
    pub error: Option<CdpError>,
    pub elapsed_ms: u64,
}
