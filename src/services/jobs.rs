//! External job sink
//!
//! Invoice generation and extras finalization are idempotent jobs consumed
//! by external workers; the engine only emits them after the atomic commit
//! and never awaits their completion.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

/// A deferred side effect requested by a post-action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExternalJob {
    GenerateInvoice { booking_id: Uuid },
    FinalizeExtras { booking_id: Uuid },
}

impl ExternalJob {
    /// Idempotency key: external workers de-duplicate on this.
    pub fn idempotency_key(&self) -> String {
        match self {
            ExternalJob::GenerateInvoice { booking_id } => format!("invoice:{}", booking_id),
            ExternalJob::FinalizeExtras { booking_id } => format!("extras:{}", booking_id),
        }
    }
}

/// Port to the external worker queue
#[async_trait]
pub trait JobSink: Send + Sync {
    async fn submit(&self, job: ExternalJob);
}

/// In-memory sink; tests and the demo binary inspect what was submitted
#[derive(Default)]
pub struct InMemoryJobSink {
    submitted: Mutex<Vec<ExternalJob>>,
}

impl InMemoryJobSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn drain(&self) -> Vec<ExternalJob> {
        std::mem::take(&mut *self.submitted.lock().await)
    }

    pub async fn submitted(&self) -> Vec<ExternalJob> {
        self.submitted.lock().await.clone()
    }
}

#[async_trait]
impl JobSink for InMemoryJobSink {
    async fn submit(&self, job: ExternalJob) {
        tracing::debug!(key = %job.idempotency_key(), "External job submitted");
        self.submitted.lock().await.push(job);
    }
}
