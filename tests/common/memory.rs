//! In-memory registry and recorder for exercising the dispatcher without
//! a database.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gitrelay::error::{AppError, AppResult};
use gitrelay::models::{DestinationEntry, DispatchSummary};
use gitrelay::services::{DestinationRegistry, EventRecorder};

/// Registry serving a fixed list of destinations
#[derive(Default)]
pub struct MemoryRegistry {
    entries: Vec<DestinationEntry>,
    unavailable: bool,
}

impl MemoryRegistry {
    pub fn new(entries: Vec<DestinationEntry>) -> Arc<Self> {
        Arc::new(Self {
            entries,
            unavailable: false,
        })
    }

    /// A registry whose every call fails
    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            entries: Vec::new(),
            unavailable: true,
        })
    }
}

#[async_trait]
impl DestinationRegistry for MemoryRegistry {
    async fn list_active(&self) -> AppResult<Vec<DestinationEntry>> {
        if self.unavailable {
            return Err(AppError::Internal("registry offline".to_string()));
        }
        Ok(self.entries.clone())
    }

    async fn get(&self, id: i32) -> AppResult<Option<DestinationEntry>> {
        if self.unavailable {
            return Err(AppError::Internal("registry offline".to_string()));
        }
        Ok(self.entries.iter().find(|e| e.id() == id).cloned())
    }
}

/// Recorder keeping every summary it receives
#[derive(Default)]
pub struct MemoryRecorder {
    summaries: Mutex<Vec<DispatchSummary>>,
}

impl MemoryRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn summaries(&self) -> Vec<DispatchSummary> {
        self.summaries.lock().unwrap().clone()
    }

    /// Polls until `count` summaries were recorded, for work spawned by
    /// the webhook handler after it responded
    pub async fn wait_for(&self, count: usize) -> Vec<DispatchSummary> {
        for _ in 0..200 {
            let summaries = self.summaries();
            if summaries.len() >= count {
                return summaries;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {} recorded summaries, got {}",
            count,
            self.summaries().len()
        );
    }
}

#[async_trait]
impl EventRecorder for MemoryRecorder {
    async fn record(&self, summary: &DispatchSummary) -> AppResult<()> {
        self.summaries.lock().unwrap().push(summary.clone());
        Ok(())
    }
}
