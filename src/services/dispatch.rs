//! Webhook pipeline orchestration.
//!
//! A request moves through `Received → Detected → Parsed → Dispatching →
//! Completed`, or ends in `Rejected` before dispatch. Every request, accepted
//! or not, produces exactly one [`DispatchSummary`] handed to the recorder.
//!
//! Fan-out runs one task per destination on a [`JoinSet`], bounded by a
//! semaphore and wrapped in a per-destination timeout. A failing, slow or
//! panicking destination only affects its own result.
//!
//! Work that outlives an HTTP response goes through
//! [`Dispatcher::spawn_background`] so shutdown can wait for it with
//! [`Dispatcher::drain`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::DispatchConfig;
use crate::error::{AppError, AppResult, DeliveryError, PipelineError};
use crate::format::{format_with, FormatOptions};
use crate::ingest::{self, signature, EventEnvelope, EventMetadata, WebhookHeaders};
use crate::models::{DeliveryResult, DestinationEntry, DispatchStage, DispatchSummary};
use crate::services::notification::Notifier;
use crate::services::{DestinationRegistry, EventRecorder};

/// A webhook request as received over HTTP
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub headers: WebhookHeaders,
    pub body: Bytes,
    pub received_at: DateTime<Utc>,
}

impl InboundRequest {
    pub fn new(headers: WebhookHeaders, body: impl Into<Bytes>) -> Self {
        Self {
            headers,
            body: body.into(),
            received_at: Utc::now(),
        }
    }
}

/// A request that failed before dispatch, with whatever metadata was known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub metadata: EventMetadata,
    pub error: PipelineError,
    /// Last stage reached before the failure
    pub stage: DispatchStage,
}

/// Destinations selected for one envelope
#[derive(Debug)]
pub struct DispatchPlan {
    pub envelope: EventEnvelope,
    /// Filter-matching destinations in registry order
    pub targets: Vec<DestinationEntry>,
    /// Set when the registry could not be read
    pub registry_error: Option<String>,
    pub received_at: DateTime<Utc>,
}

pub struct Dispatcher {
    registry: Arc<dyn DestinationRegistry>,
    recorder: Arc<dyn EventRecorder>,
    notifier: Notifier,
    config: DispatchConfig,
    webhook_secret: Option<String>,
    /// Runtime for background work; the caller's runtime when unset
    runtime: Option<Handle>,
    background: Mutex<JoinSet<()>>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<dyn DestinationRegistry>,
        recorder: Arc<dyn EventRecorder>,
        notifier: Notifier,
        config: DispatchConfig,
    ) -> Self {
        Self {
            registry,
            recorder,
            notifier,
            config,
            webhook_secret: None,
            runtime: None,
            background: Mutex::new(JoinSet::new()),
        }
    }

    /// Runs background work on `runtime` instead of the spawning thread's.
    ///
    /// Actix worker runtimes are torn down on shutdown, taking their tasks
    /// with them, so the server passes its main runtime here.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Requires inbound requests to carry a valid signature for `secret`
    pub fn with_webhook_secret(mut self, secret: Option<String>) -> Self {
        self.webhook_secret = secret.filter(|s| !s.is_empty());
        self
    }

    /// Runs the whole pipeline for one request and records the outcome
    pub async fn handle(&self, request: InboundRequest) -> DispatchSummary {
        match self.parse_stage(&request) {
            Ok(envelope) => self.dispatch(envelope, request.received_at).await,
            Err(rejection) => self.reject(rejection, request.received_at).await,
        }
    }

    /// Detection, signature verification and parsing. Pure apart from logging.
    pub fn parse_stage(&self, request: &InboundRequest) -> Result<EventEnvelope, Rejection> {
        let mut metadata = EventMetadata::default();

        let detected = ingest::detect(&request.headers).map_err(|error| Rejection {
            metadata: metadata.clone(),
            error,
            stage: DispatchStage::Received,
        })?;
        metadata.platform = Some(detected.platform);
        metadata.event_type = Some(detected.event_hint.clone());

        if let Some(secret) = &self.webhook_secret {
            signature::verify(detected.platform, &request.headers, &request.body, secret).map_err(
                |error| Rejection {
                    metadata: metadata.clone(),
                    error,
                    stage: DispatchStage::Detected,
                },
            )?;
        }

        ingest::parse(detected.platform, &detected.event_hint, &request.body).map_err(|error| {
            Rejection {
                metadata,
                error,
                stage: DispatchStage::Detected,
            }
        })
    }

    /// Records a rejected request
    pub async fn reject(&self, rejection: Rejection, received_at: DateTime<Utc>) -> DispatchSummary {
        log::warn!(
            "Rejected webhook at stage {}: {}",
            rejection.stage.as_str(),
            rejection.error
        );

        let summary = DispatchSummary::rejected(rejection.metadata, &rejection.error, received_at);
        self.record(&summary).await;
        summary
    }

    /// Fans an envelope out to every matching destination and records it
    pub async fn dispatch(&self, envelope: EventEnvelope, received_at: DateTime<Utc>) -> DispatchSummary {
        let plan = self.plan(envelope, received_at).await;
        self.execute(plan).await
    }

    /// Fetches active destinations and applies their filters
    pub async fn plan(&self, envelope: EventEnvelope, received_at: DateTime<Utc>) -> DispatchPlan {
        let (targets, registry_error) = match self.registry.list_active().await {
            Ok(entries) => (self.select(&envelope, entries), None),
            Err(e) => {
                log::error!("Failed to load destinations: {}", e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        DispatchPlan {
            envelope,
            targets,
            registry_error,
            received_at,
        }
    }

    fn select(&self, envelope: &EventEnvelope, entries: Vec<DestinationEntry>) -> Vec<DestinationEntry> {
        entries
            .into_iter()
            .filter(|entry| match entry {
                DestinationEntry::Valid(destination) => {
                    let matches = destination.filters.should_notify(envelope);
                    if !matches {
                        log::debug!(
                            "Destination {} filters skip {} event for {}",
                            destination.id,
                            envelope.event_type,
                            envelope.project
                        );
                    }
                    matches
                }
                // Surfaced as a config failure rather than dropped
                DestinationEntry::Invalid { .. } => true,
            })
            .collect()
    }

    /// Delivers a plan and records the summary
    pub async fn execute(&self, plan: DispatchPlan) -> DispatchSummary {
        let metadata = EventMetadata::from(&plan.envelope);

        log::info!(
            "Dispatching {} {} event for {} to {} destination(s)",
            plan.envelope.platform,
            plan.envelope.event_type,
            plan.envelope.project,
            plan.targets.len()
        );

        let per_destination = match plan.registry_error {
            Some(error) => vec![DeliveryResult::failure(
                &DeliveryError::Failure(format!("Destination registry unavailable: {}", error)),
                None,
                0,
            )],
            None => self.fan_out(plan.envelope, plan.targets).await,
        };

        let summary = DispatchSummary::completed(metadata, per_destination, plan.received_at);
        log::info!(
            "Dispatch completed: {} succeeded, {} failed",
            summary.succeeded(),
            summary.failed()
        );

        self.record(&summary).await;
        summary
    }

    /// Runs one delivery task per target; results keep target order
    pub async fn fan_out(
        &self,
        envelope: EventEnvelope,
        targets: Vec<DestinationEntry>,
    ) -> Vec<DeliveryResult> {
        let envelope = Arc::new(envelope);
        let options = FormatOptions {
            max_commits: self.config.max_displayed_commits,
        };
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let timeout = self.config.delivery_timeout;

        let mut slots: Vec<Option<DeliveryResult>> = vec![None; targets.len()];
        let mut running = HashMap::new();
        let mut tasks = JoinSet::new();

        for (index, entry) in targets.into_iter().enumerate() {
            let destination = match entry {
                DestinationEntry::Valid(destination) => destination,
                DestinationEntry::Invalid { id, name, error } => {
                    log::warn!("Destination {} has invalid configuration: {}", id, error);
                    slots[index] = Some(
                        DeliveryResult::failure(&DeliveryError::Config(error), None, 0)
                            .with_destination(id, name),
                    );
                    continue;
                }
            };

            let placeholder = DeliveryResult::failure(
                &DeliveryError::Failure("Delivery task panicked".to_string()),
                None,
                0,
            )
            .for_destination(&destination);

            let envelope = Arc::clone(&envelope);
            let semaphore = Arc::clone(&semaphore);
            let notifier = self.notifier.clone();
            let options = options.clone();

            let handle = tasks.spawn(async move {
                // The semaphore is never closed
                let _permit = semaphore.acquire_owned().await.ok();

                let family = destination.destination_type().family();
                let message = format_with(&envelope, family, &options);

                match tokio::time::timeout(timeout, notifier.send(&destination, &message)).await {
                    Ok(result) => (index, result),
                    Err(_) => {
                        log::warn!(
                            "Delivery to destination {} timed out after {:?}",
                            destination.id,
                            timeout
                        );
                        let result = DeliveryResult::failure(&DeliveryError::Timeout(timeout), None, 1)
                            .for_destination(&destination);
                        (index, result)
                    }
                }
            });
            running.insert(handle.id(), (index, placeholder));
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, (index, result))) => slots[index] = Some(result),
                Err(e) => {
                    log::error!("Delivery task failed: {}", e);
                    if let Some((index, placeholder)) = running.remove(&e.id()) {
                        slots[index] = Some(placeholder);
                    }
                }
            }
        }

        slots.into_iter().flatten().collect()
    }

    /// Sends a synthetic message to one destination without recording it
    pub async fn test_destination(&self, id: i32) -> AppResult<DeliveryResult> {
        let entry = self
            .registry
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Destination {} not found", id)))?;

        let result = match entry {
            DestinationEntry::Valid(destination) => self
                .notifier
                .test_connection(&destination.config)
                .await
                .for_destination(&destination),
            DestinationEntry::Invalid { id, name, error } => {
                DeliveryResult::failure(&DeliveryError::Config(error), None, 0)
                    .with_destination(id, name)
            }
        };

        Ok(result)
    }

    /// Spawns work that must finish even after its request has been answered
    pub fn spawn_background<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.background.lock().unwrap_or_else(PoisonError::into_inner);
        // Reap finished tasks so the set only holds running ones
        while tasks.try_join_next().is_some() {}

        match &self.runtime {
            Some(runtime) => tasks.spawn_on(task, runtime),
            None => tasks.spawn(task),
        };
    }

    /// Number of background tasks not yet reaped
    pub fn pending_background(&self) -> usize {
        self.background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Waits up to `timeout` for background work to finish.
    ///
    /// Returns `false` when tasks were still running at the deadline; those
    /// are aborted.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let mut tasks =
            std::mem::take(&mut *self.background.lock().unwrap_or_else(PoisonError::into_inner));
        if tasks.is_empty() {
            return true;
        }

        log::info!("Waiting for {} background task(s)", tasks.len());
        let finished = tokio::time::timeout(timeout, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    log::error!("Background task failed: {}", e);
                }
            }
        })
        .await
        .is_ok();

        if !finished {
            log::warn!(
                "Abandoning {} background task(s) after {:?}",
                tasks.len(),
                timeout
            );
        }
        finished
    }

    async fn record(&self, summary: &DispatchSummary) {
        if let Err(e) = self.recorder.record(summary).await {
            log::error!("Failed to record webhook event: {}", e);
        }
    }
}
