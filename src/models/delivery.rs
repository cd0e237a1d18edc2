//! Delivery outcomes and the per-request dispatch summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DeliveryError, PipelineError};
use crate::ingest::EventMetadata;
use crate::models::{Destination, DestinationType};

/// Diagnostics quote at most this many characters of a remote response
pub const MAX_ERROR_BODY: usize = 200;

// =============================================================================
// Status Enums
// =============================================================================

/// Outcome of one destination delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Success,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
        }
    }
}

/// Whether the inbound request produced an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Parsed,
    Rejected,
}

impl EnvelopeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeStatus::Parsed => "parsed",
            EnvelopeStatus::Rejected => "rejected",
        }
    }
}

/// Progress of a request through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStage {
    Received,
    Detected,
    Parsed,
    Dispatching,
    Completed,
    Rejected,
}

impl DispatchStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStage::Received => "received",
            DispatchStage::Detected => "detected",
            DispatchStage::Parsed => "parsed",
            DispatchStage::Dispatching => "dispatching",
            DispatchStage::Completed => "completed",
            DispatchStage::Rejected => "rejected",
        }
    }
}

// =============================================================================
// Delivery Result
// =============================================================================

/// Outcome of delivering one event to one destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    /// Absent for the synthetic record of a rejected request
    pub destination_id: Option<i32>,
    pub destination_name: Option<String>,
    pub destination_type: Option<DestinationType>,
    pub status: DeliveryStatus,
    pub error_detail: Option<String>,
    pub http_status: Option<u16>,
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

impl DeliveryResult {
    /// Creates a successful result
    pub fn success(http_status: Option<u16>, attempts: u32) -> Self {
        Self {
            destination_id: None,
            destination_name: None,
            destination_type: None,
            status: DeliveryStatus::Success,
            error_detail: None,
            http_status,
            attempts,
            timestamp: Utc::now(),
        }
    }

    /// Creates a failed result
    pub fn failure(error: &DeliveryError, http_status: Option<u16>, attempts: u32) -> Self {
        Self {
            destination_id: None,
            destination_name: None,
            destination_type: None,
            status: DeliveryStatus::Failed,
            error_detail: Some(error.to_string()),
            http_status,
            attempts,
            timestamp: Utc::now(),
        }
    }

    /// The synthetic, destination-less result recorded for a rejected request
    pub fn rejected(error: &PipelineError) -> Self {
        Self {
            destination_id: None,
            destination_name: None,
            destination_type: None,
            status: DeliveryStatus::Failed,
            error_detail: Some(format!("{}: {}", error.kind(), error)),
            http_status: None,
            attempts: 0,
            timestamp: Utc::now(),
        }
    }

    /// Binds the result to a destination
    pub fn for_destination(mut self, destination: &Destination) -> Self {
        self.destination_id = Some(destination.id);
        self.destination_name = Some(destination.name.clone());
        self.destination_type = Some(destination.destination_type());
        self
    }

    pub fn with_destination(mut self, id: i32, name: impl Into<String>) -> Self {
        self.destination_id = Some(id);
        self.destination_name = Some(name.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == DeliveryStatus::Success
    }
}

// =============================================================================
// Dispatch Summary
// =============================================================================

/// Everything the event log keeps about one inbound request
#[derive(Debug, Clone, Serialize)]
pub struct DispatchSummary {
    pub envelope_status: EnvelopeStatus,
    pub stage: DispatchStage,
    pub metadata: EventMetadata,
    /// Error kind and message for rejected requests
    pub rejection: Option<String>,
    pub per_destination: Vec<DeliveryResult>,
    pub received_at: DateTime<Utc>,
}

impl DispatchSummary {
    /// Summary of a request that never reached dispatch
    pub fn rejected(
        metadata: EventMetadata,
        error: &PipelineError,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            envelope_status: EnvelopeStatus::Rejected,
            stage: DispatchStage::Rejected,
            metadata,
            rejection: Some(format!("{}: {}", error.kind(), error)),
            per_destination: vec![DeliveryResult::rejected(error)],
            received_at,
        }
    }

    /// Summary of a parsed event after fan-out
    pub fn completed(
        metadata: EventMetadata,
        per_destination: Vec<DeliveryResult>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            envelope_status: EnvelopeStatus::Parsed,
            stage: DispatchStage::Completed,
            metadata,
            rejection: None,
            per_destination,
            received_at,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.per_destination.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.per_destination.len() - self.succeeded()
    }
}
