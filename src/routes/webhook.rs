use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use bytes::Bytes;
use serde::Serialize;

use crate::error::{ErrorDetail, PipelineError};
use crate::ingest::{Platform, WebhookHeaders};
use crate::services::{Dispatcher, InboundRequest};

/// Response for an accepted webhook
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: &'static str,
    pub platform: Platform,
    pub event_type: String,
    pub project: String,
    /// Number of destinations the event is being delivered to
    pub destinations: usize,
}

#[derive(Debug, Serialize)]
struct RejectedResponse {
    status: &'static str,
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct IgnoredResponse {
    status: &'static str,
    reason: String,
}

fn rejection_response(error: &PipelineError) -> HttpResponse {
    let status = error.status_code();
    match error {
        PipelineError::UnsupportedEventType { .. } => {
            HttpResponse::build(status).json(IgnoredResponse {
                status: "ignored",
                reason: error.to_string(),
            })
        }
        _ => HttpResponse::build(status).json(RejectedResponse {
            status: "rejected",
            error: ErrorDetail {
                error_type: error.kind().to_string(),
                message: error.to_string(),
            },
        }),
    }
}

/// POST /webhook/git
///
/// Parses synchronously and answers 202 as soon as dispatch is spawned.
/// Delivery outcomes only reach the event log. Spawned work is tracked by
/// the dispatcher so shutdown can drain it.
pub async fn receive(
    dispatcher: web::Data<Dispatcher>,
    req: HttpRequest,
    body: Bytes,
) -> HttpResponse {
    let request = InboundRequest::new(WebhookHeaders::from_header_map(req.headers()), body);
    let received_at = request.received_at;
    let dispatcher = dispatcher.into_inner();

    let envelope = match dispatcher.parse_stage(&request) {
        Ok(envelope) => envelope,
        Err(rejection) => {
            let response = rejection_response(&rejection.error);
            let task = Arc::clone(&dispatcher);
            dispatcher.spawn_background(async move {
                task.reject(rejection, received_at).await;
            });
            return response;
        }
    };

    let plan = dispatcher.plan(envelope, received_at).await;
    let accepted = AcceptedResponse {
        status: "accepted",
        platform: plan.envelope.platform,
        event_type: plan.envelope.event_type.to_string(),
        project: plan.envelope.project.clone(),
        destinations: plan.targets.len(),
    };

    log::info!(
        "Accepted {} {} event for {}",
        accepted.platform,
        accepted.event_type,
        accepted.project
    );

    let task = Arc::clone(&dispatcher);
    dispatcher.spawn_background(async move {
        task.execute(plan).await;
    });

    HttpResponse::Accepted().json(accepted)
}

/// GET /webhook/test
pub async fn probe() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "message": "Webhook endpoint is reachable",
        "endpoint": "/webhook/git",
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/webhook")
            .route("/git", web::post().to(receive))
            .route("/test", web::get().to(probe)),
    );
}
