use actix_web::{http::StatusCode, web, HttpResponse};
use serde::Serialize;

use crate::db::{self, DbPool};

#[derive(Serialize)]
pub struct LivenessResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    status: &'static str,
    checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    /// Destination registry and event log
    database: &'static str,
}

/// GET /health
pub async fn liveness() -> HttpResponse {
    HttpResponse::Ok().json(LivenessResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /health/ready
///
/// 503 while the database is unreachable: webhooks would still be accepted
/// but no destination could be loaded and nothing recorded.
pub async fn readiness(pool: web::Data<DbPool>) -> HttpResponse {
    let database_ok = db::health_check(pool.get_ref()).await;
    if !database_ok {
        log::warn!("Readiness check failed: database unreachable");
    }

    let (status, database, http_status) = if database_ok {
        ("ready", "ok", StatusCode::OK)
    } else {
        ("not_ready", "unreachable", StatusCode::SERVICE_UNAVAILABLE)
    };

    HttpResponse::build(http_status).json(ReadinessResponse {
        status,
        checks: ReadinessChecks { database },
    })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/health")
            .route("", web::get().to(liveness))
            .route("/ready", web::get().to(readiness)),
    );
}
