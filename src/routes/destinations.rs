use actix_web::{web, HttpResponse};

use crate::error::AppResult;
use crate::services::Dispatcher;

/// POST /api/destinations/{id}/test
///
/// Sends a synthetic message and returns the delivery result. Nothing is
/// written to the event log.
pub async fn test_destination(
    dispatcher: web::Data<Dispatcher>,
    path: web::Path<i32>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let result = dispatcher.test_destination(id).await?;

    log::info!(
        "Self-test of destination {} finished: {}",
        id,
        result.status.as_str()
    );

    Ok(HttpResponse::Ok().json(result))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/destinations").route("/{id}/test", web::post().to(test_destination)),
    );
}
