use actix_web::{web, HttpResponse, Result as ActixResult};
use crate::database::{extraction_attempts as attempts_db, source_messages as messages_db};
use crate::database::Database;
use crate::jobs::ingestion_manager::{IngestionManager, SyncError};
use serde::Deserialize;
use shared_types::{
    CreateSourceMessagesRequest, EnqueueMessagesResponse, ErrorResponse,
    ExtractionAttemptsResponse,
};
use std::sync::Arc;
use tracing::info;

pub async fn enqueue_messages(
    db: web::Data<Arc<Database>>,
    request: web::Json<CreateSourceMessagesRequest>,
) -> ActixResult<HttpResponse> {
    let messages = request.into_inner().messages;
    if let Some(blank) = messages
        .iter()
        .find(|m| m.source_id.trim().is_empty() || m.body.trim().is_empty())
    {
        return Err(actix_web::error::ErrorBadRequest(format!(
            "message {:?} needs a source_id and a body",
            blank.source_id
        )));
    }

    let queued = messages_db::insert_messages(db.async_connection.clone(), &messages)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    info!("Queued {} of {} messages", queued, messages.len());
    Ok(HttpResponse::Ok().json(EnqueueMessagesResponse {
        queued,
        skipped: messages.len() - queued,
    }))
}

pub async fn sync_messages(
    manager: web::Data<Arc<IngestionManager>>,
) -> ActixResult<HttpResponse> {
    match manager.sync_pending().await {
        Ok(report) => Ok(HttpResponse::Ok().json(report)),
        Err(SyncError::SyncAlreadyRunning) => Ok(HttpResponse::Conflict().json(ErrorResponse {
            error: SyncError::SyncAlreadyRunning.to_string(),
        })),
        Err(e) => Err(actix_web::error::ErrorInternalServerError(e.to_string())),
    }
}

#[derive(Deserialize)]
pub struct AttemptsQuery {
    limit: Option<usize>,
}

pub async fn list_extraction_attempts(
    db: web::Data<Arc<Database>>,
    query: web::Query<AttemptsQuery>,
) -> ActixResult<HttpResponse> {
    let limit = query.limit.unwrap_or(50).min(500);
    let attempts = attempts_db::list_attempts(db.async_connection.clone(), limit)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    Ok(HttpResponse::Ok().json(ExtractionAttemptsResponse { attempts }))
}
