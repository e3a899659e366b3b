use actix_web::{web, HttpResponse, Result as ActixResult};
use base64::Engine;
use ledgerly_agents::dedup::DeduplicationEngine;
use ledgerly_agents::vision::VisionStatementExtractor;
use shared_types::{ParseStatementImageRequest, StatementCandidate, StatementImageResponse};
use std::sync::Arc;
use tracing::info;

const DEFAULT_MIME_TYPE: &str = "image/png";

/// One statement page through the vision extractor; stores candidates only on request
pub async fn parse_statement_image(
    vision: web::Data<Option<Arc<VisionStatementExtractor>>>,
    dedup: web::Data<Arc<DeduplicationEngine>>,
    request: web::Json<ParseStatementImageRequest>,
) -> ActixResult<HttpResponse> {
    let vision = vision.get_ref().as_ref().ok_or_else(|| {
        actix_web::error::ErrorServiceUnavailable(
            "Statement parsing needs gemini_api_key in the config file",
        )
    })?;
    let request = request.into_inner();

    let image = base64::engine::general_purpose::STANDARD
        .decode(request.image_base64.trim())
        .map_err(|e| actix_web::error::ErrorBadRequest(format!("Invalid image_base64: {}", e)))?;
    if image.is_empty() {
        return Err(actix_web::error::ErrorBadRequest("image_base64 is empty"));
    }
    let mime_type = request.mime_type.as_deref().unwrap_or(DEFAULT_MIME_TYPE);

    let found = vision.parse_page(&image, mime_type).await;

    let mut candidates = Vec::with_capacity(found.len());
    for transaction in found {
        if !request.persist {
            candidates.push(StatementCandidate {
                transaction,
                duplicate: false,
            });
            continue;
        }
        let outcome = dedup
            .insert(transaction)
            .await
            .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;
        candidates.push(StatementCandidate {
            duplicate: outcome.is_duplicate(),
            transaction: outcome.into_transaction(),
        });
    }

    info!(
        "Statement page gave {} candidates (persist: {})",
        candidates.len(),
        request.persist
    );
    Ok(HttpResponse::Ok().json(StatementImageResponse {
        candidates,
        persisted: request.persist,
    }))
}

#[cfg(test)]
mod tests {
    use crate::test_support::TestApp;
    use actix_web::{http::StatusCode, test};
    use base64::Engine;
    use serde_json::json;
    use shared_types::StatementImageResponse;

    fn page() -> String {
        base64::engine::general_purpose::STANDARD.encode(b"fake-png-bytes")
    }

    #[actix_web::test]
    async fn test_candidates_are_stored_once_when_persisting() {
        let rows = r#"{"transactions": [{"date": "2025-09-25", "description": "NETFLIX.COM", "merchant": "Netflix", "amount": "649.00", "type": "debit"}]}"#;
        let harness = TestApp::with_model_replies(vec![rows, rows]);
        let app = test::init_service(harness.app()).await;

        let first: StatementImageResponse = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/statements/parse-image")
                .set_json(json!({ "image_base64": page(), "persist": true }))
                .to_request(),
        )
        .await;
        assert!(first.persisted);
        assert_eq!(first.candidates.len(), 1);
        assert!(!first.candidates[0].duplicate);
        assert_eq!(first.candidates[0].transaction.amount, 649.0);

        let second: StatementImageResponse = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/statements/parse-image")
                .set_json(json!({ "image_base64": page(), "mime_type": "image/png", "persist": true }))
                .to_request(),
        )
        .await;
        assert!(second.candidates[0].duplicate);
    }

    #[actix_web::test]
    async fn test_without_model_or_bad_payload() {
        let harness = TestApp::new();
        let app = test::init_service(harness.app()).await;
        let unavailable = test::TestRequest::post()
            .uri("/api/statements/parse-image")
            .set_json(json!({ "image_base64": page() }))
            .send_request(&app)
            .await;
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);

        let harness = TestApp::with_model_replies(vec![]);
        let app = test::init_service(harness.app()).await;
        let bad = test::TestRequest::post()
            .uri("/api/statements/parse-image")
            .set_json(json!({ "image_base64": "not base64!" }))
            .send_request(&app)
            .await;
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }
}
