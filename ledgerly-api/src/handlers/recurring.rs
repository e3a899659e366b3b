use actix_web::{web, HttpResponse, Result as ActixResult};
use crate::database::Database;
use ledgerly_agents::recurring::RecurringDetector;
use ledgerly_agents::RecurringStore;
use shared_types::{RecurringTransactionsResponse, UpdateRecurringRequest};
use std::sync::Arc;
use tracing::info;

pub async fn list_recurring(db: web::Data<Arc<Database>>) -> ActixResult<HttpResponse> {
    let recurring = db
        .ledger
        .list_recurring()
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    Ok(HttpResponse::Ok().json(RecurringTransactionsResponse { recurring }))
}

/// Full sweep over stored transactions, upserting what it finds
pub async fn detect_recurring(db: web::Data<Arc<Database>>) -> ActixResult<HttpResponse> {
    let recurring = RecurringDetector::new()
        .sweep(db.ledger.as_ref(), db.ledger.as_ref())
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    Ok(HttpResponse::Ok().json(RecurringTransactionsResponse { recurring }))
}

pub async fn update_recurring(
    db: web::Data<Arc<Database>>,
    path: web::Path<i64>,
    request: web::Json<UpdateRecurringRequest>,
) -> ActixResult<HttpResponse> {
    let id = path.into_inner();
    let updated = db
        .ledger
        .set_recurring_active(id, request.is_active)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    if !updated {
        return Err(actix_web::error::ErrorNotFound("Recurring transaction not found"));
    }

    info!("Recurring {} active: {}", id, request.is_active);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "id": id,
        "is_active": request.is_active
    })))
}

pub async fn delete_recurring(
    db: web::Data<Arc<Database>>,
    path: web::Path<i64>,
) -> ActixResult<HttpResponse> {
    let deleted = db
        .ledger
        .delete_recurring(path.into_inner())
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    if !deleted {
        return Err(actix_web::error::ErrorNotFound("Recurring transaction not found"));
    }
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use crate::test_support::TestApp;
    use actix_web::{http::StatusCode, test};
    use ledgerly_agents::TransactionStore;
    use serde_json::json;
    use shared_types::{
        ExtractionMethod, Frequency, RecurringTransactionsResponse, Transaction, TransactionType,
    };

    #[actix_web::test]
    async fn test_detect_then_deactivate() {
        let harness = TestApp::new();
        // 2025-01-05T09:00:00Z, then +30, +31, +29 days
        let mut at = 1736067600;
        for (idx, gap) in [0, 30, 31, 29].iter().enumerate() {
            at += gap * 86_400;
            let mut t = Transaction::blank(
                &format!("Netflix charge {}", idx),
                ExtractionMethod::Deterministic,
            );
            t.merchant = "Netflix".to_string();
            t.amount = 649.0;
            t.transaction_type = TransactionType::Debit;
            t.category = "Entertainment".to_string();
            t.occurred_at = at;
            harness.db.ledger.insert_transaction(&t).await.unwrap();
        }
        let app = test::init_service(harness.app()).await;

        let detected: RecurringTransactionsResponse = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri("/api/recurring/detect").to_request(),
        )
        .await;
        assert_eq!(detected.recurring.len(), 1);
        assert_eq!(detected.recurring[0].frequency, Frequency::Monthly);
        let id = detected.recurring[0].id;

        let patched = test::TestRequest::patch()
            .uri(&format!("/api/recurring/{}", id))
            .set_json(json!({ "is_active": false }))
            .send_request(&app)
            .await;
        assert_eq!(patched.status(), StatusCode::OK);

        let listed: RecurringTransactionsResponse = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/recurring").to_request(),
        )
        .await;
        assert!(!listed.recurring[0].is_active);

        let missing = test::TestRequest::delete()
            .uri("/api/recurring/9999")
            .send_request(&app)
            .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
