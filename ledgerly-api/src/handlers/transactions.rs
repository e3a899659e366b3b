use actix_web::{web, HttpResponse, Result as ActixResult};
use crate::database::Database;
use ledgerly_agents::dedup::DeduplicationEngine;
use ledgerly_agents::transaction_extractor::HybridExtractionPipeline;
use ledgerly_agents::TransactionStore;
use serde::Deserialize;
use shared_types::{
    DeleteTransactionsResponse, IngestTextRequest, IngestTextResponse, ParseTextRequest,
    ParsingResult, TransactionFilter, TransactionsResponse, UpdateTransactionRequest,
};
use std::sync::Arc;
use tracing::info;

async fn run_pipeline(
    pipeline: &HybridExtractionPipeline,
    text: &str,
    subject: Option<&str>,
) -> ParsingResult {
    pipeline.extract_message(subject, text).await
}

/// Extraction only, nothing is stored
pub async fn parse_text(
    pipeline: web::Data<Arc<HybridExtractionPipeline>>,
    request: web::Json<ParseTextRequest>,
) -> ActixResult<HttpResponse> {
    let request = request.into_inner();
    if request.text.trim().is_empty() {
        return Err(actix_web::error::ErrorBadRequest("text must not be empty"));
    }

    let parsing = run_pipeline(&pipeline, &request.text, request.subject.as_deref()).await;
    Ok(HttpResponse::Ok().json(parsing))
}

pub async fn create_transaction(
    pipeline: web::Data<Arc<HybridExtractionPipeline>>,
    dedup: web::Data<Arc<DeduplicationEngine>>,
    request: web::Json<IngestTextRequest>,
) -> ActixResult<HttpResponse> {
    let request = request.into_inner();
    if request.text.trim().is_empty() {
        return Err(actix_web::error::ErrorBadRequest("text must not be empty"));
    }

    let parsing = run_pipeline(&pipeline, &request.text, request.subject.as_deref()).await;
    let mut transaction = parsing.transaction.clone().ok_or_else(|| {
        actix_web::error::ErrorUnprocessableEntity(
            parsing
                .error
                .clone()
                .unwrap_or_else(|| "extraction produced no transaction".to_string()),
        )
    })?;
    transaction.source_id = request.source_id;

    let outcome = dedup
        .insert(transaction)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    let duplicate = outcome.is_duplicate();
    let response = IngestTextResponse {
        duplicate,
        transaction: outcome.into_transaction(),
        parsing,
    };

    if duplicate {
        Ok(HttpResponse::Ok().json(response))
    } else {
        info!("Stored transaction {}", response.transaction.id);
        Ok(HttpResponse::Created().json(response))
    }
}

pub async fn list_transactions(
    db: web::Data<Arc<Database>>,
    query: web::Query<TransactionFilter>,
) -> ActixResult<HttpResponse> {
    let transactions = db
        .ledger
        .filter_transactions(&query)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    Ok(HttpResponse::Ok().json(TransactionsResponse {
        total: transactions.len(),
        transactions,
    }))
}

pub async fn get_transaction(
    db: web::Data<Arc<Database>>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    let transaction = db
        .ledger
        .get_transaction(&path)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
        .ok_or_else(|| actix_web::error::ErrorNotFound("Transaction not found"))?;

    Ok(HttpResponse::Ok().json(transaction))
}

pub async fn update_transaction(
    db: web::Data<Arc<Database>>,
    path: web::Path<String>,
    request: web::Json<UpdateTransactionRequest>,
) -> ActixResult<HttpResponse> {
    let transaction = db
        .ledger
        .update_transaction(&path, &request)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
        .ok_or_else(|| actix_web::error::ErrorNotFound("Transaction not found"))?;

    info!("Transaction {} edited", transaction.id);
    Ok(HttpResponse::Ok().json(transaction))
}

pub async fn delete_transaction(
    db: web::Data<Arc<Database>>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    let deleted = db
        .ledger
        .delete_transaction(&path)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    if !deleted {
        return Err(actix_web::error::ErrorNotFound("Transaction not found"));
    }
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Deserialize)]
pub struct RangeQuery {
    from: i64,
    to: i64,
}

pub async fn delete_transactions_in_range(
    db: web::Data<Arc<Database>>,
    query: web::Query<RangeQuery>,
) -> ActixResult<HttpResponse> {
    if query.from >= query.to {
        return Err(actix_web::error::ErrorBadRequest("from must be before to"));
    }

    let deleted = db
        .ledger
        .delete_transactions_between(query.from, query.to)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    info!("Deleted {} transactions in [{}, {})", deleted, query.from, query.to);
    Ok(HttpResponse::Ok().json(DeleteTransactionsResponse { deleted }))
}

#[cfg(test)]
mod tests {
    use crate::test_support::TestApp;
    use actix_web::{http::StatusCode, test};
    use serde_json::json;
    use shared_types::{IngestTextResponse, TransactionsResponse};

    const ZOMATO: &str = "Rs 1,400.00 spent using ICICI Bank Card XX2008 on 25-Sep-25 at ZOMATO.";

    #[actix_web::test]
    async fn test_same_text_posted_twice_is_stored_once() {
        let harness = TestApp::new();
        let app = test::init_service(harness.app()).await;

        let first = test::TestRequest::post()
            .uri("/api/transactions")
            .set_json(json!({ "text": ZOMATO }))
            .send_request(&app)
            .await;
        assert_eq!(first.status(), StatusCode::CREATED);
        let first: IngestTextResponse = test::read_body_json(first).await;
        assert!(!first.duplicate);
        assert_eq!(first.transaction.amount, 1400.0);
        assert_eq!(first.transaction.merchant, "Zomato");

        let second = test::TestRequest::post()
            .uri("/api/transactions")
            .set_json(json!({ "text": ZOMATO }))
            .send_request(&app)
            .await;
        assert_eq!(second.status(), StatusCode::OK);
        let second: IngestTextResponse = test::read_body_json(second).await;
        assert!(second.duplicate);
        assert_eq!(second.transaction.id, first.transaction.id);

        let list: TransactionsResponse = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/transactions").to_request(),
        )
        .await;
        assert_eq!(list.total, 1);
    }

    #[actix_web::test]
    async fn test_edit_then_delete() {
        let harness = TestApp::new();
        let app = test::init_service(harness.app()).await;

        let created: IngestTextResponse = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/transactions")
                .set_json(json!({ "text": ZOMATO, "source_id": "sms:1" }))
                .to_request(),
        )
        .await;
        assert_eq!(created.transaction.source_id.as_deref(), Some("sms:1"));
        let uri = format!("/api/transactions/{}", created.transaction.id);

        let edited = test::TestRequest::patch()
            .uri(&uri)
            .set_json(json!({ "category": "Entertainment" }))
            .send_request(&app)
            .await;
        assert_eq!(edited.status(), StatusCode::OK);
        let edited: shared_types::Transaction = test::read_body_json(edited).await;
        assert_eq!(edited.category, "Entertainment");
        assert!(edited.manually_edited);

        let deleted = test::TestRequest::delete().uri(&uri).send_request(&app).await;
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
        let missing = test::TestRequest::delete().uri(&uri).send_request(&app).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_range_delete_and_parse_only() {
        let harness = TestApp::new();
        let app = test::init_service(harness.app()).await;

        let parsed = test::TestRequest::post()
            .uri("/api/parse")
            .set_json(json!({ "text": ZOMATO }))
            .send_request(&app)
            .await;
        assert_eq!(parsed.status(), StatusCode::OK);

        test::TestRequest::post()
            .uri("/api/transactions")
            .set_json(json!({ "text": ZOMATO }))
            .send_request(&app)
            .await;

        // 2025-09-25 00:00 to 2025-09-26 00:00 UTC
        let response: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::delete()
                .uri("/api/transactions?from=1758758400&to=1758844800")
                .to_request(),
        )
        .await;
        assert_eq!(response["deleted"], 1);

        let bad = test::TestRequest::delete()
            .uri("/api/transactions?from=10&to=5")
            .send_request(&app)
            .await;
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }
}
