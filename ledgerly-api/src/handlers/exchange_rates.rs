use actix_web::{web, HttpResponse, Result as ActixResult};
use ledgerly_agents::currency::CurrencyRateCache;
use std::sync::Arc;
use tracing::info;

pub async fn get_exchange_rates(
    rates: web::Data<Arc<CurrencyRateCache>>,
) -> ActixResult<HttpResponse> {
    let snapshot = rates
        .snapshot()
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    Ok(HttpResponse::Ok().json(snapshot))
}

/// Refetches regardless of age; an upstream failure is a 502
pub async fn refresh_exchange_rates(
    rates: web::Data<Arc<CurrencyRateCache>>,
) -> ActixResult<HttpResponse> {
    let count = rates
        .force_refresh()
        .await
        .map_err(|e| actix_web::error::ErrorBadGateway(e.to_string()))?;
    info!("Refreshed {} exchange rates", count);

    let snapshot = rates
        .snapshot()
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;
    Ok(HttpResponse::Ok().json(snapshot))
}

#[cfg(test)]
mod tests {
    use crate::test_support::TestApp;
    use actix_web::{http::StatusCode, test};
    use shared_types::ExchangeRatesResponse;

    #[actix_web::test]
    async fn test_offline_refresh_is_bad_gateway() {
        let harness = TestApp::new();
        let app = test::init_service(harness.app()).await;

        let refresh = test::TestRequest::post()
            .uri("/api/exchange-rates/refresh")
            .send_request(&app)
            .await;
        assert_eq!(refresh.status(), StatusCode::BAD_GATEWAY);

        let table: ExchangeRatesResponse = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/exchange-rates").to_request(),
        )
        .await;
        assert_eq!(table.base_currency, "INR");
        assert!(!table.is_fresh);
    }
}
