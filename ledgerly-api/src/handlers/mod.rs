pub mod categories;
pub mod exchange_rates;
pub mod messages;
pub mod recurring;
pub mod settings;
pub mod statements;
pub mod transactions;

use actix_web::web;

/// Routes under `/api`; services are registered separately as app data
pub fn api_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/parse", web::post().to(transactions::parse_text))
        .route("/api/transactions", web::post().to(transactions::create_transaction))
        .route("/api/transactions", web::get().to(transactions::list_transactions))
        .route("/api/transactions", web::delete().to(transactions::delete_transactions_in_range))
        .route("/api/transactions/{id}", web::get().to(transactions::get_transaction))
        .route("/api/transactions/{id}", web::patch().to(transactions::update_transaction))
        .route("/api/transactions/{id}", web::delete().to(transactions::delete_transaction))
        .route("/api/messages", web::post().to(messages::enqueue_messages))
        .route("/api/sync", web::post().to(messages::sync_messages))
        .route("/api/extraction-attempts", web::get().to(messages::list_extraction_attempts))
        .route("/api/statements/parse-image", web::post().to(statements::parse_statement_image))
        .route("/api/recurring", web::get().to(recurring::list_recurring))
        .route("/api/recurring/detect", web::post().to(recurring::detect_recurring))
        .route("/api/recurring/{id}", web::patch().to(recurring::update_recurring))
        .route("/api/recurring/{id}", web::delete().to(recurring::delete_recurring))
        .route("/api/exchange-rates", web::get().to(exchange_rates::get_exchange_rates))
        .route("/api/exchange-rates/refresh", web::post().to(exchange_rates::refresh_exchange_rates))
        .route("/api/categories", web::get().to(categories::list_categories))
        .route("/api/categories", web::post().to(categories::upsert_category));
}
