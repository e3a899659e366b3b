use actix_web::{web, HttpResponse, Result as ActixResult};
use crate::database::Database;
use ledgerly_agents::CategoryStore;
use shared_types::{CategoriesResponse, UpsertCategoryRequest};
use std::sync::Arc;
use tracing::info;

pub async fn list_categories(db: web::Data<Arc<Database>>) -> ActixResult<HttpResponse> {
    let categories = db
        .ledger
        .list_categories()
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    Ok(HttpResponse::Ok().json(CategoriesResponse { categories }))
}

/// Adds a category or toggles an existing one
pub async fn upsert_category(
    db: web::Data<Arc<Database>>,
    request: web::Json<UpsertCategoryRequest>,
) -> ActixResult<HttpResponse> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(actix_web::error::ErrorBadRequest("name must not be empty"));
    }

    let category = db
        .ledger
        .upsert_category(name, request.is_active)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    info!("Category {} active: {}", category.name, category.is_active);
    Ok(HttpResponse::Ok().json(category))
}
