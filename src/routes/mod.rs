pub mod health;
pub mod vacancy;

use axum::{
    routing::{get, post},
    Router,
};

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

/// Full application router: health check plus the vacancy API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .merge(vacancy_api())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub fn vacancy_api() -> Router<AppState> {
    Router::new()
        .route(
            "/api/vacancies",
            get(vacancy::list_vacancies).post(vacancy::create_vacancy),
        )
        .route("/api/vacancies/upsert", post(vacancy::upsert_vacancies))
        .route("/api/vacancies/sync", post(vacancy::sync_vacancies))
        .route(
            "/api/vacancies/external/:external_id",
            get(vacancy::get_vacancy_by_external_id),
        )
        .route(
            "/api/vacancies/:id",
            get(vacancy::get_vacancy)
                .patch(vacancy::update_vacancy)
                .delete(vacancy::delete_vacancy),
        )
}
