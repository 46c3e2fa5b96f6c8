use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::db::dbclient::DBClient;

pub mod extract;
pub mod raffles;
pub mod talks;

#[derive(Clone)]
pub struct AppData {
    pub db_client: Arc<DBClient>,
}

impl AppData {
    pub fn new(db_client: Arc<DBClient>) -> Self {
        Self { db_client }
    }
}

pub fn router(data: AppData) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/raffles", get(raffles::list).post(raffles::create))
        .route("/api/raffles/:id", get(raffles::detail))
        .route("/api/raffles/:id/participants", get(raffles::participants).post(raffles::register))
        .route("/api/raffles/:id/close", post(raffles::close))
        .route("/api/raffles/:id/draw", post(raffles::draw))
        .route("/api/raffles/:id/confirm-winner", post(raffles::confirm_winner))
        .route("/api/raffles/:id/reopen", post(raffles::reopen))
        .route("/api/raffles/:id/verify-pin", post(raffles::verify_pin))
        .route("/api/talks", get(talks::list).post(talks::create))
        .route("/api/talks/:id/attendance", get(talks::attendance).post(talks::register))
        .route("/api/talks/:id/attendance/:attendance_id", delete(talks::delete_attendance))
        .with_state(data)
}

async fn health() -> &'static str {
    "ok"
}
