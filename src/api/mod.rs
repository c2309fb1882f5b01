//! HTTP API routes.

pub mod health;
pub mod market;

use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().merge(health::router()).merge(market::router())
}
