//! Read-only market data passthrough for dashboards and probes.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::Result;
use crate::types::Quote;
use crate::AppState;

#[derive(Debug, Deserialize)]
struct QuoteParams {
    exchange: Option<String>,
}

async fn quote(
    Path(symbol): Path<String>,
    Query(params): Query<QuoteParams>,
    State(state): State<AppState>,
) -> Result<Json<Quote>> {
    let exchange = params
        .exchange
        .unwrap_or_else(|| "NSE".to_string())
        .to_ascii_uppercase();

    let quote = state
        .gateway
        .fetch_quote(&symbol.to_ascii_uppercase(), &exchange)
        .await?;

    Ok(Json(quote))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/quotes/:symbol", get(quote))
}
