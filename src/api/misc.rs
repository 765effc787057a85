//! Sync, bank sync, queries and batch budget updates

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::client::types::{BudgetUpdate, Query};
use crate::server::state::AppState;

use super::{optional_body, required, success, ApiJson, ApiResult};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/sync", post(sync))
        .route("/api/bank-sync", post(bank_sync))
        .route("/api/query", post(query))
        .route("/api/batch", post(batch))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankSync {
    pub account_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Batch {
    pub updates: Option<Vec<BudgetUpdate>>,
}

async fn sync(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let client = state.client().await?;
    client.sync().await?;
    Ok(success())
}

/// POST /api/bank-sync; without `accountId` every linked account is synced
async fn bank_sync(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let body: BankSync = optional_body(&body)?;
    let client = state.client().await?;
    client.run_bank_sync(body.account_id.as_deref()).await?;
    Ok(success())
}

/// POST /api/query
async fn query(State(state): State<AppState>, ApiJson(query): ApiJson<Query>) -> ApiResult<Json<Value>> {
    let client = state.client().await?;
    Ok(Json(client.run_query(query).await?))
}

/// POST /api/batch
async fn batch(State(state): State<AppState>, ApiJson(body): ApiJson<Batch>) -> ApiResult<Json<Value>> {
    let updates = required(body.updates, "updates")?;
    let client = state.client().await?;
    client.batch_budget_updates(updates).await?;
    Ok(success())
}
