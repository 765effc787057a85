//! Budget (workspace) management

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::client::types::BudgetFile;
use crate::server::state::AppState;

use super::{created, optional_body, required, success, ApiJson, ApiPath, ApiResult};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/budgets", get(list).post(create))
        .route("/api/budgets/:id/load", post(load))
        .route("/api/budgets/:id/download", post(download))
}

#[derive(Debug, Deserialize)]
pub struct CreateBudget {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Download {
    pub password: Option<String>,
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<BudgetFile>>> {
    let client = state.client().await?;
    Ok(Json(client.get_budgets().await?))
}

/// POST /api/budgets; creates a local budget and loads it
async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateBudget>,
) -> ApiResult<Json<Value>> {
    let name = required(body.name, "name")?;
    let client = state.client().await?;
    Ok(created(client.create_budget(&name).await?))
}

/// POST /api/budgets/:id/load
async fn load(State(state): State<AppState>, ApiPath(id): ApiPath<String>) -> ApiResult<Json<Value>> {
    let client = state.client().await?;
    client.load_budget(&id).await?;
    Ok(success())
}

/// POST /api/budgets/:cloudFileId/download
async fn download(
    State(state): State<AppState>,
    ApiPath(cloud_file_id): ApiPath<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body: Download = optional_body(&body)?;
    let client = state.client().await?;
    client
        .download_budget(&cloud_file_id, body.password.as_deref())
        .await?;
    Ok(success())
}
