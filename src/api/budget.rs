use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::client::types::BudgetMonth;
use crate::models::MonthKey;
use crate::server::state::AppState;

use super::{required, success, ApiError, ApiJson, ApiPath, ApiResult};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/budget/months", get(months))
        .route("/api/budget/month/:month", get(month))
        .route("/api/budget/amount", post(set_amount))
        .route("/api/budget/carryover", post(set_carryover))
        .route("/api/budget/hold", post(hold))
        .route("/api/budget/reset-hold", post(reset_hold))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAmount {
    pub month: Option<MonthKey>,
    pub category_id: Option<String>,
    pub amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCarryover {
    pub month: Option<MonthKey>,
    pub category_id: Option<String>,
    pub flag: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct Hold {
    pub month: Option<MonthKey>,
    pub amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ResetHold {
    pub month: Option<MonthKey>,
}

async fn months(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    let client = state.client().await?;
    Ok(Json(client.get_budget_months().await?))
}

/// GET /api/budget/month/:month
async fn month(State(state): State<AppState>, ApiPath(month): ApiPath<String>) -> ApiResult<Json<BudgetMonth>> {
    let month = month
        .parse::<MonthKey>()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let client = state.client().await?;
    Ok(Json(client.get_budget_month(month).await?))
}

/// POST /api/budget/amount
async fn set_amount(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SetAmount>,
) -> ApiResult<Json<Value>> {
    let month = required(body.month, "month")?;
    let category_id = required(body.category_id, "categoryId")?;
    let amount = required(body.amount, "amount")?;
    let client = state.client().await?;
    client.set_budget_amount(month, &category_id, amount).await?;
    Ok(success())
}

/// POST /api/budget/carryover
async fn set_carryover(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SetCarryover>,
) -> ApiResult<Json<Value>> {
    let month = required(body.month, "month")?;
    let category_id = required(body.category_id, "categoryId")?;
    let flag = required(body.flag, "flag")?;
    let client = state.client().await?;
    client.set_budget_carryover(month, &category_id, flag).await?;
    Ok(success())
}

/// POST /api/budget/hold
async fn hold(State(state): State<AppState>, ApiJson(body): ApiJson<Hold>) -> ApiResult<Json<Value>> {
    let month = required(body.month, "month")?;
    let amount = required(body.amount, "amount")?;
    let client = state.client().await?;
    client.hold_budget_for_next_month(month, amount).await?;
    Ok(success())
}

/// POST /api/budget/reset-hold
async fn reset_hold(State(state): State<AppState>, ApiJson(body): ApiJson<ResetHold>) -> ApiResult<Json<Value>> {
    let month = required(body.month, "month")?;
    let client = state.client().await?;
    client.reset_budget_hold(month).await?;
    Ok(success())
}
