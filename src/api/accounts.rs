use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::types::{Account, AccountUpdate, NewAccount};
use crate::server::state::AppState;

use super::{created, optional_body, required, success, ApiJson, ApiPath, ApiQuery, ApiResult};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/accounts", get(list).post(create))
        .route("/api/accounts/:id", put(update).delete(remove))
        .route("/api/accounts/:id/balance", get(balance))
        .route("/api/accounts/:id/close", post(close))
        .route("/api/accounts/:id/reopen", post(reopen))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccount {
    pub account: Option<NewAccount>,
    #[serde(default)]
    pub initial_balance: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccount {
    pub account: Option<AccountUpdate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseAccount {
    pub transfer_account_id: Option<String>,
    pub transfer_category_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    pub cutoff: Option<NaiveDate>,
}

/// GET /api/accounts
async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Account>>> {
    let client = state.client().await?;
    Ok(Json(client.get_accounts().await?))
}

/// POST /api/accounts
async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateAccount>,
) -> ApiResult<Json<Value>> {
    let account = required(body.account, "account")?;
    let client = state.client().await?;
    let id = client.create_account(account, body.initial_balance).await?;
    Ok(created(id))
}

/// PUT /api/accounts/:id
async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<UpdateAccount>,
) -> ApiResult<Json<Value>> {
    let fields = required(body.account, "account")?;
    let client = state.client().await?;
    client.update_account(&id, fields).await?;
    Ok(success())
}

/// DELETE /api/accounts/:id
async fn remove(State(state): State<AppState>, ApiPath(id): ApiPath<String>) -> ApiResult<Json<Value>> {
    let client = state.client().await?;
    client.delete_account(&id).await?;
    Ok(success())
}

/// GET /api/accounts/:id/balance
async fn balance(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiQuery(query): ApiQuery<BalanceQuery>,
) -> ApiResult<Json<Value>> {
    let client = state.client().await?;
    let balance = client.get_account_balance(&id, query.cutoff).await?;
    Ok(Json(json!({ "balance": balance })))
}

/// POST /api/accounts/:id/close
async fn close(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body: CloseAccount = optional_body(&body)?;
    let client = state.client().await?;
    client
        .close_account(
            &id,
            body.transfer_account_id.as_deref(),
            body.transfer_category_id.as_deref(),
        )
        .await?;
    Ok(success())
}

/// POST /api/accounts/:id/reopen
async fn reopen(State(state): State<AppState>, ApiPath(id): ApiPath<String>) -> ApiResult<Json<Value>> {
    let client = state.client().await?;
    client.reopen_account(&id).await?;
    Ok(success())
}
