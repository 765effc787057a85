use axum::extract::State;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::types::{AddOptions, ImportResult, NewTransaction, Transaction, TransactionUpdate};
use crate::server::state::AppState;

use super::{required, success, ApiError, ApiJson, ApiPath, ApiQuery, ApiResult};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/transactions", get(list).post(add))
        .route("/api/transactions/import", post(import))
        .route("/api/transactions/:id", put(update).delete(remove))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTransactions {
    pub account_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTransactions {
    pub account_id: Option<String>,
    pub transactions: Option<Vec<NewTransaction>>,
    #[serde(default)]
    pub learn_categories: bool,
    #[serde(default)]
    pub run_transfers: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportTransactions {
    pub account_id: Option<String>,
    pub transactions: Option<Vec<NewTransaction>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTransaction {
    pub transaction: Option<TransactionUpdate>,
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request(format!("{} must be a date (YYYY-MM-DD)", field)))
}

/// GET /api/transactions?accountId=&startDate=&endDate=
async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListTransactions>,
) -> ApiResult<Json<Vec<Transaction>>> {
    let (Some(account_id), Some(start), Some(end)) = (query.account_id, query.start_date, query.end_date)
    else {
        return Err(ApiError::bad_request("accountId, startDate and endDate are required"));
    };
    let start = parse_date(&start, "startDate")?;
    let end = parse_date(&end, "endDate")?;

    let client = state.client().await?;
    Ok(Json(client.get_transactions(&account_id, start, end).await?))
}

/// POST /api/transactions
async fn add(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AddTransactions>,
) -> ApiResult<Json<Value>> {
    let account_id = required(body.account_id, "accountId")?;
    let transactions = required(body.transactions, "transactions")?;
    let options = AddOptions {
        learn_categories: body.learn_categories,
        run_transfers: body.run_transfers,
    };

    let client = state.client().await?;
    let ids = client.add_transactions(&account_id, transactions, options).await?;
    Ok(Json(json!({ "success": true, "ids": ids })))
}

/// POST /api/transactions/import
async fn import(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ImportTransactions>,
) -> ApiResult<Json<ImportResult>> {
    let account_id = required(body.account_id, "accountId")?;
    let transactions = required(body.transactions, "transactions")?;

    let client = state.client().await?;
    Ok(Json(client.import_transactions(&account_id, transactions).await?))
}

/// PUT /api/transactions/:id
async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<UpdateTransaction>,
) -> ApiResult<Json<Value>> {
    let fields = required(body.transaction, "transaction")?;
    let client = state.client().await?;
    client.update_transaction(&id, fields).await?;
    Ok(success())
}

/// DELETE /api/transactions/:id
async fn remove(State(state): State<AppState>, ApiPath(id): ApiPath<String>) -> ApiResult<Json<Value>> {
    let client = state.client().await?;
    client.delete_transaction(&id).await?;
    Ok(success())
}
