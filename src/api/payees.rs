use axum::extract::State;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::client::types::{NewPayee, Payee, PayeeUpdate, Rule};
use crate::server::state::AppState;

use super::{created, required, success, ApiJson, ApiPath, ApiResult};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/payees", get(list).post(create))
        .route("/api/payees/merge", post(merge))
        .route("/api/payees/:id", put(update).delete(remove))
        .route("/api/payees/:id/rules", get(rules))
}

#[derive(Debug, Deserialize)]
pub struct CreatePayee {
    pub payee: Option<NewPayee>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePayee {
    pub payee: Option<PayeeUpdate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergePayees {
    pub target_id: Option<String>,
    pub merge_ids: Option<Vec<String>>,
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Payee>>> {
    let client = state.client().await?;
    Ok(Json(client.get_payees().await?))
}

async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreatePayee>,
) -> ApiResult<Json<Value>> {
    let payee = required(body.payee, "payee")?;
    let client = state.client().await?;
    Ok(created(client.create_payee(payee).await?))
}

async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<UpdatePayee>,
) -> ApiResult<Json<Value>> {
    let fields = required(body.payee, "payee")?;
    let client = state.client().await?;
    client.update_payee(&id, fields).await?;
    Ok(success())
}

async fn remove(State(state): State<AppState>, ApiPath(id): ApiPath<String>) -> ApiResult<Json<Value>> {
    let client = state.client().await?;
    client.delete_payee(&id).await?;
    Ok(success())
}

/// POST /api/payees/merge
async fn merge(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<MergePayees>,
) -> ApiResult<Json<Value>> {
    let target_id = required(body.target_id, "targetId")?;
    let merge_ids = required(body.merge_ids, "mergeIds")?;
    let client = state.client().await?;
    client.merge_payees(&target_id, &merge_ids).await?;
    Ok(success())
}

/// GET /api/payees/:id/rules
async fn rules(State(state): State<AppState>, ApiPath(id): ApiPath<String>) -> ApiResult<Json<Vec<Rule>>> {
    let client = state.client().await?;
    Ok(Json(client.get_payee_rules(&id).await?))
}
