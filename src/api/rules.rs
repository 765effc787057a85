use axum::extract::State;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::client::types::{NewRule, Rule};
use crate::server::state::AppState;

use super::{required, success, ApiJson, ApiPath, ApiResult};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/rules", get(list).post(create))
        .route("/api/rules/:id", put(update).delete(remove))
}

#[derive(Debug, Deserialize)]
pub struct RuleBody {
    pub rule: Option<NewRule>,
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Rule>>> {
    let client = state.client().await?;
    Ok(Json(client.get_rules().await?))
}

/// POST /api/rules; responds with the stored rule
async fn create(State(state): State<AppState>, ApiJson(body): ApiJson<RuleBody>) -> ApiResult<Json<Rule>> {
    let rule = required(body.rule, "rule")?;
    let client = state.client().await?;
    Ok(Json(client.create_rule(rule).await?))
}

async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<RuleBody>,
) -> ApiResult<Json<Rule>> {
    let rule = required(body.rule, "rule")?;
    let client = state.client().await?;
    Ok(Json(client.update_rule(&id, rule).await?))
}

async fn remove(State(state): State<AppState>, ApiPath(id): ApiPath<String>) -> ApiResult<Json<Value>> {
    let client = state.client().await?;
    client.delete_rule(&id).await?;
    Ok(success())
}
