//! Amount conversions
//!
//! Pure arithmetic; these never start the budget client.

use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::models::money::{amount_to_integer, integer_to_amount};
use crate::server::state::AppState;

use super::{ApiError, ApiJson, ApiResult};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/utils/amount-to-integer", post(to_integer))
        .route("/api/utils/integer-to-amount", post(to_amount))
}

#[derive(Debug, Deserialize)]
pub struct Amount {
    #[serde(default)]
    pub amount: Value,
}

fn numeric(value: &Value) -> ApiResult<f64> {
    value
        .as_f64()
        .filter(|n| n.is_finite())
        .ok_or_else(|| ApiError::bad_request("amount must be a number"))
}

/// POST /api/utils/amount-to-integer
async fn to_integer(ApiJson(body): ApiJson<Amount>) -> ApiResult<Json<Value>> {
    let amount = numeric(&body.amount)?;
    let cents = amount_to_integer(amount)
        .ok_or_else(|| ApiError::bad_request("amount is out of range"))?;
    Ok(Json(json!({ "amount": cents })))
}

/// POST /api/utils/integer-to-amount
async fn to_amount(ApiJson(body): ApiJson<Amount>) -> ApiResult<Json<Value>> {
    let amount = numeric(&body.amount)?;
    Ok(Json(json!({ "amount": integer_to_amount(amount) })))
}
