//! HTTP handlers
//!
//! Each handler checks that its required inputs are present and well-typed,
//! then forwards to exactly one [`BudgetClient`](crate::client::BudgetClient)
//! call and serializes the result. Create and update bodies wrap the entity
//! under a key such as `account` or `transaction`.

pub mod accounts;
pub mod budget;
pub mod budgets;
pub mod categories;
pub mod category_groups;
pub mod error;
pub mod health;
pub mod misc;
pub mod payees;
pub mod rules;
pub mod transactions;
pub mod utils;

use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts};
use axum::Json;
use axum::Router;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::server::state::AppState;

pub use error::{ApiError, ApiResult};

/// JSON body whose rejection is a `400` in the API error format
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string whose rejection is a `400` in the API error format
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Path parameters whose rejection is a `400` in the API error format
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Parse a body that may be absent; an empty body yields the default
pub fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Failed to parse the request body as JSON: {}", e)))
}

/// Unwrap a required field
pub fn required<T>(value: Option<T>, field: &str) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::missing(field))
}

/// `{"success": true}`
pub fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

/// `{"id": ...}`
pub fn created(id: String) -> Json<Value> {
    Json(json!({ "id": id }))
}

/// All `/api` routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(accounts::routes())
        .merge(transactions::routes())
        .merge(categories::routes())
        .merge(category_groups::routes())
        .merge(payees::routes())
        .merge(rules::routes())
        .merge(budget::routes())
        .merge(budgets::routes())
        .merge(misc::routes())
        .merge(utils::routes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, serde::Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Close {
        transfer_account_id: Option<String>,
    }

    #[test]
    fn test_optional_body() {
        let empty: Close = optional_body(&Bytes::new()).unwrap();
        assert_eq!(empty, Close::default());

        let given: Close = optional_body(&Bytes::from_static(br#"{"transferAccountId":"a"}"#)).unwrap();
        assert_eq!(given.transfer_account_id.as_deref(), Some("a"));

        let bad: ApiResult<Close> = optional_body(&Bytes::from_static(b"{nope"));
        assert!(matches!(bad, Err(ApiError::BadRequest(_))));
    }
}
