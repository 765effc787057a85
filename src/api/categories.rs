use axum::extract::State;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::client::types::{Category, CategoryUpdate, NewCategory};
use crate::server::state::AppState;

use super::{created, required, success, ApiJson, ApiPath, ApiQuery, ApiResult};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(list).post(create))
        .route("/api/categories/:id", put(update).delete(remove))
}

#[derive(Debug, Deserialize)]
pub struct CreateCategory {
    pub category: Option<NewCategory>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategory {
    pub category: Option<CategoryUpdate>,
}

/// Where the deleted category's transactions and budget go
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTarget {
    pub transfer_category_id: Option<String>,
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    let client = state.client().await?;
    Ok(Json(client.get_categories().await?))
}

async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateCategory>,
) -> ApiResult<Json<Value>> {
    let category = required(body.category, "category")?;
    let client = state.client().await?;
    Ok(created(client.create_category(category).await?))
}

async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<UpdateCategory>,
) -> ApiResult<Json<Value>> {
    let fields = required(body.category, "category")?;
    let client = state.client().await?;
    client.update_category(&id, fields).await?;
    Ok(success())
}

/// DELETE /api/categories/:id?transferCategoryId=
async fn remove(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiQuery(target): ApiQuery<TransferTarget>,
) -> ApiResult<Json<Value>> {
    let client = state.client().await?;
    client
        .delete_category(&id, target.transfer_category_id.as_deref())
        .await?;
    Ok(success())
}
