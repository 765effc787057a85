use axum::extract::State;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::client::types::{CategoryGroup, CategoryGroupUpdate, NewCategoryGroup};
use crate::server::state::AppState;

use super::categories::TransferTarget;
use super::{created, required, success, ApiJson, ApiPath, ApiQuery, ApiResult};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/category-groups", get(list).post(create))
        .route("/api/category-groups/:id", put(update).delete(remove))
}

#[derive(Debug, Deserialize)]
pub struct CreateGroup {
    pub group: Option<NewCategoryGroup>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGroup {
    pub group: Option<CategoryGroupUpdate>,
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<CategoryGroup>>> {
    let client = state.client().await?;
    Ok(Json(client.get_category_groups().await?))
}

async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateGroup>,
) -> ApiResult<Json<Value>> {
    let group = required(body.group, "group")?;
    let client = state.client().await?;
    Ok(created(client.create_category_group(group).await?))
}

async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<UpdateGroup>,
) -> ApiResult<Json<Value>> {
    let fields = required(body.group, "group")?;
    let client = state.client().await?;
    client.update_category_group(&id, fields).await?;
    Ok(success())
}

async fn remove(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiQuery(target): ApiQuery<TransferTarget>,
) -> ApiResult<Json<Value>> {
    let client = state.client().await?;
    client
        .delete_category_group(&id, target.transfer_category_id.as_deref())
        .await?;
    Ok(success())
}
