use std::sync::Arc;

use crate::bootstrap::ClientGuard;
use crate::client::BudgetClient;

use crate::api::error::ApiResult;

/// Shared application state accessible to all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub guard: Arc<ClientGuard>,
}

impl AppState {
    pub fn new(guard: Arc<ClientGuard>) -> Self {
        Self { guard }
    }

    /// The budget client, started on first use
    pub async fn client(&self) -> ApiResult<Arc<dyn BudgetClient>> {
        Ok(self.guard.client().await?)
    }
}
