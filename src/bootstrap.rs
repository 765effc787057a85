//! Lazy, single-flight startup of the budget client
//!
//! The first request that needs the client starts it; requests arriving while
//! that startup is in flight await the same shared future and receive the same
//! result. A failed startup leaves the guard retry-eligible: the next request
//! starts a fresh attempt.
//!
//! After the client connects, a default budget is selected on a best-effort
//! basis. Selection never fails the startup.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::client::{BudgetClient, Connector};
use crate::config::ClientConfig;
use crate::error::EnvelopeResult;

/// Startup failure, shared by every request waiting on the same attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    /// The connector reported an error
    #[error("Failed to initialize budget client: {0}")]
    Connect(String),

    /// The startup task panicked or was cancelled
    #[error("Budget client initialization aborted: {0}")]
    Aborted(String),
}

/// Observable guard state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardStatus {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

impl GuardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

/// Which budget, if any, was loaded during startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceSelection {
    /// The configured budget id
    Preferred(String),
    /// The first budget reported by the client
    First(String),
    /// Nothing could be loaded
    None,
}

type ClientResult = Result<Arc<dyn BudgetClient>, BootstrapError>;
type Startup = Shared<BoxFuture<'static, ClientResult>>;

enum State {
    Uninitialized,
    Initializing { generation: u64, startup: Startup },
    Ready(Arc<dyn BudgetClient>),
    Failed(BootstrapError),
}

struct Inner {
    state: State,
    generation: u64,
}

/// Owns the client handle and its startup lifecycle
pub struct ClientGuard {
    connector: Arc<dyn Connector>,
    config: ClientConfig,
    inner: Mutex<Inner>,
}

impl ClientGuard {
    pub fn new(connector: Arc<dyn Connector>, config: ClientConfig) -> Self {
        Self {
            connector,
            config,
            inner: Mutex::new(Inner {
                state: State::Uninitialized,
                generation: 0,
            }),
        }
    }

    // State transitions never leave the guard half-updated, so a poisoned
    // lock still holds a consistent state.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The client, starting it if needed
    pub async fn client(&self) -> ClientResult {
        let (generation, startup) = {
            let mut inner = self.lock();
            match &inner.state {
                State::Ready(client) => return Ok(Arc::clone(client)),
                State::Initializing {
                    generation,
                    startup,
                } => (*generation, startup.clone()),
                State::Uninitialized | State::Failed(_) => {
                    inner.generation += 1;
                    let generation = inner.generation;
                    let startup = self.start(generation);
                    inner.state = State::Initializing {
                        generation,
                        startup: startup.clone(),
                    };
                    (generation, startup)
                }
            }
        };

        let result = startup.await;
        self.settle(generation, &result);
        result
    }

    fn start(&self, generation: u64) -> Startup {
        let connector = Arc::clone(&self.connector);
        let config = self.config.clone();
        debug!(generation, "Starting budget client");

        // Run on its own task so a dropped request cannot stall the attempt
        // and a panic surfaces as an error.
        let task = tokio::spawn(async move { bootstrap(connector.as_ref(), &config).await });
        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(BootstrapError::Aborted(e.to_string())),
            }
        }
        .boxed()
        .shared()
    }

    /// Record the outcome of an attempt, unless a newer one has taken over
    fn settle(&self, generation: u64, result: &ClientResult) {
        let mut inner = self.lock();
        let current = matches!(
            inner.state,
            State::Initializing { generation: g, .. } if g == generation
        );
        if !current {
            return;
        }
        inner.state = match result {
            Ok(client) => State::Ready(Arc::clone(client)),
            Err(e) => State::Failed(e.clone()),
        };
    }

    /// Current state; never starts the client
    pub fn status(&self) -> GuardStatus {
        match self.lock().state {
            State::Uninitialized => GuardStatus::Uninitialized,
            State::Initializing { .. } => GuardStatus::Initializing,
            State::Ready(_) => GuardStatus::Ready,
            State::Failed(_) => GuardStatus::Failed,
        }
    }

    /// Shut a ready client down and return to uninitialized
    pub async fn shutdown(&self) -> EnvelopeResult<()> {
        let client = {
            let mut inner = self.lock();
            match std::mem::replace(&mut inner.state, State::Uninitialized) {
                State::Ready(client) => client,
                other => {
                    inner.state = other;
                    debug!("Budget client not running; nothing to shut down");
                    return Ok(());
                }
            }
        };
        client.shutdown().await?;
        info!("Budget client shut down");
        Ok(())
    }
}

async fn bootstrap(connector: &dyn Connector, config: &ClientConfig) -> ClientResult {
    info!(data_dir = %config.data_dir.display(), "Initializing budget client");
    let client = connector.connect(config).await.map_err(|e| {
        error!(error = %e, "Budget client failed to start");
        BootstrapError::Connect(e.to_string())
    })?;

    match select_workspace(client.as_ref(), config.budget_id.as_deref()).await {
        WorkspaceSelection::Preferred(id) => info!(budget = %id, "Loaded configured budget"),
        WorkspaceSelection::First(id) => info!(budget = %id, "Loaded first available budget"),
        WorkspaceSelection::None => warn!("No budget loaded; budget requests will fail until one is loaded"),
    }
    Ok(client)
}

/// Load the preferred budget, else the first one available
pub async fn select_workspace(client: &dyn BudgetClient, preferred: Option<&str>) -> WorkspaceSelection {
    if let Some(id) = preferred {
        match client.load_budget(id).await {
            Ok(()) => return WorkspaceSelection::Preferred(id.to_string()),
            Err(e) => warn!(budget = id, error = %e, "Could not load configured budget"),
        }
    }

    let budgets = match client.get_budgets().await {
        Ok(budgets) => budgets,
        Err(e) => {
            warn!(error = %e, "Could not list budgets");
            return WorkspaceSelection::None;
        }
    };
    let Some(first) = budgets.into_iter().next() else {
        info!("No budgets available");
        return WorkspaceSelection::None;
    };

    let loaded = match (first.id, first.cloud_file_id) {
        (Some(id), _) => client.load_budget(&id).await.map(|_| id),
        (None, Some(file_id)) => client.download_budget(&file_id, None).await.map(|_| file_id),
        (None, None) => {
            warn!(name = %first.name, "First budget has no id");
            return WorkspaceSelection::None;
        }
    };
    match loaded {
        Ok(id) => WorkspaceSelection::First(id),
        Err(e) => {
            warn!(name = %first.name, error = %e, "Could not load first budget");
            WorkspaceSelection::None
        }
    }
}
