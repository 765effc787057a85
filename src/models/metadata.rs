//! Budget file metadata
//!
//! Each budget (workspace) directory carries a `metadata.json` describing the
//! budget and, when it came from a sync server, which remote file it mirrors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata for a local budget directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetMetadata {
    /// Local budget id, also the directory name
    pub id: String,

    /// Display name
    pub name: String,

    /// Remote file id on the sync server, if this budget was downloaded or uploaded
    #[serde(default)]
    pub cloud_file_id: Option<String>,

    /// Remote group id on the sync server
    #[serde(default)]
    pub group_id: Option<String>,

    /// When the budget was created locally
    pub created_at: DateTime<Utc>,

    /// When the budget was last synced with the server
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl BudgetMetadata {
    /// Create metadata for a new local budget, deriving the id from the name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let id = Self::slug_id(&name);
        Self {
            id,
            name,
            cloud_file_id: None,
            group_id: None,
            created_at: Utc::now(),
            last_synced_at: None,
        }
    }

    /// Create metadata for a budget mirrored from the sync server
    pub fn from_remote(name: impl Into<String>, cloud_file_id: &str, group_id: Option<String>) -> Self {
        let mut metadata = Self::new(name);
        metadata.cloud_file_id = Some(cloud_file_id.to_string());
        metadata.group_id = group_id;
        metadata
    }

    /// Record a successful sync
    pub fn mark_synced(&mut self) {
        self.last_synced_at = Some(Utc::now());
    }

    /// `My-Budget-1a2b3c4` style id: a name slug plus a random suffix
    fn slug_id(name: &str) -> String {
        let slug: String = name
            .trim()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect::<String>()
            .split('-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-");
        let suffix = &Uuid::new_v4().simple().to_string()[..7];
        if slug.is_empty() {
            format!("budget-{}", suffix)
        } else {
            format!("{}-{}", slug, suffix)
        }
    }
}
