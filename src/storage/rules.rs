//! Rule repository for JSON storage
//!
//! Manages loading and saving transaction rules to rules.json

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::EnvelopeResult;
use crate::models::{Rule, RuleId};

use super::file_io::{read_json, read_lock, write_json_atomic, write_lock};

/// Serializable rule data structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleData {
    pub rules: Vec<Rule>,
}

/// Repository for rule persistence
pub struct RuleRepository {
    path: PathBuf,
    data: RwLock<HashMap<RuleId, Rule>>,
}

impl RuleRepository {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(HashMap::new()),
        }
    }

    pub fn load(&self) -> EnvelopeResult<()> {
        let file_data: RuleData = read_json(&self.path)?;
        self.replace_all(file_data)
    }

    pub fn save(&self) -> EnvelopeResult<()> {
        write_json_atomic(&self.path, &self.snapshot()?)
    }

    pub fn snapshot(&self) -> EnvelopeResult<RuleData> {
        Ok(RuleData {
            rules: self.get_all()?,
        })
    }

    pub fn replace_all(&self, file_data: RuleData) -> EnvelopeResult<()> {
        let mut data = write_lock(&self.data)?;
        data.clear();
        for rule in file_data.rules {
            data.insert(rule.id, rule);
        }
        Ok(())
    }

    pub fn get(&self, id: RuleId) -> EnvelopeResult<Option<Rule>> {
        Ok(read_lock(&self.data)?.get(&id).cloned())
    }

    /// All rules in execution order: by stage, then creation time
    pub fn get_all(&self) -> EnvelopeResult<Vec<Rule>> {
        let data = read_lock(&self.data)?;
        let mut rules: Vec<_> = data.values().cloned().collect();
        rules.sort_by(|a, b| {
            a.stage
                .cmp(&b.stage)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(rules)
    }

    pub fn upsert(&self, rule: Rule) -> EnvelopeResult<()> {
        write_lock(&self.data)?.insert(rule.id, rule);
        Ok(())
    }

    pub fn delete(&self, id: RuleId) -> EnvelopeResult<bool> {
        Ok(write_lock(&self.data)?.remove(&id).is_some())
    }
}
