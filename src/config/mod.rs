//! Configuration module for EnvelopeAPI
//!
//! This module provides configuration management including:
//! - Command-line / environment settings
//! - Data directory layout for budgets

pub mod paths;
pub mod settings;

pub use paths::{BudgetPaths, EnvelopePaths};
pub use settings::{ClientConfig, Settings};
