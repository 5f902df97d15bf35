// =====================================================
// PIPELINE CONFIGURATION
// =====================================================

use crate::db_types::{ConnectionConfig, OracleConnectionConfig};
use crate::error::{PipelineError, Result};
use crate::pipeline::notify::NotificationSettings;
use crate::pipeline::reconcile::ColumnAliases;
use crate::pipeline::schema::DEFAULT_SCHEMA;
use crate::pipeline::writer::DEFAULT_BATCH_SIZE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ORACLE_PASSWORD_ENV: &str = "APS_ORACLE_PASSWORD";
pub const MSSQL_PASSWORD_ENV: &str = "APS_MSSQL_PASSWORD";

fn default_queries_file() -> PathBuf {
    PathBuf::from("/root/airflow/include/queries_integra_aps.sql")
}

fn default_destination_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFlagSettings {
    #[serde(default = "default_flag_table")]
    pub table: String,
    #[serde(default = "default_flag_key")]
    pub key: String,
}

fn default_flag_table() -> String {
    "TB_CONFIG".to_string()
}

fn default_flag_key() -> String {
    "RODA_INTEGRACAO_APS".to_string()
}

impl Default for RunFlagSettings {
    fn default() -> Self {
        Self {
            table: default_flag_table(),
            key: default_flag_key(),
        }
    }
}

/// Reverse copy: destination table `from_table` replaces source table `to_table`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleCopySettings {
    #[serde(default = "default_copy_from")]
    pub from_table: String,
    #[serde(default = "default_copy_to")]
    pub to_table: String,
}

fn default_copy_from() -> String {
    "LSB_INT_Programacao".to_string()
}

fn default_copy_to() -> String {
    "SYSDATACOM.TB_LSB_INT_PROGRAMACAO".to_string()
}

impl Default for ScheduleCopySettings {
    fn default() -> Self {
        Self {
            from_table: default_copy_from(),
            to_table: default_copy_to(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    pub source: OracleConnectionConfig,
    pub destination: ConnectionConfig,
    #[serde(default = "default_queries_file")]
    pub queries_file: PathBuf,
    #[serde(default = "default_destination_schema")]
    pub destination_schema: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub column_aliases: ColumnAliases,
    #[serde(default)]
    pub run_flag: RunFlagSettings,
    #[serde(default)]
    pub schedule_copy: ScheduleCopySettings,
    #[serde(default)]
    pub notification: NotificationSettings,
}

impl PipelineConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str::<Self>(raw)
            .map_err(|e| PipelineError::Configuration(format!("Invalid configuration: {}", e)))
    }

    /// Loads, applies password overrides from the environment, and validates.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!(
                "Failed to read configuration {}: {}",
                path.display(),
                e
            ))
        })?;
        let mut config = Self::from_json(&raw)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        if let Some(password) = non_empty(ORACLE_PASSWORD_ENV) {
            self.source.password = Some(password);
        }
        if let Some(password) = non_empty(MSSQL_PASSWORD_ENV) {
            self.destination.password = Some(password);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.username.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "source.username is required".to_string(),
            ));
        }
        if self.source.connect_string.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "source.connectString is required".to_string(),
            ));
        }
        if self.destination.host.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "destination.host is required".to_string(),
            ));
        }
        if self.destination.username.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "destination.username is required".to_string(),
            ));
        }
        if self.destination_schema.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "destinationSchema must not be empty".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::Configuration(
                "batchSize must be greater than zero".to_string(),
            ));
        }
        for (from, to) in &self.column_aliases {
            if from.trim().is_empty() || to.trim().is_empty() {
                return Err(PipelineError::Configuration(format!(
                    "Column alias '{}' -> '{}' has an empty side",
                    from, to
                )));
            }
        }
        Ok(())
    }
}
