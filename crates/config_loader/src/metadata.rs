//! 应用元数据文件解析
//!
//! ```toml
//! [[apps]]
//! id = "6f0c..."
//! name = "billing"
//! space = "prod"
//! org = "payments"
//! ```

use std::collections::HashMap;
use std::path::Path;

use contracts::{ContractError, InstanceId, MetadataEntry};
use serde::Deserialize;

use crate::parser::{self, ConfigFormat};

#[derive(Debug, Deserialize)]
struct MetadataFile {
    #[serde(default)]
    apps: Vec<AppRecord>,
}

#[derive(Debug, Deserialize)]
struct AppRecord {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    space: String,
    #[serde(default)]
    org: String,
}

/// Loads application metadata tables.
pub struct MetadataLoader;

impl MetadataLoader {
    /// Load a metadata file, format from its extension.
    ///
    /// # Errors
    /// Any read, parse or content problem is reported as
    /// `ContractError::MetadataLoad`.
    pub fn load_from_path(
        path: &Path,
    ) -> Result<HashMap<InstanceId, MetadataEntry>, ContractError> {
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ConfigFormat::from_extension)
            .ok_or_else(|| {
                ContractError::metadata_load(format!(
                    "unsupported metadata file '{}'",
                    path.display()
                ))
            })?;
        let content = std::fs::read_to_string(path).map_err(|e| {
            ContractError::metadata_load(format!("cannot read '{}': {e}", path.display()))
        })?;
        Self::load_from_str(&content, format)
    }

    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<HashMap<InstanceId, MetadataEntry>, ContractError> {
        let file: MetadataFile = parser::parse(content, format)
            .map_err(|e| ContractError::metadata_load(e.to_string()))?;

        let mut entries = HashMap::with_capacity(file.apps.len());
        for (idx, app) in file.apps.into_iter().enumerate() {
            if app.id.is_empty() {
                return Err(ContractError::metadata_load(format!(
                    "apps[{idx}].id cannot be empty"
                )));
            }
            let id = InstanceId::from(app.id);
            if entries.contains_key(&id) {
                return Err(ContractError::metadata_load(format!(
                    "apps[{idx}]: duplicate id '{id}'"
                )));
            }
            entries.insert(id, MetadataEntry::new(app.name, app.space, app.org));
        }
        Ok(entries)
    }
}
