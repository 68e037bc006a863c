//! Container usage samples and instance metadata

use serde::{Deserialize, Serialize};

use crate::InstanceId;

/// Store key: one running instance of an application.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    pub instance_id: InstanceId,
    pub instance_index: u32,
}

/// One resource-usage observation for an application instance.
///
/// Samples are never merged: a newer sample for the same [`InstanceKey`]
/// replaces the older one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// IP of the cell that emitted the envelope
    pub source: String,

    /// Application id
    pub instance_id: InstanceId,

    /// Instance index within the application
    pub instance_index: u32,

    /// CPU used, 0 to 100 per core
    pub cpu_percentage: f64,

    pub memory_bytes: u64,
    pub disk_bytes: u64,
    pub memory_bytes_quota: u64,
    pub disk_bytes_quota: u64,
}

impl Sample {
    pub fn key(&self) -> InstanceKey {
        InstanceKey {
            instance_id: self.instance_id.clone(),
            instance_index: self.instance_index,
        }
    }
}

/// Descriptive attributes of an application.
///
/// `Default` is the value used when an id has no entry: three empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// Application name
    pub name: String,

    /// Space the application runs in
    #[serde(alias = "space")]
    pub group: String,

    /// Organization owning the space
    #[serde(alias = "org")]
    pub owner: String,
}

impl MetadataEntry {
    pub fn new(
        name: impl Into<String>,
        group: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            owner: owner.into(),
        }
    }
}
