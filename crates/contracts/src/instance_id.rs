//! InstanceId - shared application identifier
//!
//! Application ids arrive on every container metric and are cloned into map
//! keys, label sets and metadata lookups, so they are backed by `Arc<str>`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Opaque identifier of a monitored instance (usually a CF application GUID).
///
/// # Examples
/// ```
/// use contracts::InstanceId;
///
/// let id: InstanceId = "4630f6ba-8ddc-41f1-afea-1905332d6660".into();
/// let other = id.clone();
/// assert_eq!(id, other);
/// assert_eq!(id, "4630f6ba-8ddc-41f1-afea-1905332d6660");
/// ```
#[derive(Clone, Default)]
pub struct InstanceId(Arc<str>);

impl InstanceId {
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for InstanceId {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for InstanceId {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets `HashMap<InstanceId, _>` be queried with a plain `&str`.
impl Borrow<str> for InstanceId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InstanceId {
    #[inline]
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for InstanceId {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceId({:?})", self.0)
    }
}

impl PartialEq for InstanceId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for InstanceId {}

impl PartialEq<str> for InstanceId {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for InstanceId {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl Hash for InstanceId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Must match `str::hash` for the `Borrow<str>` lookups above.
        self.0.hash(state)
    }
}

impl Serialize for InstanceId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for InstanceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}
