use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::SiteId;

/// Replica settings. Deserializable so hosts can load it from their own config files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeaveConfig {
    /// Site local atoms are minted under. Hosts may supply it out of band instead.
    pub site: Option<SiteId>,
    /// Reject hashed atoms whose declared digest does not match their content.
    pub verify_checksums: bool,
    /// Upper bound on atoms per exported batch.
    pub max_batch_size: Option<usize>,
}

impl Default for WeaveConfig {
    fn default() -> Self {
        Self {
            site: None,
            verify_checksums: true,
            max_batch_size: None,
        }
    }
}

impl WeaveConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == Some(0) {
            return Err(Error::InvalidConfig("max_batch_size must be at least 1".into()));
        }
        Ok(())
    }
}
