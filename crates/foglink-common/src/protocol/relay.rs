use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upstream mapping exchanged with the relay's `/config` endpoint.
///
/// Keys are path tokens, values are upstream instance base URLs. The same
/// shape is sent on `POST /config` and returned as the acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub instances: BTreeMap<String, String>,
}

impl RelayConfig {
    pub fn new(instances: BTreeMap<String, String>) -> Self {
        Self { instances }
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Body of the relay's `/health` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayHealth {
    #[serde(default)]
    pub status: Option<String>,
}
