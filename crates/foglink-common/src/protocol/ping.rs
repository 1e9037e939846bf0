use serde::{Deserialize, Serialize};

/// Body of a FogLAMP `/foglamp/ping` response.
///
/// Only the fields the connectivity core consumes are typed; everything else
/// in the payload is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
    #[serde(default)]
    pub health: Option<String>,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub uptime: Option<f64>,
}
