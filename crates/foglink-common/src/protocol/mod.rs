pub mod error;
pub mod ping;
pub mod relay;

pub use error::{FoglinkError, Result};
pub use ping::PingResponse;
pub use relay::{RelayConfig, RelayHealth};

use serde::{Deserialize, Serialize};

/// How a request reaches an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMethod {
    /// Straight to the instance's own address
    Direct,
    /// Through the local relay's forwarding path
    Proxy,
}

impl std::fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeMethod::Direct => write!(f, "direct"),
            ProbeMethod::Proxy => write!(f, "proxy"),
        }
    }
}
