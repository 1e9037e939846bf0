use serde::{Deserialize, Serialize};

/// Outcome of the most recent check of an instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    /// Never probed
    #[default]
    Unknown,
    /// A probe is in flight
    Checking,
    Success,
    Failed,
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InstanceStatus::Unknown => "unknown",
            InstanceStatus::Checking => "checking",
            InstanceStatus::Success => "success",
            InstanceStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A registered FogLAMP endpoint and what we last learned about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredInstance {
    pub url: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Host name reported by the instance's own ping response
    #[serde(default)]
    pub remote_host_name: Option<String>,
    #[serde(default)]
    pub last_status: InstanceStatus,
    #[serde(default)]
    pub last_latency_ms: Option<u64>,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub last_checked_at: Option<u64>,
    #[serde(default)]
    pub last_error: Option<String>,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub added_at: u64,
}

impl RegisteredInstance {
    pub fn new(url: impl Into<String>, added_at: u64) -> Self {
        Self {
            url: url.into(),
            display_name: None,
            remote_host_name: None,
            last_status: InstanceStatus::Unknown,
            last_latency_ms: None,
            last_checked_at: None,
            last_error: None,
            added_at,
        }
    }

    /// User label if set, otherwise a label derived from the URL.
    pub fn label(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| foglink_common::endpoint::default_label(&self.url))
    }

    /// Merges the fields present in `patch`. `url` is never touched.
    pub fn apply(&mut self, patch: &MetaPatch) {
        if let Some(v) = &patch.display_name {
            self.display_name = v.clone();
        }
        if let Some(v) = &patch.remote_host_name {
            self.remote_host_name = v.clone();
        }
        if let Some(v) = patch.last_status {
            self.last_status = v;
        }
        if let Some(v) = patch.last_latency_ms {
            self.last_latency_ms = v;
        }
        if let Some(v) = patch.last_checked_at {
            self.last_checked_at = v;
        }
        if let Some(v) = &patch.last_error {
            self.last_error = v.clone();
        }
    }
}

/// Partial update for a [`RegisteredInstance`].
///
/// `None` leaves a field alone; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaPatch {
    pub display_name: Option<Option<String>>,
    pub remote_host_name: Option<Option<String>>,
    pub last_status: Option<InstanceStatus>,
    pub last_latency_ms: Option<Option<u64>>,
    pub last_checked_at: Option<Option<u64>>,
    pub last_error: Option<Option<String>>,
}

impl MetaPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: InstanceStatus) -> Self {
        self.last_status = Some(status);
        self
    }

    pub fn display_name(mut self, name: Option<String>) -> Self {
        self.display_name = Some(name);
        self
    }

    /// Successful probe. The host name is only overwritten when reported.
    pub fn success(latency_ms: Option<u64>, remote_host_name: Option<String>, checked_at: u64) -> Self {
        Self {
            display_name: None,
            remote_host_name: remote_host_name.map(Some),
            last_status: Some(InstanceStatus::Success),
            last_latency_ms: Some(latency_ms),
            last_checked_at: Some(Some(checked_at)),
            last_error: Some(None),
        }
    }

    /// Failed probe; clears the latency.
    pub fn failure(error: impl Into<String>, checked_at: u64) -> Self {
        Self {
            display_name: None,
            remote_host_name: None,
            last_status: Some(InstanceStatus::Failed),
            last_latency_ms: Some(None),
            last_checked_at: Some(Some(checked_at)),
            last_error: Some(Some(error.into())),
        }
    }
}
