use crate::environment::Environment;

/// Aggregate reachability summary with a suggested remedy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub environment: Environment,
    pub proxy_available: bool,
    pub total_instances: usize,
    pub accessible_instances: usize,
    /// Preferred endpoint, if any is reachable
    pub best: Option<String>,
    pub suggestion: Option<String>,
}

impl ConnectionStatus {
    pub fn new(
        environment: Environment,
        proxy_available: bool,
        relay_url: &str,
        total_instances: usize,
        accessible_instances: usize,
        best: Option<String>,
    ) -> Self {
        let suggestion = suggest(
            environment,
            proxy_available,
            relay_url,
            total_instances,
            accessible_instances,
        );
        Self {
            environment,
            proxy_available,
            total_instances,
            accessible_instances,
            best,
            suggestion,
        }
    }

    pub fn all_accessible(&self) -> bool {
        self.total_instances > 0 && self.accessible_instances == self.total_instances
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} of {} instances accessible ({}, proxy {})",
            self.accessible_instances,
            self.total_instances,
            self.environment,
            if self.proxy_available { "up" } else { "down" }
        )
    }
}

fn suggest(
    environment: Environment,
    proxy_available: bool,
    relay_url: &str,
    total: usize,
    accessible: usize,
) -> Option<String> {
    if total == 0 {
        return Some("Register a FogLAMP instance to get started".to_string());
    }
    if accessible >= total {
        return None;
    }
    let hint = if environment.is_sandboxed() && !proxy_available {
        format!(
            "Start the local proxy at {} so instances on your network can be reached from the web host",
            relay_url
        )
    } else if environment.is_sandboxed() {
        "Check that the unreachable instances are running and reachable from the proxy host".to_string()
    } else {
        "Check that the unreachable instances are running and reachable from this machine".to_string()
    };
    Some(hint)
}
