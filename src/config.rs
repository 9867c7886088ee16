//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a [`Session`](crate::Session).
///
/// Identity fields are required at connect time; the tuning knobs have
/// conservative defaults sized for real networks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Server address as `host:port`.
    pub server: String,
    /// Desired nickname.
    pub nick: String,
    /// Username for registration.
    pub user: String,
    /// Real name for registration.
    pub realname: String,
    /// Optional connection password, sent before registration.
    #[serde(default)]
    pub password: Option<String>,
    /// Seed for the lag estimate until the first calibration ping lands.
    #[serde(default = "default_initial_lag")]
    pub initial_lag: Duration,
    /// Fixed margin added to the lag estimate to form request deadlines.
    #[serde(default = "default_request_margin")]
    pub request_margin: Duration,
    /// Depth of the outbound command queue; producers wait when it is full.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl Config {
    /// A configuration with default tuning knobs.
    pub fn new(
        server: impl Into<String>,
        nick: impl Into<String>,
        user: impl Into<String>,
        realname: impl Into<String>,
    ) -> Self {
        Config {
            server: server.into(),
            nick: nick.into(),
            user: user.into(),
            realname: realname.into(),
            password: None,
            initial_lag: default_initial_lag(),
            request_margin: default_request_margin(),
            queue_depth: default_queue_depth(),
        }
    }

    /// Set the connection password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// True when every identity field required for registration is present.
    pub(crate) fn identity_complete(&self) -> bool {
        !self.nick.is_empty() && !self.user.is_empty() && !self.realname.is_empty()
    }
}

fn default_initial_lag() -> Duration {
    Duration::from_secs(1)
}

fn default_request_margin() -> Duration {
    Duration::from_secs(1)
}

fn default_queue_depth() -> usize {
    100
}
