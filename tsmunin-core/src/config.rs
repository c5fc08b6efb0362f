use std::fmt;

use tracing::debug;
use tsmunin_sdk::InstanceId;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 10011;

/// ServerQuery login.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything the plugin needs to know about its deployment.
#[derive(Debug, Clone)]
pub struct PluginConfig {
    pub host: String,
    pub port: u16,
    pub instances: Vec<InstanceId>,
    pub credentials: Option<Credentials>,
    /// Label series with virtual server names instead of ids.
    pub resolve_names: bool,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            instances: InstanceId::new(1).into_iter().collect(),
            credentials: None,
            resolve_names: true,
        }
    }
}

impl PluginConfig {
    pub fn with_instances(mut self, raw: &str) -> Self {
        self.instances = parse_instance_ids(raw);
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// Parses a comma separated id list, skipping anything that is not a
/// positive integer. Order and duplicates are kept.
pub fn parse_instance_ids(raw: &str) -> Vec<InstanceId> {
    raw.split(',')
        .filter_map(|token| match token.parse::<InstanceId>() {
            Ok(id) => Some(id),
            Err(error) => {
                debug!(%error, "skipping instance token");
                None
            }
        })
        .collect()
}
