use std::collections::HashMap;

use anyhow::{Context as _, Result, anyhow};
use tracing::{debug, info};
use tsmunin_sdk::{Connector, InstanceId, QuerySession};

pub mod catalog;
pub mod collector;
pub mod config;
pub mod render;
pub mod sanitize;
pub mod session;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use catalog::Catalog;
pub use config::{Credentials, DEFAULT_HOST, DEFAULT_PORT, PluginConfig, parse_instance_ids};
pub use render::Block;
pub use sanitize::sanitize_field_name;
pub use session::SessionGuard;
pub use tsmunin_sdk::QueryError;

/// A monitored virtual server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub id: InstanceId,
    pub display_name: Option<String>,
}

impl Instance {
    pub fn new(id: InstanceId) -> Self {
        Self {
            id,
            display_name: None,
        }
    }

    pub fn with_name<S: Into<String>>(id: InstanceId, name: S) -> Self {
        Self {
            id,
            display_name: Some(name.into()),
        }
    }

    /// Text used for `{name}`: the display name, or `id_<sid>` when there is
    /// none.
    pub fn label(&self) -> String {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("id_{}", self.id),
        }
    }

    pub fn field_name(&self, prefix: &str) -> String {
        format!("{}_{}", prefix, self.id)
    }
}

/// Rendered plugin output, kept in memory until it is complete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub blocks: Vec<Block>,
}

impl Report {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn append(&mut self, other: Report) {
        self.blocks.extend(other.blocks);
    }

    pub fn to_text(&self) -> Result<String> {
        render::render_text(&self.blocks).map_err(Into::into)
    }
}

/// Answer to Munin's `autoconf` probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Autoconf {
    Yes,
    MissingCredentials,
}

impl std::fmt::Display for Autoconf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Autoconf::Yes => f.write_str("yes"),
            Autoconf::MissingCredentials => f.write_str("no (env variables are missing)"),
        }
    }
}

/// Collect-then-render driver around one [`Connector`].
pub struct Plugin<C> {
    config: PluginConfig,
    catalog: Catalog,
    connector: C,
}

impl<C: Connector> Plugin<C> {
    pub fn new(config: PluginConfig, catalog: Catalog, connector: C) -> Self {
        Self {
            config,
            catalog,
            connector,
        }
    }

    pub fn autoconf(&self) -> Autoconf {
        if self.config.credentials.is_some() {
            Autoconf::Yes
        } else {
            Autoconf::MissingCredentials
        }
    }

    /// Graph declarations. Display names are looked up over the network only
    /// when enabled and credentials are configured.
    pub fn config_report(&self) -> Result<Report> {
        if !self.wants_names() {
            return Ok(Report::new(render::render_config(
                &self.catalog,
                &self.unnamed_instances(),
            )));
        }

        self.with_session(|session| self.config_with(session))
    }

    /// Current values of every configured instance.
    pub fn data_report(&self) -> Result<Report> {
        self.with_session(|session| self.data_with(session))
    }

    /// Config immediately followed by data, sharing one session. Nothing is
    /// returned unless both parts succeeded.
    pub fn dirty_config_report(&self) -> Result<Report> {
        self.with_session(|session| {
            let mut report = if self.wants_names() {
                self.config_with(session)?
            } else {
                Report::new(render::render_config(
                    &self.catalog,
                    &self.unnamed_instances(),
                ))
            };
            report.append(self.data_with(session)?);
            Ok(report)
        })
    }

    fn wants_names(&self) -> bool {
        self.config.resolve_names && self.config.credentials.is_some()
    }

    fn unnamed_instances(&self) -> Vec<Instance> {
        self.config
            .instances
            .iter()
            .copied()
            .map(Instance::new)
            .collect()
    }

    fn named_instances(&self, names: &HashMap<InstanceId, String>) -> Vec<Instance> {
        self.config
            .instances
            .iter()
            .map(|id| match names.get(id) {
                Some(name) => Instance::with_name(*id, name.clone()),
                None => Instance::new(*id),
            })
            .collect()
    }

    fn config_with(&self, session: &mut dyn QuerySession) -> Result<Report> {
        let names = collector::fetch_names(session, &self.config.instances)
            .context("failed to resolve virtual server names")?;
        debug!(resolved = names.len(), "display names resolved");
        Ok(Report::new(render::render_config(
            &self.catalog,
            &self.named_instances(&names),
        )))
    }

    fn data_with(&self, session: &mut dyn QuerySession) -> Result<Report> {
        let required = self.catalog.required_keys();
        let stats = collector::fetch(session, &self.config.instances, &required)
            .context("failed to collect server statistics")?;
        info!(instances = stats.len(), "collected server statistics");

        let blocks = render::render_data(&self.catalog, &self.unnamed_instances(), &stats)?;
        Ok(Report::new(blocks))
    }

    fn with_session<T>(&self, run: impl FnOnce(&mut dyn QuerySession) -> Result<T>) -> Result<T> {
        let credentials = self
            .config
            .credentials
            .as_ref()
            .ok_or_else(|| anyhow!("username and password must be set to query the server"))?;

        let mut guard = SessionGuard::open(
            &self.connector,
            &self.config.host,
            self.config.port,
            credentials,
        )?;
        run(guard.session())
    }
}
