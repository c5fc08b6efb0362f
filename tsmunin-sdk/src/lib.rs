use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

mod error;

pub use error::{InvalidInstanceId, QueryError};

/// Total clients connected to a virtual server, query clients included.
pub const CLIENTS_ONLINE: &str = "virtualserver_clientsonline";
/// ServerQuery connections counted in [`CLIENTS_ONLINE`].
pub const QUERY_CLIENTS_ONLINE: &str = "virtualserver_queryclientsonline";

/// Identifier of a virtual server (`sid`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(NonZeroU32);

impl InstanceId {
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InstanceId {
    type Err = InvalidInstanceId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidInstanceId(s.to_string()));
        }

        token
            .parse::<u32>()
            .ok()
            .and_then(InstanceId::new)
            .ok_or_else(|| InvalidInstanceId(s.to_string()))
    }
}

/// Flat statistics of one virtual server as returned by `serverinfo`.
///
/// Values are kept as the server sent them; numeric conversion only happens
/// for fields that feed derived values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStats {
    values: BTreeMap<String, String>,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Looks up a field, failing with [`QueryError::MissingField`] when absent.
    pub fn require(&self, key: &str) -> Result<&str, QueryError> {
        self.get(key).ok_or_else(|| QueryError::missing(key))
    }

    pub fn require_u64(&self, key: &str) -> Result<u64, QueryError> {
        let value = self.require(key)?;
        value.trim().parse().map_err(|_| QueryError::InvalidField {
            field: key.to_string(),
            value: value.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ServerStats {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut stats = ServerStats::new();
        for (key, value) in iter {
            stats.insert(key, value);
        }
        stats
    }
}

/// Entry of `serverlist`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualServer {
    pub id: InstanceId,
    pub name: String,
}

/// An authenticated-or-not conversation with the query interface.
///
/// Implementations are driven strictly sequentially: one command, one
/// response.
pub trait QuerySession {
    fn authenticate(&mut self, username: &str, password: &str) -> Result<(), QueryError>;
    fn select_instance(&mut self, id: InstanceId) -> Result<(), QueryError>;
    fn instance_info(&mut self) -> Result<ServerStats, QueryError>;
    fn list_instances(&mut self) -> Result<Vec<VirtualServer>, QueryError>;
    fn close(&mut self) -> Result<(), QueryError>;
}

/// Opens sessions against a query endpoint.
pub trait Connector {
    fn connect(&self, host: &str, port: u16) -> Result<Box<dyn QuerySession>, QueryError>;
}

/// Where a field's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatSource {
    /// Copied verbatim from the named `serverinfo` field.
    Raw(&'static str),
    /// Online clients without ServerQuery connections.
    ConnectedClients,
}

impl StatSource {
    pub fn required_keys(&self) -> Vec<&'static str> {
        match self {
            StatSource::Raw(key) => vec![*key],
            StatSource::ConnectedClients => vec![CLIENTS_ONLINE, QUERY_CLIENTS_ONLINE],
        }
    }
}

/// One data series of a graph, repeated for every virtual server.
///
/// The Munin field name is `<prefix>_<sid>`. `attributes` are the config
/// lines written after `<field>.`; `{sid}` expands to the instance id and
/// `{name}` to its display name.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub prefix: &'static str,
    pub source: StatSource,
    pub attributes: &'static [&'static str],
}

/// A multigraph and its series.
#[derive(Debug, Clone, Copy)]
pub struct MetricGroup {
    pub key: &'static str,
    pub graph: &'static str,
    pub position: u16,
    pub header: &'static [&'static str],
    pub fields: &'static [FieldSpec],
}

/// Descriptor of a compile-time registry entry.
pub struct GroupRegistration {
    pub group: &'static MetricGroup,
}

inventory::collect!(GroupRegistration);

pub use inventory;

/// Helper macro to register a metric group inside a module.
#[macro_export]
macro_rules! register_group {
    ($group:expr) => {
        ::tsmunin_sdk::inventory::submit! {
            ::tsmunin_sdk::GroupRegistration {
                group: $group,
            }
        }
    };
}

pub fn iter_registered_groups() -> impl Iterator<Item = &'static MetricGroup> {
    inventory::iter::<GroupRegistration>
        .into_iter()
        .map(|entry| entry.group)
}
