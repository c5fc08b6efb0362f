use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};
use tsmunin_sdk::{
    CLIENTS_ONLINE, InstanceId, QUERY_CLIENTS_ONLINE, QueryError, QuerySession, ServerStats,
    StatSource,
};

use crate::sanitize::sanitize_field_name;

pub type StatsByInstance = HashMap<InstanceId, ServerStats>;

/// Runs `use` + `serverinfo` for every instance and checks that each
/// response carries the `required` fields.
///
/// Stops at the first failure; nothing collected so far is returned.
pub fn fetch(
    session: &mut dyn QuerySession,
    instances: &[InstanceId],
    required: &[&str],
) -> Result<StatsByInstance, QueryError> {
    let mut collected = StatsByInstance::with_capacity(instances.len());

    for &id in instances {
        if collected.contains_key(&id) {
            continue;
        }

        session.select_instance(id)?;
        let stats = session.instance_info()?;
        for key in required {
            stats.require(key)?;
        }

        debug!(instance = %id, fields = stats.len(), "collected serverinfo");
        collected.insert(id, stats);
    }

    Ok(collected)
}

/// Resolves sanitized display names for the configured instances with a
/// single `serverlist` call. Instances whose name has no usable characters
/// are left out so callers fall back to the id.
pub fn fetch_names(
    session: &mut dyn QuerySession,
    instances: &[InstanceId],
) -> Result<HashMap<InstanceId, String>, QueryError> {
    let wanted: HashSet<InstanceId> = instances.iter().copied().collect();
    let mut names = HashMap::new();

    for server in session.list_instances()? {
        if !wanted.contains(&server.id) {
            continue;
        }

        let name = sanitize_field_name(&server.name);
        if name.is_empty() {
            warn!(instance = %server.id, raw = %server.name, "virtual server name unusable as label, using id");
            continue;
        }
        names.insert(server.id, name);
    }

    Ok(names)
}

/// Clients on the server excluding ServerQuery connections, never negative.
pub fn connected_clients(stats: &ServerStats) -> Result<u64, QueryError> {
    let online = stats.require_u64(CLIENTS_ONLINE)?;
    let query = stats.require_u64(QUERY_CLIENTS_ONLINE)?;

    if query > online {
        warn!(online, query, "more query clients than clients online, clamping to 0");
    }
    Ok(online.saturating_sub(query))
}

/// Value written after `.value` for a field.
pub fn field_value(source: &StatSource, stats: &ServerStats) -> Result<String, QueryError> {
    match source {
        StatSource::Raw(key) => stats.require(key).map(str::to_string),
        StatSource::ConnectedClients => connected_clients(stats).map(|count| count.to_string()),
    }
}
