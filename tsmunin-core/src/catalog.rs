use std::collections::{BTreeSet, HashSet};

use tsmunin_sdk::MetricGroup;

/// The metric groups a plugin variant exports, in output order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    groups: Vec<&'static MetricGroup>,
}

impl Catalog {
    /// Builds a catalog ordered by group position, then key, regardless of
    /// the order groups were handed in. Of several groups sharing a key only
    /// the first in that order is kept.
    pub fn new<I>(groups: I) -> Self
    where
        I: IntoIterator<Item = &'static MetricGroup>,
    {
        let mut groups: Vec<_> = groups.into_iter().collect();
        groups.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.key.cmp(b.key)));
        let mut seen = HashSet::new();
        groups.retain(|group| seen.insert(group.key));
        Self { groups }
    }

    /// Every group linked into the binary.
    pub fn registered() -> Self {
        Self::new(tsmunin_sdk::iter_registered_groups())
    }

    pub fn groups(&self) -> &[&'static MetricGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// `serverinfo` fields the catalog reads, deduplicated.
    pub fn required_keys(&self) -> Vec<&'static str> {
        self.groups
            .iter()
            .flat_map(|group| group.fields.iter())
            .flat_map(|field| field.source.required_keys())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
