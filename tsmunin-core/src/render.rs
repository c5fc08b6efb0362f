use anyhow::{Result, anyhow};
use askama::Template;
use tsmunin_sdk::MetricGroup;

use crate::Instance;
use crate::catalog::Catalog;
use crate::collector::{StatsByInstance, field_value};

/// Lines of one multigraph, starting with its `multigraph` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub graph: &'static str,
    pub lines: Vec<String>,
}

impl Block {
    fn open(group: &MetricGroup) -> Self {
        Self {
            graph: group.graph,
            lines: vec![format!("multigraph {}", group.graph)],
        }
    }
}

/// Graph declarations: the group header once, then the field attributes of
/// every instance in configured order.
pub fn render_config(catalog: &Catalog, instances: &[Instance]) -> Vec<Block> {
    catalog
        .groups()
        .iter()
        .map(|group| {
            let mut block = Block::open(group);
            block
                .lines
                .extend(group.header.iter().map(|line| line.to_string()));

            for instance in instances {
                let sid = instance.id.to_string();
                let name = instance.label();
                for field in group.fields {
                    let field_name = instance.field_name(field.prefix);
                    block.lines.extend(field.attributes.iter().map(|attribute| {
                        format!("{}.{}", field_name, expand(attribute, &sid, &name))
                    }));
                }
            }

            block
        })
        .collect()
}

/// `<field>.value <value>` rows for every group and instance.
pub fn render_data(
    catalog: &Catalog,
    instances: &[Instance],
    stats: &StatsByInstance,
) -> Result<Vec<Block>> {
    catalog
        .groups()
        .iter()
        .map(|group| -> Result<Block> {
            let mut block = Block::open(group);

            for instance in instances {
                let instance_stats = stats.get(&instance.id).ok_or_else(|| {
                    anyhow!("no statistics collected for virtual server {}", instance.id)
                })?;
                for field in group.fields {
                    let value = field_value(&field.source, instance_stats)?;
                    block
                        .lines
                        .push(format!("{}.value {}", instance.field_name(field.prefix), value));
                }
            }

            Ok(block)
        })
        .collect()
}

fn expand(template: &str, sid: &str, name: &str) -> String {
    template.replace("{sid}", sid).replace("{name}", name)
}

#[derive(Template)]
#[template(
    source = "{% for block in blocks %}{% for line in block.lines %}{{ line }}
{% endfor %}{% endfor %}",
    ext = "txt",
    escape = "none"
)]
struct PluginOutput<'a> {
    blocks: &'a [Block],
}

/// Munin plugin text for `blocks`, one line per entry.
pub fn render_text(blocks: &[Block]) -> askama::Result<String> {
    PluginOutput { blocks }.render()
}
