use cardsync_core::{Bounds, LayerKindHint, MappableLayer, NodeId, NodeKind};
use cardsync_document::{DocumentHost, NodeRecord};
use serde::Serialize;

use crate::error::EngineError;

/// A node cards are produced from, with everything a sync pass needs to
/// know about it resolved up front.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub node_id: NodeId,
    pub kind: NodeKind,
    pub name: String,
    /// Component set or main component the template belongs to. Cards
    /// remember this rather than `node_id` so switching variants keeps them
    /// attached to the same template.
    pub lineage_id: NodeId,
    /// The node whose structure new cards copy: the default variant for a
    /// component set, the template itself otherwise.
    pub source: NodeId,
    pub card_size: Bounds,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerResolution {
    pub mappable_layers: Vec<MappableLayer>,
    pub template_name: String,
    pub lineage_id: NodeId,
    pub actual_template_id: NodeId,
}

pub fn resolve_template<H: DocumentHost + ?Sized>(
    host: &H,
    node_id: NodeId,
) -> Result<Template, EngineError> {
    let record = host
        .node(node_id)?
        .ok_or_else(|| EngineError::TemplateNotFound(node_id.to_string()))?;
    match record.kind {
        NodeKind::Component
        | NodeKind::ComponentSet
        | NodeKind::Instance
        | NodeKind::Frame
        | NodeKind::Group => {}
        other => {
            return Err(EngineError::UnsupportedTemplate {
                node_id: node_id.to_string(),
                kind: other.as_str(),
            });
        }
    }

    let source = match record.kind {
        NodeKind::ComponentSet => default_variant(host, node_id)?,
        _ => node_id,
    };
    let card_size = match host.node(source)? {
        Some(source_record) => source_record.bounds,
        None => record.bounds,
    };

    Ok(Template {
        node_id,
        kind: record.kind,
        lineage_id: lineage_id(host, &record)?,
        name: record.name,
        source,
        card_size,
    })
}

/// Instance → main component; variant → its component set; anything else
/// is its own lineage.
pub fn lineage_id<H: DocumentHost + ?Sized>(
    host: &H,
    record: &NodeRecord,
) -> Result<NodeId, EngineError> {
    let defining = match record.kind {
        NodeKind::Instance => match host.main_component(record.node_id)? {
            Some(component) => host.node(component)?,
            None => None,
        },
        _ => None,
    };
    let defining = defining.as_ref().unwrap_or(record);

    if defining.kind == NodeKind::Component {
        if let Some(parent) = defining.parent {
            if let Some(parent_record) = host.node(parent)? {
                if parent_record.kind == NodeKind::ComponentSet {
                    return Ok(parent);
                }
            }
        }
    }
    Ok(defining.node_id)
}

fn default_variant<H: DocumentHost + ?Sized>(host: &H, set: NodeId) -> Result<NodeId, EngineError> {
    for child in host.children(set)? {
        if let Some(record) = host.node(child)? {
            if record.kind == NodeKind::Component {
                return Ok(child);
            }
        }
    }
    Err(EngineError::InvalidInput(format!("component set {set} has no variants")))
}

/// Produces a fresh, unplaced card from the template: native instances for
/// component-like templates, deep clones for plain containers.
pub fn instantiate<H: DocumentHost + ?Sized>(
    host: &mut H,
    template: &Template,
) -> Result<NodeId, EngineError> {
    let card = match template.kind {
        NodeKind::Component | NodeKind::ComponentSet => host.create_instance(template.source)?,
        NodeKind::Instance => match host.main_component(template.node_id)? {
            Some(component) => host.create_instance(component)?,
            None => host.clone_node(template.node_id)?,
        },
        _ => host.clone_node(template.node_id)?,
    };
    Ok(card)
}

/// Every descendant of the template whose name carries `marker`, depth-first
/// in child order.
pub fn mappable_layers<H: DocumentHost + ?Sized>(
    host: &H,
    template: &Template,
    marker: char,
) -> Result<Vec<MappableLayer>, EngineError> {
    let root_name = match host.node(template.source)? {
        Some(record) => record.name,
        None => return Err(EngineError::TemplateNotFound(template.source.to_string())),
    };
    let mut layers = Vec::new();
    collect_layers(host, template.source, &root_name, marker, &mut layers)?;
    Ok(layers)
}

fn collect_layers<H: DocumentHost + ?Sized>(
    host: &H,
    parent: NodeId,
    parent_path: &str,
    marker: char,
    out: &mut Vec<MappableLayer>,
) -> Result<(), EngineError> {
    for child in host.children(parent)? {
        let Some(record) = host.node(child)? else {
            continue;
        };
        let path = format!("{parent_path}/{}", record.name);
        if record.name.contains(marker) {
            out.push(MappableLayer {
                node_id: child,
                name: record.name.clone(),
                kind_hint: LayerKindHint::from(record.kind),
                path: path.clone(),
            });
        }
        collect_layers(host, child, &path, marker, out)?;
    }
    Ok(())
}

pub fn resolve_layers<H: DocumentHost + ?Sized>(
    host: &H,
    template_id: NodeId,
    marker: char,
) -> Result<LayerResolution, EngineError> {
    let template = resolve_template(host, template_id)?;
    let mappable_layers = mappable_layers(host, &template, marker)?;
    tracing::debug!(
        "resolved {} mappable layers in template {}",
        mappable_layers.len(),
        template.name
    );
    Ok(LayerResolution {
        mappable_layers,
        template_name: template.name,
        lineage_id: template.lineage_id,
        actual_template_id: template.node_id,
    })
}
