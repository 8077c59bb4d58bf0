use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::NodeId;
use crate::node::NodeKind;

/// How a mapped field is rendered into its target layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Image,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            _ => Err(CoreError::InvalidData(format!("unknown field kind: {s}"))),
        }
    }
}

/// Binds one record field to one named layer inside a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRule {
    pub layer_name: String,
    pub field: String,
    pub kind: FieldKind,
}

impl MappingRule {
    pub fn text(layer_name: &str, field: &str) -> Self {
        Self {
            layer_name: layer_name.to_string(),
            field: field.to_string(),
            kind: FieldKind::Text,
        }
    }

    pub fn image(layer_name: &str, field: &str) -> Self {
        Self {
            layer_name: layer_name.to_string(),
            field: field.to_string(),
            kind: FieldKind::Image,
        }
    }
}

/// What a mappable layer is most likely used for, shown next to it when
/// building mapping rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKindHint {
    Text,
    Image,
    Container,
}

impl From<NodeKind> for LayerKindHint {
    fn from(kind: NodeKind) -> Self {
        if kind.is_text() {
            Self::Text
        } else if kind.is_shape() {
            Self::Image
        } else {
            Self::Container
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappableLayer {
    pub node_id: NodeId,
    pub name: String,
    pub kind_hint: LayerKindHint,
    /// Slash-joined names from the template root down to this layer.
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_hints_follow_node_kind() {
        assert_eq!(LayerKindHint::from(NodeKind::Text), LayerKindHint::Text);
        assert_eq!(LayerKindHint::from(NodeKind::Rectangle), LayerKindHint::Image);
        assert_eq!(LayerKindHint::from(NodeKind::Frame), LayerKindHint::Container);
        assert_eq!(LayerKindHint::from(NodeKind::Instance), LayerKindHint::Container);
    }

    #[test]
    fn rules_deserialize_from_ui_json() {
        let rule: MappingRule =
            serde_json::from_str(r##"{"layer_name": "#photo", "field": "avatar", "kind": "image"}"##)
                .unwrap();
        assert_eq!(rule, MappingRule::image("#photo", "avatar"));
        assert_eq!(FieldKind::parse(rule.kind.as_str()).unwrap(), FieldKind::Image);
    }
}
