use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Node variants a document host exposes. Behaviour only branches on the
/// kind where it genuinely differs (instantiation vs. cloning, text writes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Page,
    Frame,
    Group,
    Component,
    ComponentSet,
    Instance,
    Text,
    Rectangle,
    Ellipse,
    Vector,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Frame => "frame",
            Self::Group => "group",
            Self::Component => "component",
            Self::ComponentSet => "component_set",
            Self::Instance => "instance",
            Self::Text => "text",
            Self::Rectangle => "rectangle",
            Self::Ellipse => "ellipse",
            Self::Vector => "vector",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "page" => Ok(Self::Page),
            "frame" => Ok(Self::Frame),
            "group" => Ok(Self::Group),
            "component" => Ok(Self::Component),
            "component_set" => Ok(Self::ComponentSet),
            "instance" => Ok(Self::Instance),
            "text" => Ok(Self::Text),
            "rectangle" => Ok(Self::Rectangle),
            "ellipse" => Ok(Self::Ellipse),
            "vector" => Ok(Self::Vector),
            _ => Err(CoreError::InvalidData(format!("unknown node kind: {s}"))),
        }
    }

    pub fn has_children(&self) -> bool {
        matches!(
            self,
            Self::Page
                | Self::Frame
                | Self::Group
                | Self::Component
                | Self::ComponentSet
                | Self::Instance
        )
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text)
    }

    /// Leaf shapes that can carry an image fill.
    pub fn is_shape(&self) -> bool {
        matches!(self, Self::Rectangle | Self::Ellipse | Self::Vector)
    }

    pub fn has_bounds(&self) -> bool {
        !matches!(self, Self::Page)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FontName {
    pub family: String,
    pub style: String,
}

impl FontName {
    pub fn new(family: &str, style: &str) -> Self {
        Self {
            family: family.to_string(),
            style: style.to_string(),
        }
    }
}

/// Paragraph list styling applied to the whole text range of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ListStyle {
    #[default]
    None,
    Ordered,
}

impl ListStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Ordered => "ordered",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "none" => Ok(Self::None),
            "ordered" => Ok(Self::Ordered),
            _ => Err(CoreError::InvalidData(format!("unknown list style: {s}"))),
        }
    }
}
