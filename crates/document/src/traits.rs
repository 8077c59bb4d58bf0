use cardsync_core::{Bounds, FontName, ImageHash, ListStyle, NodeId, NodeKind};

use crate::error::DocumentError;

/// Snapshot of the shared properties every node kind exposes.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub node_id: NodeId,
    pub kind: NodeKind,
    pub name: String,
    pub parent: Option<NodeId>,
    pub visible: bool,
    pub bounds: Bounds,
}

/// The capability set the sync engine needs from whatever owns the document
/// tree. Node ids stay valid until the host removes the node.
pub trait DocumentHost {
    /// Top-level nodes of the page currently being edited, in paint order.
    fn root_children(&self) -> Result<Vec<NodeId>, DocumentError>;

    fn node(&self, node_id: NodeId) -> Result<Option<NodeRecord>, DocumentError>;

    fn children(&self, node_id: NodeId) -> Result<Vec<NodeId>, DocumentError>;

    fn get_tag(&self, node_id: NodeId, key: &str) -> Result<Option<String>, DocumentError>;

    /// Writing an empty value removes the tag.
    fn set_tag(&mut self, node_id: NodeId, key: &str, value: &str) -> Result<(), DocumentError>;

    fn set_visible(&mut self, node_id: NodeId, visible: bool) -> Result<(), DocumentError>;

    fn text(&self, node_id: NodeId) -> Result<Option<String>, DocumentError>;

    /// Fonts a text node renders with. Every one must be loaded before the
    /// node's text can be written.
    fn text_fonts(&self, node_id: NodeId) -> Result<Vec<FontName>, DocumentError>;

    fn load_font(&mut self, font: &FontName) -> Result<(), DocumentError>;

    fn set_text(
        &mut self,
        node_id: NodeId,
        text: &str,
        list_style: ListStyle,
    ) -> Result<(), DocumentError>;

    /// The component an instance was created from, if it still exists.
    fn main_component(&self, node_id: NodeId) -> Result<Option<NodeId>, DocumentError>;

    /// Deep copy inserted as the next sibling of the original.
    fn clone_node(&mut self, node_id: NodeId) -> Result<NodeId, DocumentError>;

    fn create_instance(&mut self, component_id: NodeId) -> Result<NodeId, DocumentError>;

    /// Reparents a node to the end of the current page.
    fn append_to_root(&mut self, node_id: NodeId) -> Result<(), DocumentError>;

    fn set_position(&mut self, node_id: NodeId, x: f64, y: f64) -> Result<(), DocumentError>;

    fn create_image(&mut self, bytes: &[u8]) -> Result<ImageHash, DocumentError>;

    fn set_image_fill(&mut self, node_id: NodeId, image: ImageHash) -> Result<(), DocumentError>;

    fn selection(&self) -> Result<Vec<NodeId>, DocumentError>;

    fn scroll_into_view(&mut self, node_ids: &[NodeId]) -> Result<(), DocumentError>;
}
