use std::collections::HashMap;

use cardsync_core::NodeId;
use cardsync_document::DocumentHost;

use crate::error::EngineError;

/// Identifier → cards currently tagged with it, in document order.
///
/// Built with one walk of the current page per pass. Cards created during
/// the pass are appended rather than re-queried.
#[derive(Debug, Default)]
pub struct IdentityIndex {
    entries: HashMap<String, Vec<NodeId>>,
    visited: usize,
}

impl IdentityIndex {
    pub fn build<H: DocumentHost + ?Sized>(host: &H, tag: &str) -> Result<Self, EngineError> {
        let mut index = Self::default();
        let mut stack: Vec<NodeId> = host.root_children()?;
        stack.reverse();

        while let Some(node_id) = stack.pop() {
            index.visited += 1;
            if let Some(identifier) = host.get_tag(node_id, tag)? {
                if !identifier.is_empty() {
                    index.entries.entry(identifier).or_default().push(node_id);
                }
            }
            let mut children = host.children(node_id)?;
            children.reverse();
            stack.extend(children);
        }

        tracing::debug!(
            "identity index: {} identifiers over {} nodes",
            index.entries.len(),
            index.visited
        );
        Ok(index)
    }

    pub fn get(&self, identifier: &str) -> &[NodeId] {
        self.entries
            .get(identifier)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn first(&self, identifier: &str) -> Option<NodeId> {
        self.get(identifier).first().copied()
    }

    pub fn insert(&mut self, identifier: String, node_id: NodeId) {
        self.entries.entry(identifier).or_default().push(node_id);
    }

    /// Number of distinct identifiers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn visited(&self) -> usize {
        self.visited
    }
}
