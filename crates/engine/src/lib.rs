pub mod apply;
pub mod config;
pub mod error;
pub mod image_cache;
pub mod index;
pub mod layout;
pub mod resolver;
pub mod sync;
pub mod text;

#[cfg(test)]
mod testing;

pub use apply::{ApplyPlan, FieldApplier, LayerEdit, PendingImage, find_layer};
pub use config::SyncConfig;
pub use error::EngineError;
pub use image_cache::UrlMap;
pub use index::IdentityIndex;
pub use resolver::{LayerResolution, Template};
pub use sync::{NoProgress, Progress, SyncOutcome, SyncRequest};
pub use text::{FormattedText, format_text};

use std::collections::BTreeMap;

use cardsync_core::{MappingRule, NodeId, Record};
use cardsync_document::DocumentHost;
use serde::Serialize;

/// Identifier tags found on one selected node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceTag {
    pub node_id: NodeId,
    pub name: String,
    pub identifier: Option<String>,
    pub lineage_id: Option<String>,
}

/// Entry point for every request the hosting UI makes. Owns the document
/// host for the duration of the session; exactly one request runs at a time.
pub struct Engine<H: DocumentHost> {
    host: H,
    config: SyncConfig,
}

impl<H: DocumentHost> Engine<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            config: SyncConfig::default(),
        }
    }

    pub fn with_config(host: H, config: SyncConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { host, config })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // ========================================================================
    // Template & sync
    // ========================================================================

    /// Mappable layers of a template, plus the ids a later `sync` needs.
    pub fn resolve_layers(&self, template: NodeId) -> Result<LayerResolution, EngineError> {
        resolver::resolve_layers(&self.host, template, self.config.marker)
    }

    pub fn sync<P: Progress + ?Sized>(
        &mut self,
        request: &SyncRequest<'_>,
        progress: &mut P,
    ) -> Result<SyncOutcome, EngineError> {
        sync::run_sync(&mut self.host, &self.config, request, progress)
    }

    /// Re-applies records to the currently selected cards without creating
    /// any. `template`, when given, must still resolve.
    pub fn sync_selected<P: Progress + ?Sized>(
        &mut self,
        template: Option<NodeId>,
        rules: &[MappingRule],
        identifier_field: &str,
        records: &[Record],
        progress: &mut P,
    ) -> Result<SyncOutcome, EngineError> {
        if let Some(template) = template {
            resolver::resolve_template(&self.host, template)?;
        }
        sync::run_sync_selected(
            &mut self.host,
            &self.config,
            rules,
            identifier_field,
            records,
            progress,
        )
    }

    // ========================================================================
    // Images
    // ========================================================================

    /// Fills `layer_name` on every card tagged `identifier` with the decoded
    /// image and remembers `url` for it. Returns how many layers were
    /// filled; an identifier with no card yet is not an error.
    pub fn set_image(
        &mut self,
        identifier: &str,
        layer_name: &str,
        image: &[u8],
        url: Option<&str>,
    ) -> Result<usize, EngineError> {
        let index = IdentityIndex::build(&self.host, &self.config.identifier_tag)?;
        let cards = index.get(identifier);
        if cards.is_empty() {
            tracing::debug!("dropping image for unknown identifier {identifier}");
            return Ok(0);
        }

        let hash = self.host.create_image(image)?;
        let mut filled = 0;
        for card in cards {
            let Some(layer) = find_layer(&self.host, *card, layer_name)? else {
                tracing::debug!("card {card} has no layer {layer_name}");
                continue;
            };
            self.host.set_image_fill(layer, hash)?;
            if let Some(url) = url {
                image_cache::set_cached_url(
                    &mut self.host,
                    *card,
                    &self.config.image_urls_tag,
                    layer_name,
                    url,
                )?;
            }
            filled += 1;
        }
        Ok(filled)
    }

    pub fn get_image_urls(
        &self,
        identifiers: &[String],
    ) -> Result<BTreeMap<String, UrlMap>, EngineError> {
        let index = IdentityIndex::build(&self.host, &self.config.identifier_tag)?;
        image_cache::cached_urls(&self.host, &index, identifiers, &self.config.image_urls_tag)
    }

    // ========================================================================
    // Manual identifier tools
    // ========================================================================

    pub fn read_instance_ids(&self) -> Result<Vec<InstanceTag>, EngineError> {
        let selection = self.host.selection()?;
        if selection.is_empty() {
            return Err(EngineError::EmptySelection);
        }
        let mut tags = Vec::with_capacity(selection.len());
        for node_id in selection {
            let Some(record) = self.host.node(node_id)? else {
                continue;
            };
            tags.push(InstanceTag {
                node_id,
                name: record.name,
                identifier: self.host.get_tag(node_id, &self.config.identifier_tag)?,
                lineage_id: self.host.get_tag(node_id, &self.config.lineage_tag)?,
            });
        }
        Ok(tags)
    }

    /// Overwrites the identifier on every selected node. Returns how many
    /// nodes were retagged.
    pub fn update_instance_id(&mut self, new_id: &str) -> Result<usize, EngineError> {
        let new_id = new_id.trim();
        if new_id.is_empty() {
            return Err(EngineError::InvalidInput("identifier must not be empty".into()));
        }
        let selection = self.host.selection()?;
        if selection.is_empty() {
            return Err(EngineError::EmptySelection);
        }
        for node_id in &selection {
            self.host
                .set_tag(*node_id, &self.config.identifier_tag, new_id)?;
        }
        tracing::info!("retagged {} nodes as {new_id}", selection.len());
        Ok(selection.len())
    }
}
