use std::collections::BTreeMap;

use cardsync_core::{CoreError, NodeId};
use cardsync_document::DocumentHost;

use crate::error::EngineError;
use crate::index::IdentityIndex;

/// Layer name → URL of the image last applied to it.
pub type UrlMap = BTreeMap<String, String>;

/// Reads a card's URL cache. A missing or unreadable value counts as empty.
pub fn read_url_map<H: DocumentHost + ?Sized>(
    host: &H,
    card: NodeId,
    tag: &str,
) -> Result<UrlMap, EngineError> {
    let Some(raw) = host.get_tag(card, tag)? else {
        return Ok(UrlMap::new());
    };
    match serde_json::from_str::<UrlMap>(&raw) {
        Ok(map) => Ok(map),
        Err(e) => {
            tracing::warn!("ignoring malformed image url cache on {card}: {e}");
            Ok(UrlMap::new())
        }
    }
}

/// Merges one entry into a card's URL cache.
pub fn set_cached_url<H: DocumentHost + ?Sized>(
    host: &mut H,
    card: NodeId,
    tag: &str,
    layer_name: &str,
    url: &str,
) -> Result<(), EngineError> {
    let mut map = read_url_map(host, card, tag)?;
    map.insert(layer_name.to_string(), url.to_string());
    let encoded =
        serde_json::to_string(&map).map_err(|e| CoreError::Serialization(e.to_string()))?;
    host.set_tag(card, tag, &encoded)?;
    Ok(())
}

/// URL caches for the requested identifiers, taken from the first card
/// carrying each one. Duplicates are assumed to show the same images;
/// identifiers without a card are left out.
pub fn cached_urls<H: DocumentHost + ?Sized>(
    host: &H,
    index: &IdentityIndex,
    identifiers: &[String],
    tag: &str,
) -> Result<BTreeMap<String, UrlMap>, EngineError> {
    let mut result = BTreeMap::new();
    for identifier in identifiers {
        if let Some(card) = index.first(identifier) {
            result.insert(identifier.clone(), read_url_map(host, card, tag)?);
        }
    }
    Ok(result)
}
