use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub const DEFAULT_COLUMNS: usize = 4;
pub const DEFAULT_GAP: f64 = 40.0;
/// Layers whose name contains this character can be targeted by mapping rules.
pub const DEFAULT_MARKER: char = '#';

pub const IDENTIFIER_TAG: &str = "cardsync.id";
pub const LINEAGE_TAG: &str = "cardsync.template";
pub const IMAGE_URLS_TAG: &str = "cardsync.image-urls";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Cards per row when laying out newly created cards.
    pub columns: usize,
    /// Spacing between new cards, and half the margin below existing content.
    pub gap: f64,
    pub marker: char,
    pub identifier_tag: String,
    pub lineage_tag: String,
    pub image_urls_tag: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS,
            gap: DEFAULT_GAP,
            marker: DEFAULT_MARKER,
            identifier_tag: IDENTIFIER_TAG.to_string(),
            lineage_tag: LINEAGE_TAG.to_string(),
            image_urls_tag: IMAGE_URLS_TAG.to_string(),
        }
    }
}

impl SyncConfig {
    /// Reads a config where every key is optional; missing keys keep their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.columns == 0 {
            return Err(EngineError::InvalidConfig("columns must be at least 1".into()));
        }
        if !self.gap.is_finite() || self.gap < 0.0 {
            return Err(EngineError::InvalidConfig(format!("gap must be a non-negative number, got {}", self.gap)));
        }
        let tags = [&self.identifier_tag, &self.lineage_tag, &self.image_urls_tag];
        if tags.iter().any(|t| t.is_empty()) {
            return Err(EngineError::InvalidConfig("tag keys must not be empty".into()));
        }
        if self.identifier_tag == self.lineage_tag
            || self.identifier_tag == self.image_urls_tag
            || self.lineage_tag == self.image_urls_tag
        {
            return Err(EngineError::InvalidConfig("tag keys must be distinct".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SyncConfig::from_json(r#"{"columns": 3}"#).unwrap();
        assert_eq!(config.columns, 3);
        assert_eq!(config.gap, DEFAULT_GAP);
        assert_eq!(config.marker, '#');
        assert_eq!(config.identifier_tag, IDENTIFIER_TAG);
    }

    #[test]
    fn rejects_degenerate_grids() {
        assert!(SyncConfig::from_json(r#"{"columns": 0}"#).is_err());
        assert!(SyncConfig::from_json(r#"{"gap": -1.0}"#).is_err());
        assert!(SyncConfig::from_json(r#"{"lineage_tag": "cardsync.id"}"#).is_err());
        assert!(SyncConfig::from_json("not json").is_err());
    }
}
