use cardsync_core::{Bounds, FontName, MappingRule, NodeId, Record};
use cardsync_document::{DocumentHost, SqliteDocument};
use cardsync_engine::{
    Engine, EngineError, IdentityIndex, NoProgress, SyncConfig, SyncOutcome, SyncRequest,
    find_layer,
};

pub const CARD_WIDTH: f64 = 240.0;
pub const CARD_HEIGHT: f64 = 160.0;

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Installs a test-friendly subscriber once; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn title_font() -> FontName {
    FontName::new("Inter", "Bold")
}

pub fn body_font() -> FontName {
    FontName::new("Inter", "Regular")
}

/// An engine over an in-memory document holding a "Person Card" component
/// on a separate Library page, so the page being synced starts empty.
///
/// Card layout: background, #name, #role, #bio,
/// #featured { #featured-label }, #avatar.
pub struct TestCanvas {
    pub engine: Engine<SqliteDocument>,
    pub library: NodeId,
    pub template: NodeId,
}

impl TestCanvas {
    pub fn new() -> TestResult<Self> {
        Self::with_config(SyncConfig::default())
    }

    pub fn with_config(config: SyncConfig) -> TestResult<Self> {
        let mut doc = SqliteDocument::open_in_memory()?;
        doc.register_font(&title_font())?;
        doc.register_font(&body_font())?;

        let library = doc.create_page("Library")?;
        let card = Bounds::new(0.0, 0.0, CARD_WIDTH, CARD_HEIGHT);
        let template = doc.create_component(library, "Person Card", card)?;
        doc.create_rectangle(template, "background", card)?;
        doc.create_text(template, "#name", "Name", &title_font(), Bounds::new(16.0, 16.0, 160.0, 24.0))?;
        doc.create_text(template, "#role", "Role", &body_font(), Bounds::new(16.0, 44.0, 160.0, 20.0))?;
        doc.create_text(template, "#bio", "Bio", &body_font(), Bounds::new(16.0, 68.0, 208.0, 48.0))?;
        let featured = doc.create_frame(template, "#featured", Bounds::new(16.0, 124.0, 96.0, 24.0))?;
        doc.create_text(featured, "#featured-label", "Featured", &body_font(), Bounds::new(4.0, 4.0, 88.0, 16.0))?;
        doc.create_rectangle(template, "#avatar", Bounds::new(176.0, 16.0, 48.0, 48.0))?;

        Ok(Self {
            engine: Engine::with_config(doc, config)?,
            library,
            template,
        })
    }

    pub fn doc(&self) -> &SqliteDocument {
        self.engine.host()
    }

    pub fn doc_mut(&mut self) -> &mut SqliteDocument {
        self.engine.host_mut()
    }

    pub fn rules() -> Vec<MappingRule> {
        vec![
            MappingRule::text("#name", "name"),
            MappingRule::text("#role", "role"),
            MappingRule::text("#bio", "bio"),
            MappingRule::text("#featured", "featured"),
            MappingRule::text("#featured-label", "featured_label"),
            MappingRule::image("#avatar", "avatar"),
        ]
    }

    /// Syncs with the default rules, keyed by `id`.
    pub fn sync(&mut self, records: &[Record]) -> Result<SyncOutcome, EngineError> {
        self.sync_with(records, &Self::rules())
    }

    pub fn sync_with(
        &mut self,
        records: &[Record],
        rules: &[MappingRule],
    ) -> Result<SyncOutcome, EngineError> {
        let request = SyncRequest {
            template: self.template,
            lineage_id: None,
            records,
            rules,
            identifier_field: "id",
        };
        self.engine.sync(&request, &mut NoProgress)
    }

    /// Top-level nodes carrying an identifier tag, in page order.
    pub fn cards(&self) -> TestResult<Vec<NodeId>> {
        let tag = &self.engine.config().identifier_tag;
        let mut cards = Vec::new();
        for node_id in self.doc().root_children()? {
            if self.doc().get_tag(node_id, tag)?.is_some() {
                cards.push(node_id);
            }
        }
        Ok(cards)
    }

    pub fn cards_for(&self, identifier: &str) -> TestResult<Vec<NodeId>> {
        let index = IdentityIndex::build(self.doc(), &self.engine.config().identifier_tag)?;
        Ok(index.get(identifier).to_vec())
    }

    pub fn layer(&self, card: NodeId, name: &str) -> TestResult<NodeId> {
        find_layer(self.doc(), card, name)?
            .ok_or_else(|| format!("card {card} has no layer {name}").into())
    }

    pub fn text(&self, card: NodeId, layer: &str) -> TestResult<Option<String>> {
        Ok(self.doc().text(self.layer(card, layer)?)?)
    }

    pub fn is_visible(&self, card: NodeId, layer: &str) -> TestResult<bool> {
        let node = self.layer(card, layer)?;
        let record = self
            .doc()
            .node(node)?
            .ok_or_else(|| format!("layer {layer} vanished"))?;
        Ok(record.visible)
    }

    pub fn bounds(&self, node_id: NodeId) -> TestResult<Bounds> {
        let record = self
            .doc()
            .node(node_id)?
            .ok_or_else(|| format!("node {node_id} not found"))?;
        Ok(record.bounds)
    }

    pub fn identifier(&self, card: NodeId) -> TestResult<Option<String>> {
        Ok(self
            .doc()
            .get_tag(card, &self.engine.config().identifier_tag)?)
    }

    pub fn lineage(&self, card: NodeId) -> TestResult<Option<String>> {
        Ok(self.doc().get_tag(card, &self.engine.config().lineage_tag)?)
    }
}

/// Shorthand for a person record keyed by `id`.
pub fn person(id: &str, name: &str) -> Record {
    Record::new().with("id", id).with("name", name)
}
