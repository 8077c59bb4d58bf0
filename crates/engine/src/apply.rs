use std::collections::BTreeSet;

use cardsync_core::{FieldKind, FontName, MappingRule, NodeId, Record};
use cardsync_document::DocumentHost;
use serde::Serialize;

use crate::error::EngineError;
use crate::text::{FormattedText, format_text};

/// An image layer that should show the picture at `url`. The bytes arrive
/// later through `Engine::set_image`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingImage {
    pub identifier: String,
    pub layer_name: String,
    pub url: String,
}

/// What one rule does to one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerEdit {
    pub rule_index: usize,
    pub layer: NodeId,
    pub visible: bool,
    pub text: Option<FormattedText>,
    pub fonts: Vec<FontName>,
    pub image: Option<PendingImage>,
}

/// Every edit a record implies for one card, computed without touching the
/// document.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyPlan {
    pub card: NodeId,
    pub edits: Vec<LayerEdit>,
}

impl ApplyPlan {
    pub fn required_fonts(&self) -> BTreeSet<FontName> {
        self.edits
            .iter()
            .filter(|e| e.text.is_some())
            .flat_map(|e| e.fonts.iter().cloned())
            .collect()
    }

    /// Image requests for layers still visible once every edit has run.
    /// A later rule hiding the same layer cancels an earlier request.
    pub fn pending_images(&self) -> Vec<PendingImage> {
        self.edits
            .iter()
            .filter(|e| self.ends_visible(e.layer))
            .filter_map(|e| e.image.clone())
            .collect()
    }

    fn ends_visible(&self, layer: NodeId) -> bool {
        self.edits
            .iter()
            .rev()
            .find(|e| e.layer == layer)
            .is_none_or(|e| e.visible)
    }
}

/// First descendant of `root` named exactly `name`, depth-first in child
/// order. The root itself is not a candidate.
pub fn find_layer<H: DocumentHost + ?Sized>(
    host: &H,
    root: NodeId,
    name: &str,
) -> Result<Option<NodeId>, EngineError> {
    let mut stack = host.children(root)?;
    stack.reverse();
    while let Some(node_id) = stack.pop() {
        if let Some(record) = host.node(node_id)? {
            if record.name == name {
                return Ok(Some(node_id));
            }
        }
        let mut children = host.children(node_id)?;
        children.reverse();
        stack.extend(children);
    }
    Ok(None)
}

/// Applies an ordered rule list to cards. Rules run in order, so a later
/// rule for the same layer overrides an earlier one.
#[derive(Debug, Clone, Copy)]
pub struct FieldApplier<'a> {
    rules: &'a [MappingRule],
}

impl<'a> FieldApplier<'a> {
    pub fn new(rules: &'a [MappingRule]) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &'a [MappingRule] {
        self.rules
    }

    /// Read-only phase: resolves target layers, visibility, text and the
    /// fonts that must be loaded before anything is written.
    pub fn plan<H: DocumentHost + ?Sized>(
        &self,
        host: &H,
        card: NodeId,
        identifier: &str,
        record: &Record,
    ) -> Result<ApplyPlan, EngineError> {
        let mut edits = Vec::new();

        for (rule_index, rule) in self.rules.iter().enumerate() {
            let Some(layer) = find_layer(host, card, &rule.layer_name)? else {
                tracing::debug!("card {card} has no layer {}", rule.layer_name);
                continue;
            };
            let Some(value) = record.value(&rule.field) else {
                continue;
            };
            let Some(layer_record) = host.node(layer)? else {
                continue;
            };

            let visible = value.coerce_visible();
            let mut edit = LayerEdit {
                rule_index,
                layer,
                visible,
                text: None,
                fonts: Vec::new(),
                image: None,
            };

            if visible && !value.is_boolean() {
                let rendered = value.to_display_string();
                if layer_record.kind.is_text() {
                    edit.text = Some(format_text(&rendered));
                    edit.fonts = host.text_fonts(layer)?;
                }
                if rule.kind == FieldKind::Image {
                    edit.image = Some(PendingImage {
                        identifier: identifier.to_string(),
                        layer_name: rule.layer_name.clone(),
                        url: rendered,
                    });
                }
            }
            edits.push(edit);
        }

        Ok(ApplyPlan { card, edits })
    }

    /// Mutating phase. Font loads are best effort; a text write that still
    /// fails on a missing font aborts the card.
    pub fn commit<H: DocumentHost + ?Sized>(
        &self,
        host: &mut H,
        plan: &ApplyPlan,
    ) -> Result<Vec<PendingImage>, EngineError> {
        for font in plan.required_fonts() {
            if let Err(e) = host.load_font(&font) {
                tracing::warn!("could not load font {} {}: {e}", font.family, font.style);
            }
        }

        for edit in &plan.edits {
            host.set_visible(edit.layer, edit.visible)?;
            if let Some(text) = &edit.text {
                host.set_text(edit.layer, &text.text, text.list_style)?;
            }
        }

        Ok(plan.pending_images())
    }

    pub fn apply<H: DocumentHost + ?Sized>(
        &self,
        host: &mut H,
        card: NodeId,
        identifier: &str,
        record: &Record,
    ) -> Result<Vec<PendingImage>, EngineError> {
        let plan = self.plan(host, card, identifier, record)?;
        self.commit(host, &plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use cardsync_core::{FieldValue, ListStyle};
    use cardsync_document::{DocumentError, SqliteDocument};

    fn setup() -> (SqliteDocument, NodeId) {
        let mut doc = SqliteDocument::open_in_memory().unwrap();
        let fixture = card_component(&mut doc).unwrap();
        let card = doc.create_instance(fixture.component).unwrap();
        (doc, card)
    }

    fn layer(doc: &SqliteDocument, card: NodeId, name: &str) -> NodeId {
        find_layer(doc, card, name).unwrap().unwrap()
    }

    #[test]
    fn find_layer_is_depth_first_and_skips_root() {
        let (doc, card) = setup();
        let badge = layer(&doc, card, "#badge");
        let label = layer(&doc, card, "#badge-label");
        assert_eq!(doc.children(badge).unwrap(), vec![label]);
        assert_eq!(find_layer(&doc, card, "Card").unwrap(), None);
        assert_eq!(find_layer(&doc, card, "#missing").unwrap(), None);
    }

    #[test]
    fn writes_text_and_shows_layer() {
        let (mut doc, card) = setup();
        let rules = vec![MappingRule::text("#title", "name")];
        let record = Record::new().with("name", "Ada Lovelace");
        FieldApplier::new(&rules).apply(&mut doc, card, "1", &record).unwrap();

        let title = layer(&doc, card, "#title");
        assert_eq!(doc.text(title).unwrap().as_deref(), Some("Ada Lovelace"));
        assert_eq!(doc.list_style(title).unwrap(), ListStyle::None);
        assert!(doc.node(title).unwrap().unwrap().visible);
    }

    #[test]
    fn numbered_text_becomes_list() {
        let (mut doc, card) = setup();
        let rules = vec![MappingRule::text("#body", "steps")];
        let record = Record::new().with("steps", "1. A\n2. B");
        FieldApplier::new(&rules).apply(&mut doc, card, "1", &record).unwrap();

        let body = layer(&doc, card, "#body");
        assert_eq!(doc.text(body).unwrap().as_deref(), Some("A\nB"));
        assert_eq!(doc.list_style(body).unwrap(), ListStyle::Ordered);
    }

    #[test]
    fn numbers_are_stringified() {
        let (mut doc, card) = setup();
        let rules = vec![MappingRule::text("#title", "count")];
        let record = Record::new().with("count", 42i64);
        FieldApplier::new(&rules).apply(&mut doc, card, "1", &record).unwrap();
        assert_eq!(
            doc.text(layer(&doc, card, "#title")).unwrap().as_deref(),
            Some("42")
        );
    }

    #[test]
    fn hidden_container_keeps_nested_text() {
        let (mut doc, card) = setup();
        let rules = vec![
            MappingRule::text("#badge", "is_new"),
            MappingRule::text("#badge-label", "badge_text"),
        ];
        let record = Record::new()
            .with("is_new", false)
            .with("badge_text", FieldValue::Null);
        FieldApplier::new(&rules).apply(&mut doc, card, "1", &record).unwrap();

        let badge = layer(&doc, card, "#badge");
        let label = layer(&doc, card, "#badge-label");
        assert!(!doc.node(badge).unwrap().unwrap().visible);
        assert_eq!(doc.text(label).unwrap().as_deref(), Some("New"));
    }

    #[test]
    fn falsy_text_hides_without_rewriting() {
        let (mut doc, card) = setup();
        let rules = vec![MappingRule::text("#title", "name")];
        FieldApplier::new(&rules)
            .apply(&mut doc, card, "1", &Record::new().with("name", "unchecked"))
            .unwrap();
        let title = layer(&doc, card, "#title");
        assert!(!doc.node(title).unwrap().unwrap().visible);
        assert_eq!(doc.text(title).unwrap().as_deref(), Some("Title"));
    }

    #[test]
    fn boolean_true_shows_without_writing_text() {
        let (mut doc, card) = setup();
        let title = layer(&doc, card, "#title");
        doc.set_visible(title, false).unwrap();

        let rules = vec![MappingRule::text("#title", "flag")];
        FieldApplier::new(&rules)
            .apply(&mut doc, card, "1", &Record::new().with("flag", true))
            .unwrap();
        assert!(doc.node(title).unwrap().unwrap().visible);
        assert_eq!(doc.text(title).unwrap().as_deref(), Some("Title"));
    }

    #[test]
    fn missing_field_and_missing_layer_are_skipped() {
        let (mut doc, card) = setup();
        let title = layer(&doc, card, "#title");
        doc.set_visible(title, false).unwrap();

        let rules = vec![
            MappingRule::text("#title", "absent"),
            MappingRule::text("#nowhere", "name"),
        ];
        let plan = FieldApplier::new(&rules)
            .plan(&doc, card, "1", &Record::new().with("name", "x"))
            .unwrap();
        assert!(plan.edits.is_empty());

        FieldApplier::new(&rules)
            .commit(&mut doc, &plan)
            .unwrap();
        assert!(!doc.node(title).unwrap().unwrap().visible);
        assert_eq!(doc.text(title).unwrap().as_deref(), Some("Title"));
    }

    #[test]
    fn later_rule_wins_for_same_layer() {
        let (mut doc, card) = setup();
        let rules = vec![
            MappingRule::text("#title", "first"),
            MappingRule::text("#title", "second"),
        ];
        let record = Record::new().with("first", "one").with("second", "two");
        FieldApplier::new(&rules).apply(&mut doc, card, "1", &record).unwrap();
        assert_eq!(
            doc.text(layer(&doc, card, "#title")).unwrap().as_deref(),
            Some("two")
        );
    }

    #[test]
    fn image_rules_surface_requests_for_visible_values() {
        let (mut doc, card) = setup();
        let rules = vec![
            MappingRule::image("#photo", "avatar"),
            MappingRule::image("#background-photo", "avatar"),
        ];
        let record = Record::new().with("avatar", "https://img.example/ada.png");
        let pending = FieldApplier::new(&rules)
            .apply(&mut doc, card, "ada", &record)
            .unwrap();
        assert_eq!(
            pending,
            vec![PendingImage {
                identifier: "ada".into(),
                layer_name: "#photo".into(),
                url: "https://img.example/ada.png".into(),
            }]
        );

        let hidden = Record::new().with("avatar", "");
        let pending = FieldApplier::new(&rules)
            .apply(&mut doc, card, "ada", &hidden)
            .unwrap();
        assert!(pending.is_empty());
        assert!(!doc.node(layer(&doc, card, "#photo")).unwrap().unwrap().visible);
    }

    #[test]
    fn later_rule_hiding_the_layer_cancels_its_image() {
        let (mut doc, card) = setup();
        let rules = vec![
            MappingRule::image("#photo", "avatar"),
            MappingRule::text("#photo", "has_photo"),
        ];
        let record = Record::new()
            .with("avatar", "https://img.example/ada.png")
            .with("has_photo", false);
        let plan = FieldApplier::new(&rules).plan(&doc, card, "ada", &record).unwrap();
        assert!(plan.edits[0].image.is_some());
        assert!(plan.pending_images().is_empty());

        let pending = FieldApplier::new(&rules)
            .apply(&mut doc, card, "ada", &record)
            .unwrap();
        assert!(pending.is_empty());
        assert!(!doc.node(layer(&doc, card, "#photo")).unwrap().unwrap().visible);

        // Shown again by the later rule, the request stands
        let record = record.with("has_photo", true);
        let pending = FieldApplier::new(&rules)
            .apply(&mut doc, card, "ada", &record)
            .unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn plan_lists_fonts_of_text_edits_only() {
        let (doc, card) = setup();
        let rules = vec![
            MappingRule::text("#title", "name"),
            MappingRule::text("#badge", "is_new"),
        ];
        let record = Record::new().with("name", "x").with("is_new", "yes");
        let plan = FieldApplier::new(&rules).plan(&doc, card, "1", &record).unwrap();
        assert_eq!(plan.edits.len(), 2);
        assert_eq!(plan.required_fonts().into_iter().collect::<Vec<_>>(), vec![font()]);
        assert!(!doc.is_font_loaded(&font()));
    }

    #[test]
    fn unavailable_font_fails_the_write() {
        let mut doc = SqliteDocument::open_in_memory().unwrap();
        let page = doc.current_page();
        let card = doc.create_frame(page, "card", card_bounds()).unwrap();
        let missing = cardsync_core::FontName::new("Nope", "Bold");
        doc.create_text(card, "#title", "", &missing, card_bounds()).unwrap();

        let rules = vec![MappingRule::text("#title", "name")];
        let result = FieldApplier::new(&rules).apply(&mut doc, card, "1", &Record::new().with("name", "x"));
        assert!(matches!(
            result,
            Err(EngineError::Document(DocumentError::FontNotLoaded { .. }))
        ));
    }

    #[test]
    fn reapplying_is_idempotent() {
        let (mut doc, card) = setup();
        let rules = vec![
            MappingRule::text("#title", "name"),
            MappingRule::text("#body", "steps"),
            MappingRule::text("#badge", "is_new"),
        ];
        let record = Record::new()
            .with("name", "Ada")
            .with("steps", "1. A\n2. B")
            .with("is_new", 0i64);
        let applier = FieldApplier::new(&rules);
        applier.apply(&mut doc, card, "1", &record).unwrap();
        let first = applier.plan(&doc, card, "1", &record).unwrap();
        applier.apply(&mut doc, card, "1", &record).unwrap();
        let second = applier.plan(&doc, card, "1", &record).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            doc.text(layer(&doc, card, "#body")).unwrap().as_deref(),
            Some("A\nB")
        );
    }
}
