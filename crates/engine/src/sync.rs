use std::collections::HashSet;

use cardsync_core::{MappingRule, NodeId, Record};
use cardsync_document::DocumentHost;
use serde::Serialize;

use crate::apply::{FieldApplier, PendingImage};
use crate::config::SyncConfig;
use crate::error::EngineError;
use crate::index::IdentityIndex;
use crate::layout::{GridPlacer, next_insertion_origin};
use crate::resolver::{Template, instantiate, resolve_template};

/// Receives a tick after every record (or selected card) is processed.
pub trait Progress {
    fn on_record(&mut self, done: usize, total: usize);
}

/// Progress sink that ignores every tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn on_record(&mut self, _done: usize, _total: usize) {}
}

impl<F: FnMut(usize, usize)> Progress for F {
    fn on_record(&mut self, done: usize, total: usize) {
        self(done, total)
    }
}

#[derive(Debug, Clone)]
pub struct SyncRequest<'a> {
    pub template: NodeId,
    /// Lineage reported by an earlier `resolve_layers`; resolved again from
    /// the template when absent.
    pub lineage_id: Option<NodeId>,
    pub records: &'a [Record],
    pub rules: &'a [MappingRule],
    pub identifier_field: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncOutcome {
    pub created: usize,
    /// One per card touched, so an identifier shared by N cards counts N.
    pub updated: usize,
    /// Created and updated cards, each once, in the order first touched.
    pub touched: Vec<NodeId>,
    pub pending_images: Vec<PendingImage>,
}

impl SyncOutcome {
    fn touch(&mut self, seen: &mut HashSet<NodeId>, card: NodeId) {
        if seen.insert(card) {
            self.touched.push(card);
        }
    }
}

pub(crate) fn validate_batch(
    records: &[Record],
    rules: &[MappingRule],
    identifier_field: &str,
) -> Result<(), EngineError> {
    if records.is_empty() {
        return Err(EngineError::InvalidInput("no records to sync".into()));
    }
    if rules.is_empty() {
        return Err(EngineError::InvalidInput("no mapping rules given".into()));
    }
    if identifier_field.trim().is_empty() {
        return Err(EngineError::InvalidInput("identifier field is missing".into()));
    }
    Ok(())
}

/// State carried across the records of one pass.
struct Pass<'a> {
    config: &'a SyncConfig,
    template: Template,
    lineage: String,
    index: IdentityIndex,
    grid: GridPlacer,
    applier: FieldApplier<'a>,
    outcome: SyncOutcome,
    seen: HashSet<NodeId>,
}

impl Pass<'_> {
    fn upsert<H: DocumentHost + ?Sized>(
        &mut self,
        host: &mut H,
        identifier: &str,
        keyed: bool,
        record: &Record,
    ) -> Result<(), EngineError> {
        let existing = if keyed {
            self.index.get(identifier).to_vec()
        } else {
            Vec::new()
        };

        if existing.is_empty() {
            let card = self.insert(host, identifier)?;
            let pending = self.applier.apply(host, card, identifier, record)?;
            self.outcome.created += 1;
            self.outcome.pending_images.extend(pending);
            self.outcome.touch(&mut self.seen, card);
            tracing::debug!("created card {card} for {identifier}");
            return Ok(());
        }

        for card in existing {
            let pending = self.applier.apply(host, card, identifier, record)?;
            self.outcome.updated += 1;
            self.outcome.pending_images.extend(pending);
            self.outcome.touch(&mut self.seen, card);
        }
        tracing::debug!("updated cards for {identifier}");
        Ok(())
    }

    fn insert<H: DocumentHost + ?Sized>(
        &mut self,
        host: &mut H,
        identifier: &str,
    ) -> Result<NodeId, EngineError> {
        let card = instantiate(host, &self.template)?;
        host.append_to_root(card)?;
        let (x, y) = self.grid.next_position();
        host.set_position(card, x, y)?;
        host.set_tag(card, &self.config.identifier_tag, identifier)?;
        host.set_tag(card, &self.config.lineage_tag, &self.lineage)?;
        self.index.insert(identifier.to_string(), card);
        Ok(card)
    }
}

/// One full upsert pass: every record either updates the cards already
/// tagged with its identifier, leaving their geometry alone, or produces a
/// new card placed in a grid below existing content.
///
/// Records run strictly in order. The first failing record aborts the pass;
/// changes made for earlier records stay in place.
pub fn run_sync<H: DocumentHost + ?Sized, P: Progress + ?Sized>(
    host: &mut H,
    config: &SyncConfig,
    request: &SyncRequest<'_>,
    progress: &mut P,
) -> Result<SyncOutcome, EngineError> {
    validate_batch(request.records, request.rules, request.identifier_field)?;
    let template = resolve_template(host, request.template)?;
    let lineage = request.lineage_id.unwrap_or(template.lineage_id).to_string();
    let index = IdentityIndex::build(host, &config.identifier_tag)?;
    let origin = next_insertion_origin(host, config.gap)?;
    let grid = GridPlacer::new(origin, template.card_size, config.columns, config.gap);

    let mut pass = Pass {
        config,
        template,
        lineage,
        index,
        grid,
        applier: FieldApplier::new(request.rules),
        outcome: SyncOutcome::default(),
        seen: HashSet::new(),
    };

    let total = request.records.len();
    for (i, record) in request.records.iter().enumerate() {
        let identifier = record.identifier(request.identifier_field, i);
        let keyed = record.has_identifier(request.identifier_field);
        pass.upsert(host, &identifier, keyed, record)
            .map_err(|e| EngineError::RecordFailed {
                index: i,
                identifier: identifier.clone(),
                source: Box::new(e),
            })?;
        progress.on_record(i + 1, total);
    }

    let outcome = pass.outcome;
    if !outcome.touched.is_empty() {
        host.scroll_into_view(&outcome.touched)?;
    }
    tracing::info!(
        "sync finished: {} created, {} updated, {} images pending",
        outcome.created,
        outcome.updated,
        outcome.pending_images.len()
    );
    Ok(outcome)
}

/// Tagged cards within the selection: a tagged node stands for itself,
/// an untagged one is searched for tagged descendants.
pub(crate) fn tagged_in_selection<H: DocumentHost + ?Sized>(
    host: &H,
    selection: &[NodeId],
    tag: &str,
) -> Result<Vec<(NodeId, String)>, EngineError> {
    let mut found = Vec::new();
    let mut seen = HashSet::new();
    let mut stack: Vec<NodeId> = selection.iter().rev().copied().collect();
    while let Some(node_id) = stack.pop() {
        match host.get_tag(node_id, tag)? {
            Some(identifier) if !identifier.is_empty() => {
                if seen.insert(node_id) {
                    found.push((node_id, identifier));
                }
            }
            _ => {
                let mut children = host.children(node_id)?;
                children.reverse();
                stack.extend(children);
            }
        }
    }
    Ok(found)
}

/// Last record carrying `identifier`, with its position in the batch.
/// Records without an identifier of their own never match, so a card
/// tagged with a `row-N` placeholder is not claimed by whatever record
/// happens to sit at position N.
fn matching_record<'r>(
    records: &'r [Record],
    identifier_field: &str,
    identifier: &str,
) -> Option<(usize, &'r Record)> {
    records.iter().enumerate().rev().find(|(index, r)| {
        r.has_identifier(identifier_field) && r.identifier(identifier_field, *index) == identifier
    })
}

/// Re-applies records to the selected cards only. Never creates cards;
/// cards whose identifier has no record are left alone.
pub fn run_sync_selected<H: DocumentHost + ?Sized, P: Progress + ?Sized>(
    host: &mut H,
    config: &SyncConfig,
    rules: &[MappingRule],
    identifier_field: &str,
    records: &[Record],
    progress: &mut P,
) -> Result<SyncOutcome, EngineError> {
    validate_batch(records, rules, identifier_field)?;
    let selection = host.selection()?;
    if selection.is_empty() {
        return Err(EngineError::EmptySelection);
    }

    let cards = tagged_in_selection(host, &selection, &config.identifier_tag)?;
    let applier = FieldApplier::new(rules);
    let mut outcome = SyncOutcome::default();
    let mut seen = HashSet::new();

    let total = cards.len();
    for (i, (card, identifier)) in cards.iter().enumerate() {
        match matching_record(records, identifier_field, identifier) {
            Some((index, record)) => {
                let pending = applier
                    .apply(host, *card, identifier, record)
                    .map_err(|e| EngineError::RecordFailed {
                        index,
                        identifier: identifier.clone(),
                        source: Box::new(e),
                    })?;
                outcome.updated += 1;
                outcome.pending_images.extend(pending);
                outcome.touch(&mut seen, *card);
            }
            None => tracing::debug!("no record for selected card {card} ({identifier})"),
        }
        progress.on_record(i + 1, total);
    }

    if !outcome.touched.is_empty() {
        host.scroll_into_view(&outcome.touched)?;
    }
    tracing::info!("selection sync finished: {} updated", outcome.updated);
    Ok(outcome)
}
