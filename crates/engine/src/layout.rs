use cardsync_core::Bounds;
use cardsync_document::DocumentHost;

use crate::error::EngineError;

/// Top edge of the free band below all top-level content: the lowest bottom
/// edge plus two gaps, or zero on an empty page.
pub fn next_insertion_origin<H: DocumentHost + ?Sized>(host: &H, gap: f64) -> Result<f64, EngineError> {
    let mut lowest: Option<f64> = None;
    for node_id in host.root_children()? {
        let Some(record) = host.node(node_id)? else {
            continue;
        };
        let bottom = record.bounds.bottom();
        lowest = Some(lowest.map_or(bottom, |l| l.max(bottom)));
    }
    Ok(lowest.map_or(0.0, |l| l + 2.0 * gap))
}

/// Hands out grid cells for cards created during one pass, row by row.
#[derive(Debug, Clone)]
pub struct GridPlacer {
    origin_y: f64,
    cell_width: f64,
    cell_height: f64,
    columns: usize,
    gap: f64,
    placed: usize,
}

impl GridPlacer {
    pub fn new(origin_y: f64, card_size: Bounds, columns: usize, gap: f64) -> Self {
        Self {
            origin_y,
            cell_width: card_size.width,
            cell_height: card_size.height,
            columns: columns.max(1),
            gap,
            placed: 0,
        }
    }

    /// Position of the next card, advancing the counter.
    pub fn next_position(&mut self) -> (f64, f64) {
        let column = self.placed % self.columns;
        let row = self.placed / self.columns;
        self.placed += 1;
        (
            column as f64 * (self.cell_width + self.gap),
            self.origin_y + row as f64 * (self.cell_height + self.gap),
        )
    }

    pub fn placed(&self) -> usize {
        self.placed
    }
}
