use cardsync_core::{Bounds, FontName, NodeId};
use cardsync_document::{DocumentError, SqliteDocument};

pub(crate) struct CardFixture {
    pub component: NodeId,
}

pub(crate) fn font() -> FontName {
    FontName::new("Inter", "Regular")
}

pub(crate) fn card_bounds() -> Bounds {
    Bounds::new(0.0, 0.0, 240.0, 160.0)
}

/// A "Card" component on its own page:
/// background, #title, #body, #badge { #badge-label }, #photo.
pub(crate) fn card_component(doc: &mut SqliteDocument) -> Result<CardFixture, DocumentError> {
    doc.register_font(&font())?;
    let library = doc.create_page("Library")?;
    let component = doc.create_component(library, "Card", card_bounds())?;
    doc.create_rectangle(component, "background", card_bounds())?;
    doc.create_text(component, "#title", "Title", &font(), Bounds::new(16.0, 16.0, 208.0, 24.0))?;
    doc.create_text(component, "#body", "Body", &font(), Bounds::new(16.0, 48.0, 208.0, 64.0))?;
    let badge = doc.create_frame(component, "#badge", Bounds::new(16.0, 120.0, 80.0, 24.0))?;
    doc.create_text(badge, "#badge-label", "New", &font(), Bounds::new(4.0, 4.0, 72.0, 16.0))?;
    doc.create_rectangle(component, "#photo", Bounds::new(160.0, 16.0, 64.0, 64.0))?;
    Ok(CardFixture { component })
}
