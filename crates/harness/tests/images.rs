use cardsync_core::ImageHash;
use cardsync_document::DocumentHost;
use cardsync_engine::PendingImage;
use cardsync_harness::{TestCanvas, person};

const AVATAR_URL: &str = "https://example.com/ada.png";
const PNG: &[u8] = b"\x89PNG\r\n\x1a\nnot really a png";

// ============================================================================
// Pending images (2 tests)
// ============================================================================

#[test]
fn sync_reports_images_to_fetch() -> Result<(), Box<dyn std::error::Error>> {
    let mut canvas = TestCanvas::new()?;
    let outcome = canvas.sync(&[
        person("1", "Ada").with("avatar", AVATAR_URL),
        person("2", "Grace"),
        person("3", "Edsger").with("avatar", ""),
    ])?;

    assert_eq!(
        outcome.pending_images,
        vec![PendingImage {
            identifier: "1".into(),
            layer_name: "#avatar".into(),
            url: AVATAR_URL.into(),
        }]
    );
    let edsger = canvas.cards_for("3")?[0];
    assert!(!canvas.is_visible(edsger, "#avatar")?);
    Ok(())
}

#[test]
fn every_duplicate_card_asks_for_its_image() -> Result<(), Box<dyn std::error::Error>> {
    let mut canvas = TestCanvas::new()?;
    canvas.sync(&[person("1", "Ada")])?;
    let original = canvas.cards_for("1")?[0];
    canvas.doc_mut().clone_node(original)?;

    let outcome = canvas.sync(&[person("1", "Ada").with("avatar", AVATAR_URL)])?;
    assert_eq!(outcome.pending_images.len(), 2);
    Ok(())
}

// ============================================================================
// Delivery & cache (4 tests)
// ============================================================================

#[test]
fn set_image_fills_every_card_and_caches_the_url() -> Result<(), Box<dyn std::error::Error>> {
    let mut canvas = TestCanvas::new()?;
    canvas.sync(&[person("1", "Ada").with("avatar", AVATAR_URL)])?;
    let original = canvas.cards_for("1")?[0];
    let copy = canvas.doc_mut().clone_node(original)?;

    let filled = canvas.engine.set_image("1", "#avatar", PNG, Some(AVATAR_URL))?;
    assert_eq!(filled, 2);

    let hash = ImageHash::digest(PNG);
    for card in [original, copy] {
        let avatar = canvas.layer(card, "#avatar")?;
        assert_eq!(canvas.doc().image_fill(avatar)?, Some(hash));
    }
    assert_eq!(canvas.doc().image_bytes(hash)?.as_deref(), Some(PNG));
    assert_eq!(canvas.doc().image_count()?, 1);

    let urls = canvas.engine.get_image_urls(&["1".to_string()])?;
    assert_eq!(urls["1"]["#avatar"], AVATAR_URL);
    Ok(())
}

#[test]
fn images_for_unknown_identifiers_are_dropped() -> Result<(), Box<dyn std::error::Error>> {
    let mut canvas = TestCanvas::new()?;
    canvas.sync(&[person("1", "Ada")])?;

    let filled = canvas.engine.set_image("ghost", "#avatar", PNG, Some(AVATAR_URL))?;
    assert_eq!(filled, 0);
    assert_eq!(canvas.doc().image_count()?, 0);

    let urls = canvas
        .engine
        .get_image_urls(&["1".to_string(), "ghost".to_string()])?;
    assert!(urls["1"].is_empty());
    assert!(!urls.contains_key("ghost"));
    Ok(())
}

#[test]
fn url_cache_merges_per_layer() -> Result<(), Box<dyn std::error::Error>> {
    let mut canvas = TestCanvas::new()?;
    canvas.sync(&[person("1", "Ada")])?;

    canvas.engine.set_image("1", "#avatar", PNG, Some("https://example.com/a.png"))?;
    canvas.engine.set_image("1", "background", PNG, Some("https://example.com/bg.png"))?;
    canvas.engine.set_image("1", "#avatar", PNG, Some("https://example.com/b.png"))?;
    // No URL leaves the cache alone
    canvas.engine.set_image("1", "#avatar", PNG, None)?;

    let urls = canvas.engine.get_image_urls(&["1".to_string()])?;
    let cached = &urls["1"];
    assert_eq!(cached.len(), 2);
    assert_eq!(cached["#avatar"], "https://example.com/b.png");
    assert_eq!(cached["background"], "https://example.com/bg.png");
    Ok(())
}

#[test]
fn corrupt_url_cache_reads_as_empty() -> Result<(), Box<dyn std::error::Error>> {
    let mut canvas = TestCanvas::new()?;
    canvas.sync(&[person("1", "Ada")])?;
    let card = canvas.cards_for("1")?[0];
    let tag = canvas.engine.config().image_urls_tag.clone();
    canvas.doc_mut().set_tag(card, &tag, "{not json")?;

    let urls = canvas.engine.get_image_urls(&["1".to_string()])?;
    assert!(urls["1"].is_empty());

    // The next delivery replaces the damaged value
    canvas.engine.set_image("1", "#avatar", PNG, Some(AVATAR_URL))?;
    let urls = canvas.engine.get_image_urls(&["1".to_string()])?;
    assert_eq!(urls["1"].len(), 1);
    Ok(())
}
