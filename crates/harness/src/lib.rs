mod canvas;

pub use canvas::{CARD_HEIGHT, CARD_WIDTH, TestCanvas, body_font, init_tracing, person, title_font};
