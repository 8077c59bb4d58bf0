pub mod error;
pub mod field_value;
pub mod ids;
pub mod mapping;
pub mod node;
pub mod record;

pub use error::CoreError;
pub use field_value::FieldValue;
pub use ids::*;
pub use mapping::{FieldKind, LayerKindHint, MappableLayer, MappingRule};
pub use node::{Bounds, FontName, ListStyle, NodeKind};
pub use record::Record;
