//! Data model for the import engine

pub mod entity;
pub mod staged;
pub mod timing;
pub mod tree;
pub mod value;

pub use entity::EntityType;
pub use staged::{Binding, StagedEntity};
pub use timing::Timing;
pub use tree::{LapSpec, RecordTree, RelayLegSpec, ResultLine, SectionSpec, SessionSpec};
pub use value::{Row, Value};
