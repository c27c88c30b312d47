mod loader;
mod model;

pub use loader::{from_json, load_xml, to_json};
pub use model::{Cascade, Stage, StageIter, Weak, WeakIter, WeakRect};
