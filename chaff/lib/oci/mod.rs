//! OCI image access: references, registry clients, and layer archives.

mod analyze;
pub mod distribution;
mod layer;
mod reference;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use analyze::*;
pub use layer::{LayerArchive, LayerBlob, LayerCompression, LayerDescriptor};
pub use reference::*;
