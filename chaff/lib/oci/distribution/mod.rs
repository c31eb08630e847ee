//! Clients for the OCI distribution API.

mod docker;
mod traits;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use docker::*;
pub use traits::*;
