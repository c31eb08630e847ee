//! `chaff` finds bytes shipped in container image layers that the merged filesystem can never
//! reach.
//!
//! # Overview
//!
//! An image is a stack of tarballs merged with union-filesystem semantics. A file written in
//! one layer and deleted or overwritten in a later one still ships with every pull. chaff
//! replays the layers and reports every such entry with its size, along with the share of the
//! image it accounts for.
//!
//! # Architecture
//!
//! - **Overlay engine** ([`overlay`]): pure, synchronous whiteout resolution over a sequence of
//!   layer entries. No I/O.
//! - **OCI** ([`oci`]): image references, a registry client, and the layer archive reader that
//!   feeds the engine.
//! - **Rendering** ([`render`]): the text and JSON reports.
//!
//! # Usage Example
//!
//! ```rust
//! use chaff::overlay::{resolve, LayerEntry};
//!
//! // Oldest layer first.
//! let report = resolve(vec![
//!     vec![LayerEntry::directory("tmp/"), LayerEntry::file("tmp/build.o", 4096)],
//!     vec![LayerEntry::file("tmp/.wh.build.o", 0)],
//! ]);
//!
//! assert_eq!(report.total_chaff_size(), 4096);
//! ```
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Default values
//! - [`oci`] - OCI image handling and distribution
//! - [`overlay`] - The overlay-resolution engine
//! - [`render`] - Report rendering
//! - [`utils`] - Environment and terminal helpers

#![warn(missing_docs)]

mod error;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod cli;
pub mod config;
pub mod oci;
pub mod overlay;
pub mod render;
pub mod utils;

pub use error::*;
