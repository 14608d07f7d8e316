//! Layer model
//!
//! A layer is a directory of a release described by a tree of remote
//! manifests. Layers stack: each may name one base layer it builds on.

pub mod index;
pub mod manifest;
pub mod resolve;

pub use index::{IndexEntry, LayerIndex};
pub use manifest::{Manifest, ManifestError, Payload};
pub use resolve::{LayerResolver, ReleaseLayerResolver, RequiredLayer};
