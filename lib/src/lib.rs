//! Asset cooking, registry and package format core for the vasset pipeline.
//!
//! This crate owns the cooked data formats (`VTEXTURE`, `VMATERIAL`,
//! `VMESH`), the asset registry that maps stable ids to cooked paths, the
//! source-to-cooked importers, and the `PKG` package format plus the two
//! filesystem views layered over it. It never installs a logger; callers own
//! that (see the `retrotool` CLI crate).

pub mod binformat;
pub mod error;
pub mod fs;
pub mod id;
pub mod importers;
pub mod material;
pub mod math;
pub mod mesh;
pub mod pkg;
pub mod registry;
pub mod texture;
pub mod vimport;

pub use error::{AssetError, AssetResult};
pub use id::Id;
