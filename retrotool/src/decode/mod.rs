//! Concrete collaborator implementations for the `vasset` import traits.
//!
//! `vasset` specifies `ImageDecoder`, `TextureEncoder`, `SceneLoader` and
//! `MeshletClusterer` as external capabilities it only consumes through
//! trait objects. This binary owns the one real implementation of each so
//! the library crate itself never links against an image or scene-graph
//! library.

pub mod image_decoder;
pub mod ktx2_encoder;
pub mod meshlet_clusterer;
pub mod scene_loader;

pub use image_decoder::StdImageDecoder;
pub use ktx2_encoder::UncompressedKtx2Encoder;
pub use meshlet_clusterer::GreedyMeshletClusterer;
pub use scene_loader::DefaultSceneLoader;
