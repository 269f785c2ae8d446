use std::io;

/// Closed error taxonomy for the asset/package layer.
///
/// Library code always returns this concrete type rather than a boxed or
/// type-erased error; callers that need to compose with `anyhow` (the CLI
/// boundary) can rely on the `std::error::Error` impl from `thiserror`.
#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    #[error("invalid import file: {0}")]
    InvalidImportFile(String),
    #[error("unknown importer for '{0}'")]
    UnknownImporter(String),
    #[error("import failed: {0}")]
    ImportFailed(String),
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
    #[error("not supported: {0}")]
    NotSupported(String),
    #[error("out of memory")]
    OutOfMemory,
}

pub type AssetResult<T> = Result<T, AssetError>;
