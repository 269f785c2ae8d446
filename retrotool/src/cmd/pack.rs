use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use argh::FromArgs;
use vasset::{
    pkg::{write_pkg, WriteItem},
    vimport::load_vimport,
};
use walkdir::WalkDir;

#[derive(FromArgs, PartialEq, Debug)]
/// scan an asset root's import descriptors and write a PKG package
#[argh(subcommand, name = "pack")]
pub struct Args {
    #[argh(positional)]
    /// asset root directory
    asset_root: PathBuf,
    #[argh(positional)]
    /// output .pkg path
    output: PathBuf,
    #[argh(option, default = "3")]
    /// zstd level used for compressible entries
    zstd: i32,
}

pub fn run(args: Args) -> Result<()> {
    if !args.asset_root.is_dir() {
        bail!("asset root '{}' is not a directory", args.asset_root.display());
    }

    let mut sources = Vec::new();
    let mut all_ok = true;
    for entry in WalkDir::new(&args.asset_root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some("vimport") {
            continue;
        }
        match load_vimport(entry.path()) {
            Ok(desc) => sources.push(desc),
            Err(e) => {
                log::error!("failed to read import descriptor {}: {e}", entry.path().display());
                all_ok = false;
            }
        }
    }

    let mut bytes_by_source = Vec::with_capacity(sources.len());
    for desc in &sources {
        let output_path = args.asset_root.join(&desc.output);
        match fs::read(&output_path) {
            Ok(bytes) => bytes_by_source.push(bytes),
            Err(e) => {
                log::error!("failed to read cooked output '{}': {e}", output_path.display());
                all_ok = false;
                bytes_by_source.push(Vec::new());
            }
        }
    }

    let items: Vec<WriteItem> = sources
        .iter()
        .zip(&bytes_by_source)
        .map(|(desc, bytes)| WriteItem { logical_path: desc.source.clone(), bytes, allow_compress: true })
        .collect();

    write_pkg(&args.output, &items, args.zstd)
        .with_context(|| format!("failed to write package '{}'", args.output.display()))?;

    log::info!("wrote {} file(s) to {}", items.len(), args.output.display());

    if !all_ok {
        bail!("one or more sources failed while packaging; package may be incomplete");
    }
    Ok(())
}
