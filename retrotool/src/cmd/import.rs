use std::path::PathBuf;

use anyhow::{bail, Result};
use argh::FromArgs;
use vasset::{
    importers::{
        import_or_reimport_folder, MeshImportOptions, MeshImporter, TextureImportOptions, TextureImporter,
    },
    registry::Registry,
};

use crate::decode::{GreedyMeshletClusterer, DefaultSceneLoader, StdImageDecoder, UncompressedKtx2Encoder};

#[derive(FromArgs, PartialEq, Debug)]
/// walk a source tree and cook every recognized asset into it
#[argh(subcommand, name = "import")]
pub struct Args {
    #[argh(positional)]
    /// asset root directory
    asset_root: PathBuf,
    #[argh(switch)]
    /// re-cook assets that are already registered
    reimport: bool,
    #[argh(switch)]
    /// skip meshlet generation for imported meshes
    no_meshlets: bool,
    #[argh(option, default = "3")]
    /// zstd level used when saving cooked meshes
    zstd: i32,
}

pub fn run(args: Args) -> Result<()> {
    if !args.asset_root.is_dir() {
        bail!("asset root '{}' is not a directory", args.asset_root.display());
    }

    let mut registry = Registry::new();
    registry.set_asset_root(&args.asset_root);

    let decoder = StdImageDecoder;
    let encoder = UncompressedKtx2Encoder;
    let texture_importer = TextureImporter::new(&decoder, &encoder, TextureImportOptions::default());

    let scene_loader = DefaultSceneLoader;
    let clusterer = GreedyMeshletClusterer;
    let mesh_texture_importer = TextureImporter::new(&decoder, &encoder, TextureImportOptions::default());
    let mesh_importer = MeshImporter::new(
        &scene_loader,
        &clusterer,
        mesh_texture_importer,
        MeshImportOptions { generate_meshlets: !args.no_meshlets, zstd_level: args.zstd },
    );

    let all_ok =
        import_or_reimport_folder(&args.asset_root, args.reimport, &mut registry, &texture_importer, &mesh_importer);

    let registry_path = args.asset_root.join("imported").join("asset_registry.vreg");
    registry.save(&registry_path)?;
    registry.cleanup();

    log::info!("imported {} asset(s) into {}", registry.len(), registry_path.display());

    if !all_ok {
        bail!("one or more assets failed to import; see above for details");
    }
    Ok(())
}
