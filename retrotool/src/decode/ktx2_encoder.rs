//! Minimal KTX2 container writer used as the `TextureEncoder` for the
//! `Ktx2` import target.
//!
//! BasisU supercompression is the external encoder the spec abstracts away;
//! this writes a single, uncompressed mip level in `VK_FORMAT_R8G8B8A8_UNORM`
//! (or `R32G32B32A32_SFLOAT` for HDR sources) so the container is a valid,
//! loadable KTX2 file even without that encoder linked in.

use vasset::{
    error::AssetResult,
    importers::{DecodedImage, TextureEncoder, TextureImportOptions},
};

const KTX2_IDENTIFIER: [u8; 12] =
    [0xAB, b'K', b'T', b'X', b' ', b'2', b'0', 0xBB, b'\r', b'\n', 0x1A, b'\n'];
const VK_FORMAT_R8G8B8A8_UNORM: u32 = 37;
const VK_FORMAT_R32G32B32A32_SFLOAT: u32 = 109;

pub struct UncompressedKtx2Encoder;

impl TextureEncoder for UncompressedKtx2Encoder {
    fn encode_ktx2(&self, image: &DecodedImage, _options: &TextureImportOptions) -> AssetResult<Vec<u8>> {
        let (vk_format, type_size, pixel_bytes) = if image.is_hdr {
            (VK_FORMAT_R32G32B32A32_SFLOAT, 4u32, image.pixels.clone())
        } else {
            (VK_FORMAT_R8G8B8A8_UNORM, 1u32, image.pixels.clone())
        };

        // Fixed header: 12-byte identifier + 9 little-endian u32 fields.
        const HEADER_SIZE: u64 = 12 + 4 * 9;
        // Index: 4 u32 (dfd/kvd offset+length) + 2 u64 (sgd offset+length) +
        // one level-index entry (3 u64).
        const INDEX_SIZE: u64 = 4 * 4 + 2 * 8 + 3 * 8;
        const DATA_OFFSET: u64 = HEADER_SIZE + INDEX_SIZE;

        let mut out = Vec::with_capacity(DATA_OFFSET as usize + pixel_bytes.len());

        out.extend_from_slice(&KTX2_IDENTIFIER);
        out.extend_from_slice(&vk_format.to_le_bytes());
        out.extend_from_slice(&type_size.to_le_bytes());
        out.extend_from_slice(&image.width.to_le_bytes());
        out.extend_from_slice(&image.height.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // pixelDepth
        out.extend_from_slice(&0u32.to_le_bytes()); // layerCount
        out.extend_from_slice(&1u32.to_le_bytes()); // faceCount
        out.extend_from_slice(&1u32.to_le_bytes()); // levelCount
        out.extend_from_slice(&0u32.to_le_bytes()); // supercompressionScheme: none

        out.extend_from_slice(&0u32.to_le_bytes()); // dfdByteOffset
        out.extend_from_slice(&0u32.to_le_bytes()); // dfdByteLength
        out.extend_from_slice(&0u32.to_le_bytes()); // kvdByteOffset
        out.extend_from_slice(&0u32.to_le_bytes()); // kvdByteLength
        out.extend_from_slice(&0u64.to_le_bytes()); // sgdByteOffset
        out.extend_from_slice(&0u64.to_le_bytes()); // sgdByteLength

        out.extend_from_slice(&DATA_OFFSET.to_le_bytes()); // byteOffset
        out.extend_from_slice(&(pixel_bytes.len() as u64).to_le_bytes()); // byteLength
        out.extend_from_slice(&(pixel_bytes.len() as u64).to_le_bytes()); // uncompressedByteLength

        debug_assert_eq!(out.len() as u64, DATA_OFFSET);
        out.extend_from_slice(&pixel_bytes);
        Ok(out)
    }
}
