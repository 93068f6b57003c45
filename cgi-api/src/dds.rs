use crate::{
    CgiError, CgiFormat, CgiResult, CgiTextureDef, CgiTextureUsage, MAX_TEXTURE_ARRAY_SIZE,
    MAX_TEXTURE_EXTENT,
};
use bytemuck::{Pod, Zeroable};

const DDS_MAGIC: u32 = 0x2053_4444;
const DDS_HEADER_SIZE: u32 = 124;
const DDS_PIXEL_FORMAT_SIZE: u32 = 32;

const DDSD_MIPMAPCOUNT: u32 = 0x2_0000;
const DDPF_FOURCC: u32 = 0x4;
const DDPF_RGB: u32 = 0x40;
const DDPF_LUMINANCE: u32 = 0x2_0000;
const DDSCAPS2_CUBEMAP: u32 = 0x200;
const DDSCAPS2_VOLUME: u32 = 0x20_0000;
const DDS_RESOURCE_MISC_TEXTURECUBE: u32 = 0x4;
const DDS_DIMENSION_TEXTURE2D: u32 = 3;

const fn four_cc(code: &[u8; 4]) -> u32 {
    (code[0] as u32) | (code[1] as u32) << 8 | (code[2] as u32) << 16 | (code[3] as u32) << 24
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub(crate) struct DdsPixelFormat {
    pub size: u32,
    pub flags: u32,
    pub four_cc: u32,
    pub rgb_bit_count: u32,
    pub r_bit_mask: u32,
    pub g_bit_mask: u32,
    pub b_bit_mask: u32,
    pub a_bit_mask: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub(crate) struct DdsHeader {
    pub size: u32,
    pub flags: u32,
    pub height: u32,
    pub width: u32,
    pub pitch_or_linear_size: u32,
    pub depth: u32,
    pub mip_map_count: u32,
    pub reserved1: [u32; 11],
    pub pixel_format: DdsPixelFormat,
    pub caps: u32,
    pub caps2: u32,
    pub caps3: u32,
    pub caps4: u32,
    /// Recommended number of top mips to skip, written by the asset pipeline
    pub reserved2: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub(crate) struct DdsHeaderDxt10 {
    pub dxgi_format: u32,
    pub resource_dimension: u32,
    pub misc_flag: u32,
    pub array_size: u32,
    pub misc_flags2: u32,
}

fn read_pod<T: Pod>(
    bytes: &[u8],
    offset: usize,
) -> CgiResult<T> {
    let size = std::mem::size_of::<T>();
    let end = offset + size;
    if bytes.len() < end {
        return Err(CgiError::ContentError(format!(
            "DDS file is truncated, expected at least {} bytes but it has {}",
            end,
            bytes.len()
        )));
    }

    let mut value = T::zeroed();
    bytemuck::bytes_of_mut(&mut value).copy_from_slice(&bytes[offset..end]);
    Ok(value)
}

fn format_from_dxgi(dxgi_format: u32) -> Option<CgiFormat> {
    Some(match dxgi_format {
        2 => CgiFormat::R32G32B32A32Sfloat,
        10 => CgiFormat::R16G16B16A16Sfloat,
        28 => CgiFormat::R8G8B8A8Unorm,
        29 => CgiFormat::R8G8B8A8Srgb,
        61 => CgiFormat::R8Unorm,
        71 => CgiFormat::Bc1Unorm,
        72 => CgiFormat::Bc1Srgb,
        74 => CgiFormat::Bc2Unorm,
        75 => CgiFormat::Bc2Srgb,
        77 => CgiFormat::Bc3Unorm,
        78 => CgiFormat::Bc3Srgb,
        80 => CgiFormat::Bc4Unorm,
        83 => CgiFormat::Bc5Unorm,
        87 => CgiFormat::B8G8R8A8Unorm,
        91 => CgiFormat::B8G8R8A8Srgb,
        98 => CgiFormat::Bc7Unorm,
        99 => CgiFormat::Bc7Srgb,
        _ => return None,
    })
}

fn format_from_pixel_format(pixel_format: &DdsPixelFormat) -> Option<CgiFormat> {
    if pixel_format.flags & DDPF_FOURCC != 0 {
        let code = pixel_format.four_cc;
        return Some(if code == four_cc(b"DXT1") {
            CgiFormat::Bc1Unorm
        } else if code == four_cc(b"DXT2") || code == four_cc(b"DXT3") {
            CgiFormat::Bc2Unorm
        } else if code == four_cc(b"DXT4") || code == four_cc(b"DXT5") {
            CgiFormat::Bc3Unorm
        } else if code == four_cc(b"ATI1") || code == four_cc(b"BC4U") {
            CgiFormat::Bc4Unorm
        } else if code == four_cc(b"ATI2") || code == four_cc(b"BC5U") {
            CgiFormat::Bc5Unorm
        } else if code == 113 {
            // D3DFMT_A16B16G16R16F
            CgiFormat::R16G16B16A16Sfloat
        } else if code == 116 {
            // D3DFMT_A32B32G32R32F
            CgiFormat::R32G32B32A32Sfloat
        } else {
            return None;
        });
    }

    let masks = (
        pixel_format.r_bit_mask,
        pixel_format.g_bit_mask,
        pixel_format.b_bit_mask,
        pixel_format.a_bit_mask,
    );
    if pixel_format.flags & DDPF_RGB != 0 && pixel_format.rgb_bit_count == 32 {
        return match masks {
            (0xff, 0xff00, 0xff_0000, 0xff00_0000) => Some(CgiFormat::R8G8B8A8Unorm),
            (0xff_0000, 0xff00, 0xff, 0xff00_0000) => Some(CgiFormat::B8G8R8A8Unorm),
            _ => None,
        };
    }

    if pixel_format.flags & DDPF_LUMINANCE != 0 && pixel_format.rgb_bit_count == 8 {
        return Some(CgiFormat::R8Unorm);
    }

    None
}

#[derive(Clone, Debug, PartialEq)]
pub struct CgiDdsMipLevel {
    pub width: u32,
    pub height: u32,
    pub row_pitch: u32,
    pub data: Vec<u8>,
}

/// Contents of a DDS file, after skipping the mips removed by the LOD bias
#[derive(Clone, Debug, PartialEq)]
pub struct CgiDdsImage {
    pub format: CgiFormat,
    pub width: u32,
    pub height: u32,
    pub is_cube_map: bool,
    /// Number of top mips that were skipped
    pub skipped_mips: u32,
    /// `layers[array_layer][mip_level]`
    pub layers: Vec<Vec<CgiDdsMipLevel>>,
}

impl CgiDdsImage {
    pub fn mip_count(&self) -> u32 {
        self.layers.first().map(|mips| mips.len() as u32).unwrap_or(0)
    }

    pub fn array_layers(&self) -> u32 {
        self.layers.len() as u32
    }

    /// A texture definition able to hold this image
    pub fn texture_def(
        &self,
        name: &str,
    ) -> CgiTextureDef {
        let mut usage = CgiTextureUsage::SAMPLED;
        if self.is_cube_map {
            usage |= CgiTextureUsage::CUBE_MAP;
        }

        CgiTextureDef {
            name: name.to_string(),
            format: self.format,
            width: self.width,
            height: self.height,
            mip_count: self.mip_count(),
            array_layers: self.array_layers(),
            usage,
            ..Default::default()
        }
    }
}

/// Parse a DDS file.
///
/// `lod_bias` is the number of top mips the caller wants skipped (texture quality setting). It is
/// added to the bias stored in the header's `reserved2` field. At least one mip is always kept.
pub fn load_dds(
    bytes: &[u8],
    lod_bias: u32,
) -> CgiResult<CgiDdsImage> {
    profiling::scope!("load_dds");

    let magic: u32 = read_pod(bytes, 0)?;
    if magic != DDS_MAGIC {
        return Err(CgiError::ContentError(
            "not a DDS file, magic number does not match".to_string(),
        ));
    }

    let header: DdsHeader = read_pod(bytes, 4)?;
    if header.size != DDS_HEADER_SIZE || header.pixel_format.size != DDS_PIXEL_FORMAT_SIZE {
        return Err(CgiError::ContentError(format!(
            "DDS header has size {} and pixel format size {}, expected {} and {}",
            header.size, header.pixel_format.size, DDS_HEADER_SIZE, DDS_PIXEL_FORMAT_SIZE
        )));
    }
    if header.width == 0 || header.height == 0 {
        return Err(CgiError::ContentError("DDS image has a zero extent".to_string()));
    }
    if header.width > MAX_TEXTURE_EXTENT || header.height > MAX_TEXTURE_EXTENT {
        return Err(CgiError::ContentError(format!(
            "DDS image of {}x{} exceeds the {} texel limit",
            header.width, header.height, MAX_TEXTURE_EXTENT
        )));
    }
    if header.caps2 & DDSCAPS2_VOLUME != 0 && header.depth > 1 {
        return Err(CgiError::ContentError(
            "volume DDS textures are not supported".to_string(),
        ));
    }

    let mut data_offset = 4 + std::mem::size_of::<DdsHeader>();
    let mut is_cube_map = header.caps2 & DDSCAPS2_CUBEMAP != 0;
    let mut array_layers = if is_cube_map { 6 } else { 1 };

    let format = if header.pixel_format.flags & DDPF_FOURCC != 0
        && header.pixel_format.four_cc == four_cc(b"DX10")
    {
        let dxt10: DdsHeaderDxt10 = read_pod(bytes, data_offset)?;
        data_offset += std::mem::size_of::<DdsHeaderDxt10>();

        if dxt10.resource_dimension != DDS_DIMENSION_TEXTURE2D {
            return Err(CgiError::ContentError(format!(
                "DDS resource dimension {} is not supported, only 2D textures",
                dxt10.resource_dimension
            )));
        }

        if dxt10.array_size > MAX_TEXTURE_ARRAY_SIZE {
            return Err(CgiError::ContentError(format!(
                "DDS array size {} exceeds the limit of {}",
                dxt10.array_size, MAX_TEXTURE_ARRAY_SIZE
            )));
        }

        is_cube_map = dxt10.misc_flag & DDS_RESOURCE_MISC_TEXTURECUBE != 0;
        array_layers = dxt10.array_size.max(1) * if is_cube_map { 6 } else { 1 };

        format_from_dxgi(dxt10.dxgi_format).ok_or_else(|| {
            CgiError::ContentError(format!(
                "DXGI format {} is not supported",
                dxt10.dxgi_format
            ))
        })?
    } else {
        format_from_pixel_format(&header.pixel_format).ok_or_else(|| {
            CgiError::ContentError(format!(
                "DDS pixel format {:?} is not supported",
                header.pixel_format
            ))
        })?
    };

    let mip_count = if header.flags & DDSD_MIPMAPCOUNT != 0 && header.mip_map_count > 0 {
        header.mip_map_count
    } else {
        1
    };
    let max_mips = 32 - header.width.max(header.height).leading_zeros();
    if mip_count > max_mips {
        return Err(CgiError::ContentError(format!(
            "DDS image of {}x{} claims {} mips",
            header.width, header.height, mip_count
        )));
    }

    let skipped_mips = lod_bias.saturating_add(header.reserved2).min(mip_count - 1);

    let mip_sizes: Vec<u64> = (0..mip_count)
        .map(|mip_level| {
            format.surface_size(
                (header.width >> mip_level).max(1),
                (header.height >> mip_level).max(1),
            )
        })
        .collect();
    let required_size = mip_sizes
        .iter()
        .sum::<u64>()
        .checked_mul(u64::from(array_layers))
        .and_then(|size| size.checked_add(data_offset as u64))
        .ok_or_else(|| CgiError::ContentError("DDS image size overflows".to_string()))?;
    if (bytes.len() as u64) < required_size {
        return Err(CgiError::ContentError(format!(
            "DDS file is truncated, needs {} bytes but has {}",
            required_size,
            bytes.len()
        )));
    }

    let mut layers = Vec::with_capacity(array_layers as usize);
    let mut offset = data_offset;
    for _ in 0..array_layers {
        let mut mips = Vec::with_capacity((mip_count - skipped_mips) as usize);
        for (mip_level, size) in (0..mip_count).zip(mip_sizes.iter()) {
            let width = (header.width >> mip_level).max(1);
            let height = (header.height >> mip_level).max(1);
            let size = *size as usize;

            if mip_level >= skipped_mips {
                mips.push(CgiDdsMipLevel {
                    width,
                    height,
                    row_pitch: format.row_pitch(width),
                    data: bytes[offset..offset + size].to_vec(),
                });
            }
            offset += size;
        }
        layers.push(mips);
    }

    log::trace!(
        "Loaded DDS {:?} {}x{} with {} mips and {} layers, skipped {} mips",
        format,
        header.width,
        header.height,
        mip_count,
        array_layers,
        skipped_mips
    );

    Ok(CgiDdsImage {
        format,
        width: (header.width >> skipped_mips).max(1),
        height: (header.height >> skipped_mips).max(1),
        is_cube_map,
        skipped_mips,
        layers,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const HEADER_HEIGHT_OFFSET: usize = 4 + 8;
    const HEADER_WIDTH_OFFSET: usize = 4 + 12;
    const DXT10_MISC_FLAG_OFFSET: usize = 4 + 124 + 8;
    const DXT10_ARRAY_SIZE_OFFSET: usize = 4 + 124 + 12;

    fn set_u32(
        bytes: &mut [u8],
        offset: usize,
        value: u32,
    ) {
        bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Build a DDS blob with a DX10 header (or a legacy FourCC if `legacy_four_cc` is set) and
    /// `mip_count` mips filled with their mip index
    pub(crate) fn make_dds(
        width: u32,
        height: u32,
        mip_count: u32,
        format: CgiFormat,
        dxgi_format: u32,
        legacy_four_cc: Option<&[u8; 4]>,
        reserved2: u32,
    ) -> Vec<u8> {
        let mut header = DdsHeader::zeroed();
        header.size = DDS_HEADER_SIZE;
        header.flags = 0x1 | 0x2 | 0x4 | 0x1000 | DDSD_MIPMAPCOUNT;
        header.width = width;
        header.height = height;
        header.mip_map_count = mip_count;
        header.pixel_format.size = DDS_PIXEL_FORMAT_SIZE;
        header.pixel_format.flags = DDPF_FOURCC;
        header.pixel_format.four_cc = four_cc(legacy_four_cc.unwrap_or(b"DX10"));
        header.reserved2 = reserved2;

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&DDS_MAGIC.to_le_bytes());
        bytes.extend_from_slice(bytemuck::bytes_of(&header));
        if legacy_four_cc.is_none() {
            let dxt10 = DdsHeaderDxt10 {
                dxgi_format,
                resource_dimension: DDS_DIMENSION_TEXTURE2D,
                misc_flag: 0,
                array_size: 1,
                misc_flags2: 0,
            };
            bytes.extend_from_slice(bytemuck::bytes_of(&dxt10));
        }

        for mip_level in 0..mip_count {
            let size =
                format.surface_size((width >> mip_level).max(1), (height >> mip_level).max(1));
            bytes.extend(std::iter::repeat(mip_level as u8).take(size as usize));
        }
        bytes
    }

    #[test]
    fn header_sizes_match_the_file_format() {
        assert_eq!(std::mem::size_of::<DdsPixelFormat>(), 32);
        assert_eq!(std::mem::size_of::<DdsHeader>(), 124);
        assert_eq!(std::mem::size_of::<DdsHeaderDxt10>(), 20);
    }

    #[test]
    fn loads_bc1_bc3_bc7() {
        let cases = [
            (CgiFormat::Bc1Unorm, 71),
            (CgiFormat::Bc3Unorm, 77),
            (CgiFormat::Bc7Unorm, 98),
            (CgiFormat::Bc7Srgb, 99),
        ];
        for (format, dxgi_format) in &cases {
            let bytes = make_dds(64, 32, 7, *format, *dxgi_format, None, 0);
            let image = load_dds(&bytes, 0).unwrap();
            assert_eq!(image.format, *format);
            assert_eq!((image.width, image.height), (64, 32));
            assert_eq!(image.mip_count(), 7);
            assert_eq!(image.array_layers(), 1);
            let last = &image.layers[0][6];
            assert_eq!((last.width, last.height), (1, 1));
            assert_eq!(last.data.len(), format.block_size_in_bytes().unwrap() as usize);
        }
    }

    #[test]
    fn loads_legacy_four_cc() {
        let bytes = make_dds(16, 16, 1, CgiFormat::Bc1Unorm, 0, Some(b"DXT1"), 0);
        assert_eq!(load_dds(&bytes, 0).unwrap().format, CgiFormat::Bc1Unorm);

        let bytes = make_dds(16, 16, 1, CgiFormat::Bc3Unorm, 0, Some(b"DXT5"), 0);
        assert_eq!(load_dds(&bytes, 0).unwrap().format, CgiFormat::Bc3Unorm);
    }

    #[test]
    fn lod_bias_skips_top_mips() {
        // One mip skipped by the header, one more by the caller
        let bytes = make_dds(256, 128, 9, CgiFormat::Bc3Unorm, 77, None, 1);
        let image = load_dds(&bytes, 1).unwrap();
        assert_eq!(image.skipped_mips, 2);
        assert_eq!((image.width, image.height), (64, 32));
        assert_eq!(image.mip_count(), 7);
        // The first kept mip carries the data of mip 2
        assert!(image.layers[0][0].data.iter().all(|b| *b == 2));
    }

    #[test]
    fn lod_bias_keeps_last_mip() {
        let bytes = make_dds(8, 8, 4, CgiFormat::Bc1Unorm, 71, None, 0);
        let image = load_dds(&bytes, 10).unwrap();
        assert_eq!(image.mip_count(), 1);
        assert_eq!((image.width, image.height), (1, 1));
    }

    #[test]
    fn rejects_bad_files() {
        assert!(matches!(load_dds(b"NOPE", 0), Err(CgiError::ContentError(_))));

        let mut bytes = make_dds(16, 16, 1, CgiFormat::Bc1Unorm, 71, None, 0);
        bytes[0] = b'X';
        assert!(load_dds(&bytes, 0).is_err());

        let mut bytes = make_dds(16, 16, 1, CgiFormat::Bc1Unorm, 71, None, 0);
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(load_dds(&bytes, 0), Err(CgiError::ContentError(_))));

        let bytes = make_dds(16, 16, 1, CgiFormat::Bc1Unorm, 12345, None, 0);
        assert!(load_dds(&bytes, 0).is_err());

        // Extents past the texture limit, including one that overflows block math
        let mut bytes = make_dds(16, 16, 1, CgiFormat::Bc1Unorm, 0, Some(b"DXT1"), 0);
        set_u32(&mut bytes, HEADER_WIDTH_OFFSET, u32::MAX);
        assert!(matches!(load_dds(&bytes, 0), Err(CgiError::ContentError(_))));
        set_u32(&mut bytes, HEADER_WIDTH_OFFSET, MAX_TEXTURE_EXTENT + 1);
        assert!(matches!(load_dds(&bytes, 0), Err(CgiError::ContentError(_))));

        // Largest legal extent, but no payload
        let mut bytes = make_dds(16, 16, 1, CgiFormat::Bc1Unorm, 71, None, 0);
        set_u32(&mut bytes, HEADER_WIDTH_OFFSET, MAX_TEXTURE_EXTENT);
        set_u32(&mut bytes, HEADER_HEIGHT_OFFSET, MAX_TEXTURE_EXTENT);
        assert!(matches!(load_dds(&bytes, 0), Err(CgiError::ContentError(_))));

        // Array sizes past the limit, and a cube map array whose layers are missing
        let mut bytes = make_dds(16, 16, 1, CgiFormat::Bc1Unorm, 71, None, 0);
        set_u32(&mut bytes, DXT10_MISC_FLAG_OFFSET, DDS_RESOURCE_MISC_TEXTURECUBE);
        set_u32(&mut bytes, DXT10_ARRAY_SIZE_OFFSET, u32::MAX);
        assert!(matches!(load_dds(&bytes, 0), Err(CgiError::ContentError(_))));
        set_u32(&mut bytes, DXT10_ARRAY_SIZE_OFFSET, MAX_TEXTURE_ARRAY_SIZE + 1);
        assert!(matches!(load_dds(&bytes, 0), Err(CgiError::ContentError(_))));
        set_u32(&mut bytes, DXT10_ARRAY_SIZE_OFFSET, MAX_TEXTURE_ARRAY_SIZE);
        assert!(matches!(load_dds(&bytes, 0), Err(CgiError::ContentError(_))));
    }

    #[test]
    fn huge_header_lod_bias_keeps_last_mip() {
        let bytes = make_dds(8, 8, 4, CgiFormat::Bc1Unorm, 71, None, u32::MAX);
        let image = load_dds(&bytes, 1).unwrap();
        assert_eq!(image.skipped_mips, 3);
        assert_eq!((image.width, image.height), (1, 1));
    }
}
