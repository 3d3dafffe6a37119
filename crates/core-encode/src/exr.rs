//! Handwritten OpenEXR emitter: minimal uncompressed scan-line files,
//! version 2, no flags.
//!
//! Layout: magic + version, an attribute list (`channels`, `compression`,
//! `dataWindow`, `displayWindow`, `lineOrder`, `pixelAspectRatio`,
//! `screenWindowCenter`, `screenWindowWidth`, optionally
//! `chromaticities`), a null terminator, an offset table of one 8-byte
//! little-endian file offset per scan line, then one chunk per line:
//! `i32 y`, `i32 pixel_data_size`, and the raw planar B/G/R samples the
//! sequencer already produced. Every multi-byte value in the file is
//! little-endian regardless of host.

use core_config::{ColorProfile, NumberFormat};
use core_image::ByteImage;
use std::io::Write;

use crate::EncodeError;

const EXR_MAGIC: u32 = 0x01312F76;

// openexr_attr.h pixel types
const PIXEL_UINT: i32 = 0;
const PIXEL_HALF: i32 = 1;
const PIXEL_FLOAT: i32 = 2;

const COMPRESSION_NONE: u8 = 0;
const LINEORDER_INCREASING_Y: u8 = 0;
const PERCEPTUALLY_LOGARITHMIC: u8 = 0;

/// CIE xy primaries + white point for the EXR chromaticities attribute.
#[derive(Debug, Clone, Copy)]
pub struct Chromaticities {
    pub red_x: f32,
    pub red_y: f32,
    pub green_x: f32,
    pub green_y: f32,
    pub blue_x: f32,
    pub blue_y: f32,
    pub white_x: f32,
    pub white_y: f32,
}

pub const SRGB_CHROMATICITIES: Chromaticities = Chromaticities {
    red_x: 0.6400,
    red_y: 0.3300,
    green_x: 0.3000,
    green_y: 0.6000,
    blue_x: 0.1500,
    blue_y: 0.0600,
    white_x: 0.3127,
    white_y: 0.3290,
};

pub const DISPLAY_P3_CHROMATICITIES: Chromaticities = Chromaticities {
    red_x: 0.6800,
    red_y: 0.3200,
    green_x: 0.2650,
    green_y: 0.6900,
    blue_x: 0.1500,
    blue_y: 0.0600,
    white_x: 0.3127,
    white_y: 0.3290,
};

pub const REC2020_CHROMATICITIES: Chromaticities = Chromaticities {
    red_x: 0.7080,
    red_y: 0.3290,
    green_x: 0.1700,
    green_y: 0.7970,
    blue_x: 0.1310,
    blue_y: 0.0460,
    white_x: 0.3127,
    white_y: 0.3290,
};

pub const REC601_NTSC_CHROMATICITIES: Chromaticities = Chromaticities {
    red_x: 0.6300,
    red_y: 0.3400,
    green_x: 0.3100,
    green_y: 0.5950,
    blue_x: 0.1550,
    blue_y: 0.0700,
    white_x: 0.3127,
    white_y: 0.3290,
};

pub const REC601_PAL_CHROMATICITIES: Chromaticities = Chromaticities {
    red_x: 0.6400,
    red_y: 0.3300,
    green_x: 0.2900,
    green_y: 0.6000,
    blue_x: 0.1500,
    blue_y: 0.0600,
    white_x: 0.3127,
    white_y: 0.3290,
};

pub const REC709_CHROMATICITIES: Chromaticities = Chromaticities {
    red_x: 0.6400,
    red_y: 0.3300,
    green_x: 0.3000,
    green_y: 0.6000,
    blue_x: 0.1500,
    blue_y: 0.0600,
    white_x: 0.3127,
    white_y: 0.3290,
};

/// The chromaticities attribute emitted for a color profile, if any.
pub fn chromaticities_for(profile: ColorProfile) -> Option<Chromaticities> {
    match profile {
        ColorProfile::Srgb => Some(SRGB_CHROMATICITIES),
        ColorProfile::DisplayP3 => Some(DISPLAY_P3_CHROMATICITIES),
        ColorProfile::Rec2020 => Some(REC2020_CHROMATICITIES),
        ColorProfile::Rec601Ntsc => Some(REC601_NTSC_CHROMATICITIES),
        ColorProfile::Rec601Pal => Some(REC601_PAL_CHROMATICITIES),
        ColorProfile::Rec709 => Some(REC709_CHROMATICITIES),
        ColorProfile::Linear
        | ColorProfile::Flat2
        | ColorProfile::Rec2100Pq => None,
    }
}

fn pixel_type(number_format: NumberFormat, bits_per_color: u32) -> i32 {
    match (number_format, bits_per_color) {
        (NumberFormat::UnsignedInt, _) => PIXEL_UINT,
        (NumberFormat::Float, 16) => PIXEL_HALF,
        (NumberFormat::Float, _) => PIXEL_FLOAT,
    }
}

/// Serializer for the header's null-terminated strings and little-endian
/// scalars.
struct HeaderWriter {
    bytes: Vec<u8>,
}

impl HeaderWriter {
    fn new() -> HeaderWriter {
        HeaderWriter {
            bytes: Vec::with_capacity(4096),
        }
    }

    fn str32(&mut self, value: &str) {
        debug_assert!(value.len() < 32);
        self.bytes.extend_from_slice(value.as_bytes());
        self.bytes.push(0);
    }

    fn u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    fn i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn f32(&mut self, value: f32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// One channel entry of the chlist attribute value.
    fn channel(&mut self, name: &str, kind: i32) {
        self.str32(name);
        self.i32(kind);
        self.u8(PERCEPTUALLY_LOGARITHMIC);
        self.u8(0);
        self.u8(0);
        self.u8(0);
        self.i32(1); // x sampling (4:4:4)
        self.i32(1); // y sampling
    }
}

/// Build the header bytes through the end-of-attributes terminator.
pub fn header_bytes(
    width: u32,
    height: u32,
    number_format: NumberFormat,
    bits_per_color: u32,
    profile: ColorProfile,
) -> Vec<u8> {
    let kind = pixel_type(number_format, bits_per_color);
    let mut header = HeaderWriter::new();

    header.u32(EXR_MAGIC);
    header.u8(0x02); // version 2
    header.u8(0); // no tiles, no long names, no deep data, single part
    header.u8(0);
    header.u8(0);

    header.str32("channels");
    header.str32("chlist");
    // three channel entries of 18 bytes each, plus the list terminator
    header.i32(55);
    header.channel("B", kind);
    header.channel("G", kind);
    header.channel("R", kind);
    header.u8(0);

    header.str32("compression");
    header.str32("compression");
    header.i32(1);
    header.u8(COMPRESSION_NONE);

    header.str32("dataWindow");
    header.str32("box2i");
    header.i32(16);
    header.i32(0);
    header.i32(0);
    header.i32(width as i32 - 1);
    header.i32(height as i32 - 1);

    header.str32("displayWindow");
    header.str32("box2i");
    header.i32(16);
    header.i32(0);
    header.i32(0);
    header.i32(width as i32 - 1);
    header.i32(height as i32 - 1);

    header.str32("lineOrder");
    header.str32("lineOrder");
    header.i32(1);
    header.u8(LINEORDER_INCREASING_Y);

    header.str32("pixelAspectRatio");
    header.str32("float");
    header.i32(4);
    header.f32(1.0);

    header.str32("screenWindowCenter");
    header.str32("v2f");
    header.i32(8);
    header.f32(0.0);
    header.f32(0.0);

    header.str32("screenWindowWidth");
    header.str32("float");
    header.i32(4);
    header.f32(1.0);

    if let Some(c) = chromaticities_for(profile) {
        header.str32("chromaticities");
        header.str32("chromaticities");
        header.i32(32);
        header.f32(c.red_x);
        header.f32(c.red_y);
        header.f32(c.green_x);
        header.f32(c.green_y);
        header.f32(c.blue_x);
        header.f32(c.blue_y);
        header.f32(c.white_x);
        header.f32(c.white_y);
    }

    // end of attributes
    header.u8(0);
    header.bytes
}

/// Write a complete EXR stream: header, offset table, then one
/// uncompressed chunk per scan line from the sequenced planar bytes.
pub fn write_exr(
    writer: &mut dyn Write,
    image: &ByteImage,
    number_format: NumberFormat,
    bits_per_color: u32,
    profile: ColorProfile,
) -> Result<(), EncodeError> {
    let header = header_bytes(image.width, image.height, number_format, bits_per_color, profile);
    writer.write_all(&header)?;

    let chunk_header_size = 8u64; // i32 y + i32 pixel_data_size
    let pixel_data_size = image.row_bytes() as u64;
    let offset_table_size = 8 * u64::from(image.height);
    let first_chunk = header.len() as u64 + offset_table_size;
    for y in 0..u64::from(image.height) {
        let offset = first_chunk + y * (chunk_header_size + pixel_data_size);
        writer.write_all(&offset.to_le_bytes())?;
    }

    for (y, row) in image.rows().enumerate() {
        writer.write_all(&(y as i32).to_le_bytes())?;
        writer.write_all(&(pixel_data_size as i32).to_le_bytes())?;
        writer.write_all(row)?;
    }
    Ok(())
}
