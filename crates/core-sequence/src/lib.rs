//! Pixel sequencing: the post-processed float image becomes the exact byte
//! stream the chosen container wants.
//!
//! Image formats disagree on nearly everything downstream of the float
//! image: number format (unsigned integer vs binary16/32 float), bit depth,
//! channel order (PNG and JPEG interleave RGB, EXR groups whole planes of
//! B, then G, then R per scan line), endianness (PNG samples are
//! big-endian, everything EXR is little-endian), and encoding gamma (EXR is
//! linear, everything else applies the selected profile's transfer curve).
//! One pass over the image resolves all of it; encoders downstream only
//! move bytes.
//!
//! A final intensity clamp runs here as well, so no NaN, infinity, or
//! out-of-range value can reach an encoder regardless of what the
//! post-process chain did.

use core_config::{ColorProfile, ImageFormat, NumberFormat, PixelLimitMode};
use core_image::PixelRgb;
use half::f16;
use std::ops::Range;

mod gamma;

pub use gamma::{TransferCurve, encode_sample};

/// Everything the sequencer needs to know about the output encoding.
#[derive(Debug, Clone, Copy)]
pub struct SequenceParams {
    pub format: ImageFormat,
    pub bits_per_color: u32,
    pub number_format: NumberFormat,
    pub color_profile: ColorProfile,
    pub limit_mode: PixelLimitMode,
}

impl SequenceParams {
    pub fn bytes_per_color(&self) -> usize {
        self.bits_per_color as usize / 8
    }

    pub fn bytes_per_pixel(&self) -> usize {
        3 * self.bytes_per_color()
    }

    /// The transfer curve actually applied: linear for EXR regardless of
    /// profile, the profile's curve otherwise.
    pub fn transfer_curve(&self) -> TransferCurve {
        if self.format == ImageFormat::Exr {
            TransferCurve::Linear
        } else {
            TransferCurve::for_profile(self.color_profile)
        }
    }
}

/// Sequence rows `rows` of the source image into `dst_band`, which holds
/// exactly those output rows.
pub fn sequence_band(
    src: &[PixelRgb],
    width: u32,
    params: &SequenceParams,
    rows: Range<u32>,
    dst_band: &mut [u8],
) {
    let curve = params.transfer_curve();
    let width = width as usize;
    let bytes_per_color = params.bytes_per_color();
    let row_bytes = width * 3 * bytes_per_color;

    for (row_index, y) in rows.enumerate() {
        let row_out = &mut dst_band[row_index * row_bytes..(row_index + 1) * row_bytes];
        let row_src = &src[y as usize * width..(y as usize + 1) * width];
        match params.format {
            ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Avif | ImageFormat::Heif => {
                sequence_interleaved_row(row_src, params, curve, row_out);
            }
            ImageFormat::Exr => {
                sequence_planar_row(row_src, params, curve, row_out);
            }
        }
    }
}

/// RGB RGB RGB..., big-endian samples (PNG wire order; JPEG consumes 8-bit
/// where endianness is moot).
fn sequence_interleaved_row(
    row_src: &[PixelRgb],
    params: &SequenceParams,
    curve: TransferCurve,
    row_out: &mut [u8],
) {
    let bytes_per_color = params.bytes_per_color();
    let mut cursor = 0;
    for pixel in row_src {
        let (r, g, b) = clamped(pixel, params.limit_mode);
        for value in [r, g, b] {
            let encoded = encode_sample(value, curve);
            match params.bits_per_color {
                8 => row_out[cursor] = quantize_u8(encoded),
                16 => {
                    row_out[cursor..cursor + 2]
                        .copy_from_slice(&quantize_u16(encoded).to_be_bytes());
                }
                _ => {
                    row_out[cursor..cursor + 4]
                        .copy_from_slice(&quantize_u32(encoded).to_be_bytes());
                }
            }
            cursor += bytes_per_color;
        }
    }
}

/// BBB... GGG... RRR... within each scan line, little-endian samples (EXR
/// chunk layout with channels in alphabetical order).
fn sequence_planar_row(
    row_src: &[PixelRgb],
    params: &SequenceParams,
    curve: TransferCurve,
    row_out: &mut [u8],
) {
    let bytes_per_color = params.bytes_per_color();
    let plane_bytes = row_src.len() * bytes_per_color;
    for (column, pixel) in row_src.iter().enumerate() {
        let (r, g, b) = clamped(pixel, params.limit_mode);
        for (plane, value) in [b, g, r].into_iter().enumerate() {
            let encoded = encode_sample(value, curve);
            let cursor = (plane * plane_bytes) + (column * bytes_per_color);
            match (params.number_format, params.bits_per_color) {
                (NumberFormat::Float, 16) => {
                    row_out[cursor..cursor + 2]
                        .copy_from_slice(&f16::from_f64(encoded).to_le_bytes());
                }
                (NumberFormat::Float, _) => {
                    row_out[cursor..cursor + 4]
                        .copy_from_slice(&(encoded as f32).to_le_bytes());
                }
                (NumberFormat::UnsignedInt, _) => {
                    row_out[cursor..cursor + 4]
                        .copy_from_slice(&quantize_u32(encoded).to_le_bytes());
                }
            }
        }
    }
}

#[inline]
fn clamped(pixel: &PixelRgb, mode: PixelLimitMode) -> (f64, f64, f64) {
    let mut pixel = *pixel;
    match mode {
        PixelLimitMode::Saturate => pixel.limit_saturate(),
        PixelLimitMode::PreserveColor => pixel.limit_preserve_hue(),
    }
    (pixel.r, pixel.g, pixel.b)
}

#[inline]
fn quantize_u8(value: f64) -> u8 {
    ((value * 255.0) + 0.5) as u8
}

#[inline]
fn quantize_u16(value: f64) -> u16 {
    ((value * 65535.0) + 0.5) as u16
}

#[inline]
fn quantize_u32(value: f64) -> u32 {
    ((value * 4294967295.0) + 0.5) as u32
}
