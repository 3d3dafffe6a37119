//! Output encoding: the sequenced byte image becomes PNG, JPEG, or EXR
//! bytes on a file or the CGI response stream.
//!
//! PNG and JPEG go through the `image` crate — the sequencer already
//! produced exactly the sample layout those encoders expect (interleaved
//! RGB, big-endian 16-bit). EXR is emitted by the handwritten writer in
//! [`exr`]. HEIF/AVIF are recognized formats but not built in; they are
//! rejected at config validation and again here. ICC profile blobs are
//! not embedded — the color profile selects the transfer curve upstream
//! and the EXR chromaticities attribute here.

use core_config::{ImageFormat, RenderConfig};
use core_image::ByteImage;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Instant;
use thiserror::Error;
use tracing::info;

pub mod exr;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("could not write output: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoder rejected the image: {0}")]
    Image(#[from] image::ImageError),
    #[error("image format {0:?} is not supported by this build")]
    Unsupported(ImageFormat),
}

/// Encode the sequenced image into `writer` per the configured format.
pub fn encode(
    writer: &mut dyn Write,
    image: &ByteImage,
    config: &RenderConfig,
) -> Result<(), EncodeError> {
    match config.image_format {
        ImageFormat::Png => {
            let color_type = if config.bits_per_color == 16 {
                ExtendedColorType::Rgb16
            } else {
                ExtendedColorType::Rgb8
            };
            PngEncoder::new(writer).write_image(&image.data, image.width, image.height, color_type)?;
        }
        ImageFormat::Jpeg => {
            JpegEncoder::new_with_quality(writer, config.compression_quality).write_image(
                &image.data,
                image.width,
                image.height,
                ExtendedColorType::Rgb8,
            )?;
        }
        ImageFormat::Exr => {
            exr::write_exr(
                writer,
                image,
                config.image_number_format,
                config.bits_per_color,
                config.color_profile,
            )?;
        }
        format @ (ImageFormat::Avif | ImageFormat::Heif) => {
            return Err(EncodeError::Unsupported(format));
        }
    }
    Ok(())
}

/// Write the final image where the configuration says: the output file in
/// CLI mode, stdout with a `Content-type` header in CGI mode.
pub fn write_output(image: &ByteImage, config: &RenderConfig) -> Result<(), EncodeError> {
    let started = Instant::now();
    if config.cgi_mode {
        let stdout = std::io::stdout();
        let mut stream = BufWriter::new(stdout.lock());
        write!(stream, "Content-type: {}\n\n", config.image_format.content_type())?;
        encode(&mut stream, image, config)?;
        stream.flush()?;
    } else {
        let path = config.output_file_name();
        let mut file = BufWriter::new(File::create(path)?);
        encode(&mut file, image, config)?;
        file.flush()?;
        info!(path, elapsed = ?started.elapsed(), "wrote output file");
    }
    Ok(())
}
