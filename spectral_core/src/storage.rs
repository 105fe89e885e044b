//! Lossless PNG persistence for quantized images and the slice file naming
//! convention shared by the batch converter and the manifest builder.

use png::{BitDepth, ColorType, Compression, Decoder, Encoder};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{CodecError, Result};
use crate::image::QuantizedImage;

/// Write an 8-bit grayscale PNG.
pub fn save_png<P: AsRef<Path>>(image: &QuantizedImage, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| CodecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let encode_err = |source| CodecError::PngEncode {
        path: path.to_path_buf(),
        source,
    };

    let mut encoder = Encoder::new(
        BufWriter::new(file),
        image.width() as u32,
        image.height() as u32,
    );
    encoder.set_color(ColorType::Grayscale);
    encoder.set_depth(BitDepth::Eight);
    encoder.set_compression(Compression::Fast);

    let mut writer = encoder.write_header().map_err(encode_err)?;
    writer
        .write_image_data(&image.to_raw())
        .map_err(encode_err)?;
    writer.finish().map_err(encode_err)?;
    Ok(())
}

/// Read an 8-bit grayscale PNG written by [`save_png`].
pub fn load_png<P: AsRef<Path>>(path: P) -> Result<QuantizedImage> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| CodecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let decode_err = |source| CodecError::PngDecode {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = Decoder::new(BufReader::new(file))
        .read_info()
        .map_err(decode_err)?;
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf).map_err(decode_err)?;

    if info.color_type != ColorType::Grayscale || info.bit_depth != BitDepth::Eight {
        return Err(CodecError::Image {
            path: path.to_path_buf(),
            message: format!(
                "expected 8-bit grayscale, found {:?} at {:?}",
                info.color_type, info.bit_depth
            ),
        });
    }

    buf.truncate(info.buffer_size());
    QuantizedImage::from_raw(info.width as usize, info.height as usize, buf)
}

/// `{index}_{stem}.{extension}`
pub fn slice_file_name(index: usize, stem: &str, extension: &str) -> String {
    format!("{index}_{stem}.{extension}")
}

/// Split a slice file name back into `(index, stem)`.
///
/// Only the first underscore separates the index, so stems may contain
/// underscores of their own.
pub fn parse_slice_file_name(file_name: &str) -> Option<(usize, String)> {
    let (base, _extension) = file_name.rsplit_once('.')?;
    let (index, stem) = base.split_once('_')?;
    if stem.is_empty() {
        return None;
    }
    Some((index.parse().ok()?, stem.to_string()))
}
