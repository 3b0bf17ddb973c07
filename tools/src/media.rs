//! Image handling for tools that send or return pictures.

use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;

use cloud_jobs::error::{validation_error, Error, ValidationErrorKind};
use image::codecs::gif::GifDecoder;
use image::imageops::{self, FilterType};
use image::{AnimationDecoder, DynamicImage, ImageFormat};
use log::*;

/// Size every first frame of a generated video must have.
pub const FIRST_FRAME_WIDTH: u32 = 1280;
pub const FIRST_FRAME_HEIGHT: u32 = 720;

fn invalid(message: &str) -> Error {
    validation_error(ValidationErrorKind::InvalidParameter, message)
}

/// Encode `image` as PNG.
pub fn encode_png(image: DynamicImage) -> Result<Vec<u8>, Error> {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| {
            warn!("PNG encoding failed: {:?}", e);
            Error::from(std::io::Error::other(e))
        })?;
    Ok(png)
}

/// Turn a PNG or JPEG into the 1280x720 RGB PNG a video first frame must be.
///
/// Images with an alpha channel are accepted only when every pixel is fully
/// opaque. Anything else is converted to RGB and resized when needed.
pub fn normalize_first_frame(bytes: &[u8]) -> Result<Vec<u8>, Error> {
    let image = image::load_from_memory(bytes).map_err(|e| {
        debug!("First frame does not decode: {:?}", e);
        invalid("Failed to process image. Please ensure the image is a valid JPEG or PNG file.")
    })?;

    if image.color().has_alpha() && image.to_rgba8().pixels().any(|pixel| pixel.0[3] < u8::MAX) {
        return Err(invalid(
            "PNG image contains transparent or translucent pixels, which is not supported. \
             Please provide an image without transparency.",
        ));
    }

    let mut rgb = image.to_rgb8();
    if rgb.dimensions() != (FIRST_FRAME_WIDTH, FIRST_FRAME_HEIGHT) {
        warn!(
            "Image dimensions {:?} do not match required {}x{}, resizing",
            rgb.dimensions(),
            FIRST_FRAME_WIDTH,
            FIRST_FRAME_HEIGHT
        );
        rgb = imageops::resize(&rgb, FIRST_FRAME_WIDTH, FIRST_FRAME_HEIGHT, FilterType::Lanczos3);
    }

    encode_png(DynamicImage::ImageRgb8(rgb))
}

/// Indices of the frames to pull out of an animation of `total` frames.
///
/// Two frames means first and last. A count at or above the total returns
/// every frame. Otherwise the frames are evenly spaced and the last index is
/// always the final frame. The result is ascending.
pub fn frame_indices(total: usize, count: usize) -> Vec<usize> {
    if total == 0 || count == 0 {
        return Vec::new();
    }
    if count == 2 {
        return vec![0, total - 1];
    }
    if count >= total {
        return (0..total).collect();
    }

    let step = if count > 1 {
        (total - 1) as f64 / (count - 1) as f64
    } else {
        0.0
    };
    let mut indices: Vec<usize> = (0..count).map(|i| (i as f64 * step) as usize).collect();
    if let Some(last) = indices.last_mut() {
        *last = total - 1;
    }
    indices
}

fn open_gif(path: &Path) -> Result<GifDecoder<BufReader<File>>, Error> {
    let file = File::open(path)?;
    GifDecoder::new(BufReader::new(file)).map_err(|e| {
        debug!("{} is not a GIF: {:?}", path.display(), e);
        invalid("Only GIF input is supported and the file is not a valid GIF.")
    })
}

fn decode_failure(path: &Path, e: image::ImageError) -> Error {
    warn!("Failed to decode frame of {}: {:?}", path.display(), e);
    invalid(&format!("GIF frame could not be decoded: {}", e))
}

/// Count the frames of the GIF at `path`.
pub fn count_gif_frames(path: &Path) -> Result<usize, Error> {
    let mut total = 0;
    for frame in open_gif(path)?.into_frames() {
        frame.map_err(|e| decode_failure(path, e))?;
        total += 1;
    }
    Ok(total)
}

/// Decode the frames at `indices` (ascending, repeats allowed) from the GIF at
/// `path`, each as a full-canvas PNG.
///
/// Blocks on file I/O and decoding.
pub fn extract_gif_frames(path: &Path, indices: &[usize]) -> Result<Vec<Vec<u8>>, Error> {
    let mut wanted = indices.iter().copied().peekable();
    let mut frames = Vec::with_capacity(indices.len());

    for (index, frame) in open_gif(path)?.into_frames().enumerate() {
        if wanted.peek().is_none() {
            break;
        }
        let image = frame.map_err(|e| decode_failure(path, e))?.into_buffer();
        while wanted.next_if_eq(&index).is_some() {
            frames.push(encode_png(DynamicImage::ImageRgba8(image.clone()))?);
        }
    }

    if frames.len() != indices.len() {
        return Err(invalid("GIF has fewer frames than requested"));
    }
    Ok(frames)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Frame, Rgb, RgbImage, Rgba, RgbaImage};

    pub fn png(image: DynamicImage) -> Vec<u8> {
        encode_png(image).unwrap()
    }

    pub fn solid_rgb_png(width: u32, height: u32) -> Vec<u8> {
        png(DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 40, 40]))))
    }

    /// A GIF with one solid frame per color.
    pub fn gif(width: u32, height: u32, colors: &[[u8; 3]]) -> Vec<u8> {
        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            let frames = colors.iter().map(|[r, g, b]| {
                Frame::new(RgbaImage::from_pixel(width, height, Rgba([*r, *g, *b, 255])))
            });
            encoder.encode_frames(frames).unwrap();
        }
        bytes
    }
}
