use crate::error::Result;
use crate::model::{AtlasItem, PixelData, PixelFormat};
use image::{DynamicImage, ImageReader};
use std::path::Path;
use tracing::debug;

/// Reads an image into an item keyed by `key`.
///
/// Without `load_pixels` only the header is parsed: the item gets its size and
/// an `Rgba8` format tag, but no pixels.
pub fn read_item(path: impl AsRef<Path>, key: impl Into<String>, load_pixels: bool) -> Result<AtlasItem> {
    let path = path.as_ref();
    if !load_pixels {
        let (w, h) = image::image_dimensions(path)?;
        return Ok(AtlasItem::new(key, w, h));
    }
    let img = decode(path)?;
    Ok(AtlasItem::with_image(key, img))
}

/// Decodes `path` and attaches its pixels, size and format to `item`.
pub fn attach_pixels(item: &mut AtlasItem, path: impl AsRef<Path>) -> Result<()> {
    let img = decode(path.as_ref())?;
    item.width = img.width();
    item.height = img.height();
    item.format = PixelFormat::of_image(&img);
    item.pixels = Some(PixelData::new(img));
    Ok(())
}

fn decode(path: &Path) -> Result<DynamicImage> {
    debug!(path = %path.display(), "decoding image");
    Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?)
}

/// Encodes `image` to `path`; the format follows the extension.
pub fn write_image(path: impl AsRef<Path>, image: &DynamicImage) -> Result<()> {
    let path = path.as_ref();
    debug!(path = %path.display(), w = image.width(), h = image.height(), "writing image");
    image.save(path)?;
    Ok(())
}
