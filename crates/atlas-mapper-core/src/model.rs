use crate::error::{MapperError, Result};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Returns true if the two rectangles share at least one pixel.
    pub fn intersects(&self, other: &Rect) -> bool {
        !(self.x >= other.x + other.w
            || other.x >= self.x + self.w
            || self.y >= other.y + other.h
            || other.y >= self.y + self.h)
    }
    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }
    /// Shrinks the rectangle by `by` pixels on every side.
    pub fn shrink(&self, by: u32) -> Rect {
        Rect::new(
            self.x + by,
            self.y + by,
            self.w.saturating_sub(by * 2),
            self.h.saturating_sub(by * 2),
        )
    }
    /// Grows the rectangle by `by` pixels on every side (saturating at the origin).
    pub fn inflate(&self, by: u32) -> Rect {
        let x = self.x.saturating_sub(by);
        let y = self.y.saturating_sub(by);
        Rect::new(x, y, self.x + self.w + by - x, self.y + self.h + by - y)
    }
}

/// Pixel layouts supported for atlas pages and decoded sprites.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    #[default]
    Rgba8,
    Rgb8,
    La8,
    L8,
}

impl PixelFormat {
    pub fn name(&self) -> &'static str {
        match self {
            PixelFormat::Rgba8 => "rgba8",
            PixelFormat::Rgb8 => "rgb8",
            PixelFormat::La8 => "la8",
            PixelFormat::L8 => "l8",
        }
    }

    /// Maps a decoded image's color type onto the closest supported layout.
    pub fn of_image(img: &DynamicImage) -> Self {
        let color = img.color();
        match (color.has_color(), color.has_alpha()) {
            (true, true) => PixelFormat::Rgba8,
            (true, false) => PixelFormat::Rgb8,
            (false, true) => PixelFormat::La8,
            (false, false) => PixelFormat::L8,
        }
    }

    /// Converts an RGBA page into this layout.
    pub fn convert(&self, rgba: image::RgbaImage) -> DynamicImage {
        let img = DynamicImage::ImageRgba8(rgba);
        match self {
            PixelFormat::Rgba8 => img,
            PixelFormat::Rgb8 => DynamicImage::ImageRgb8(img.to_rgb8()),
            PixelFormat::La8 => DynamicImage::ImageLumaA8(img.to_luma_alpha8()),
            PixelFormat::L8 => DynamicImage::ImageLuma8(img.to_luma8()),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = MapperError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rgba8" | "rgba" => Ok(Self::Rgba8),
            "rgb8" | "rgb" => Ok(Self::Rgb8),
            "la8" => Ok(Self::La8),
            "l8" | "gray" => Ok(Self::L8),
            other => Err(MapperError::UnknownPixelFormat(other.to_string())),
        }
    }
}

/// Shared, read-only handle to decoded sprite pixels.
///
/// Cloning the handle never copies the pixel buffer.
#[derive(Clone)]
pub struct PixelData(Arc<DynamicImage>);

impl PixelData {
    pub fn new(image: DynamicImage) -> Self {
        Self(Arc::new(image))
    }
    pub fn image(&self) -> &DynamicImage {
        &self.0
    }
    pub fn dimensions(&self) -> (u32, u32) {
        (self.0.width(), self.0.height())
    }
}

impl fmt::Debug for PixelData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = self.dimensions();
        write!(f, "PixelData({}x{} {:?})", w, h, self.0.color())
    }
}

/// Where an item ended up inside an atlas.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Placement {
    /// Placed rectangle (post-rotation width/height).
    pub frame: Rect,
    /// True if the item was rotated 90° when placed.
    pub rotated: bool,
}

/// One sprite travelling through the pipeline.
///
/// Before mapping only `key`, the size, `format`, `pixels` and `allow_rotation`
/// are meaningful; the mapper fills `placement` when it emits the item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtlasItem {
    /// Stable identifier, usually the image path relative to the source root.
    pub key: String,
    /// Unpadded, unrotated width.
    pub width: u32,
    /// Unpadded, unrotated height.
    pub height: u32,
    pub format: PixelFormat,
    #[serde(skip)]
    pub pixels: Option<PixelData>,
    pub allow_rotation: bool,
    #[serde(default)]
    pub placement: Placement,
}

impl AtlasItem {
    pub fn new(key: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            key: key.into(),
            width,
            height,
            format: PixelFormat::Rgba8,
            pixels: None,
            allow_rotation: true,
            placement: Placement::default(),
        }
    }

    /// Builds an item from decoded pixels, taking size and format from the image.
    pub fn with_image(key: impl Into<String>, image: DynamicImage) -> Self {
        let format = PixelFormat::of_image(&image);
        let (width, height) = (image.width(), image.height());
        Self {
            format,
            pixels: Some(PixelData::new(image)),
            ..Self::new(key, width, height)
        }
    }

    pub fn allow_rotation(mut self, v: bool) -> Self {
        self.allow_rotation = v;
        self
    }
}

/// Atlas-level properties: the template a caller hands to `begin_atlas`, and the
/// finished description the mapper emits downstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AtlasSpec {
    /// Output base name, assigned by the naming stage.
    #[serde(default = "default_atlas_name")]
    pub name: String,
    pub format: PixelFormat,
    pub premultiplied: bool,
    /// Pixels reserved around every item.
    pub padding: u32,
    /// Fraction of the surface covered by items, written by the mapper.
    #[serde(default)]
    pub occupancy: f32,
    pub width: u32,
    pub height: u32,
}

pub(crate) fn default_atlas_name() -> String {
    "atlas".into()
}

impl Default for AtlasSpec {
    fn default() -> Self {
        Self {
            name: default_atlas_name(),
            format: PixelFormat::Rgba8,
            premultiplied: false,
            padding: 0,
            occupancy: 0.0,
            width: 1024,
            height: 1024,
        }
    }
}

impl AtlasSpec {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }
    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }
    pub fn premultiplied(mut self, v: bool) -> Self {
        self.premultiplied = v;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MapperError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// One atlas as received by a terminal sink.
#[derive(Debug, Clone)]
pub struct MappedAtlas {
    pub spec: AtlasSpec,
    pub items: Vec<AtlasItem>,
    /// The `finalize` flag passed to `end_atlas`.
    pub finalized: bool,
}

/// Statistics about a mapping run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MappingStats {
    pub num_atlases: usize,
    pub num_items: usize,
    /// Sum of width * height over all atlases.
    pub total_atlas_area: u64,
    /// Sum of placed (unpadded) item areas.
    pub used_item_area: u64,
    /// used_item_area / total_atlas_area (0.0 to 1.0).
    pub occupancy: f64,
    pub max_atlas_width: u32,
    pub max_atlas_height: u32,
    pub num_rotated: usize,
}

impl MappingStats {
    pub fn from_atlases(atlases: &[MappedAtlas]) -> Self {
        let mut stats = MappingStats {
            num_atlases: atlases.len(),
            num_items: 0,
            total_atlas_area: 0,
            used_item_area: 0,
            occupancy: 0.0,
            max_atlas_width: 0,
            max_atlas_height: 0,
            num_rotated: 0,
        };
        for atlas in atlases {
            stats.total_atlas_area += atlas.spec.width as u64 * atlas.spec.height as u64;
            stats.max_atlas_width = stats.max_atlas_width.max(atlas.spec.width);
            stats.max_atlas_height = stats.max_atlas_height.max(atlas.spec.height);
            for item in &atlas.items {
                stats.num_items += 1;
                stats.used_item_area += item.placement.frame.area();
                if item.placement.rotated {
                    stats.num_rotated += 1;
                }
            }
        }
        if stats.total_atlas_area > 0 {
            stats.occupancy = stats.used_item_area as f64 / stats.total_atlas_area as f64;
        }
        stats
    }

    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Atlases: {}, Items: {}, Occupancy: {:.2}%, Total Area: {} px², Used Area: {} px², Rotated: {}",
            self.num_atlases,
            self.num_items,
            self.occupancy * 100.0,
            self.total_atlas_area,
            self.used_item_area,
            self.num_rotated,
        )
    }

    /// Returns wasted space in pixels.
    pub fn wasted_area(&self) -> u64 {
        self.total_atlas_area.saturating_sub(self.used_item_area)
    }
}
