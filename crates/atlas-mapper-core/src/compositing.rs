use crate::error::{MapperError, Result};
use crate::image_io;
use crate::model::{AtlasItem, AtlasSpec};
use crate::sink::{AtlasSink, SinkState};
use image::{DynamicImage, Rgba, RgbaImage};
use std::path::PathBuf;
use tracing::{debug, instrument};

/// Blit `src` into `canvas` with its top-left at (dx, dy), optionally rotated
/// 90° clockwise and with alpha premultiplied into the color channels.
///
/// Pixels falling outside the canvas are dropped.
pub fn blit_rgba(
    src: &RgbaImage,
    canvas: &mut RgbaImage,
    dx: u32,
    dy: u32,
    rotated: bool,
    premultiply: bool,
) {
    let (cw, ch) = canvas.dimensions();
    let (sw, sh) = src.dimensions();
    // destination (rendered) size differs when rotated
    let (rw, rh) = if rotated { (sh, sw) } else { (sw, sh) };

    for yy in 0..rh {
        for xx in 0..rw {
            if dx + xx >= cw || dy + yy >= ch {
                continue;
            }
            let (ix, iy) = if rotated { (yy, sh - 1 - xx) } else { (xx, yy) };
            let mut px = *src.get_pixel(ix, iy);
            if premultiply {
                px = premultiply_pixel(px);
            }
            canvas.put_pixel(dx + xx, dy + yy, px);
        }
    }
}

pub fn premultiply_pixel(px: Rgba<u8>) -> Rgba<u8> {
    let [r, g, b, a] = px.0;
    let mul = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
    Rgba([mul(r), mul(g), mul(b), a])
}

/// Receives every finished atlas image.
pub trait AtlasEncoder {
    fn encode(&mut self, spec: &AtlasSpec, image: DynamicImage) -> Result<()>;
}

impl<F> AtlasEncoder for F
where
    F: FnMut(&AtlasSpec, DynamicImage) -> Result<()>,
{
    fn encode(&mut self, spec: &AtlasSpec, image: DynamicImage) -> Result<()> {
        self(spec, image)
    }
}

/// Writes `<dir>/<atlas name>.png`.
#[derive(Debug, Clone)]
pub struct PngDirEncoder {
    dir: PathBuf,
}

impl PngDirEncoder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl AtlasEncoder for PngDirEncoder {
    fn encode(&mut self, spec: &AtlasSpec, image: DynamicImage) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.png", spec.name));
        image_io::write_image(&path, &image)
    }
}

/// Pipeline stage rendering each atlas into an image.
pub struct AtlasCompositor<S: AtlasSink, E: AtlasEncoder> {
    sink: S,
    encoder: E,
    state: SinkState,
    spec: AtlasSpec,
    canvas: Option<RgbaImage>,
    items: usize,
}

impl<S: AtlasSink, E: AtlasEncoder> AtlasCompositor<S, E> {
    pub fn new(encoder: E, sink: S) -> Self {
        Self {
            sink,
            encoder,
            state: SinkState::default(),
            spec: AtlasSpec::default(),
            canvas: None,
            items: 0,
        }
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    pub fn into_parts(self) -> (E, S) {
        (self.encoder, self.sink)
    }

    fn draw(&mut self, item: &AtlasItem) -> Result<()> {
        let pixels = item.pixels.as_ref().ok_or_else(|| {
            MapperError::InvalidItem(format!("'{}' has no pixel data", item.key))
        })?;
        let frame = item.placement.frame;
        let (pw, ph) = pixels.dimensions();
        let expected = if item.placement.rotated { (ph, pw) } else { (pw, ph) };
        if (frame.w, frame.h) != expected {
            return Err(MapperError::InvalidItem(format!(
                "'{}' pixels are {}x{} but its frame is {}x{}",
                item.key, pw, ph, frame.w, frame.h
            )));
        }
        let premultiply = self.spec.premultiplied;
        let Some(canvas) = self.canvas.as_mut() else {
            return Ok(());
        };
        if frame.x + frame.w > canvas.width() || frame.y + frame.h > canvas.height() {
            return Err(MapperError::InvalidItem(format!(
                "'{}' frame {:?} exceeds the {}x{} atlas",
                item.key,
                frame,
                canvas.width(),
                canvas.height()
            )));
        }
        let src = pixels.image().to_rgba8();
        blit_rgba(
            &src,
            canvas,
            frame.x,
            frame.y,
            item.placement.rotated,
            premultiply,
        );
        Ok(())
    }
}

impl<S: AtlasSink, E: AtlasEncoder> AtlasSink for AtlasCompositor<S, E> {
    fn begin_atlas(&mut self, spec: &AtlasSpec) -> Result<()> {
        self.state.open("compositor")?;
        spec.validate()?;
        self.spec = spec.clone();
        self.canvas = Some(RgbaImage::new(spec.width, spec.height));
        self.items = 0;
        self.sink.begin_atlas(spec)
    }

    fn add_item(&mut self, item: &AtlasItem) -> Result<()> {
        self.state.ensure_open("compositor")?;
        self.draw(item)?;
        self.items += 1;
        self.sink.add_item(item)
    }

    #[instrument(skip_all, fields(name = %self.spec.name, items = self.items))]
    fn end_atlas(&mut self, finalize: bool) -> Result<()> {
        self.state.close("compositor")?;
        if let Some(canvas) = self.canvas.take() {
            if self.items > 0 {
                debug!(format = %self.spec.format, "encoding atlas");
                let image = self.spec.format.convert(canvas);
                self.encoder.encode(&self.spec, image)?;
            }
        }
        self.sink.end_atlas(finalize)
    }

    fn reset(&mut self) {
        self.state.reset();
        self.canvas = None;
        self.items = 0;
        self.sink.reset();
    }
}
