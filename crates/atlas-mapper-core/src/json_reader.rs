use crate::error::{MapperError, Result};
use crate::json_writer::{AtlasManifest, SpritesMap};
use crate::model::{AtlasItem, AtlasSpec, PixelFormat, Placement, Rect};
use crate::sink::AtlasSink;
use tracing::{error, instrument};

/// Parses an atlas manifest and its sprites map and replays them into `sink`
/// as one finalized atlas.
///
/// `loader` receives each item with its key (the image path from the sprites
/// map) and placement filled in, and is expected to attach pixels. The
/// decoded size must match the region, taking rotation into account.
/// On any failure the sink is reset.
#[instrument(skip_all)]
pub fn replay_manifest<S, F>(atlas_json: &str, sprites_json: &str, sink: &mut S, loader: F) -> Result<()>
where
    S: AtlasSink + ?Sized,
    F: FnMut(&mut AtlasItem) -> Result<()>,
{
    let manifest: AtlasManifest = serde_json::from_str(atlas_json)?;
    let sprites: SpritesMap = serde_json::from_str(sprites_json)?;
    let spec = AtlasSpec {
        format: manifest.pixel_format.parse::<PixelFormat>()?,
        premultiplied: manifest.premultiplied,
        padding: manifest.padding,
        width: manifest.size[0],
        height: manifest.size[1],
        ..AtlasSpec::default()
    };
    spec.validate()?;

    sink.begin_atlas(&spec)?;
    match replay_regions(&manifest, &sprites, sink, loader) {
        Ok(()) => sink.end_atlas(true),
        Err(e) => {
            error!(error = %e, "manifest replay failed");
            sink.reset();
            Err(e)
        }
    }
}

fn replay_regions<S, F>(
    manifest: &AtlasManifest,
    sprites: &SpritesMap,
    sink: &mut S,
    mut loader: F,
) -> Result<()>
where
    S: AtlasSink + ?Sized,
    F: FnMut(&mut AtlasItem) -> Result<()>,
{
    for region in &manifest.regions {
        let path = sprites.get(&region.sprite_name).ok_or_else(|| {
            MapperError::Manifest(format!(
                "sprite '{}' is missing from the sprites map",
                region.sprite_name
            ))
        })?;
        let [x, y, w, h] = region.rect;
        let (width, height) = if region.rotated { (h, w) } else { (w, h) };
        let mut item = AtlasItem::new(path.clone(), width, height);
        item.placement = Placement {
            frame: Rect::new(x, y, w, h),
            rotated: region.rotated,
        };
        loader(&mut item)?;
        if (item.width, item.height) != (width, height) {
            return Err(MapperError::Manifest(format!(
                "sprite '{}' is {}x{} but its region expects {}x{}",
                region.sprite_name, item.width, item.height, width, height
            )));
        }
        sink.add_item(&item)?;
    }
    Ok(())
}
