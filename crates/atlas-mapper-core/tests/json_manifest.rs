use atlas_mapper_core::json_writer::{AtlasManifest, MemoryStore, SpritesMap};
use atlas_mapper_core::model::PixelData;
use atlas_mapper_core::prelude::*;
use atlas_mapper_core::{MapperError, Result};
use image::{DynamicImage, Rgba, RgbaImage};
use std::collections::HashMap;

fn solid(w: u32, h: u32, color: [u8; 4]) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba(color)))
}

fn sources() -> Vec<(&'static str, DynamicImage, [u8; 4])> {
    vec![
        ("sprites/red.png", solid(40, 20, [255, 0, 0, 255]), [255, 0, 0, 255]),
        ("sprites/green.png", solid(16, 30, [0, 255, 0, 255]), [0, 255, 0, 255]),
        ("sprites/blue.png", solid(25, 25, [0, 0, 255, 255]), [0, 0, 255, 255]),
        ("sprites/white.png", solid(8, 50, [255, 255, 255, 255]), [255, 255, 255, 255]),
    ]
}

/// Maps the sources through mapper -> writer and returns the written documents.
fn write_manifest() -> MemoryStore {
    let writer = JsonAtlasWriter::new(MemoryStore::default(), AtlasCollector::new());
    let mut mapper = AtlasMapper::new(MapperConfig::default(), writer);
    mapper
        .begin_atlas(&AtlasSpec::new(128, 128).with_padding(1))
        .unwrap();
    for (key, img, _) in sources() {
        mapper.add_item(&AtlasItem::with_image(key, img)).unwrap();
    }
    mapper.end_atlas(true).unwrap();
    let (store, collector) = mapper.into_sink().into_parts();
    assert_eq!(collector.atlases().len(), 1);
    store
}

#[test]
fn writer_emits_atlas_and_sprites_map() {
    let store = write_manifest();
    let manifest: AtlasManifest = serde_json::from_str(store.get("atlas.json").unwrap()).unwrap();
    assert_eq!(manifest.padding, 1);
    assert_eq!(manifest.pixel_format, "rgba8");
    assert!(!manifest.premultiplied);
    assert_eq!(manifest.sprites_file, "sprites_map.json");
    assert_eq!(manifest.regions.len(), 4);
    assert!(manifest.size[0] <= 128 && manifest.size[1] <= 128);

    let sprites: SpritesMap = serde_json::from_str(store.get("sprites_map.json").unwrap()).unwrap();
    assert_eq!(sprites.len(), 4);
    assert_eq!(sprites["red"], "sprites/red.png");
    for region in &manifest.regions {
        assert!(sprites.contains_key(&region.sprite_name));
    }
}

#[test]
fn manifest_replays_into_the_compositor() {
    let store = write_manifest();
    let manifest: AtlasManifest = serde_json::from_str(store.get("atlas.json").unwrap()).unwrap();
    let by_key: HashMap<&str, (DynamicImage, [u8; 4])> =
        sources().into_iter().map(|(k, img, c)| (k, (img, c))).collect();

    let mut encoded: Vec<(AtlasSpec, DynamicImage)> = Vec::new();
    {
        let encoder = |spec: &AtlasSpec, img: DynamicImage| -> Result<()> {
            encoded.push((spec.clone(), img));
            Ok(())
        };
        let mut compositor = AtlasCompositor::new(encoder, AtlasCollector::new());
        replay_manifest(
            store.get("atlas.json").unwrap(),
            store.get("sprites_map.json").unwrap(),
            &mut compositor,
            |item: &mut AtlasItem| {
                let (img, _) = &by_key[item.key.as_str()];
                item.width = img.width();
                item.height = img.height();
                item.pixels = Some(PixelData::new(img.clone()));
                Ok(())
            },
        )
        .unwrap();
        let (_, collector) = compositor.into_parts();
        assert_eq!(collector.atlases().len(), 1);
        assert!(collector.is_finalized());
    }

    assert_eq!(encoded.len(), 1);
    let (spec, img) = &encoded[0];
    assert_eq!((spec.width, spec.height), (manifest.size[0], manifest.size[1]));
    let rgba = img.to_rgba8();
    let sprites: SpritesMap = serde_json::from_str(store.get("sprites_map.json").unwrap()).unwrap();
    for region in &manifest.regions {
        let [x, y, w, h] = region.rect;
        let (_, color) = &by_key[sprites[&region.sprite_name].as_str()];
        assert_eq!(rgba.get_pixel(x, y).0, *color);
        assert_eq!(rgba.get_pixel(x + w - 1, y + h - 1).0, *color);
        // padding stays transparent
        if x > 0 {
            assert_eq!(rgba.get_pixel(x - 1, y).0[3], 0);
        }
    }
}

#[test]
fn duplicate_sprite_names_are_rejected() {
    let mut writer = JsonAtlasWriter::new(MemoryStore::default(), ());
    writer.begin_atlas(&AtlasSpec::new(64, 64)).unwrap();
    writer.add_item(&AtlasItem::new("a/icon.png", 4, 4)).unwrap();
    let err = writer.add_item(&AtlasItem::new("b/icon.png", 4, 4)).unwrap_err();
    assert!(matches!(err, MapperError::DuplicateSprite(name) if name == "icon"));
}

#[test]
fn empty_atlases_are_not_written() {
    let mut writer = JsonAtlasWriter::new(MemoryStore::default(), ());
    writer.begin_atlas(&AtlasSpec::new(64, 64)).unwrap();
    writer.end_atlas(true).unwrap();
    assert!(writer.store().files.is_empty());
}

#[test]
fn size_mismatch_fails_and_resets_the_sink() {
    let store = write_manifest();
    let mut collector = AtlasCollector::new();
    let err = replay_manifest(
        store.get("atlas.json").unwrap(),
        store.get("sprites_map.json").unwrap(),
        &mut collector,
        |item: &mut AtlasItem| {
            item.width += 1;
            Ok(())
        },
    )
    .unwrap_err();
    assert!(matches!(err, MapperError::Manifest(_)));
    assert!(collector.atlases().is_empty());
    // the reset collector accepts a fresh bracket
    collector.begin_atlas(&AtlasSpec::default()).unwrap();
}

#[test]
fn unknown_pixel_format_is_reported() {
    let atlas = r#"{"padding":0,"size":[8,8],"premultiplied":false,"pixel_format":"bgr565",
        "sprites_file":"sprites_map.json","regions":[]}"#;
    let err = replay_manifest(atlas, "{}", &mut (), |_: &mut AtlasItem| Ok(())).unwrap_err();
    assert!(matches!(err, MapperError::UnknownPixelFormat(_)));
}

#[test]
fn missing_sprite_is_a_manifest_error() {
    let atlas = r#"{"padding":0,"size":[8,8],"premultiplied":false,"pixel_format":"rgba8",
        "sprites_file":"sprites_map.json","regions":[{"rect":[0,0,2,2],"rotated":false,"sprite_name":"ghost"}]}"#;
    let err = replay_manifest(atlas, "{}", &mut (), |_: &mut AtlasItem| Ok(())).unwrap_err();
    assert!(matches!(err, MapperError::Manifest(_)));
}
