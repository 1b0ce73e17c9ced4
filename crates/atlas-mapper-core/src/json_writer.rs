use crate::error::{MapperError, Result};
use crate::model::{AtlasItem, AtlasSpec};
use crate::sink::{AtlasSink, SinkState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

pub const DEFAULT_SPRITES_FILE: &str = "sprites_map.json";

/// On-disk description of one atlas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AtlasManifest {
    pub padding: u32,
    pub size: [u32; 2],
    pub premultiplied: bool,
    pub pixel_format: String,
    /// File name of the sprites map shared by every atlas of a run.
    pub sprites_file: String,
    pub regions: Vec<Region>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Region {
    /// `[x, y, w, h]` in atlas pixels, post-rotation.
    pub rect: [u32; 4],
    pub rotated: bool,
    pub sprite_name: String,
}

/// Sprite name → image path.
pub type SpritesMap = BTreeMap<String, String>;

/// Sprite name for an image path: its file name without extension.
pub fn sprite_name_of(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_owned()
}

/// Destination for manifest documents.
pub trait ManifestStore {
    fn store(&mut self, file_name: &str, contents: &str) -> Result<()>;
}

/// Writes every document as a file inside a directory.
#[derive(Debug, Clone)]
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ManifestStore for DirStore {
    fn store(&mut self, file_name: &str, contents: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        debug!(path = %path.display(), "writing manifest");
        fs::write(path, contents)?;
        Ok(())
    }
}

/// Keeps documents in memory, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub files: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn get(&self, file_name: &str) -> Option<&str> {
        self.files.get(file_name).map(String::as_str)
    }
}

impl ManifestStore for MemoryStore {
    fn store(&mut self, file_name: &str, contents: &str) -> Result<()> {
        self.files.insert(file_name.to_owned(), contents.to_owned());
        Ok(())
    }
}

impl<M: ManifestStore + ?Sized> ManifestStore for &mut M {
    fn store(&mut self, file_name: &str, contents: &str) -> Result<()> {
        (**self).store(file_name, contents)
    }
}

/// Pipeline stage writing `<atlas name>.json` for every non-empty atlas and
/// the sprites map once the run is finalized.
pub struct JsonAtlasWriter<S: AtlasSink, M: ManifestStore> {
    sink: S,
    store: M,
    sprites_file: String,
    state: SinkState,
    name: String,
    current: Option<AtlasManifest>,
    sprites: SpritesMap,
}

impl<S: AtlasSink, M: ManifestStore> JsonAtlasWriter<S, M> {
    pub fn new(store: M, sink: S) -> Self {
        Self {
            sink,
            store,
            sprites_file: DEFAULT_SPRITES_FILE.to_owned(),
            state: SinkState::default(),
            name: String::new(),
            current: None,
            sprites: SpritesMap::new(),
        }
    }

    pub fn with_sprites_file(mut self, file_name: impl Into<String>) -> Self {
        self.sprites_file = file_name.into();
        self
    }

    pub fn store(&self) -> &M {
        &self.store
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_parts(self) -> (M, S) {
        (self.store, self.sink)
    }

    fn write_sprites_map(&mut self) -> Result<()> {
        if self.sprites.is_empty() {
            return Ok(());
        }
        let json = serde_json::to_string_pretty(&self.sprites)?;
        self.store.store(&self.sprites_file, &json)
    }
}

impl<S: AtlasSink, M: ManifestStore> AtlasSink for JsonAtlasWriter<S, M> {
    fn begin_atlas(&mut self, spec: &AtlasSpec) -> Result<()> {
        self.state.open("json writer")?;
        if self.sprites_file.is_empty() {
            return Err(MapperError::InvalidConfig("sprites map file name is empty".into()));
        }
        self.name = spec.name.clone();
        self.current = Some(AtlasManifest {
            padding: spec.padding,
            size: [spec.width, spec.height],
            premultiplied: spec.premultiplied,
            pixel_format: spec.format.name().to_owned(),
            sprites_file: self.sprites_file.clone(),
            regions: Vec::new(),
        });
        self.sink.begin_atlas(spec)
    }

    fn add_item(&mut self, item: &AtlasItem) -> Result<()> {
        self.state.ensure_open("json writer")?;
        let sprite_name = sprite_name_of(&item.key);
        if self.sprites.contains_key(&sprite_name) {
            error!(sprite = %sprite_name, key = %item.key, "duplicate sprite name");
            return Err(MapperError::DuplicateSprite(sprite_name));
        }
        self.sprites.insert(sprite_name.clone(), item.key.clone());
        let f = item.placement.frame;
        if let Some(manifest) = self.current.as_mut() {
            manifest.regions.push(Region {
                rect: [f.x, f.y, f.w, f.h],
                rotated: item.placement.rotated,
                sprite_name,
            });
        }
        self.sink.add_item(item)
    }

    fn end_atlas(&mut self, finalize: bool) -> Result<()> {
        self.state.close("json writer")?;
        if let Some(manifest) = self.current.take() {
            if !manifest.regions.is_empty() {
                let json = serde_json::to_string_pretty(&manifest)?;
                self.store.store(&format!("{}.json", self.name), &json)?;
            }
        }
        if finalize {
            self.write_sprites_map()?;
        }
        self.sink.end_atlas(finalize)
    }

    fn reset(&mut self) {
        self.state.reset();
        self.current = None;
        self.sprites.clear();
        self.sink.reset();
    }
}
