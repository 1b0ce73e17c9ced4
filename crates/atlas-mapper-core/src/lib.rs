//! Core library for mapping sprites into texture atlases.
//!
//! - Packing strategies: MaxRects (BSSF/BLSF/BAF/BL/CP), Skyline (BL/MW + optional waste map), Guillotine (choice + split)
//! - Sizing policies: constant, best fit (shrinks toward the smallest square), squared power of two
//! - Pipeline: stages implementing [`AtlasSink`] chain into one value; [`AtlasMapper`] is the packing stage,
//!   the others name atlases, write JSON manifests and composite images.
//!
//! Quick example:
//! ```ignore
//! use atlas_mapper_core::prelude::*;
//! # fn main() -> atlas_mapper_core::Result<()> {
//! let mut mapper = AtlasMapper::new(MapperConfig::default(), AtlasCollector::new());
//! mapper.begin_atlas(&AtlasSpec::new(256, 256).with_padding(1))?;
//! mapper.add_item(&AtlasItem::new("ui/button.png", 64, 32))?;
//! mapper.add_item(&AtlasItem::new("ui/panel.png", 100, 80))?;
//! mapper.end_atlas(true)?;
//! let atlases = mapper.into_sink().into_atlases();
//! println!("atlases: {}", atlases.len());
//! # Ok(()) }
//! ```

mod bin;
pub mod compositing;
pub mod config;
pub mod error;
pub mod image_io;
pub mod json_reader;
pub mod json_writer;
pub mod mapper;
pub mod model;
pub mod naming;
pub mod packer;
pub mod sink;

pub use compositing::{AtlasCompositor, AtlasEncoder, PngDirEncoder};
pub use config::*;
pub use error::*;
pub use json_reader::replay_manifest;
pub use json_writer::{AtlasManifest, DirStore, JsonAtlasWriter, ManifestStore, MemoryStore, Region};
pub use mapper::AtlasMapper;
pub use model::*;
pub use naming::AtlasNaming;
pub use packer::{PackingStrategy, create_strategy};
pub use sink::{AtlasCollector, AtlasSink, SinkState};

/// Convenience prelude for common types and functions.
/// Importing `atlas_mapper_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::config::{
        AlgorithmFamily, GuillotineChoice, GuillotineSplit, MapperConfig, MapperConfigBuilder,
        MaxRectsHeuristic, SizingPolicy, SkylineHeuristic, StrategyConfig,
    };
    pub use crate::model::{
        AtlasItem, AtlasSpec, MappedAtlas, MappingStats, PixelFormat, Placement, Rect,
    };
    pub use crate::{
        AtlasCollector, AtlasCompositor, AtlasMapper, AtlasNaming, AtlasSink, JsonAtlasWriter,
        replay_manifest,
    };
}
