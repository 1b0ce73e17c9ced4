use crate::error::{MapperError, Result};
use crate::model::{AtlasItem, AtlasSpec, MappedAtlas};

/// A pipeline stage receiving atlases one bracket at a time:
/// `begin_atlas`, any number of `add_item`, then `end_atlas`.
///
/// Stages own their downstream and forward to it, so they chain into a
/// single value (`AtlasNaming<AtlasMapper<JsonAtlasWriter<..>>>`). The last
/// `end_atlas` of a run carries `finalize = true`.
pub trait AtlasSink {
    fn begin_atlas(&mut self, spec: &AtlasSpec) -> Result<()>;
    fn add_item(&mut self, item: &AtlasItem) -> Result<()>;
    fn end_atlas(&mut self, finalize: bool) -> Result<()>;
    /// Drops any buffered state and returns to idle.
    fn reset(&mut self) {}
}

/// Terminal sink accepting everything.
impl AtlasSink for () {
    fn begin_atlas(&mut self, _spec: &AtlasSpec) -> Result<()> {
        Ok(())
    }
    fn add_item(&mut self, _item: &AtlasItem) -> Result<()> {
        Ok(())
    }
    fn end_atlas(&mut self, _finalize: bool) -> Result<()> {
        Ok(())
    }
}

impl<S: AtlasSink + ?Sized> AtlasSink for &mut S {
    fn begin_atlas(&mut self, spec: &AtlasSpec) -> Result<()> {
        (**self).begin_atlas(spec)
    }
    fn add_item(&mut self, item: &AtlasItem) -> Result<()> {
        (**self).add_item(item)
    }
    fn end_atlas(&mut self, finalize: bool) -> Result<()> {
        (**self).end_atlas(finalize)
    }
    fn reset(&mut self) {
        (**self).reset()
    }
}

impl<S: AtlasSink + ?Sized> AtlasSink for Box<S> {
    fn begin_atlas(&mut self, spec: &AtlasSpec) -> Result<()> {
        (**self).begin_atlas(spec)
    }
    fn add_item(&mut self, item: &AtlasItem) -> Result<()> {
        (**self).add_item(item)
    }
    fn end_atlas(&mut self, finalize: bool) -> Result<()> {
        (**self).end_atlas(finalize)
    }
    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Tracks whether a stage is inside a begin/end bracket.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SinkState {
    open: bool,
}

impl SinkState {
    pub fn open(&mut self, stage: &str) -> Result<()> {
        if self.open {
            return Err(MapperError::SinkProtocol(format!(
                "{stage}: begin_atlas while an atlas is already open"
            )));
        }
        self.open = true;
        Ok(())
    }

    pub fn ensure_open(&self, stage: &str) -> Result<()> {
        if !self.open {
            return Err(MapperError::SinkProtocol(format!(
                "{stage}: add_item outside begin_atlas/end_atlas"
            )));
        }
        Ok(())
    }

    pub fn close(&mut self, stage: &str) -> Result<()> {
        if !self.open {
            return Err(MapperError::SinkProtocol(format!(
                "{stage}: end_atlas without a matching begin_atlas"
            )));
        }
        self.open = false;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.open = false;
    }
}

/// Terminal sink that records every atlas it receives.
#[derive(Debug, Default)]
pub struct AtlasCollector {
    state: SinkState,
    current: Option<MappedAtlas>,
    atlases: Vec<MappedAtlas>,
}

impl AtlasCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atlases(&self) -> &[MappedAtlas] {
        &self.atlases
    }

    pub fn into_atlases(self) -> Vec<MappedAtlas> {
        self.atlases
    }

    /// True once an atlas closed with `finalize = true` has been received.
    pub fn is_finalized(&self) -> bool {
        self.atlases.last().is_some_and(|a| a.finalized)
    }
}

impl AtlasSink for AtlasCollector {
    fn begin_atlas(&mut self, spec: &AtlasSpec) -> Result<()> {
        self.state.open("collector")?;
        self.current = Some(MappedAtlas {
            spec: spec.clone(),
            items: Vec::new(),
            finalized: false,
        });
        Ok(())
    }

    fn add_item(&mut self, item: &AtlasItem) -> Result<()> {
        self.state.ensure_open("collector")?;
        if let Some(atlas) = self.current.as_mut() {
            atlas.items.push(item.clone());
        }
        Ok(())
    }

    fn end_atlas(&mut self, finalize: bool) -> Result<()> {
        self.state.close("collector")?;
        if let Some(mut atlas) = self.current.take() {
            atlas.finalized = finalize;
            self.atlases.push(atlas);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.state.reset();
        self.current = None;
    }
}
