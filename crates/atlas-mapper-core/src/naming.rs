use crate::error::Result;
use crate::model::{AtlasItem, AtlasSpec, default_atlas_name};
use crate::sink::{AtlasSink, SinkState};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Directory name an item belongs to, or the default atlas name.
fn dir_name_of(item: &AtlasItem) -> String {
    Path::new(&item.key)
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(default_atlas_name)
}

/// Names atlases and, optionally, splits them on directory changes.
///
/// With `naming_after_dir`, every atlas is named after the parent directory
/// of its first item and a new atlas is started whenever an item comes from
/// another directory. Reused names get a counter suffix: `ui`, `ui1`, `ui2`.
///
/// Downstream `begin_atlas` is delayed until the first item arrives so the
/// forwarded spec already carries the final name.
pub struct AtlasNaming<S: AtlasSink> {
    sink: S,
    naming_after_dir: bool,
    state: SinkState,
    template: AtlasSpec,
    begin_pending: bool,
    used_names: HashMap<String, u32>,
    last_name: Option<String>,
    next_atlas: bool,
}

impl<S: AtlasSink> AtlasNaming<S> {
    pub fn new(naming_after_dir: bool, sink: S) -> Self {
        Self {
            sink,
            naming_after_dir,
            state: SinkState::default(),
            template: AtlasSpec::default(),
            begin_pending: false,
            used_names: HashMap::new(),
            last_name: None,
            next_atlas: false,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Name of the current (or last) atlas.
    pub fn atlas_name(&self) -> String {
        let Some(last) = self.last_name.as_deref() else {
            return default_atlas_name();
        };
        match self.used_names.get(last) {
            Some(0) | None => last.to_owned(),
            Some(n) => format!("{last}{n}"),
        }
    }

    fn name_of(&self, item: &AtlasItem) -> String {
        if self.naming_after_dir {
            dir_name_of(item)
        } else {
            default_atlas_name()
        }
    }

    fn record_name(&mut self, item: &AtlasItem) {
        let name = self.name_of(item);
        if self.last_name.as_deref() == Some(name.as_str()) && !self.next_atlas {
            return;
        }
        self.used_names
            .entry(name.clone())
            .and_modify(|n| *n += 1)
            .or_insert(0);
        self.last_name = Some(name);
    }

    fn splitting_required(&self, item: &AtlasItem) -> bool {
        if !self.naming_after_dir || self.next_atlas {
            return false;
        }
        match self.last_name.as_deref() {
            Some(last) => dir_name_of(item) != last,
            None => false,
        }
    }

    fn forward_begin(&mut self) -> Result<()> {
        let spec = AtlasSpec {
            name: self.atlas_name(),
            ..self.template.clone()
        };
        debug!(name = %spec.name, "naming atlas");
        self.begin_pending = false;
        self.sink.begin_atlas(&spec)
    }
}

impl<S: AtlasSink> AtlasSink for AtlasNaming<S> {
    fn begin_atlas(&mut self, spec: &AtlasSpec) -> Result<()> {
        self.state.open("naming")?;
        self.template = spec.clone();
        self.begin_pending = true;
        Ok(())
    }

    fn add_item(&mut self, item: &AtlasItem) -> Result<()> {
        self.state.ensure_open("naming")?;
        if !self.begin_pending && self.splitting_required(item) {
            debug!(key = %item.key, "directory changed, splitting atlas");
            self.sink.end_atlas(false)?;
            self.begin_pending = true;
        }
        self.record_name(item);
        self.next_atlas = false;
        if self.begin_pending {
            self.forward_begin()?;
        }
        self.sink.add_item(item)
    }

    fn end_atlas(&mut self, finalize: bool) -> Result<()> {
        self.state.close("naming")?;
        if self.begin_pending {
            self.forward_begin()?;
        }
        self.next_atlas = true;
        self.sink.end_atlas(finalize)
    }

    fn reset(&mut self) {
        self.state.reset();
        self.begin_pending = false;
        self.used_names.clear();
        self.last_name = None;
        self.next_atlas = false;
        self.sink.reset();
    }
}
