use crate::bin::Bin;
use crate::config::{MapperConfig, SizingPolicy};
use crate::error::{MapperError, Result};
use crate::model::{AtlasItem, AtlasSpec};
use crate::packer::create_strategy;
use crate::sink::{AtlasSink, SinkState};
use tracing::{debug, error, info, instrument};

/// An admitted item with the weights used to order the pending queue.
#[derive(Debug, Clone)]
pub(crate) struct WeightedItem {
    pub item: AtlasItem,
    /// Padded area.
    pub square: u64,
    /// Smallest `e` with `2^e >= max(padded w, padded h)`.
    pub size_class: u32,
}

impl WeightedItem {
    pub fn new(item: AtlasItem, padding: u32) -> Self {
        let pw = item.width + padding * 2;
        let ph = item.height + padding * 2;
        Self {
            square: pw as u64 * ph as u64,
            size_class: ceil_log2(pw.max(ph)),
            item,
        }
    }
}

fn ceil_log2(v: u32) -> u32 {
    if v <= 1 {
        0
    } else {
        u32::BITS - (v - 1).leading_zeros()
    }
}

/// Side of the square power-of-two bin for the current pending queue, or
/// `None` when the template gives nothing to work with.
fn sqpow2_side(template: &AtlasSpec, pending_square: u64, first_class: Option<u32>) -> Option<u32> {
    let max_edge = template.width.max(template.height);
    if max_edge == 0 || pending_square == 0 {
        return None;
    }
    let square_exp = (pending_square as f64).log2() / 2.0;
    let edge_exp = (max_edge as f64).log2();
    let mut exp = square_exp.min(edge_exp).ceil() as u32;
    if let Some(class) = first_class {
        exp = exp.max(class);
    }
    1u32.checked_shl(exp)
}

/// Packs collected items into as many atlases as needed and emits them downstream.
///
/// Items are buffered between `begin_atlas` and `end_atlas`; the whole
/// packing work happens in `end_atlas`, which emits one or more complete
/// atlases to the wrapped sink. Only the last of them carries the caller's
/// `finalize` flag.
pub struct AtlasMapper<S: AtlasSink> {
    config: MapperConfig,
    sink: S,
    state: SinkState,
    template: AtlasSpec,
    pending: Vec<WeightedItem>,
    pending_square: u64,
}

impl<S: AtlasSink> AtlasMapper<S> {
    pub fn new(config: MapperConfig, sink: S) -> Self {
        Self {
            config,
            sink,
            state: SinkState::default(),
            template: AtlasSpec::default(),
            pending: Vec::new(),
            pending_square: 0,
        }
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Number of items waiting to be packed.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn sort_pending(&mut self) {
        match self.config.sizing {
            SizingPolicy::SqPow2 => self
                .pending
                .sort_by(|a, b| (b.size_class, b.square).cmp(&(a.size_class, a.square))),
            SizingPolicy::Constant | SizingPolicy::BestFit => {
                self.pending.sort_by(|a, b| b.square.cmp(&a.square))
            }
        }
    }

    fn bin_size(&self) -> (u32, u32) {
        let fixed = (self.template.width, self.template.height);
        match self.config.sizing {
            SizingPolicy::SqPow2 => {
                let first = self.pending.first().map(|w| w.size_class);
                match sqpow2_side(&self.template, self.pending_square, first) {
                    Some(side) => (side, side),
                    None => fixed,
                }
            }
            SizingPolicy::Constant | SizingPolicy::BestFit => fixed,
        }
    }

    fn new_bin(&self, width: u32, height: u32) -> Bin {
        Bin::new(
            create_strategy(&self.config.strategy, width, height),
            self.template.padding,
        )
    }

    /// Greedy pass over the pending queue; items that do not fit stay pending.
    fn fill(&self, bin: &mut Bin) -> Result<()> {
        for (index, item) in self.pending.iter().enumerate() {
            bin.try_insert(index, item);
        }
        if bin.is_empty() && !self.pending.is_empty() {
            let (width, height) = bin.size();
            return Err(MapperError::ZeroProgress {
                pending: self.pending.len(),
                width,
                height,
            });
        }
        Ok(())
    }

    /// Shrinks a best-fit bin toward the smallest square that still holds its items.
    fn compact(&self, mut bin: Bin) -> Bin {
        let (w, h) = bin.size();
        let best_edge = bin.min_edge().max(bin.square().isqrt() as u32);
        let mut max_edge = w.max(h);
        let mut floating = best_edge;
        let mut last_failed = false;

        while max_edge.saturating_sub(floating) / 2 > 0 {
            let mut candidate = self.new_bin(floating, floating);
            if bin.replay_into(&mut candidate) {
                debug!(edge = floating, "compacted bin");
                bin = candidate;
                max_edge = floating;
                floating = best_edge;
                last_failed = false;
            } else {
                floating += (max_edge - floating) / 2;
                last_failed = true;
            }
        }

        // last candidate failed: replay the working bin at its last good size
        if last_failed {
            if let Err(e) = bin.rebuild() {
                error!(error = %e, "failed to rebuild bin after compaction");
            }
        }
        bin
    }

    /// Emits the bin as one atlas and removes its items from the queue.
    fn flush(&mut self, bin: Bin, finalize: bool) -> Result<()> {
        let (width, height) = bin.size();
        let spec = AtlasSpec {
            width,
            height,
            occupancy: bin.occupancy(),
            ..self.template.clone()
        };
        info!(
            width,
            height,
            items = bin.len(),
            occupancy = spec.occupancy,
            "emitting atlas"
        );

        self.sink.begin_atlas(&spec)?;

        let mut slots: Vec<Option<WeightedItem>> =
            std::mem::take(&mut self.pending).into_iter().map(Some).collect();
        for entry in bin.entries() {
            let Some(mut weighted) = slots[entry.index].take() else {
                continue;
            };
            weighted.item.placement = entry.placement;
            self.pending_square -= weighted.square;
            self.sink.add_item(&weighted.item)?;
        }
        self.pending = slots.into_iter().flatten().collect();

        self.sink.end_atlas(finalize && self.pending.is_empty())
    }
}

impl<S: AtlasSink> AtlasSink for AtlasMapper<S> {
    fn begin_atlas(&mut self, spec: &AtlasSpec) -> Result<()> {
        self.state.open("mapper")?;
        self.template = spec.clone();
        self.pending.clear();
        self.pending_square = 0;
        Ok(())
    }

    fn add_item(&mut self, item: &AtlasItem) -> Result<()> {
        self.state.ensure_open("mapper")?;
        if item.width == 0 || item.height == 0 {
            return Err(MapperError::InvalidItem(format!(
                "'{}' has zero size ({}x{})",
                item.key, item.width, item.height
            )));
        }
        let padding = self.template.padding;
        let padded = |v: u32| padding.checked_mul(2).and_then(|extra| v.checked_add(extra));
        let fits = match (padded(item.width), padded(item.height)) {
            (Some(pw), Some(ph)) => pw < self.template.width && ph < self.template.height,
            _ => false,
        };
        if !fits {
            return Err(MapperError::ItemTooLarge {
                key: item.key.clone(),
                width: item.width,
                height: item.height,
                padding,
                max_width: self.template.width,
                max_height: self.template.height,
            });
        }
        let weighted = WeightedItem::new(item.clone(), padding);
        self.pending_square += weighted.square;
        self.pending.push(weighted);
        Ok(())
    }

    #[instrument(skip_all, fields(sizing = self.config.sizing.name(), items = self.pending.len()))]
    fn end_atlas(&mut self, finalize: bool) -> Result<()> {
        self.state.close("mapper")?;
        self.sort_pending();
        loop {
            let (width, height) = self.bin_size();
            debug!(width, height, pending = self.pending.len(), "sizing bin");
            let mut bin = self.new_bin(width, height);
            self.fill(&mut bin)?;
            if self.config.sizing == SizingPolicy::BestFit && !bin.is_empty() {
                info!(occupancy = bin.occupancy(), "initial occupancy");
                bin = self.compact(bin);
            }
            self.flush(bin, finalize)?;
            if self.pending.is_empty() {
                return Ok(());
            }
        }
    }

    fn reset(&mut self) {
        self.state.reset();
        self.pending.clear();
        self.pending_square = 0;
        self.sink.reset();
    }
}
