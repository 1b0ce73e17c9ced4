use crate::error::{MapperError, Result};
use crate::mapper::WeightedItem;
use crate::model::Placement;
use crate::packer::PackingStrategy;

/// One placed item, remembered so the bin can be replayed.
#[derive(Debug, Clone)]
pub(crate) struct BinEntry {
    /// Position of the item in the mapper's pending queue.
    pub index: usize,
    pub key: String,
    pub width: u32,
    pub height: u32,
    pub allow_rotation: bool,
    pub square: u64,
    /// Final (unpadded) placement.
    pub placement: Placement,
}

/// A packing strategy plus the bookkeeping needed to replay and compact it.
///
/// Entries are kept in placement order; `square` and `min_edge` always
/// describe exactly those entries.
pub(crate) struct Bin {
    strategy: Box<dyn PackingStrategy>,
    padding: u32,
    entries: Vec<BinEntry>,
    square: u64,
    min_edge: u32,
}

impl Bin {
    pub fn new(strategy: Box<dyn PackingStrategy>, padding: u32) -> Self {
        Self {
            strategy,
            padding,
            entries: Vec::new(),
            square: 0,
            min_edge: 0,
        }
    }

    /// Inserts the padded item; the returned box is already shrunk back.
    fn insert_padded(&mut self, width: u32, height: u32, allow_rotation: bool) -> Option<Placement> {
        let extra = self.padding * 2;
        let placed = self
            .strategy
            .insert(width + extra, height + extra, allow_rotation)?;
        let edge = placed.frame.w.max(placed.frame.h);
        self.min_edge = self.min_edge.max(edge);
        Some(Placement {
            frame: placed.frame.shrink(self.padding),
            rotated: placed.rotated,
        })
    }

    pub fn try_insert(&mut self, index: usize, item: &WeightedItem) -> bool {
        let spec = &item.item;
        let Some(placement) = self.insert_padded(spec.width, spec.height, spec.allow_rotation)
        else {
            return false;
        };
        self.square += item.square;
        self.entries.push(BinEntry {
            index,
            key: spec.key.clone(),
            width: spec.width,
            height: spec.height,
            allow_rotation: spec.allow_rotation,
            square: item.square,
            placement,
        });
        true
    }

    fn try_insert_entry(&mut self, entry: &BinEntry) -> bool {
        let Some(placement) = self.insert_padded(entry.width, entry.height, entry.allow_rotation)
        else {
            return false;
        };
        self.square += entry.square;
        self.entries.push(BinEntry {
            placement,
            ..entry.clone()
        });
        true
    }

    /// Replays this bin's entries, in order, into `other`.
    /// Returns false as soon as one entry does not fit.
    pub fn replay_into(&self, other: &mut Bin) -> bool {
        self.entries.iter().all(|e| other.try_insert_entry(e))
    }

    /// Clears the strategy and re-inserts every entry in placement order.
    pub fn rebuild(&mut self) -> Result<()> {
        self.strategy.clear();
        self.square = 0;
        self.min_edge = 0;
        let entries = std::mem::take(&mut self.entries);
        for entry in &entries {
            if !self.try_insert_entry(entry) {
                let (width, height) = self.size();
                return Err(MapperError::RebuildFailed {
                    key: entry.key.clone(),
                    width,
                    height,
                });
            }
        }
        Ok(())
    }

    pub fn size(&self) -> (u32, u32) {
        self.strategy.dimensions()
    }

    pub fn occupancy(&self) -> f32 {
        self.strategy.occupancy()
    }

    pub fn square(&self) -> u64 {
        self.square
    }

    pub fn min_edge(&self) -> u32 {
        self.min_edge
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[BinEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyConfig;
    use crate::model::AtlasItem;
    use crate::packer::create_strategy;

    fn weighted(key: &str, w: u32, h: u32, padding: u32) -> WeightedItem {
        WeightedItem::new(AtlasItem::new(key, w, h), padding)
    }

    fn filled_bin(padding: u32) -> Bin {
        let cfg = StrategyConfig::default();
        let mut bin = Bin::new(create_strategy(&cfg, 128, 128), padding);
        let sizes = [(40, 30), (30, 40), (20, 20), (50, 10), (10, 50)];
        for (i, (w, h)) in sizes.into_iter().enumerate() {
            assert!(bin.try_insert(i, &weighted(&format!("s{i}"), w, h, padding)));
        }
        bin
    }

    #[test]
    fn rebuild_reproduces_totals_and_placements() {
        let mut bin = filled_bin(1);
        let before: Vec<_> = bin.entries().iter().map(|e| (e.index, e.placement)).collect();
        let square = bin.square();
        let min_edge = bin.min_edge();
        let occupancy = bin.occupancy();

        for _ in 0..2 {
            bin.rebuild().expect("rebuild");

            let after: Vec<_> = bin.entries().iter().map(|e| (e.index, e.placement)).collect();
            assert_eq!(before, after);
            assert_eq!(bin.square(), square);
            assert_eq!(bin.min_edge(), min_edge);
            assert_eq!(bin.occupancy(), occupancy);
        }
    }

    #[test]
    fn square_and_min_edge_use_padded_sizes() {
        let bin = filled_bin(2);
        let expected: u64 = [(40, 30), (30, 40), (20, 20), (50, 10), (10, 50)]
            .iter()
            .map(|&(w, h)| (w as u64 + 4) * (h as u64 + 4))
            .sum();
        assert_eq!(bin.square(), expected);
        assert_eq!(bin.min_edge(), 54);
        for e in bin.entries() {
            let f = e.placement.frame;
            let (fw, fh) = if e.placement.rotated {
                (e.height, e.width)
            } else {
                (e.width, e.height)
            };
            assert_eq!((f.w, f.h), (fw, fh));
            assert!(f.x >= 2 && f.y >= 2);
        }
    }

    #[test]
    fn rebuild_into_smaller_strategy_fails() {
        let mut bin = filled_bin(0);
        let cfg = StrategyConfig::default();
        bin.strategy = create_strategy(&cfg, 32, 32);
        let err = bin.rebuild().unwrap_err();
        assert!(matches!(err, MapperError::RebuildFailed { width: 32, height: 32, .. }));
    }

    #[test]
    fn failed_insert_leaves_bin_untouched() {
        let mut bin = filled_bin(0);
        let len = bin.len();
        let square = bin.square();
        assert!(!bin.try_insert(99, &weighted("huge", 200, 10, 0)));
        assert_eq!(bin.len(), len);
        assert_eq!(bin.square(), square);
    }
}
