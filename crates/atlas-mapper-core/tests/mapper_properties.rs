use atlas_mapper_core::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

const PADDING: u32 = 1;
const BOUND: u32 = 256;

fn random_items(seed: u64, n: usize) -> Vec<AtlasItem> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let w = rng.gen_range(1..=90);
            let h = rng.gen_range(1..=90);
            AtlasItem::new(format!("sprites/s{i}.png"), w, h).allow_rotation(rng.gen_bool(0.8))
        })
        .collect()
}

fn map_all(cfg: MapperConfig, items: &[AtlasItem]) -> Vec<MappedAtlas> {
    let mut m = AtlasMapper::new(cfg, AtlasCollector::new());
    m.begin_atlas(&AtlasSpec::new(BOUND, BOUND).with_padding(PADDING))
        .unwrap();
    for item in items {
        m.add_item(item).unwrap();
    }
    m.end_atlas(true).unwrap();
    m.into_sink().into_atlases()
}

fn configs() -> Vec<MapperConfig> {
    let mut out = Vec::new();
    for sizing in [SizingPolicy::Constant, SizingPolicy::BestFit, SizingPolicy::SqPow2] {
        for family in [
            AlgorithmFamily::MaxRects,
            AlgorithmFamily::Skyline,
            AlgorithmFamily::Guillotine,
        ] {
            out.push(MapperConfig::builder().sizing(sizing).family(family).build());
        }
    }
    out
}

#[test]
fn every_item_is_emitted_exactly_once() {
    let items = random_items(42, 120);
    for cfg in configs() {
        let atlases = map_all(cfg.clone(), &items);
        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        for a in &atlases {
            for item in &a.items {
                *seen.entry(item.key.as_str()).or_default() += 1;
            }
        }
        assert_eq!(seen.len(), items.len(), "{cfg:?}");
        assert!(seen.values().all(|&n| n == 1), "{cfg:?}");
    }
}

#[test]
fn padded_boxes_are_disjoint_and_inside_the_atlas() {
    let items = random_items(3, 120);
    for cfg in configs() {
        for a in map_all(cfg.clone(), &items) {
            let (w, h) = (a.spec.width, a.spec.height);
            let boxes: Vec<Rect> = a
                .items
                .iter()
                .map(|i| i.placement.frame.inflate(PADDING))
                .collect();
            for (item, b) in a.items.iter().zip(&boxes) {
                let f = item.placement.frame;
                assert!(f.x >= PADDING && f.y >= PADDING, "{cfg:?}: {f:?}");
                assert!(b.x + b.w <= w && b.y + b.h <= h, "{cfg:?}: {b:?} in {w}x{h}");
                let expected = if item.placement.rotated {
                    (item.height, item.width)
                } else {
                    (item.width, item.height)
                };
                assert_eq!((f.w, f.h), expected);
                if !item.allow_rotation {
                    assert!(!item.placement.rotated);
                }
            }
            for i in 0..boxes.len() {
                for j in (i + 1)..boxes.len() {
                    assert!(!boxes[i].intersects(&boxes[j]), "{cfg:?}: {:?} vs {:?}", boxes[i], boxes[j]);
                }
            }
        }
    }
}

#[test]
fn atlas_sizes_follow_the_sizing_policy() {
    let items = random_items(11, 100);
    for cfg in configs() {
        let atlases = map_all(cfg.clone(), &items);
        assert!(!atlases.is_empty());
        for a in &atlases {
            let (w, h) = (a.spec.width, a.spec.height);
            match cfg.sizing {
                SizingPolicy::Constant => assert_eq!((w, h), (BOUND, BOUND)),
                // compaction never grows the bin
                SizingPolicy::BestFit => assert!(w <= BOUND && h <= BOUND && w == h, "{cfg:?}"),
                SizingPolicy::SqPow2 => {
                    assert_eq!(w, h);
                    assert!(w.is_power_of_two() && w <= BOUND, "{cfg:?}: {w}");
                }
            }
            assert!((0.0..=1.0).contains(&a.spec.occupancy));
            assert!(!a.items.is_empty());
        }
    }
}

#[test]
fn only_the_last_atlas_is_finalized() {
    let items = random_items(5, 150);
    for cfg in configs() {
        let atlases = map_all(cfg.clone(), &items);
        let finals: Vec<bool> = atlases.iter().map(|a| a.finalized).collect();
        assert_eq!(finals.last(), Some(&true), "{cfg:?}");
        assert!(finals[..finals.len() - 1].iter().all(|f| !f), "{cfg:?}");
    }
}

#[test]
fn not_finalizing_keeps_every_end_open() {
    let items = random_items(8, 60);
    let mut m = AtlasMapper::new(MapperConfig::default(), AtlasCollector::new());
    m.begin_atlas(&AtlasSpec::new(BOUND, BOUND)).unwrap();
    for item in &items {
        m.add_item(item).unwrap();
    }
    m.end_atlas(false).unwrap();
    assert!(m.sink().atlases().iter().all(|a| !a.finalized));
    assert!(!m.sink().is_finalized());
}

#[test]
fn mapping_is_deterministic() {
    let items = random_items(99, 80);
    for cfg in configs() {
        let a = map_all(cfg.clone(), &items);
        let b = map_all(cfg.clone(), &items);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.spec, y.spec);
            let px: Vec<_> = x.items.iter().map(|i| (&i.key, i.placement)).collect();
            let py: Vec<_> = y.items.iter().map(|i| (&i.key, i.placement)).collect();
            assert_eq!(px, py);
        }
    }
}

#[test]
fn stats_add_up() {
    let items = random_items(21, 50);
    let atlases = map_all(MapperConfig::default(), &items);
    let stats = MappingStats::from_atlases(&atlases);
    assert_eq!(stats.num_atlases, atlases.len());
    assert_eq!(stats.num_items, items.len());
    let used: u64 = items.iter().map(|i| i.width as u64 * i.height as u64).sum();
    assert_eq!(stats.used_item_area, used);
    assert!(stats.occupancy > 0.0 && stats.occupancy <= 1.0);
    assert_eq!(stats.wasted_area(), stats.total_atlas_area - used);
}
