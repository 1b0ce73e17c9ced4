use atlas_mapper_core::config::{
    AlgorithmFamily, GuillotineChoice, GuillotineSplit, MaxRectsHeuristic, SkylineHeuristic,
    StrategyConfig,
};
use atlas_mapper_core::model::Placement;
use atlas_mapper_core::packer::{PackingStrategy, create_strategy};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn disjoint(placements: &[Placement]) -> bool {
    for i in 0..placements.len() {
        for j in (i + 1)..placements.len() {
            if placements[i].frame.intersects(&placements[j].frame) {
                return false;
            }
        }
    }
    true
}

fn all_configs() -> Vec<StrategyConfig> {
    let mut out = Vec::new();
    for h in [
        MaxRectsHeuristic::BestShortSideFit,
        MaxRectsHeuristic::BestLongSideFit,
        MaxRectsHeuristic::BestAreaFit,
        MaxRectsHeuristic::BottomLeft,
        MaxRectsHeuristic::ContactPoint,
    ] {
        out.push(StrategyConfig {
            family: AlgorithmFamily::MaxRects,
            mr_heuristic: h,
            ..Default::default()
        });
    }
    for h in [SkylineHeuristic::BottomLeft, SkylineHeuristic::MinWaste] {
        for waste in [false, true] {
            out.push(StrategyConfig {
                family: AlgorithmFamily::Skyline,
                skyline_heuristic: h,
                use_waste_map: waste,
                ..Default::default()
            });
        }
    }
    for (choice, split) in [
        (GuillotineChoice::BestAreaFit, GuillotineSplit::SplitMinimizeArea),
        (GuillotineChoice::BestShortSideFit, GuillotineSplit::SplitShorterLeftoverAxis),
        (GuillotineChoice::WorstAreaFit, GuillotineSplit::SplitLongerAxis),
    ] {
        for merge in [false, true] {
            out.push(StrategyConfig {
                family: AlgorithmFamily::Guillotine,
                g_choice: choice,
                g_split: split,
                use_merge: merge,
                ..Default::default()
            });
        }
    }
    out
}

fn random_sizes(seed: u64, n: usize) -> Vec<(u32, u32)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (rng.gen_range(4..=64), rng.gen_range(4..=64)))
        .collect()
}

#[test]
fn placements_are_disjoint_and_inside_the_bin() {
    let sizes = random_sizes(7, 200);
    for cfg in all_configs() {
        let mut s = create_strategy(&cfg, 512, 512);
        assert_eq!(s.dimensions(), (512, 512));
        let mut placed = Vec::new();
        let mut area = 0u64;
        for &(w, h) in &sizes {
            if let Some(p) = s.insert(w, h, true) {
                let f = p.frame;
                assert!(f.x + f.w <= 512 && f.y + f.h <= 512, "{cfg:?}: {f:?} out of bounds");
                let expected = if p.rotated { (h, w) } else { (w, h) };
                assert_eq!((f.w, f.h), expected, "{cfg:?}");
                area += f.area();
                placed.push(p);
            }
        }
        assert!(!placed.is_empty());
        assert!(disjoint(&placed), "{cfg:?} produced overlapping placements");
        let expected_occ = area as f64 / (512.0 * 512.0);
        assert!((s.occupancy() as f64 - expected_occ).abs() < 1e-4, "{cfg:?}");
    }
}

#[test]
fn failed_insert_leaves_state_unchanged() {
    for cfg in all_configs() {
        let mut s = create_strategy(&cfg, 128, 128);
        assert!(s.insert(100, 100, true).is_some());
        let occ = s.occupancy();
        assert!(s.insert(129, 1, true).is_none());
        assert!(s.insert(100, 100, true).is_none());
        assert_eq!(s.occupancy(), occ);
        // the remaining free space is still usable
        assert!(s.insert(20, 20, true).is_some(), "{cfg:?}");
    }
}

#[test]
fn clear_forgets_placements() {
    for cfg in all_configs() {
        let mut s = create_strategy(&cfg, 64, 64);
        assert!(s.insert(64, 64, true).is_some());
        assert!(s.insert(1, 1, true).is_none());
        s.clear();
        assert_eq!(s.occupancy(), 0.0);
        assert_eq!(s.dimensions(), (64, 64));
        assert!(s.insert(64, 64, true).is_some(), "{cfg:?}");
    }
}

#[test]
fn rotation_requires_item_and_strategy_consent() {
    for cfg in all_configs() {
        // only fits when turned
        let mut s = create_strategy(&cfg, 100, 20);
        assert!(s.insert(20, 100, false).is_none(), "{cfg:?}");
        let p = s.insert(20, 100, true).expect("rotated fit");
        assert!(p.rotated);
        assert_eq!((p.frame.w, p.frame.h), (100, 20));

        let no_rot = StrategyConfig {
            allow_rotation: false,
            ..cfg.clone()
        };
        let mut s = create_strategy(&no_rot, 100, 20);
        assert!(s.insert(20, 100, true).is_none(), "{no_rot:?}");
    }
}

#[test]
fn zero_sized_rectangles_are_refused() {
    for cfg in all_configs() {
        let mut s = create_strategy(&cfg, 32, 32);
        assert!(s.insert(0, 10, true).is_none());
        assert!(s.insert(10, 0, true).is_none());
        assert_eq!(s.occupancy(), 0.0);
    }
}

#[test]
fn exact_fill_with_equal_tiles() {
    for cfg in all_configs() {
        let mut s = create_strategy(&cfg, 64, 64);
        let mut placed = Vec::new();
        for _ in 0..16 {
            placed.push(s.insert(16, 16, true).expect("tile fits"));
        }
        assert!(disjoint(&placed));
        assert!((s.occupancy() - 1.0).abs() < 1e-6, "{cfg:?}");
        assert!(s.insert(1, 1, true).is_none());
    }
}
