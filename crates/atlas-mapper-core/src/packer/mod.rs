use crate::config::{AlgorithmFamily, StrategyConfig};
use crate::model::{Placement, Rect};

pub mod guillotine;
pub mod maxrects;
pub mod skyline;

/// A packing strategy places rectangles into a bin of fixed dimensions.
///
/// Implementations must ensure no overlaps and never place outside the bin.
/// `insert` returns `None` when no free region can hold the rectangle, and in
/// that case leaves the strategy untouched. Different strategies produce
/// different layouts for identical input; nothing is promised about *where* a
/// rectangle lands.
pub trait PackingStrategy {
    /// Bin dimensions, fixed at construction.
    fn dimensions(&self) -> (u32, u32);
    /// Placed area divided by the bin area, in `[0, 1]`.
    fn occupancy(&self) -> f32;
    /// Forgets every placement; dimensions are unchanged.
    fn clear(&mut self);
    /// Places a `width x height` rectangle, rotating it by 90° only when
    /// `allow_rotation` is set and the strategy is configured to rotate.
    fn insert(&mut self, width: u32, height: u32, allow_rotation: bool) -> Option<Placement>;
}

impl<P: PackingStrategy + ?Sized> PackingStrategy for Box<P> {
    fn dimensions(&self) -> (u32, u32) {
        (**self).dimensions()
    }
    fn occupancy(&self) -> f32 {
        (**self).occupancy()
    }
    fn clear(&mut self) {
        (**self).clear()
    }
    fn insert(&mut self, width: u32, height: u32, allow_rotation: bool) -> Option<Placement> {
        (**self).insert(width, height, allow_rotation)
    }
}

/// Builds the strategy selected by `cfg` for a `width x height` bin.
pub fn create_strategy(cfg: &StrategyConfig, width: u32, height: u32) -> Box<dyn PackingStrategy> {
    match cfg.family {
        AlgorithmFamily::MaxRects => Box::new(maxrects::MaxRectsPacker::new(
            width,
            height,
            cfg.mr_heuristic,
            cfg.allow_rotation,
        )),
        AlgorithmFamily::Skyline => Box::new(skyline::SkylinePacker::new(
            width,
            height,
            cfg.skyline_heuristic,
            cfg.use_waste_map,
            cfg.allow_rotation,
        )),
        AlgorithmFamily::Guillotine => Box::new(guillotine::GuillotinePacker::new(
            width,
            height,
            cfg.g_choice,
            cfg.g_split,
            cfg.use_merge,
            cfg.allow_rotation,
        )),
    }
}

/// Occupancy helper shared by the strategies.
pub(crate) fn occupancy_of(used_area: u64, width: u32, height: u32) -> f32 {
    let total = width as u64 * height as u64;
    if total == 0 {
        0.0
    } else {
        (used_area as f64 / total as f64) as f32
    }
}

/// Builds the placement for a rectangle requested as `w x h` and stored as `place`.
pub(crate) fn placement_of(w: u32, h: u32, place: Rect) -> Placement {
    Placement {
        frame: place,
        rotated: w != h && place.w == h && place.h == w,
    }
}

/// Removes every rectangle fully contained in another one.
pub(crate) fn prune_contained(free: &mut Vec<Rect>) {
    let mut i = 0;
    while i < free.len() {
        let mut j = i + 1;
        let a = free[i];
        let a_x2 = a.x + a.w;
        let a_y2 = a.y + a.h;
        let mut remove_i = false;
        while j < free.len() {
            let b = free[j];
            let b_x2 = b.x + b.w;
            let b_y2 = b.y + b.h;
            // a inside b
            if a.x >= b.x && a.y >= b.y && a_x2 <= b_x2 && a_y2 <= b_y2 {
                remove_i = true;
                break;
            }
            // b inside a
            if b.x >= a.x && b.y >= a.y && b_x2 <= a_x2 && b_y2 <= a_y2 {
                free.remove(j);
                continue;
            }
            j += 1;
        }
        if remove_i {
            free.remove(i);
        } else {
            i += 1;
        }
    }
}

/// Merges adjacent rectangles sharing a full edge until no merge applies.
pub(crate) fn merge_adjacent(free: &mut Vec<Rect>) {
    let mut merged = true;
    while merged {
        merged = false;
        'outer: for i in 0..free.len() {
            for j in i + 1..free.len() {
                let a = free[i];
                let b = free[j];
                // horizontal merge (same y, height, contiguous in x)
                if a.y == b.y && a.h == b.h {
                    if a.x + a.w == b.x {
                        free[i] = Rect::new(a.x, a.y, a.w + b.w, a.h);
                        free.remove(j);
                        merged = true;
                        break 'outer;
                    } else if b.x + b.w == a.x {
                        free[i] = Rect::new(b.x, a.y, a.w + b.w, a.h);
                        free.remove(j);
                        merged = true;
                        break 'outer;
                    }
                }
                // vertical merge (same x, width, contiguous in y)
                if a.x == b.x && a.w == b.w {
                    if a.y + a.h == b.y {
                        free[i] = Rect::new(a.x, a.y, a.w, a.h + b.h);
                        free.remove(j);
                        merged = true;
                        break 'outer;
                    } else if b.y + b.h == a.y {
                        free[i] = Rect::new(a.x, b.y, a.w, a.h + b.h);
                        free.remove(j);
                        merged = true;
                        break 'outer;
                    }
                }
            }
        }
    }
}

/// Splits `fr` around `node`, pushing the free parts (above, below, left, right).
pub(crate) fn subtract(fr: &Rect, node: &Rect, out: &mut Vec<Rect>) {
    let fr_x2 = fr.x + fr.w;
    let fr_y2 = fr.y + fr.h;
    let n_x2 = node.x + node.w;
    let n_y2 = node.y + node.h;

    let ix1 = fr.x.max(node.x);
    let iy1 = fr.y.max(node.y);
    let ix2 = fr_x2.min(n_x2);
    let iy2 = fr_y2.min(n_y2);

    if iy1 > fr.y {
        out.push(Rect::new(fr.x, fr.y, fr.w, iy1 - fr.y));
    }
    if iy2 < fr_y2 {
        out.push(Rect::new(fr.x, iy2, fr.w, fr_y2 - iy2));
    }
    let band = iy2.saturating_sub(iy1);
    if ix1 > fr.x && band > 0 {
        out.push(Rect::new(fr.x, iy1, ix1 - fr.x, band));
    }
    if ix2 < fr_x2 && band > 0 {
        out.push(Rect::new(ix2, iy1, fr_x2 - ix2, band));
    }
}
