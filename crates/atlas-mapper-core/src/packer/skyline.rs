use super::guillotine::score_choice;
use super::{PackingStrategy, merge_adjacent, occupancy_of, placement_of, prune_contained, subtract};
use crate::config::{GuillotineChoice, SkylineHeuristic};
use crate::model::{Placement, Rect};

/// One horizontal segment of the skyline; `y` is the first free row above it.
#[derive(Clone, Copy, Debug)]
struct SkylineNode {
    x: u32,
    y: u32,
    w: u32,
}

impl SkylineNode {
    #[inline]
    fn end(&self) -> u32 {
        self.x + self.w
    }
}

pub struct SkylinePacker {
    width: u32,
    height: u32,
    skylines: Vec<SkylineNode>,
    heuristic: SkylineHeuristic,
    waste: Option<WasteMap>,
    allow_rotation: bool,
    used_area: u64,
}

impl SkylinePacker {
    pub fn new(
        width: u32,
        height: u32,
        heuristic: SkylineHeuristic,
        use_waste_map: bool,
        allow_rotation: bool,
    ) -> Self {
        Self {
            width,
            height,
            skylines: vec![SkylineNode { x: 0, y: 0, w: width }],
            heuristic,
            waste: use_waste_map.then(WasteMap::default),
            allow_rotation,
            used_area: 0,
        }
    }

    fn can_put(&self, mut i: usize, w: u32, h: u32) -> Option<Rect> {
        let mut rect = Rect::new(self.skylines[i].x, 0, w, h);
        if rect.x + w > self.width {
            return None;
        }
        let mut width_left = w;
        loop {
            rect.y = rect.y.max(self.skylines[i].y);
            if rect.y + h > self.height {
                return None;
            }
            if self.skylines[i].w >= width_left {
                return Some(rect);
            }
            width_left -= self.skylines[i].w;
            i += 1;
            if i >= self.skylines.len() {
                return None;
            }
        }
    }

    fn orientations(&self, w: u32, h: u32, rotate: bool) -> impl Iterator<Item = (u32, u32)> {
        [(w, h, true), (h, w, rotate && w != h)]
            .into_iter()
            .filter(|o| o.2)
            .map(|o| (o.0, o.1))
    }

    fn find_skyline(&self, w: u32, h: u32, rotate: bool) -> Option<(usize, Rect)> {
        // (primary, secondary) scores, lower is better
        let mut best: Option<((u64, u64), usize, Rect)> = None;
        for i in 0..self.skylines.len() {
            for (cw, ch) in self.orientations(w, h, rotate) {
                let Some(r) = self.can_put(i, cw, ch) else {
                    continue;
                };
                let bottom = (r.y + r.h) as u64;
                let score = match self.heuristic {
                    SkylineHeuristic::BottomLeft => (bottom, self.skylines[i].w as u64),
                    SkylineHeuristic::MinWaste => (self.wasted_area_for(i, &r), bottom),
                };
                if best.as_ref().is_none_or(|b| score < b.0) {
                    best = Some((score, i, r));
                }
            }
        }
        best.map(|(_, i, r)| (i, r))
    }

    fn wasted_area_for(&self, start: usize, r: &Rect) -> u64 {
        let mut area: u64 = 0;
        let mut width_left = r.w;
        let mut i = start;
        while width_left > 0 && i < self.skylines.len() {
            let seg = &self.skylines[i];
            let use_w = width_left.min(seg.w);
            if seg.y < r.y {
                area += (r.y - seg.y) as u64 * use_w as u64;
            }
            width_left -= use_w;
            i += 1;
        }
        area
    }

    fn split(&mut self, index: usize, rect: &Rect) {
        let node = SkylineNode {
            x: rect.x,
            y: rect.y + rect.h,
            w: rect.w,
        };
        debug_assert!(node.end() <= self.width);
        self.skylines.insert(index, node);

        let i = index + 1;
        while i < self.skylines.len() {
            let prev_end = self.skylines[i - 1].end();
            if self.skylines[i].x >= prev_end {
                break;
            }
            let shrink = prev_end - self.skylines[i].x;
            if self.skylines[i].w <= shrink {
                self.skylines.remove(i);
            } else {
                self.skylines[i].x += shrink;
                self.skylines[i].w -= shrink;
                break;
            }
        }
    }

    fn merge(&mut self) {
        let mut i = 1;
        while i < self.skylines.len() {
            if self.skylines[i - 1].y == self.skylines[i].y {
                self.skylines[i - 1].w += self.skylines[i].w;
                self.skylines.remove(i);
            } else {
                i += 1;
            }
        }
    }

    /// Records the gaps left between the old skyline and the underside of `rect`.
    fn add_waste_areas(&mut self, index: usize, rect: &Rect) {
        let Some(wm) = self.waste.as_mut() else {
            return;
        };
        let rect_end = rect.x + rect.w;
        let mut i = index;
        while i < self.skylines.len() && self.skylines[i].x < rect_end {
            let seg = self.skylines[i];
            if seg.end() <= rect.x {
                break;
            }
            let left = seg.x.max(rect.x);
            let right = seg.end().min(rect_end);
            if seg.y < rect.y && right > left {
                wm.add_area(Rect::new(left, seg.y, right - left, rect.y - seg.y));
            }
            i += 1;
        }
    }
}

impl PackingStrategy for SkylinePacker {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn occupancy(&self) -> f32 {
        occupancy_of(self.used_area, self.width, self.height)
    }

    fn clear(&mut self) {
        self.skylines.clear();
        self.skylines.push(SkylineNode {
            x: 0,
            y: 0,
            w: self.width,
        });
        if let Some(wm) = self.waste.as_mut() {
            wm.free.clear();
        }
        self.used_area = 0;
    }

    fn insert(&mut self, width: u32, height: u32, allow_rotation: bool) -> Option<Placement> {
        if width == 0 || height == 0 {
            return None;
        }
        let rotate = self.allow_rotation && allow_rotation;

        // Try waste map first
        if let Some(wm) = self.waste.as_mut() {
            if let Some(place) = wm.try_pack(width, height, rotate) {
                self.used_area += place.area();
                return Some(placement_of(width, height, place));
            }
        }

        let (i, place) = self.find_skyline(width, height, rotate)?;
        // The waste areas are measured against the skyline before the split.
        self.add_waste_areas(i, &place);
        self.split(i, &place);
        self.merge();
        self.used_area += place.area();
        Some(placement_of(width, height, place))
    }
}

/// Free rectangles recovered from underneath the skyline.
#[derive(Clone, Default)]
struct WasteMap {
    free: Vec<Rect>,
}

impl WasteMap {
    fn try_pack(&mut self, w: u32, h: u32, rotate: bool) -> Option<Rect> {
        let r = self.choose(w, h, rotate)?;
        self.place(&r);
        Some(r)
    }

    fn choose(&self, w: u32, h: u32, rotate: bool) -> Option<Rect> {
        let mut best: Option<((i64, i64), Rect)> = None;
        for fr in &self.free {
            for (cw, ch, enabled) in [(w, h, true), (h, w, rotate && w != h)] {
                if !enabled || fr.w < cw || fr.h < ch {
                    continue;
                }
                let score = score_choice(GuillotineChoice::BestShortSideFit, fr, cw, ch);
                if best.as_ref().is_none_or(|b| score < b.0) {
                    best = Some((score, Rect::new(fr.x, fr.y, cw, ch)));
                }
            }
        }
        best.map(|(_, r)| r)
    }

    fn place(&mut self, node: &Rect) {
        // keep the list disjoint from the placed node
        let mut new_free: Vec<Rect> = Vec::with_capacity(self.free.len() + 2);
        for fr in self.free.drain(..) {
            if fr.intersects(node) {
                subtract(&fr, node, &mut new_free);
            } else {
                new_free.push(fr);
            }
        }
        self.free = new_free;
        prune_contained(&mut self.free);
        merge_adjacent(&mut self.free);
    }

    fn add_area(&mut self, r: Rect) {
        if r.w > 0 && r.h > 0 {
            self.free.push(r);
        }
        prune_contained(&mut self.free);
        merge_adjacent(&mut self.free);
    }
}
