use super::{PackingStrategy, occupancy_of, placement_of, prune_contained, subtract};
use crate::config::MaxRectsHeuristic;
use crate::model::{Placement, Rect};

/// Free-rectangle list packer.
pub struct MaxRectsPacker {
    width: u32,
    height: u32,
    free: Vec<Rect>,
    used: Vec<Rect>,
    used_area: u64,
    heuristic: MaxRectsHeuristic,
    allow_rotation: bool,
}

struct Candidate {
    score: (i64, i64, u32, u32),
    rect: Rect,
}

impl MaxRectsPacker {
    pub fn new(width: u32, height: u32, heuristic: MaxRectsHeuristic, allow_rotation: bool) -> Self {
        Self {
            width,
            height,
            free: vec![Rect::new(0, 0, width, height)],
            used: Vec::new(),
            used_area: 0,
            heuristic,
            allow_rotation,
        }
    }

    /// Free list as it would look after placing `node`.
    fn split_free(&self, node: &Rect) -> Vec<Rect> {
        let mut out = Vec::with_capacity(self.free.len() + 4);
        for fr in &self.free {
            if fr.intersects(node) {
                subtract(fr, node, &mut out);
            } else {
                out.push(*fr);
            }
        }
        prune_contained(&mut out);
        out
    }

    fn place_rect(&mut self, node: &Rect) {
        self.free = self.split_free(node);
        self.used.push(*node);
        self.used_area += node.area();
    }

    fn primary_score(&self, fr: &Rect, w: u32, h: u32) -> i64 {
        let leftover_h = (fr.w - w) as i64;
        let leftover_v = (fr.h - h) as i64;
        match self.heuristic {
            MaxRectsHeuristic::BestShortSideFit => leftover_h.min(leftover_v),
            MaxRectsHeuristic::BestLongSideFit => leftover_h.max(leftover_v),
            MaxRectsHeuristic::BestAreaFit => fr.area() as i64 - (w as i64 * h as i64),
            MaxRectsHeuristic::BottomLeft => fr.y as i64 + h as i64,
            // maximize contact; negate for minimization
            MaxRectsHeuristic::ContactPoint => -(self.contact_point_score(fr.x, fr.y, w, h) as i64),
        }
    }

    fn secondary_score(&self, fr: &Rect, node: &Rect) -> i64 {
        let leftover_h = (fr.w - node.w) as i64;
        let leftover_v = (fr.h - node.h) as i64;
        match self.heuristic {
            MaxRectsHeuristic::BestShortSideFit => self.split_free(node).len() as i64,
            MaxRectsHeuristic::BestLongSideFit | MaxRectsHeuristic::BestAreaFit => {
                leftover_h.min(leftover_v)
            }
            MaxRectsHeuristic::BottomLeft => fr.x as i64,
            MaxRectsHeuristic::ContactPoint => fr.area() as i64 - node.area() as i64,
        }
    }

    fn find_position(&self, w: u32, h: u32, rotate: bool) -> Option<Rect> {
        let mut best: Option<Candidate> = None;
        for fr in &self.free {
            for (cw, ch, enabled) in [(w, h, true), (h, w, rotate && w != h)] {
                if !enabled || fr.w < cw || fr.h < ch {
                    continue;
                }
                let s1 = self.primary_score(fr, cw, ch);
                // the secondary score can be expensive; skip hopeless candidates
                if best.as_ref().is_some_and(|b| s1 > b.score.0) {
                    continue;
                }
                let node = Rect::new(fr.x, fr.y, cw, ch);
                let s2 = self.secondary_score(fr, &node);
                let score = (s1, s2, fr.y + ch, fr.x);
                if best.as_ref().is_none_or(|b| score < b.score) {
                    best = Some(Candidate { score, rect: node });
                }
            }
        }
        best.map(|c| c.rect)
    }

    fn contact_point_score(&self, x: u32, y: u32, w: u32, h: u32) -> u32 {
        let mut score = 0u32;
        if x == 0 {
            score += h;
        }
        if y == 0 {
            score += w;
        }
        if x + w == self.width {
            score += h;
        }
        if y + h == self.height {
            score += w;
        }
        for u in &self.used {
            if x == u.x + u.w || u.x == x + w {
                score += overlap_1d(y, y + h, u.y, u.y + u.h);
            }
            if y == u.y + u.h || u.y == y + h {
                score += overlap_1d(x, x + w, u.x, u.x + u.w);
            }
        }
        score
    }
}

fn overlap_1d(a1: u32, a2: u32, b1: u32, b2: u32) -> u32 {
    let start = a1.max(b1);
    let end = a2.min(b2);
    end.saturating_sub(start)
}

impl PackingStrategy for MaxRectsPacker {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn occupancy(&self) -> f32 {
        occupancy_of(self.used_area, self.width, self.height)
    }

    fn clear(&mut self) {
        self.free.clear();
        self.free.push(Rect::new(0, 0, self.width, self.height));
        self.used.clear();
        self.used_area = 0;
    }

    fn insert(&mut self, width: u32, height: u32, allow_rotation: bool) -> Option<Placement> {
        if width == 0 || height == 0 {
            return None;
        }
        let place = self.find_position(width, height, self.allow_rotation && allow_rotation)?;
        let upright = place.w == width && place.h == height;
        let turned = place.w == height && place.h == width;
        if !(upright || turned) {
            return None;
        }
        self.place_rect(&place);
        Some(placement_of(width, height, place))
    }
}
