use super::{PackingStrategy, merge_adjacent, occupancy_of, placement_of, prune_contained};
use crate::config::{GuillotineChoice, GuillotineSplit};
use crate::model::{Placement, Rect};

pub struct GuillotinePacker {
    width: u32,
    height: u32,
    free: Vec<Rect>,
    used_area: u64,
    choice: GuillotineChoice,
    split: GuillotineSplit,
    use_merge: bool,
    allow_rotation: bool,
}

/// Scores placing `w x h` into `fr`; lower is better.
pub(crate) fn score_choice(choice: GuillotineChoice, fr: &Rect, w: u32, h: u32) -> (i64, i64) {
    let area_fit = fr.area() as i64 - (w as i64 * h as i64);
    let leftover_h = fr.w as i64 - w as i64;
    let leftover_v = fr.h as i64 - h as i64;
    let short_fit = leftover_h.abs().min(leftover_v.abs());
    let long_fit = leftover_h.abs().max(leftover_v.abs());
    match choice {
        GuillotineChoice::BestAreaFit => (area_fit, short_fit),
        GuillotineChoice::BestShortSideFit => (short_fit, long_fit),
        GuillotineChoice::BestLongSideFit => (long_fit, short_fit),
        GuillotineChoice::WorstAreaFit => (-area_fit, -short_fit),
        GuillotineChoice::WorstShortSideFit => (-short_fit, -long_fit),
        GuillotineChoice::WorstLongSideFit => (-long_fit, -short_fit),
    }
}

impl GuillotinePacker {
    pub fn new(
        width: u32,
        height: u32,
        choice: GuillotineChoice,
        split: GuillotineSplit,
        use_merge: bool,
        allow_rotation: bool,
    ) -> Self {
        Self {
            width,
            height,
            free: vec![Rect::new(0, 0, width, height)],
            used_area: 0,
            choice,
            split,
            use_merge,
            allow_rotation,
        }
    }

    fn choose(&self, w: u32, h: u32, rotate: bool) -> Option<(usize, Rect)> {
        let mut best: Option<((i64, i64), usize, Rect)> = None;
        for (i, fr) in self.free.iter().enumerate() {
            for (cw, ch, enabled) in [(w, h, true), (h, w, rotate && w != h)] {
                if !enabled || fr.w < cw || fr.h < ch {
                    continue;
                }
                let score = score_choice(self.choice, fr, cw, ch);
                if best.as_ref().is_none_or(|b| score < b.0) {
                    best = Some((score, i, Rect::new(fr.x, fr.y, cw, ch)));
                }
            }
        }
        best.map(|(_, i, r)| (i, r))
    }

    /// Cuts `fr` along one axis into a bottom and a right remainder.
    fn split_free(&self, fr: &Rect, placed: &Rect) -> [Rect; 2] {
        let w_right = fr.w - placed.w;
        let h_bottom = fr.h - placed.h;

        let split_horizontal = match self.split {
            GuillotineSplit::SplitShorterLeftoverAxis => h_bottom < w_right,
            GuillotineSplit::SplitLongerLeftoverAxis => h_bottom > w_right,
            GuillotineSplit::SplitMinimizeArea => {
                (w_right as u64 * fr.h as u64) <= (fr.w as u64 * h_bottom as u64)
            }
            GuillotineSplit::SplitMaximizeArea => {
                (w_right as u64 * fr.h as u64) >= (fr.w as u64 * h_bottom as u64)
            }
            GuillotineSplit::SplitShorterAxis => fr.h < fr.w,
            GuillotineSplit::SplitLongerAxis => fr.h > fr.w,
        };

        let mut bottom = Rect::new(fr.x, placed.y + placed.h, 0, h_bottom);
        let mut right = Rect::new(placed.x + placed.w, fr.y, w_right, 0);
        if split_horizontal {
            bottom.w = fr.w;
            right.h = placed.h;
        } else {
            bottom.w = placed.w;
            right.h = fr.h;
        }
        [bottom, right]
    }

    fn place(&mut self, idx: usize, placed: &Rect) {
        let fr = self.free.swap_remove(idx);
        for r in self.split_free(&fr, placed) {
            if r.w > 0 && r.h > 0 {
                self.free.push(r);
            }
        }
        prune_contained(&mut self.free);
        if self.use_merge {
            merge_adjacent(&mut self.free);
        }
        self.used_area += placed.area();
    }
}

impl PackingStrategy for GuillotinePacker {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn occupancy(&self) -> f32 {
        occupancy_of(self.used_area, self.width, self.height)
    }

    fn clear(&mut self) {
        self.free.clear();
        self.free.push(Rect::new(0, 0, self.width, self.height));
        self.used_area = 0;
    }

    fn insert(&mut self, width: u32, height: u32, allow_rotation: bool) -> Option<Placement> {
        if width == 0 || height == 0 {
            return None;
        }
        let (idx, place) = self.choose(width, height, self.allow_rotation && allow_rotation)?;
        self.place(idx, &place);
        Some(placement_of(width, height, place))
    }
}
