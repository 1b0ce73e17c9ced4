use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Rectangle packing families.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmFamily {
    /// MaxRects free-list (high quality; many heuristics; the reference strategy).
    MaxRects,
    /// Skyline data structure (fast baseline). Optional waste-map recovery.
    Skyline,
    /// Guillotine splitting (flexible choice/split).
    Guillotine,
}

impl FromStr for AlgorithmFamily {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "maxrects" => Ok(Self::MaxRects),
            "skyline" => Ok(Self::Skyline),
            "guillotine" => Ok(Self::Guillotine),
            _ => Err(()),
        }
    }
}

/// MaxRects placement heuristics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MaxRectsHeuristic {
    /// Minimize the leftover short side; ties go to the candidate that leaves the
    /// fewest free rectangles behind.
    BestShortSideFit,
    BestLongSideFit,
    BestAreaFit,
    BottomLeft,
    ContactPoint,
}

impl FromStr for MaxRectsHeuristic {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bssf" | "bestshortsidefit" => Ok(Self::BestShortSideFit),
            "blsf" | "bestlongsidefit" => Ok(Self::BestLongSideFit),
            "baf" | "bestareafit" => Ok(Self::BestAreaFit),
            "bl" | "bottomleft" => Ok(Self::BottomLeft),
            "cp" | "contactpoint" => Ok(Self::ContactPoint),
            _ => Err(()),
        }
    }
}

/// Skyline placement heuristics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SkylineHeuristic {
    BottomLeft,
    MinWaste,
}

impl FromStr for SkylineHeuristic {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bl" | "bottomleft" => Ok(Self::BottomLeft),
            "minwaste" | "mw" => Ok(Self::MinWaste),
            _ => Err(()),
        }
    }
}

/// Guillotine free-rect choice heuristics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GuillotineChoice {
    BestAreaFit,
    BestShortSideFit,
    BestLongSideFit,
    WorstAreaFit,
    WorstShortSideFit,
    WorstLongSideFit,
}

impl FromStr for GuillotineChoice {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "baf" | "bestareafit" => Ok(Self::BestAreaFit),
            "bssf" | "bestshortsidefit" => Ok(Self::BestShortSideFit),
            "blsf" | "bestlongsidefit" => Ok(Self::BestLongSideFit),
            "waf" | "worstareafit" => Ok(Self::WorstAreaFit),
            "wssf" | "worstshortsidefit" => Ok(Self::WorstShortSideFit),
            "wlsf" | "worstlongsidefit" => Ok(Self::WorstLongSideFit),
            _ => Err(()),
        }
    }
}

/// Guillotine split axis heuristics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GuillotineSplit {
    SplitShorterLeftoverAxis,
    SplitLongerLeftoverAxis,
    SplitMinimizeArea,
    SplitMaximizeArea,
    SplitShorterAxis,
    SplitLongerAxis,
}

impl FromStr for GuillotineSplit {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "slas" | "splitshorterleftoveraxis" => Ok(Self::SplitShorterLeftoverAxis),
            "llas" | "splitlongerleftoveraxis" => Ok(Self::SplitLongerLeftoverAxis),
            "minas" | "splitminimizearea" => Ok(Self::SplitMinimizeArea),
            "maxas" | "splitmaximizearea" => Ok(Self::SplitMaximizeArea),
            "sas" | "splitshorteraxis" => Ok(Self::SplitShorterAxis),
            "las" | "splitlongeraxis" => Ok(Self::SplitLongerAxis),
            _ => Err(()),
        }
    }
}

/// How the mapper chooses each bin's dimensions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SizingPolicy {
    /// Use the template size unchanged.
    Constant,
    /// Fill a template-sized bin, then shrink it toward the smallest square that
    /// still holds every placed item.
    BestFit,
    /// Square power-of-two bins sized from the pending area and the largest item.
    SqPow2,
}

impl SizingPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            SizingPolicy::Constant => "constant",
            SizingPolicy::BestFit => "bestfit",
            SizingPolicy::SqPow2 => "sqpow2",
        }
    }
}

impl FromStr for SizingPolicy {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "constant" => Ok(Self::Constant),
            "bestfit" | "best_fit" => Ok(Self::BestFit),
            "sqpow2" => Ok(Self::SqPow2),
            _ => Err(()),
        }
    }
}

/// Packing strategy selection and its tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StrategyConfig {
    #[serde(default = "default_family")]
    pub family: AlgorithmFamily,
    #[serde(default = "default_mr_heuristic")]
    pub mr_heuristic: MaxRectsHeuristic,
    #[serde(default = "default_skyline_heuristic")]
    pub skyline_heuristic: SkylineHeuristic,
    /// Use a waste map in Skyline to recover gaps below the skyline.
    #[serde(default = "default_true")]
    pub use_waste_map: bool,
    #[serde(default = "default_g_choice")]
    pub g_choice: GuillotineChoice,
    #[serde(default = "default_g_split")]
    pub g_split: GuillotineSplit,
    /// Merge adjacent Guillotine free rectangles after each placement.
    #[serde(default = "default_true")]
    pub use_merge: bool,
    /// Allow 90° rotations. Items can still opt out individually.
    #[serde(default = "default_true")]
    pub allow_rotation: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            family: default_family(),
            mr_heuristic: default_mr_heuristic(),
            skyline_heuristic: default_skyline_heuristic(),
            use_waste_map: true,
            g_choice: default_g_choice(),
            g_split: default_g_split(),
            use_merge: true,
            allow_rotation: true,
        }
    }
}

/// Mapper configuration.
/// Key notes:
///   - `sizing` decides how each bin's dimensions are chosen (see [`SizingPolicy`])
///   - `strategy` selects the rectangle packer every bin is built on; it is fixed
///     for the lifetime of a mapper
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MapperConfig {
    #[serde(default = "default_sizing")]
    pub sizing: SizingPolicy,
    #[serde(default)]
    pub strategy: StrategyConfig,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            sizing: default_sizing(),
            strategy: StrategyConfig::default(),
        }
    }
}

impl MapperConfig {
    /// Create a fluent builder for `MapperConfig`.
    pub fn builder() -> MapperConfigBuilder {
        MapperConfigBuilder::new()
    }
}

fn default_sizing() -> SizingPolicy {
    SizingPolicy::BestFit
}
fn default_family() -> AlgorithmFamily {
    AlgorithmFamily::MaxRects
}
fn default_mr_heuristic() -> MaxRectsHeuristic {
    MaxRectsHeuristic::BestShortSideFit
}
fn default_skyline_heuristic() -> SkylineHeuristic {
    SkylineHeuristic::MinWaste
}
fn default_g_choice() -> GuillotineChoice {
    GuillotineChoice::BestAreaFit
}
fn default_g_split() -> GuillotineSplit {
    GuillotineSplit::SplitMinimizeArea
}
fn default_true() -> bool {
    true
}

/// Builder for `MapperConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct MapperConfigBuilder {
    cfg: MapperConfig,
}

impl MapperConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: MapperConfig::default(),
        }
    }
    pub fn sizing(mut self, v: SizingPolicy) -> Self {
        self.cfg.sizing = v;
        self
    }
    pub fn family(mut self, v: AlgorithmFamily) -> Self {
        self.cfg.strategy.family = v;
        self
    }
    pub fn mr_heuristic(mut self, v: MaxRectsHeuristic) -> Self {
        self.cfg.strategy.mr_heuristic = v;
        self
    }
    pub fn skyline_heuristic(mut self, v: SkylineHeuristic) -> Self {
        self.cfg.strategy.skyline_heuristic = v;
        self
    }
    pub fn use_waste_map(mut self, v: bool) -> Self {
        self.cfg.strategy.use_waste_map = v;
        self
    }
    pub fn g_choice(mut self, v: GuillotineChoice) -> Self {
        self.cfg.strategy.g_choice = v;
        self
    }
    pub fn g_split(mut self, v: GuillotineSplit) -> Self {
        self.cfg.strategy.g_split = v;
        self
    }
    pub fn use_merge(mut self, v: bool) -> Self {
        self.cfg.strategy.use_merge = v;
        self
    }
    pub fn allow_rotation(mut self, v: bool) -> Self {
        self.cfg.strategy.allow_rotation = v;
        self
    }
    pub fn build(self) -> MapperConfig {
        self.cfg
    }
}
