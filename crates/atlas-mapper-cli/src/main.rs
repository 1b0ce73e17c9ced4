use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use atlas_mapper_core::json_writer::{AtlasManifest, DEFAULT_SPRITES_FILE};
use atlas_mapper_core::prelude::*;
use atlas_mapper_core::{DirStore, PngDirEncoder, image_io};
use clap::{ArgAction, Parser, Subcommand};
use globset::{Glob, GlobSet, GlobSetBuilder};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(
    name = "atlas-mapper",
    about = "Map folders of sprites into texture atlases",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show progress bars (disable with --progress false or --quiet)
    #[arg(long, default_value_t = true, action=ArgAction::Set, global=true, help_heading = "Logging/UX")]
    progress: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(
        short,
        long,
        default_value_t = false,
        global = true,
        help_heading = "Logging/UX"
    )]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Map every sprite under <SRC> and write JSON manifests into <DST>
    Map(MapArgs),
    /// Rebuild an atlas image from a manifest and its sprites map
    Build(BuildArgs),
}

#[derive(Parser, Debug, Clone)]
struct MapArgs {
    /// Source directory (sprite keys are paths relative to it)
    #[arg(help_heading = "Input/Output")]
    src: PathBuf,
    /// Output directory for manifests (and PNGs with --debug-mapping)
    #[arg(help_heading = "Input/Output")]
    dst: PathBuf,
    /// YAML config file (overrides mapper options)
    #[arg(long, help_heading = "Input/Output")]
    config: Option<PathBuf>,
    /// Include patterns (glob), matched against keys
    #[arg(long, default_value = "**/*.png", help_heading = "Input/Output")]
    include: Vec<String>,
    /// Exclude patterns (glob), matched against keys
    #[arg(long, help_heading = "Input/Output")]
    exclude: Vec<String>,
    /// Also composite every atlas into <DST>/<name>.png
    #[arg(long, default_value_t = false, help_heading = "Input/Output")]
    debug_mapping: bool,
    /// Print the effective config and exit
    #[arg(long, default_value_t = false, help_heading = "Input/Output")]
    print_config: bool,
    /// Print format for --print-config: json|yaml
    #[arg(long, default_value = "json", help_heading = "Input/Output")]
    print_config_format: String,

    // Atlas
    /// Atlas width bound
    #[arg(long, help_heading = "Atlas")]
    width: u32,
    /// Atlas height bound
    #[arg(long, help_heading = "Atlas")]
    height: u32,
    /// Pixels reserved around every sprite
    #[arg(long, default_value_t = 0, help_heading = "Atlas")]
    padding: u32,
    /// Pixel format: rgba8|rgb8|la8|l8
    #[arg(long, default_value = "rgba8", help_heading = "Atlas")]
    pixel_format: String,
    /// Premultiply color by alpha when compositing
    #[arg(long, default_value_t = false, help_heading = "Atlas")]
    premultiply_alpha: bool,
    /// Name atlases after the sprites' directory and split on directory change
    #[arg(long, default_value_t = false, help_heading = "Atlas")]
    dir_naming: bool,

    // Algorithms/Heuristics
    /// Sizing policy: constant|bestfit|sqpow2
    #[arg(long, default_value = "bestfit", help_heading = "Algorithms")]
    sizing: String,
    /// Strategy: maxrects|skyline|guillotine
    #[arg(long, value_parser = ["maxrects", "skyline", "guillotine"], default_value = "maxrects", help_heading = "Algorithms")]
    strategy: String,
    /// Heuristic for the chosen strategy (maxrects: bssf|blsf|baf|bl|cp, skyline: bl|minwaste, guillotine: baf|bssf|blsf|waf|wssf|wlsf)
    #[arg(long, help_heading = "Heuristics")]
    heuristic: Option<String>,
    /// Guillotine split: slas|llas|minas|maxas|sas|las
    #[arg(long, help_heading = "Heuristics")]
    g_split: Option<String>,
    /// Disable 90° rotation for every sprite
    #[arg(long, default_value_t = false, help_heading = "Heuristics")]
    no_rotation: bool,
}

#[derive(Parser, Debug, Clone)]
struct BuildArgs {
    /// Atlas manifest (<name>.json) written by `map`
    manifest: PathBuf,
    /// Directory the sprite keys are relative to
    #[arg(long)]
    src: PathBuf,
    /// Output image file
    #[arg(long)]
    dst: PathBuf,
    /// Sprites map file; defaults to the one named in the manifest, next to it
    #[arg(long)]
    sprites: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    match &cli.command {
        Commands::Map(args) => run_map(args, cli.progress && !cli.quiet),
        Commands::Build(args) => run_build(args),
    }
}

/// Everything `map` feeds into the pipeline, after CLI flags and YAML are merged.
#[derive(Debug, Clone, Serialize)]
struct MapSettings {
    template: AtlasSpec,
    dir_naming: bool,
    mapper: MapperConfig,
}

fn run_map(args: &MapArgs, show_progress: bool) -> anyhow::Result<()> {
    let mut settings = settings_from_args(args)?;
    if let Some(path) = &args.config {
        let file = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let y: YamlConfig = serde_yaml::from_str(&file)
            .with_context(|| format!("parse config {}", path.display()))?;
        y.apply(&mut settings)?;
    }
    settings.template.validate()?;

    if args.print_config {
        match args.print_config_format.as_str() {
            "yaml" => println!("{}", serde_yaml::to_string(&settings)?),
            _ => println!("{}", serde_json::to_string_pretty(&settings)?),
        }
        return Ok(());
    }

    fs::create_dir_all(&args.dst)
        .with_context(|| format!("create dst {}", args.dst.display()))?;

    let paths = gather_paths(&args.src, &args.include, &args.exclude)?;
    let items = read_items_with_progress(&paths, args.debug_mapping, show_progress)?;
    info!(count = items.len(), "read sprites");

    let atlases = if args.debug_mapping {
        let compositor = AtlasCompositor::new(PngDirEncoder::new(&args.dst), AtlasCollector::new());
        let (_, collector) = map_items(&settings, &args.dst, &items, compositor)?.into_parts();
        collector.into_atlases()
    } else {
        map_items(&settings, &args.dst, &items, AtlasCollector::new())?.into_atlases()
    };

    let stats = MappingStats::from_atlases(&atlases);
    info!(
        atlases = stats.num_atlases,
        items = stats.num_items,
        occupancy = stats.occupancy,
        "mapping finished"
    );
    for a in &atlases {
        debug!(name = %a.spec.name, w = a.spec.width, h = a.spec.height, occupancy = a.spec.occupancy, "atlas");
    }
    println!("{}", stats.summary());
    Ok(())
}

/// Runs naming -> mapper -> naming -> JSON writer -> `tail` and hands `tail` back.
fn map_items<T: AtlasSink>(
    settings: &MapSettings,
    dst: &Path,
    items: &[AtlasItem],
    tail: T,
) -> anyhow::Result<T> {
    let writer = JsonAtlasWriter::new(DirStore::new(dst), tail);
    let mapper = AtlasMapper::new(
        settings.mapper.clone(),
        AtlasNaming::new(settings.dir_naming, writer),
    );
    let mut chain = AtlasNaming::new(settings.dir_naming, mapper);

    chain.begin_atlas(&settings.template)?;
    for item in items {
        chain
            .add_item(item)
            .with_context(|| format!("map sprite {}", item.key))?;
    }
    chain.end_atlas(true).context("flush atlases")?;

    let (_, tail) = chain.into_sink().into_sink().into_sink().into_parts();
    Ok(tail)
}

fn run_build(args: &BuildArgs) -> anyhow::Result<()> {
    let atlas_json = fs::read_to_string(&args.manifest)
        .with_context(|| format!("read manifest {}", args.manifest.display()))?;
    let sprites_path = match &args.sprites {
        Some(p) => p.clone(),
        None => {
            let manifest: AtlasManifest = serde_json::from_str(&atlas_json)
                .with_context(|| format!("parse manifest {}", args.manifest.display()))?;
            let file = if manifest.sprites_file.is_empty() {
                DEFAULT_SPRITES_FILE.to_string()
            } else {
                manifest.sprites_file
            };
            args.manifest
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(file)
        }
    };
    let sprites_json = fs::read_to_string(&sprites_path)
        .with_context(|| format!("read sprites map {}", sprites_path.display()))?;

    let dst = args.dst.clone();
    if let Some(dir) = dst.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let encoder = move |spec: &AtlasSpec, img: DynamicImage| -> atlas_mapper_core::Result<()> {
        info!(name = %spec.name, w = spec.width, h = spec.height, path = %dst.display(), "writing atlas");
        image_io::write_image(&dst, &img)
    };
    let mut compositor = AtlasCompositor::new(encoder, AtlasCollector::new());
    replay_manifest(&atlas_json, &sprites_json, &mut compositor, |item: &mut AtlasItem| {
        let path = args.src.join(&item.key);
        image_io::attach_pixels(item, path)
    })
    .with_context(|| format!("build atlas from {}", args.manifest.display()))?;

    let (_, collector) = compositor.into_parts();
    let stats = MappingStats::from_atlases(collector.atlases());
    info!(items = stats.num_items, "atlas rebuilt");
    Ok(())
}

fn settings_from_args(args: &MapArgs) -> anyhow::Result<MapSettings> {
    let format: PixelFormat = args.pixel_format.parse()?;
    let template = AtlasSpec::new(args.width, args.height)
        .with_padding(args.padding)
        .with_format(format)
        .premultiplied(args.premultiply_alpha);

    let family: AlgorithmFamily = parse_named(&args.strategy, "strategy")?;
    let mut builder = MapperConfig::builder()
        .sizing(parse_named(&args.sizing, "sizing policy")?)
        .family(family)
        .allow_rotation(!args.no_rotation);
    if let Some(h) = &args.heuristic {
        builder = apply_heuristic(builder, family, h)?;
    }
    if let Some(s) = &args.g_split {
        builder = builder.g_split(parse_named(s, "guillotine split")?);
    }

    Ok(MapSettings {
        template,
        dir_naming: args.dir_naming,
        mapper: builder.build(),
    })
}

/// Routes `--heuristic` to the knob of the selected strategy.
fn apply_heuristic(
    builder: MapperConfigBuilder,
    family: AlgorithmFamily,
    h: &str,
) -> anyhow::Result<MapperConfigBuilder> {
    Ok(match family {
        AlgorithmFamily::MaxRects => builder.mr_heuristic(parse_named(h, "maxrects heuristic")?),
        AlgorithmFamily::Skyline => builder.skyline_heuristic(parse_named(h, "skyline heuristic")?),
        AlgorithmFamily::Guillotine => builder.g_choice(parse_named(h, "guillotine choice")?),
    })
}

fn parse_named<T: std::str::FromStr>(s: &str, what: &str) -> anyhow::Result<T> {
    s.parse().map_err(|_| anyhow!("unknown {}: {}", what, s))
}

fn gather_paths(
    root: &Path,
    include: &[String],
    exclude: &[String],
) -> anyhow::Result<Vec<(PathBuf, String)>> {
    let inc_set = build_globs(include)?;
    let exc_set = build_globs(exclude)?;
    anyhow::ensure!(root.is_dir(), "source {} is not a directory", root.display());

    let mut list = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        let p = entry.path();
        if !p.is_file() || !is_image(p) {
            continue;
        }
        let key = key_of(root, p)?;
        if !should_skip(&key, inc_set.as_ref(), exc_set.as_ref()) {
            list.push((p.to_path_buf(), key));
        }
    }
    Ok(list)
}

fn build_globs(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut b = GlobSetBuilder::new();
    for pat in patterns {
        b.add(Glob::new(pat).with_context(|| format!("bad glob {pat}"))?);
    }
    Ok(Some(b.build()?))
}

/// Path of `p` relative to `root`, with '/' separators.
fn key_of(root: &Path, p: &Path) -> anyhow::Result<String> {
    let rel = p
        .strip_prefix(root)
        .with_context(|| format!("{} is outside {}", p.display(), root.display()))?;
    Ok(rel.to_string_lossy().replace('\\', "/"))
}

fn should_skip(key: &str, include: Option<&GlobSet>, exclude: Option<&GlobSet>) -> bool {
    if let Some(ex) = exclude {
        if ex.is_match(key) {
            return true;
        }
    }
    if let Some(inc) = include {
        if !inc.is_match(key) {
            return true;
        }
    }
    false
}

fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_ascii_lowercase()),
        Some(ext) if matches!(ext.as_str(), "png" | "jpg" | "jpeg" | "bmp" | "tga" | "gif")
    )
}

fn read_items_with_progress(
    paths: &[(PathBuf, String)],
    load_pixels: bool,
    progress: bool,
) -> anyhow::Result<Vec<AtlasItem>> {
    use indicatif::{ProgressBar, ProgressStyle};
    let bar = if progress {
        let b = ProgressBar::new(paths.len() as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.green} reading {pos}/{len} [{elapsed_precise}] {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        b.set_style(style);
        Some(b)
    } else {
        None
    };
    let mut list = Vec::with_capacity(paths.len());
    for (p, key) in paths {
        if let Some(b) = &bar {
            b.set_message(key.clone());
        }
        let item = image_io::read_item(p, key.as_str(), load_pixels)
            .with_context(|| format!("read sprite {}", p.display()))?;
        list.push(item);
        if let Some(b) = &bar {
            b.inc(1);
        }
    }
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    Ok(list)
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .try_init();
}

/// Mapper options read from `--config`; every field overrides the CLI value.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct YamlConfig {
    width: Option<u32>,
    height: Option<u32>,
    padding: Option<u32>,
    pixel_format: Option<String>,
    premultiply_alpha: Option<bool>,
    dir_naming: Option<bool>,
    sizing: Option<String>,
    strategy: Option<String>,
    heuristic: Option<String>,
    skyline: Option<String>,
    use_waste_map: Option<bool>,
    g_choice: Option<String>,
    g_split: Option<String>,
    use_merge: Option<bool>,
    allow_rotation: Option<bool>,
}

impl YamlConfig {
    fn apply(self, s: &mut MapSettings) -> anyhow::Result<()> {
        if let Some(v) = self.width {
            s.template.width = v;
        }
        if let Some(v) = self.height {
            s.template.height = v;
        }
        if let Some(v) = self.padding {
            s.template.padding = v;
        }
        if let Some(v) = self.pixel_format {
            s.template.format = v.parse()?;
        }
        if let Some(v) = self.premultiply_alpha {
            s.template.premultiplied = v;
        }
        if let Some(v) = self.dir_naming {
            s.dir_naming = v;
        }
        let cfg = &mut s.mapper;
        if let Some(v) = self.sizing {
            cfg.sizing = parse_named(&v, "sizing policy")?;
        }
        let st = &mut cfg.strategy;
        if let Some(v) = self.strategy {
            st.family = parse_named(&v, "strategy")?;
        }
        if let Some(v) = self.heuristic {
            st.mr_heuristic = parse_named(&v, "maxrects heuristic")?;
        }
        if let Some(v) = self.skyline {
            st.skyline_heuristic = parse_named(&v, "skyline heuristic")?;
        }
        if let Some(v) = self.use_waste_map {
            st.use_waste_map = v;
        }
        if let Some(v) = self.g_choice {
            st.g_choice = parse_named(&v, "guillotine choice")?;
        }
        if let Some(v) = self.g_split {
            st.g_split = parse_named(&v, "guillotine split")?;
        }
        if let Some(v) = self.use_merge {
            st.use_merge = v;
        }
        if let Some(v) = self.allow_rotation {
            st.allow_rotation = v;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> MapArgs {
        let mut argv = vec!["atlas-mapper", "map", "in", "out", "--width", "256", "--height", "128"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Map(a) => a,
            Commands::Build(_) => unreachable!(),
        }
    }

    #[test]
    fn flags_build_the_template_and_mapper_config() {
        let s = settings_from_args(&args(&[
            "--padding",
            "2",
            "--sizing",
            "sqpow2",
            "--strategy",
            "skyline",
            "--heuristic",
            "bl",
            "--no-rotation",
        ]))
        .unwrap();
        assert_eq!((s.template.width, s.template.height, s.template.padding), (256, 128, 2));
        assert_eq!(s.mapper.sizing, SizingPolicy::SqPow2);
        assert_eq!(s.mapper.strategy.family, AlgorithmFamily::Skyline);
        assert_eq!(s.mapper.strategy.skyline_heuristic, SkylineHeuristic::BottomLeft);
        assert!(!s.mapper.strategy.allow_rotation);
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(settings_from_args(&args(&["--sizing", "huge"])).is_err());
        assert!(settings_from_args(&args(&["--heuristic", "bogus"])).is_err());
        assert!(settings_from_args(&args(&["--pixel-format", "bgr565"])).is_err());
    }

    #[test]
    fn yaml_overrides_flags() {
        let mut s = settings_from_args(&args(&[])).unwrap();
        let y: YamlConfig =
            serde_yaml::from_str("width: 64\nsizing: constant\nstrategy: guillotine\ng_split: las\ndir_naming: true\n")
                .unwrap();
        y.apply(&mut s).unwrap();
        assert_eq!(s.template.width, 64);
        assert_eq!(s.template.height, 128);
        assert!(s.dir_naming);
        assert_eq!(s.mapper.sizing, SizingPolicy::Constant);
        assert_eq!(s.mapper.strategy.family, AlgorithmFamily::Guillotine);
        assert_eq!(s.mapper.strategy.g_split, GuillotineSplit::SplitLongerAxis);
    }

    #[test]
    fn keys_are_relative_with_forward_slashes() {
        let root = Path::new("assets");
        let key = key_of(root, &root.join("ui").join("button.png")).unwrap();
        assert_eq!(key, "ui/button.png");
        assert!(key_of(root, Path::new("elsewhere/x.png")).is_err());
    }

    #[test]
    fn globs_filter_keys() {
        let inc = build_globs(&["**/*.png".to_string()]).unwrap();
        let exc = build_globs(&["hud/**".to_string()]).unwrap();
        assert!(!should_skip("ui/a.png", inc.as_ref(), exc.as_ref()));
        assert!(should_skip("hud/a.png", inc.as_ref(), exc.as_ref()));
        assert!(should_skip("ui/a.jpg", inc.as_ref(), exc.as_ref()));
    }
}
