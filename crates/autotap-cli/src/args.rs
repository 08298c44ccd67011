//! CLI argument parsing with clap derive macros.

use std::path::PathBuf;

use autotap_core::Rect;
use clap::{Parser, Subcommand, ValueEnum};

/// Offline inspection and replay for autotap.
///
/// Runs the recognition layer and the rule dispatcher against PNG captures
/// on disk, so templates and rule sets can be checked without a device.
#[derive(Debug, Parser)]
#[command(name = "autotap", version)]
pub struct Cli {
    /// Config file [default: $AUTOTAP_CONFIG, then <config dir>/autotap/config.json]
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Look for a template in a captured frame
    #[command(
        name = "match",
        after_help = "\
Examples:
  autotap match screen.png button.png              # Best hit as JSON
  autotap match screen.png icon.png --mode all     # Every deduplicated hit
  autotap match screen.png icon.png --mode count   # Hit count at the strict threshold
  autotap match screen.png star.png --transparent  # Mask from the template's alpha
  autotap match screen.png card.png --mask card_mask.png -t 0.85"
    )]
    Match(MatchArgs),

    /// Find the first pixel of a colour in a captured frame
    #[command(after_help = "\
Examples:
  autotap color screen.png '#FF3040'
  autotap color screen.png ff3040 --tolerance 8 --rect 0,0,360,200")]
    Color(ColorArgs),

    /// Run a click/until rule set against a directory of frames
    #[command(after_long_help = "\
Frames are served in file-name order, one per capture. Rules are evaluated
in the order given: every --click rule before every --until rule.

Examples:
  autotap replay captures/ --click skip.png --until home.png
  autotap replay captures/ --click ok.png --click close.png --until home.png --hold-last --timeout 5000
  autotap replay captures/ --until home.png --expect badge.png --dump-dir failures/")]
    Replay(ReplayArgs),
}

#[derive(Debug, clap::Args)]
pub struct MatchArgs {
    /// Captured frame (PNG or any format the image crate reads)
    pub frame: PathBuf,

    /// Template image
    pub template: PathBuf,

    /// What to report
    #[arg(short, long, value_enum, default_value_t = MatchMode::Best)]
    pub mode: MatchMode,

    /// Score threshold in [0, 1] [default: from config]
    #[arg(short, long)]
    pub threshold: Option<f32>,

    /// Mask image; white pixels take part in scoring
    #[arg(long, value_name = "FILE", conflicts_with = "transparent")]
    pub mask: Option<PathBuf>,

    /// Derive the mask from the template's alpha channel
    #[arg(long)]
    pub transparent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MatchMode {
    /// Highest-scoring hit
    Best,
    /// All hits after deduplication
    All,
    /// Number of hits
    Count,
}

#[derive(Debug, clap::Args)]
pub struct ColorArgs {
    /// Captured frame
    pub frame: PathBuf,

    /// Colour as RRGGBB, with or without a leading '#'
    pub color: String,

    /// Per-channel tolerance
    #[arg(long, default_value_t = 0)]
    pub tolerance: u8,

    /// Search region as x,y,width,height
    #[arg(long, value_parser = parse_rect)]
    pub rect: Option<Rect>,
}

#[derive(Debug, clap::Args)]
pub struct ReplayArgs {
    /// Directory of captured frames
    pub frames: PathBuf,

    /// Click this template whenever it is visible
    #[arg(long, value_name = "TEMPLATE")]
    pub click: Vec<PathBuf>,

    /// Stop once this template is visible
    #[arg(long, value_name = "TEMPLATE", required = true)]
    pub until: Vec<PathBuf>,

    /// After the run, require this template on the last frame
    #[arg(long, value_name = "TEMPLATE")]
    pub expect: Option<PathBuf>,

    /// Sleep between idle ticks in milliseconds [default: from config]
    #[arg(long, value_name = "MS")]
    pub interval: Option<u64>,

    /// Give up after this many milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Keep serving the last frame once the directory is exhausted
    #[arg(long)]
    pub hold_last: bool,

    /// Save the frame an expectation failed against into this directory
    #[arg(long, value_name = "DIR")]
    pub dump_dir: Option<PathBuf>,
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y, w, h] = parts.as_slice() else {
        return Err(format!("expected x,y,width,height, got '{}'", s));
    };
    let int = |v: &str| v.parse::<i32>().map_err(|e| format!("'{}': {}", v, e));
    let dim = |v: &str| v.parse::<u32>().map_err(|e| format!("'{}': {}", v, e));
    Ok(Rect::new(int(x)?, int(y)?, dim(w)?, dim(h)?))
}
