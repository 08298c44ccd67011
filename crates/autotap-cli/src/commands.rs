//! Command implementations. Each builds a [`Context`] over a replay device
//! and drives the core the same way a task script would.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context as _;
use autotap_core::vision::{Mask, Template};
use autotap_core::{Config, Context, Dispatcher, Error, Frame, Interrupt, ScreenshotMode};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::args::{ColorArgs, MatchArgs, MatchMode, ReplayArgs};
use crate::replay::{ReplayDevice, ReplayEvent};
use crate::report::dump_failure;

/// Context pinned to a single frame loaded from disk.
fn single_frame_context(path: &Path, config: Config) -> anyhow::Result<Context> {
    let frame = Frame::open(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(Context::builder(ReplayDevice::new(vec![frame], true))
        .config(config)
        .build()?)
}

fn load_template(path: &Path) -> anyhow::Result<Template> {
    Template::open(path).with_context(|| format!("failed to read template {}", path.display()))
}

pub fn run_match(args: &MatchArgs, config: Config) -> anyhow::Result<Value> {
    let mut template = load_template(&args.template)?;
    if let Some(mask) = &args.mask {
        template = template.with_mask(Mask::open(mask)?)?;
    } else if args.transparent {
        template = template.transparent()?;
    }

    let ctx = single_frame_context(&args.frame, config)?;
    let _scope = ctx.manual_context(ScreenshotMode::Manual);
    ctx.screenshot()?;

    let mut image = ctx.image();
    if let Some(threshold) = args.threshold {
        image = image.threshold(threshold);
    }

    let output = match args.mode {
        MatchMode::Best => json!({
            "template": template.name(),
            "hit": image.find(&template)?,
        }),
        MatchMode::All => json!({
            "template": template.name(),
            "hits": image.find_all(&template)?,
        }),
        MatchMode::Count => json!({
            "template": template.name(),
            "count": image.count(&template)?,
        }),
    };
    Ok(output)
}

pub fn run_color(args: &ColorArgs, config: Config) -> anyhow::Result<Value> {
    let ctx = single_frame_context(&args.frame, config)?;
    let _scope = ctx.manual_context(ScreenshotMode::Manual);
    ctx.screenshot()?;

    let mut color = ctx.color().tolerance(args.tolerance);
    if let Some(rect) = args.rect {
        color = color.rect(rect);
    }
    let point = color.find_rgb(&args.color)?;
    Ok(json!({ "color": args.color, "point": point }))
}

/// Outcome of a replay run.
#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    /// Name of the `--until` template that ended the run.
    pub reached: Option<String>,
    pub frames: usize,
    pub events: Vec<ReplayEvent>,
    pub elapsed_ms: u128,
}

/// Run the replay dispatcher; blocks until it finishes or is interrupted.
pub fn run_replay(
    args: &ReplayArgs,
    config: Config,
    interrupt: Interrupt,
) -> anyhow::Result<ReplaySummary> {
    let result = replay(args, config, interrupt);
    if let (Err(err), Some(dir)) = (&result, &args.dump_dir) {
        if let Some(core) = err.downcast_ref::<Error>() {
            if let Err(dump_err) = dump_failure(dir, core) {
                warn!("failed to save failure frame: {:#}", dump_err);
            }
        }
    }
    result
}

fn replay(args: &ReplayArgs, config: Config, interrupt: Interrupt) -> anyhow::Result<ReplaySummary> {
    let clicks = args
        .click
        .iter()
        .map(|path| load_template(path))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let untils = args
        .until
        .iter()
        .map(|path| load_template(path))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let expected = args.expect.as_deref().map(load_template).transpose()?;

    let device = ReplayDevice::open_dir(&args.frames, args.hold_last)?;
    let log = device.log();
    let ctx = Context::builder(device)
        .config(config)
        .interrupt(interrupt)
        .build()?;

    let mut dispatcher = Dispatcher::with_result("replay");
    for template in &clicks {
        dispatcher = dispatcher
            .click(template)
            .log(format!("click {}", template.name()));
    }
    for template in &untils {
        dispatcher = dispatcher
            .until(template, template.name().to_string())
            .log(format!("reached {}", template.name()));
    }
    if let Some(ms) = args.interval {
        dispatcher = dispatcher.interval(Duration::from_millis(ms));
    }
    if let Some(ms) = args.timeout {
        dispatcher = dispatcher.timeout(Duration::from_millis(ms));
    }

    let started = Instant::now();
    let reached = dispatcher.run(&ctx)?;
    info!(reached = ?reached, "replay finished");

    if let Some(template) = &expected {
        let frame = log
            .lock()
            .last_frame()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no frame was captured"))?;
        let _scope = ctx.manual_context(ScreenshotMode::Manual);
        ctx.use_frame(Some(frame))?;
        ctx.image().expect(template)?;
    }

    let log = log.lock();
    Ok(ReplaySummary {
        reached,
        frames: log.served(),
        events: log.events().to_vec(),
        elapsed_ms: started.elapsed().as_millis(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{imageops, Rgb, RgbImage};

    fn pattern(width: u32, height: u32, seed: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let v = (x.wrapping_mul(73) ^ y.wrapping_mul(151) ^ seed.wrapping_mul(2_654_435_761))
                .wrapping_mul(2_246_822_519);
            Rgb([(v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8])
        })
    }

    fn screen(patches: &[(&RgbImage, i64, i64)]) -> RgbImage {
        let mut image = RgbImage::from_pixel(64, 64, Rgb([255, 255, 255]));
        for (patch, x, y) in patches {
            imageops::replace(&mut image, *patch, *x, *y);
        }
        image
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("autotap-cmd-{}-{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn replay_args(frames: &Path, click: Vec<PathBuf>, until: Vec<PathBuf>) -> ReplayArgs {
        ReplayArgs {
            frames: frames.to_path_buf(),
            click,
            until,
            expect: None,
            interval: Some(1),
            timeout: None,
            hold_last: false,
            dump_dir: None,
        }
    }

    #[test]
    fn test_replay_clicks_then_stops() {
        let dir = scratch_dir("replay");
        let frames = dir.join("frames");
        std::fs::create_dir_all(&frames).unwrap();

        let skip = pattern(12, 12, 1);
        let home = pattern(12, 12, 2);
        skip.save(dir.join("skip.png")).unwrap();
        home.save(dir.join("home.png")).unwrap();
        screen(&[]).save(frames.join("000.png")).unwrap();
        screen(&[(&skip, 20, 30)]).save(frames.join("001.png")).unwrap();
        screen(&[(&home, 4, 4)]).save(frames.join("002.png")).unwrap();

        let args = replay_args(
            &frames,
            vec![dir.join("skip.png")],
            vec![dir.join("home.png")],
        );
        let summary = run_replay(&args, Config::default(), Interrupt::new()).unwrap();

        assert_eq!(summary.reached.as_deref(), Some("home"));
        assert_eq!(summary.frames, 3);
        assert_eq!(
            summary.events,
            vec![ReplayEvent::Click {
                frame: 1,
                point: autotap_core::Point::new(26, 36)
            }]
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_replay_expectation_failure_dumps_frame() {
        let dir = scratch_dir("dump");
        let frames = dir.join("frames");
        std::fs::create_dir_all(&frames).unwrap();

        let home = pattern(12, 12, 2);
        let badge = pattern(8, 8, 3);
        home.save(dir.join("home.png")).unwrap();
        badge.save(dir.join("badge.png")).unwrap();
        screen(&[(&home, 4, 4)]).save(frames.join("000.png")).unwrap();

        let mut args = replay_args(&frames, Vec::new(), vec![dir.join("home.png")]);
        args.expect = Some(dir.join("badge.png"));
        args.dump_dir = Some(dir.join("dumps"));

        let err = run_replay(&args, Config::default(), Interrupt::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::TemplateNotFound { .. })
        ));
        let dumped = std::fs::read_dir(dir.join("dumps")).unwrap().count();
        assert_eq!(dumped, 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_replay_interrupted_before_start() {
        let dir = scratch_dir("interrupt");
        let frames = dir.join("frames");
        std::fs::create_dir_all(&frames).unwrap();
        let home = pattern(12, 12, 2);
        home.save(dir.join("home.png")).unwrap();
        screen(&[]).save(frames.join("000.png")).unwrap();

        let interrupt = Interrupt::new();
        interrupt.set();
        let args = replay_args(&frames, Vec::new(), vec![dir.join("home.png")]);
        let err = run_replay(&args, Config::default(), interrupt).unwrap_err();
        assert!(err.downcast_ref::<Error>().is_some_and(Error::is_cancellation));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_match_and_color_commands() {
        let dir = scratch_dir("match");
        let icon = pattern(10, 10, 5);
        icon.save(dir.join("icon.png")).unwrap();
        let mut frame = screen(&[(&icon, 5, 5), (&icon, 40, 40)]);
        frame.put_pixel(60, 2, Rgb([255, 48, 64]));
        frame.save(dir.join("frame.png")).unwrap();

        let args = MatchArgs {
            frame: dir.join("frame.png"),
            template: dir.join("icon.png"),
            mode: MatchMode::Count,
            threshold: None,
            mask: None,
            transparent: false,
        };
        let out = run_match(&args, Config::default()).unwrap();
        assert_eq!(out["count"], 2);
        assert_eq!(out["template"], "icon");

        let args = ColorArgs {
            frame: dir.join("frame.png"),
            color: "#FF3040".into(),
            tolerance: 0,
            rect: None,
        };
        let out = run_color(&args, Config::default()).unwrap();
        assert_eq!(out["point"]["x"], 60);
        assert_eq!(out["point"]["y"], 2);

        std::fs::remove_dir_all(&dir).ok();
    }
}
