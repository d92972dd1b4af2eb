use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use log::{error, info, warn};

use gesture_keyboard::app::{
    App, AppError, KeyboardSession, KeystrokeDispatcher, RunOptions, RunSummary,
};
use gesture_keyboard::config::AppConfig;
use gesture_keyboard::domain::core::Rect;
use gesture_keyboard::domain::gesture::GestureInterpreter;
use gesture_keyboard::platform;
use gesture_keyboard::tracking::{
    FrameSource, JsonLinesSource, ScriptTiming, ScriptedSource, TrackingError, labels_for_text,
};
use gesture_keyboard::ui::{KeyboardRenderer, RenderGeometry};

const DEMO_SOURCE: &str = "demo";

#[derive(Parser, Debug)]
#[command(
    name = "gesture-keyboard",
    about = "Type by pointing at a virtual keyboard and curling your index finger"
)]
struct Args {
    /// Minimum time between two accepted key presses, in milliseconds.
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Fingertip-to-palm distance in camera pixels below which the finger presses.
    #[arg(long)]
    press_threshold: Option<f32>,

    /// Display size as WIDTHxHEIGHT.
    #[arg(long, value_parser = parse_size)]
    display: Option<(u32, u32)>,

    /// Camera frame size as WIDTHxHEIGHT.
    #[arg(long, value_parser = parse_size)]
    camera: Option<(u32, u32)>,

    /// Interpret every Nth frame.
    #[arg(long)]
    skip_frames: Option<u32>,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// Tracker input: "demo", "-" for JSON lines on stdin, or a JSON-lines file.
    #[arg(long, default_value = DEMO_SOURCE)]
    source: String,

    /// Text the demo hand types.
    #[arg(long, default_value = "hello world")]
    demo_text: String,

    /// TrueType/OpenType font for key labels.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Write the last rendered frame to this PNG file.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Log keystrokes instead of sending them.
    #[arg(long)]
    dry_run: bool,

    /// Start with the keyboard hidden.
    #[arg(long)]
    hide_keyboard: bool,

    /// Debug logging.
    #[arg(short, long)]
    verbose: bool,
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", value))?;
    let w = w.trim().parse().map_err(|e| format!("bad width '{}': {}", w, e))?;
    let h = h.trim().parse().map_err(|e| format!("bad height '{}': {}", h, e))?;
    Ok((w, h))
}

impl Args {
    fn apply(&self, mut config: AppConfig) -> AppConfig {
        if let Some(ms) = self.debounce_ms {
            config.typing.debounce = Duration::from_millis(ms);
        }
        if let Some(threshold) = self.press_threshold {
            config.typing.press_threshold = threshold;
        }
        if let Some((w, h)) = self.display {
            config.display.width = w;
            config.display.height = h;
        }
        if let Some((w, h)) = self.camera {
            config.tracking.camera_width = w;
            config.tracking.camera_height = h;
        }
        if let Some(skip) = self.skip_frames {
            config.tracking.skip_frames = skip;
        }
        if self.hide_keyboard {
            config.keyboard_visible = false;
        }
        config
    }
}

fn open_source(args: &Args, config: &AppConfig) -> Result<Box<dyn FrameSource>, AppError> {
    match args.source.as_str() {
        DEMO_SOURCE => {
            let source = ScriptedSource::new(
                &config.build_layout()?,
                &config.coordinate_mapper()?,
                &config.gesture_config(),
                &labels_for_text(&args.demo_text),
                ScriptTiming::default(),
                Instant::now(),
            )
            .map_err(AppError::Device)?;
            info!("Demo hand will type {:?} over {} frames", args.demo_text, source.len());
            Ok(Box::new(source))
        }
        "-" => {
            info!("Reading tracker frames from stdin");
            Ok(Box::new(JsonLinesSource::new(io::stdin().lock())))
        }
        path => {
            let file = File::open(path).map_err(|e| {
                AppError::Device(TrackingError::DeviceUnavailable(format!("{}: {}", path, e)))
            })?;
            info!("Reading tracker frames from {}", path);
            Ok(Box::new(JsonLinesSource::new(BufReader::new(file))))
        }
    }
}

/// Marks a shutdown request; returns true if one was already pending
fn request_shutdown(flag: &AtomicBool) -> bool {
    flag.swap(true, Ordering::SeqCst)
}

/// First Ctrl-C stops the loop between frames so held keys get released.
/// A second one exits at once, for a tracker that never sends another frame.
fn install_interrupt_handler(flag: Arc<AtomicBool>) {
    let result = ctrlc::set_handler(move || {
        if request_shutdown(&flag) {
            warn!("Second interrupt, exiting without cleanup");
            std::process::exit(130);
        }
        info!("Interrupt received, stopping after the current frame");
    });
    if let Err(err) = result {
        warn!("Ctrl-C handler not installed: {}", err);
    }
}

fn run(args: &Args) -> Result<RunSummary, AppError> {
    let config = args.apply(AppConfig::new()).validate()?;
    let layout = config.build_layout()?;
    info!(
        "Layout ready: {} keys in {} rows, display {}x{}",
        layout.len(),
        layout.row_count(),
        config.display.width,
        config.display.height
    );

    // The demo hand types on its own; never aim it at the focused window
    let dry_run = args.dry_run || args.source == DEMO_SOURCE;
    let dispatcher = KeystrokeDispatcher::new(platform::default_backend(dry_run), config.typing.debounce);
    let session = KeyboardSession::new(
        layout,
        GestureInterpreter::new(config.gesture_config()),
        config.coordinate_mapper()?,
        dispatcher,
    )
    .with_movement_threshold(config.typing.movement_threshold);

    let origin = config.keyboard.origin(&config.display);
    let geometry = RenderGeometry {
        width: config.display.width,
        height: config.display.height,
        keyboard_area: Rect::new(origin.x, origin.y, config.keyboard.width, config.keyboard.height),
        key_rounding: config.keyboard.key_rounding,
        font_size: config.keyboard.key_height as f32 * 0.3,
    };
    let mut renderer = KeyboardRenderer::new(geometry, config.palette)?;
    if let Some(path) = &args.font {
        renderer = renderer.with_font(KeyboardRenderer::load_font(path)?);
    }

    let options = RunOptions {
        skip_frames: config.tracking.skip_frames,
        max_frames: args.max_frames,
        keyboard_visible: config.keyboard_visible,
    };
    let source = open_source(args, &config)?;
    let mut app = App::new(source, renderer, session, options);
    install_interrupt_handler(app.shutdown_handle());
    let summary = app.run()?;

    if let Some(path) = &args.snapshot {
        app.renderer().save_png(path)?;
        info!("Saved last frame to {}", path.display());
    }
    Ok(summary)
}

fn main() -> ExitCode {
    let args = Args::parse();
    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    info!("gesture-keyboard {}", env!("CARGO_PKG_VERSION"));

    match run(&args) {
        Ok(summary) => {
            info!(
                "{} frames ({} interpreted), {} presses sent, {} debounced, {:.1} fps",
                summary.frames, summary.interpreted, summary.presses_sent, summary.debounced, summary.fps
            );
            if summary.dispatch_failures > 0 || !summary.shutdown.is_clean() {
                warn!(
                    "{} failed presses, {} keys not released on shutdown",
                    summary.dispatch_failures,
                    summary.shutdown.failed.len()
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::from(1)
        }
    }
}
