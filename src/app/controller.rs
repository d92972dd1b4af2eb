//! Application controller and frame loop
//!
//! [`KeyboardSession`] owns everything that survives between frames: the
//! layout, the gesture interpreter, the interaction state and the
//! dispatcher. [`App`] drives a session from a [`FrameSource`] and feeds a
//! [`FrameRenderer`], one blocking pass per frame on a single thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::app::dispatcher::{DispatchError, KeystrokeDispatcher, PressOutcome, ShutdownReport};
use crate::app::state::{FrameObservation, InteractionState, StateMachine, Transition};
use crate::config::ConfigError;
use crate::domain::core::Point;
use crate::domain::gesture::{CoordinateMapper, GestureInterpreter, GestureReading};
use crate::domain::hand::HandLandmarks;
use crate::domain::keyboard::Layout;
use crate::input::InputBackend;
use crate::tracking::{FrameSource, TrackedFrame, TrackingError};
use crate::ui::{FrameRenderer, RenderView, RendererError};

/// Errors that abort startup or the frame loop
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tracking failed: {0}")]
    Device(TrackingError),

    #[error("Renderer error: {0}")]
    Renderer(#[from] RendererError),
}

/// What happened during one interpreted frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub observation: FrameObservation,
    pub transition: Transition,
    pub reading: GestureReading,
    /// Fingertip in display coordinates
    pub fingertip: Option<Point>,
    /// Palm anchor in display coordinates
    pub palm: Option<Point>,
    /// Result of the press edge, if this frame had one that reached the OS
    pub dispatched: Option<PressOutcome>,
    pub dispatch_error: Option<DispatchError>,
    /// Fingertip travelled at least the movement threshold since last frame
    pub moving: bool,
}

/// Per-run typing state: layout, gesture reading, interaction and dispatch
pub struct KeyboardSession<B: InputBackend> {
    layout: Layout,
    interpreter: GestureInterpreter,
    mapper: CoordinateMapper,
    state: InteractionState,
    dispatcher: KeystrokeDispatcher<B>,
    movement_threshold: f32,
}

impl<B: InputBackend> KeyboardSession<B> {
    pub fn new(
        layout: Layout,
        interpreter: GestureInterpreter,
        mapper: CoordinateMapper,
        dispatcher: KeystrokeDispatcher<B>,
    ) -> Self {
        Self {
            layout,
            interpreter,
            mapper,
            state: InteractionState::default(),
            dispatcher,
            movement_threshold: 10.0,
        }
    }

    pub fn with_movement_threshold(mut self, threshold: f32) -> Self {
        self.movement_threshold = threshold;
        self
    }

    pub fn process_frame(&mut self, frame: &TrackedFrame) -> FrameOutcome {
        self.process_hand(frame.primary_hand(), frame.captured_at)
    }

    /// Runs one frame through interpreter, state machine and dispatcher
    ///
    /// Dispatch failures are logged and returned in the outcome; they never
    /// stop the caller's loop.
    pub fn process_hand(&mut self, hand: Option<&HandLandmarks>, now: Instant) -> FrameOutcome {
        let reading = self.interpreter.interpret(hand);
        let fingertip = reading.fingertip.map(|tip| self.mapper.to_display(&tip));
        let palm = hand
            .and_then(|h| self.interpreter.palm_center(h))
            .map(|lm| self.mapper.to_display(lm));

        let observation = match (hand, fingertip) {
            (None, _) => FrameObservation::NoHand,
            (Some(_), None) => FrameObservation::NoFingertip,
            (Some(_), Some(point)) => FrameObservation::Fingertip {
                key: self.layout.hit_test(point.x, point.y),
                pressed: reading.pressed,
            },
        };

        let transition = StateMachine::process_frame(self.state, observation);
        self.state = transition.state;

        if transition.hover_changed {
            match transition.state.hover_key.and_then(|id| self.layout.character_of(id)) {
                Some(label) => debug!("Hovering '{}'", label),
                None => debug!("Hover cleared"),
            }
        }

        let mut dispatched = None;
        let mut dispatch_error = None;
        if let Some(kind) = transition.press_edge.and_then(|id| self.layout.kind_of(id)) {
            match self.dispatcher.press(kind, now) {
                Ok(outcome) => dispatched = Some(outcome),
                Err(err) => {
                    warn!("{}", err);
                    dispatch_error = Some(err);
                }
            }
        }

        FrameOutcome {
            observation,
            transition,
            moving: reading.movement >= self.movement_threshold,
            reading,
            fingertip,
            palm,
            dispatched,
            dispatch_error,
        }
    }

    pub fn view(&self, keyboard_visible: bool, fps: f32) -> RenderView {
        RenderView {
            hover: self.state.hover_key,
            pressed: self.state.press_key,
            fingertip: None,
            palm: None,
            keyboard_visible,
            distance: None,
            fps,
        }
    }

    /// Releases held keys and returns the interaction state to neutral
    pub fn shutdown(&mut self) -> ShutdownReport {
        self.state = InteractionState::default();
        self.interpreter.reset();
        self.dispatcher.shutdown()
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn dispatcher(&self) -> &KeystrokeDispatcher<B> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut KeystrokeDispatcher<B> {
        &mut self.dispatcher
    }
}

/// Frames counted per one-second window
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window_start: Option<Instant>,
    frames: u32,
    current: f32,
}

impl FpsCounter {
    const WINDOW: Duration = Duration::from_secs(1);

    pub fn new() -> Self {
        Self {
            window_start: None,
            frames: 0,
            current: 0.0,
        }
    }

    /// Counts a frame; returns the new rate when a window closes
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;

        let elapsed = now.saturating_duration_since(start);
        if elapsed < Self::WINDOW {
            return None;
        }
        self.current = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.window_start = Some(now);
        Some(self.current)
    }

    pub fn current(&self) -> f32 {
        self.current
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame-loop options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Interpret every Nth frame
    pub skip_frames: u32,
    pub max_frames: Option<u64>,
    pub keyboard_visible: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            skip_frames: 1,
            max_frames: None,
            keyboard_visible: true,
        }
    }
}

/// Totals for a finished run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub frames: u64,
    pub interpreted: u64,
    pub presses_sent: u64,
    pub debounced: u64,
    pub dispatch_failures: u64,
    pub malformed_frames: u64,
    pub render_failures: u64,
    pub fps: f32,
    pub shutdown: ShutdownReport,
}

/// Frame loop over a source, a session and a renderer
pub struct App<S: FrameSource, R: FrameRenderer, B: InputBackend> {
    source: S,
    renderer: R,
    session: KeyboardSession<B>,
    options: RunOptions,
    shutdown: Arc<AtomicBool>,
    fps: FpsCounter,
}

impl<S: FrameSource, R: FrameRenderer, B: InputBackend> App<S, R, B> {
    pub fn new(source: S, renderer: R, session: KeyboardSession<B>, options: RunOptions) -> Self {
        Self {
            source,
            renderer,
            session,
            options,
            shutdown: Arc::new(AtomicBool::new(false)),
            fps: FpsCounter::new(),
        }
    }

    /// Flag that stops the loop before the next frame when set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn session(&self) -> &KeyboardSession<B> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut KeyboardSession<B> {
        &mut self.session
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Runs until the source ends, the shutdown flag is set or the frame
    /// limit is reached
    ///
    /// Held keys are released before returning, including on a device error.
    pub fn run(&mut self) -> Result<RunSummary, AppError> {
        let mut summary = RunSummary::default();
        let skip = u64::from(self.options.skip_frames.max(1));
        let mut last: Option<FrameOutcome> = None;

        info!("Frame loop started");
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("Shutdown requested");
                break;
            }
            if self.options.max_frames.is_some_and(|max| summary.frames >= max) {
                info!("Frame limit of {} reached", summary.frames);
                break;
            }

            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("Tracker stream ended");
                    break;
                }
                Err(err) if err.is_frame_local() => {
                    warn!("{}; treating frame as empty", err);
                    summary.malformed_frames += 1;
                    TrackedFrame::empty(Instant::now())
                }
                Err(err) => {
                    error!("{}", err);
                    let report = self.session.shutdown();
                    if !report.is_clean() {
                        warn!("{} key(s) could not be released", report.failed.len());
                    }
                    return Err(AppError::Device(err));
                }
            };

            if summary.frames % skip == 0 {
                let outcome = self.session.process_frame(&frame);
                summary.interpreted += 1;
                match outcome.dispatched {
                    Some(PressOutcome::Sent) => summary.presses_sent += 1,
                    Some(PressOutcome::Debounced) => summary.debounced += 1,
                    None => {}
                }
                if outcome.dispatch_error.is_some() {
                    summary.dispatch_failures += 1;
                }
                last = Some(outcome);
            }
            summary.frames += 1;

            if let Some(rate) = self.fps.tick(frame.captured_at) {
                debug!("FPS: {:.1}", rate);
            }

            let mut view = self.session.view(self.options.keyboard_visible, self.fps.current());
            if let Some(outcome) = &last {
                view.fingertip = outcome.fingertip;
                view.palm = outcome.palm;
                view.distance = outcome.reading.distance;
            }
            if let Err(err) = self.renderer.render(self.session.layout(), &view) {
                warn!("Frame {} not rendered: {}", summary.frames, err);
                summary.render_failures += 1;
            }
        }

        summary.fps = self.fps.current();
        summary.shutdown = self.session.shutdown();
        info!(
            "Frame loop finished: {} frames, {} presses sent",
            summary.frames, summary.presses_sent
        );
        Ok(summary)
    }
}
