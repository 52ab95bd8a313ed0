//! Fixed-step game loop
//!
//! Wall-clock frame time feeds an accumulator that releases whole simulation
//! ticks. Drawing happens once per frame regardless of how many ticks ran, so
//! difficulty and collisions do not depend on display performance.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use crate::consts::{MAX_FRAME_DT_MS, MAX_SUBSTEPS};
use crate::platform::input::MotionSource;
use crate::sim::{GameSession, SessionEvent, SessionResult, TickOutcome};

/// Converts frame time into a number of fixed ticks
#[derive(Debug, Clone)]
pub struct FixedStep {
    step: Duration,
    accumulator: Duration,
}

impl FixedStep {
    pub fn new(tick_hz: u32) -> Self {
        Self {
            step: Duration::from_secs(1) / tick_hz.max(1),
            accumulator: Duration::ZERO,
        }
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Add a frame's elapsed time and return how many ticks are due
    pub fn accumulate(&mut self, frame_dt: Duration) -> u32 {
        self.accumulator += frame_dt.min(Duration::from_millis(MAX_FRAME_DT_MS));

        let mut substeps = 0;
        while self.accumulator >= self.step && substeps < MAX_SUBSTEPS {
            self.accumulator -= self.step;
            substeps += 1;
        }
        substeps
    }

    /// Fraction of the next tick already accumulated (for interpolation)
    pub fn alpha(&self) -> f32 {
        (self.accumulator.as_secs_f32() / self.step.as_secs_f32()).min(1.0)
    }

    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
    }
}

/// External request to stop the loop
#[derive(Debug, Clone, Default)]
pub struct QuitSignal(Arc<AtomicBool>);

impl QuitSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Watch a terminal for `q`/`quit` on a background thread
///
/// Every line is forwarded on the returned channel so prompts can share the
/// same input; the channel closes at EOF.
pub fn watch_terminal<R>(input: R, quit: QuitSignal) -> std::io::Result<Receiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("terminal-watch".into())
        .spawn(move || {
            for line in input.lines() {
                let Ok(line) = line else { break };
                let line = line.trim().to_lowercase();
                if matches!(line.as_str(), "q" | "quit") {
                    log::info!("Quit requested from terminal");
                    quit.request();
                }
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// How a run loop finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The session ended on a collision
    Finished(SessionResult),
    /// Quit was requested before the session ended
    Quit,
}

/// Presentation hook called once per frame
pub trait Renderer {
    /// Draw the session; `alpha` is progress toward the next tick
    fn draw(&mut self, session: &GameSession, alpha: f32);

    /// Events produced by the ticks run this frame
    fn on_events(&mut self, _events: &[SessionEvent]) {}
}

/// Renderer that draws nothing
#[derive(Debug, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn draw(&mut self, _session: &GameSession, _alpha: f32) {}
}

/// Drive a session in real time until it ends or quit is requested
pub fn run_session(
    session: &mut GameSession,
    source: &mut dyn MotionSource,
    renderer: &mut dyn Renderer,
    quit: &QuitSignal,
    frame_interval: Duration,
) -> RunOutcome {
    if let Some(result) = session.result() {
        return RunOutcome::Finished(result);
    }

    let mut clock = FixedStep::new(session.settings().tick_hz);
    let mut last = Instant::now();
    log::info!(
        "Session started: {} lanes, {} Hz, seed {}",
        session.settings().lane_count(),
        session.settings().tick_hz,
        session.seed()
    );

    loop {
        if quit.is_requested() {
            log::info!("Quit requested at tick {}", session.time_ticks());
            return RunOutcome::Quit;
        }

        let frame_start = Instant::now();
        let due = clock.accumulate(frame_start - last);
        last = frame_start;

        let mut finished = None;
        for _ in 0..due {
            match session.step(source) {
                TickOutcome::Continue => {}
                TickOutcome::Ended(result) => {
                    finished = Some(result);
                    break;
                }
                TickOutcome::Halted => {
                    finished = session.result();
                    break;
                }
            }
        }

        let events = session.drain_events();
        if !events.is_empty() {
            renderer.on_events(&events);
        }
        renderer.draw(session, clock.alpha());

        if let Some(result) = finished {
            return RunOutcome::Finished(result);
        }

        thread::sleep(frame_interval.saturating_sub(frame_start.elapsed()));
    }
}

/// Run a session as fast as possible, without a wall clock
///
/// Returns `None` if the session is still running after `max_ticks`.
pub fn run_headless(
    session: &mut GameSession,
    source: &mut dyn MotionSource,
    max_ticks: u64,
) -> Option<SessionResult> {
    for _ in 0..max_ticks {
        match session.step(source) {
            TickOutcome::Continue => {}
            TickOutcome::Ended(result) => return Some(result),
            TickOutcome::Halted => return session.result(),
        }
    }
    None
}
