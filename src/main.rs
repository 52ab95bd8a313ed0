//! Lane Runner entry point
//!
//! Wires a motion source, a terminal status view and the game over flow
//! around the simulation, one session per run.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use clap::Parser;

use lane_runner::game_over::{CannedFlavorText, GameOverSummary, RetryPrompt, now_ms};
use lane_runner::highscores::format_age;
use lane_runner::platform::LineDecoder;
use lane_runner::sim::SessionEvent;
use lane_runner::{
    GameOverFlow, GameSession, HighScores, LaneLayout, QuitSignal, Renderer, RunOutcome,
    SerialMotionSource, Settings, run_session, watch_terminal,
};

#[derive(Debug, Parser)]
#[command(name = "lane-runner", version, about = "Motion-sensor lane runner")]
struct Cli {
    /// JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Motion input: a serial device path, or `-` for stdin
    #[arg(long, default_value = "-")]
    input: String,

    /// Lane layout: 2 or 3
    #[arg(long)]
    lanes: Option<String>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    tick_hz: Option<u32>,

    /// Minimum time between lane changes (0 disables)
    #[arg(long)]
    cooldown_ms: Option<u64>,

    /// Stop after this many runs (defaults to 1 when reading stdin)
    #[arg(long)]
    runs: Option<u32>,

    /// High score file
    #[arg(long)]
    scores: Option<PathBuf>,

    /// Status view refresh rate
    #[arg(long, default_value_t = 60)]
    fps: u32,
}

impl Cli {
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)
                .with_context(|| format!("loading settings from {}", path.display()))?,
            None => Settings::default(),
        };
        if let Some(lanes) = &self.lanes {
            let Some(layout) = LaneLayout::from_str(lanes) else {
                bail!("unsupported lane layout {:?} (expected 2 or 3)", lanes);
            };
            settings.apply_layout(layout);
        }
        if let Some(seed) = self.seed {
            settings.seed = Some(seed);
        }
        if let Some(hz) = self.tick_hz {
            settings.tick_hz = hz;
        }
        if let Some(ms) = self.cooldown_ms {
            settings.cooldown_ms = ms;
        }
        settings.validate().context("invalid settings")?;
        Ok(settings)
    }

    fn reads_stdin(&self) -> bool {
        self.input == "-"
    }
}

/// One-line status view on stdout
struct TerminalRenderer {
    last_draw: Option<Instant>,
    interval: Duration,
}

impl TerminalRenderer {
    fn new() -> Self {
        Self {
            last_draw: None,
            interval: Duration::from_millis(100),
        }
    }
}

impl Renderer for TerminalRenderer {
    fn draw(&mut self, session: &GameSession, _alpha: f32) {
        if self.last_draw.is_some_and(|t| t.elapsed() < self.interval) {
            return;
        }
        self.last_draw = Some(Instant::now());

        let lanes: String = (0..session.settings().lane_count())
            .map(|lane| {
                let blocked = session.obstacles().any(|o| o.lane == lane);
                match (session.runner().lane() == lane, blocked) {
                    (true, true) => "[@!]",
                    (true, false) => "[@ ]",
                    (false, true) => "[ !]",
                    (false, false) => "[  ]",
                }
            })
            .collect();
        let params = session.difficulty();
        print!(
            "\r{}  score {:>5}  speed {:>4.1}  spawn {:>4}ms ",
            lanes,
            session.score(),
            params.speed,
            params.spawn_interval_ms
        );
        let _ = io::stdout().flush();
    }

    fn on_events(&mut self, events: &[SessionEvent]) {
        for event in events {
            match event {
                SessionEvent::Collision { obstacle_id, lane } => {
                    log::debug!("Hit obstacle {} in lane {}", obstacle_id, lane);
                }
                SessionEvent::MoveDropped(command) => {
                    log::debug!("Ignored {:?} (cooldown)", command);
                }
                _ => {}
            }
        }
    }
}

/// Asks on the terminal: R to restart, Q to quit
struct TerminalPrompt {
    lines: Receiver<String>,
}

impl RetryPrompt for TerminalPrompt {
    fn should_retry(&mut self, summary: &GameOverSummary) -> bool {
        print_summary(summary);
        // Drop whatever was typed during the run
        while self.lines.try_recv().is_ok() {}
        loop {
            print!("Press R to restart or Q to quit: ");
            let _ = io::stdout().flush();
            match self.lines.recv() {
                Err(_) => return false,
                Ok(line) => match line.as_str() {
                    "r" | "restart" => return true,
                    "q" | "quit" => return false,
                    _ => {}
                },
            }
        }
    }
}

/// Retries until a fixed number of runs have been played
struct RunLimit {
    played: u32,
    max: Option<u32>,
}

impl RetryPrompt for RunLimit {
    fn should_retry(&mut self, summary: &GameOverSummary) -> bool {
        print_summary(summary);
        self.played += 1;
        self.max.is_none_or(|max| self.played < max)
    }
}

fn print_summary(summary: &GameOverSummary) {
    println!();
    println!("GAME OVER!");
    println!("Final Score: {}", summary.result.final_score);
    if summary.is_new_best() {
        println!("New high score!");
    } else if let Some(rank) = summary.rank {
        println!("Leaderboard rank #{}", rank);
    }
    if let Some(best) = summary.previous_best {
        println!("Previous best: {}", best);
    }
    println!("{}", summary.flavor_text);
}

fn open_input(cli: &Cli, decoder: LineDecoder) -> anyhow::Result<SerialMotionSource> {
    let source = if cli.reads_stdin() {
        SerialMotionSource::spawn(BufReader::new(io::stdin()), decoder)
    } else {
        let device = File::open(&cli.input)
            .with_context(|| format!("opening motion device {}", cli.input))?;
        SerialMotionSource::spawn(BufReader::new(device), decoder)
    };
    source.context("starting motion reader")
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Lane Runner starting...");

    let cli = Cli::parse();
    let settings = cli.settings()?;
    log::info!(
        "{} lanes, {} Hz, cooldown {}ms",
        settings.lane_count(),
        settings.tick_hz,
        settings.cooldown_ms
    );

    let mut source = open_input(&cli, LineDecoder::new(settings.digit_codes))?;

    let high_scores = match &cli.scores {
        Some(path) => HighScores::load(path)
            .with_context(|| format!("loading high scores from {}", path.display()))?,
        None => HighScores::new(),
    };
    for (i, entry) in high_scores.entries.iter().take(3).enumerate() {
        log::info!(
            "#{} {} ({})",
            i + 1,
            entry.score,
            format_age(entry.timestamp_ms, now_ms())
        );
    }

    let base_seed = settings.seed.unwrap_or_else(now_ms);
    let provider = Arc::new(CannedFlavorText::new(base_seed));
    let mut flow = GameOverFlow::new(provider, Duration::from_millis(settings.flavor_timeout_ms))
        .with_high_scores(high_scores, cli.scores.clone());

    let quit = QuitSignal::new();
    let mut prompt: Box<dyn RetryPrompt> = if cli.reads_stdin() {
        Box::new(RunLimit {
            played: 0,
            max: Some(cli.runs.unwrap_or(1)),
        })
    } else {
        // Motion comes from the device, so the terminal is free for commands
        let lines = watch_terminal(BufReader::new(io::stdin()), quit.clone())
            .context("starting terminal watcher")?;
        println!("Type q and Enter to quit at any time.");
        Box::new(TerminalPrompt { lines })
    };

    let frame_interval = Duration::from_secs(1) / cli.fps.max(1);
    let mut renderer = TerminalRenderer::new();
    let mut runs = 0u32;

    loop {
        let seed = base_seed.wrapping_add(runs as u64);
        let mut session = GameSession::new(settings.clone(), seed)?;
        // Stale input from the previous game over screen
        source.slot().take();

        let outcome = run_session(
            &mut session,
            &mut source,
            &mut renderer,
            &quit,
            frame_interval,
        );
        let result = match outcome {
            RunOutcome::Finished(result) => result,
            RunOutcome::Quit => break,
        };
        runs += 1;

        if !flow.conclude(result, prompt.as_mut()) {
            break;
        }
        if cli.runs.is_some_and(|max| runs >= max) {
            break;
        }
    }

    let diag = source.diagnostics();
    if diag.errors > 0 {
        log::info!(
            "Motion input: {} lines, {} errors (last: {})",
            diag.lines_read,
            diag.errors,
            diag.last_error.as_deref().unwrap_or("none")
        );
    }
    log::info!("Goodbye after {} run(s)", runs);
    Ok(())
}
