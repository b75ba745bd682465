//! Terminal runner for the trophy demos.

mod telemetry;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tokio::signal;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info, warn};
use trophy_core::{FallDirection, SettleMode, Timestamp, TrophyConfig};
use trophy_world::{
    Carousel, CellVisual, DisplaySink, GridSource, HandleMap, Phase, Screen,
    ScriptedInput, SimulationDriver, TextSink, TickResult,
};

const FLASH_INPUT: &str = "aoc2021_day11_init.txt";
const ROCK_INPUT: &str = "aoc2023_day14_map.txt";
const SAND_INPUT: &str = "aoc2022_day14_cave.txt";

/// Polling granularity of the real-time loop
const IDLE_POLL_MS: u64 = 20;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Which demo to run
    #[arg(short, long, value_enum, default_value = "carousel")]
    demo: Demo,

    /// Starting grid for a single demo (ignored by the carousel)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Directory holding the carousel's grid files
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// JSON configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many ticks of work
    #[arg(long)]
    ticks: Option<u64>,

    /// Run on a simulated clock without pacing or wave animation
    #[arg(long)]
    headless: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Initial fall direction for the settle demos
    #[arg(long)]
    direction: Option<FallDirection>,

    /// Press the advance button every this many milliseconds
    #[arg(long)]
    advance_every_ms: Option<u64>,

    /// Print the final counters as JSON on exit
    #[arg(long)]
    summary_json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Demo {
    Flash,
    Rocks,
    Sand,
    Carousel,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    telemetry::init_telemetry(args.json_logs)?;

    let config = match &args.config {
        Some(path) => TrophyConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TrophyConfig::default(),
    };

    info!(demo = ?args.demo, headless = args.headless, "Starting trophy runner");

    let mut carousel = build_carousel(&args, &config);
    let mut input = scripted_input(&args, carousel.len());
    let mut sink = TextSink::new(0, 0);

    carousel.enter(0, Timestamp::default());
    if let Some(driver) = carousel.active_driver() {
        driver.paint(&mut sink);
    }
    print_frame(&carousel, &sink);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let clock = Instant::now();
    let mut virtual_now = Timestamp::default();
    let mut worked = 0u64;

    loop {
        let now = if args.headless {
            virtual_now
        } else {
            Timestamp::from_millis(clock.elapsed().as_millis() as u64)
        };

        let before = carousel.active_index();
        let result = carousel.run_once(now, &mut input, &mut sink);

        if let Some(result) = &result {
            worked += 1;
            if !args.headless {
                animate_waves(result, &sink, config.cadence.phase_pause_ms).await;
            }
        }
        if result.is_some() || carousel.active_index() != before {
            print_frame(&carousel, &sink);
        }

        if args.ticks.is_some_and(|limit| worked >= limit) {
            info!(ticks = worked, "Tick limit reached");
            break;
        }

        if args.headless {
            if input.is_exhausted() && !active_is_running(&carousel) {
                info!("Nothing left to simulate");
                break;
            }
            virtual_now = next_wakeup(&carousel, &input, virtual_now);
            continue;
        }

        tokio::select! {
            _ = &mut shutdown => break,
            _ = sleep(Duration::from_millis(IDLE_POLL_MS)) => {}
        }
    }

    if let Some(driver) = carousel.active_driver() {
        let counters = driver.counters();
        info!(
            event = "run_finished",
            phase = ?driver.phase(),
            step = counters.step,
            flashes = counters.flashes,
            load = counters.load,
            "Run finished"
        );
        if args.summary_json {
            println!("{}", serde_json::to_string(counters)?);
        }
    }

    telemetry::shutdown_telemetry();
    Ok(())
}

/// The carousel opens on a static title screen; a single demo runs alone.
fn build_carousel(args: &Args, config: &TrophyConfig) -> Carousel {
    let source_for = |file: &str| match (&args.input, args.demo) {
        (Some(path), demo) if demo != Demo::Carousel => GridSource::File(path.clone()),
        _ => GridSource::File(args.data_dir.join(file)),
    };

    let mut rocks = config.settle.clone();
    let mut sand = config.sand.clone();
    sand.mode = SettleMode::Drop;
    if let Some(direction) = args.direction {
        rocks.initial_direction = direction;
        sand.initial_direction = direction;
    }

    let flash = Screen::demo(
        "octopus",
        SimulationDriver::flash(config.flash.clone(), source_for(FLASH_INPUT), config.cadence.clone()),
    );
    let rocks = Screen::demo(
        "rocks",
        SimulationDriver::settle(rocks, source_for(ROCK_INPUT), config.cadence.clone()),
    );
    let sand = Screen::demo(
        "sand",
        SimulationDriver::settle(sand, source_for(SAND_INPUT), config.cadence.clone()),
    );

    let screens = match args.demo {
        Demo::Carousel => vec![Screen::fixed("trophy"), flash, rocks, sand],
        Demo::Flash => vec![flash],
        Demo::Rocks => vec![rocks],
        Demo::Sand => vec![sand],
    };
    Carousel::new(screens, &config.input)
}

fn scripted_input(args: &Args, screens: usize) -> ScriptedInput {
    match (args.advance_every_ms, args.demo) {
        // One full lap back to the title screen.
        (Some(period), Demo::Carousel) => ScriptedInput::periodic_advance(period, screens),
        (Some(_), _) => {
            warn!("--advance-every-ms only applies to the carousel");
            ScriptedInput::default()
        }
        (None, _) => ScriptedInput::default(),
    }
}

fn active_is_running(carousel: &Carousel) -> bool {
    carousel
        .active_driver()
        .is_some_and(|driver| driver.phase() == Phase::Running)
}

/// Earliest moment anything can happen on the simulated clock.
fn next_wakeup(carousel: &Carousel, input: &ScriptedInput, now: Timestamp) -> Timestamp {
    let tick = carousel
        .active_driver()
        .filter(|driver| driver.phase() == Phase::Running)
        .map(|driver| driver.next_tick_at());
    let press = input.next_at();

    let wakeup = match (tick, press) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) | (None, Some(a)) => a,
        (None, None) => now.after_millis(IDLE_POLL_MS),
    };
    wakeup.max(now)
}

/// Replay a flash tick's propagation rounds before the final frame.
async fn animate_waves(result: &TickResult, sink: &TextSink, pause_ms: u64) {
    let TickResult::Flash { outcome, .. } = result else {
        return;
    };
    if outcome.waves.len() < 2 || pause_ms == 0 {
        return;
    }

    let (rows, cols) = sink.dimensions();
    let handles = HandleMap::new(rows, cols);
    let mut frame = sink.clone();
    for (round, wave) in outcome.waves.iter().enumerate() {
        for &pos in wave {
            if let Some(handle) = handles.handle(pos) {
                frame.draw_cell(handle, pos, CellVisual::Flashing);
            }
        }
        debug!(round, cells = wave.len(), "Flash wave");
        println!("{}", frame.render());
        sleep(Duration::from_millis(pause_ms)).await;
    }
}

fn print_frame(carousel: &Carousel, sink: &TextSink) {
    let name = carousel
        .active_screen()
        .map(|screen| screen.name.as_str())
        .unwrap_or("-");
    println!("== {} ==\n{}", name, sink.render());
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
