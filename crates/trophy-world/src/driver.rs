//! Cadence-driven driver that owns one demo's grid, engine and counters.

use crate::display::{
    format_counter, paint_energy, paint_settle, CellVisual, DisplaySink, HandleMap,
};
use crate::flash::{FlashEngine, FlashOutcome};
use crate::grid::Grid;
use crate::loader::{example_map, load_energy_grid, load_settle_map, GridSource};
use crate::settle::{load, SettleEngine, SettleEvent, SettleGrid};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};
use trophy_core::{
    CadenceConfig, Coord, Error, FallDirection, FlashConfig, Result, SettleConfig, Timestamp,
};

/// Which demo a driver runs, with its parameters
#[derive(Debug, Clone)]
pub enum DemoKind {
    Flash(FlashConfig),
    Settle(SettleConfig),
}

/// Lifecycle of a demo instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Not entered yet
    Idle,
    /// Ticking on cadence
    Running,
    /// Nothing can move under the current direction
    Stable,
    /// Ran to its natural end (step limit reached, particle fell out, source blocked)
    Finished,
    /// Stopped by a fatal error; see [`SimulationDriver::last_error`]
    Halted,
}

/// Running totals exposed to the display
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Ticks that did work since the last reset
    pub step: u64,
    /// Cumulative flashes (flash demo)
    pub flashes: u64,
    /// First step on which every cell flashed together
    pub first_sync_step: Option<u64>,
    /// Particle moves (settle demo)
    pub moves: u64,
    /// Particles at rest (drop mode)
    pub rested: u64,
    /// Current load (settle demo)
    pub load: u64,
}

/// What changed in one tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickResult {
    Flash { step: u64, outcome: FlashOutcome },
    Settle { step: u64, event: SettleEvent, load: u64 },
}

/// Grid plus the engine that advances it
#[derive(Debug, Clone)]
pub enum World {
    Flash { grid: Grid<u8>, engine: FlashEngine },
    Settle { grid: SettleGrid, engine: SettleEngine },
}

/// Everything one demo instance owns between ticks
#[derive(Debug, Clone)]
pub struct SimulationState {
    pub phase: Phase,
    pub counters: Counters,
    pub world: Option<World>,
    pub last_error: Option<String>,
}

impl SimulationState {
    fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            counters: Counters::default(),
            world: None,
            last_error: None,
        }
    }
}

pub struct SimulationDriver {
    kind: DemoKind,
    source: GridSource,
    cadence: CadenceConfig,
    direction: FallDirection,
    rng: ChaCha8Rng,
    state: SimulationState,
    next_tick: Timestamp,
}

impl SimulationDriver {
    pub fn new(kind: DemoKind, source: GridSource, cadence: CadenceConfig) -> Self {
        let rng = match &kind {
            DemoKind::Flash(FlashConfig { seed: Some(seed), .. }) => ChaCha8Rng::seed_from_u64(*seed),
            _ => ChaCha8Rng::from_entropy(),
        };
        let direction = match &kind {
            DemoKind::Settle(config) => config.initial_direction,
            DemoKind::Flash(_) => FallDirection::Down,
        };

        Self {
            kind,
            source,
            cadence,
            direction,
            rng,
            state: SimulationState::idle(),
            next_tick: Timestamp::default(),
        }
    }

    pub fn flash(config: FlashConfig, source: GridSource, cadence: CadenceConfig) -> Self {
        Self::new(DemoKind::Flash(config), source, cadence)
    }

    pub fn settle(config: SettleConfig, source: GridSource, cadence: CadenceConfig) -> Self {
        Self::new(DemoKind::Settle(config), source, cadence)
    }

    pub fn kind(&self) -> &DemoKind {
        &self.kind
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn counters(&self) -> &Counters {
        &self.state.counters
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.state.last_error.as_deref()
    }

    pub fn next_tick_at(&self) -> Timestamp {
        self.next_tick
    }

    pub fn fall_direction(&self) -> FallDirection {
        self.direction
    }

    pub fn energy_grid(&self) -> Option<&Grid<u8>> {
        match &self.state.world {
            Some(World::Flash { grid, .. }) => Some(grid),
            _ => None,
        }
    }

    pub fn settle_grid(&self) -> Option<&SettleGrid> {
        match &self.state.world {
            Some(World::Settle { grid, .. }) => Some(grid),
            _ => None,
        }
    }

    /// Particle in flight in drop mode
    pub fn falling(&self) -> Option<Coord> {
        match &self.state.world {
            Some(World::Settle {
                engine: SettleEngine::Drop(engine),
                ..
            }) => engine.falling(),
            _ => None,
        }
    }

    /// Reload the grid and zero the counters. The first tick is scheduled one
    /// entry delay after `now`. A malformed map halts the demo and is returned.
    #[instrument(skip(self))]
    pub fn reset(&mut self, now: Timestamp) -> Result<()> {
        self.state = SimulationState::idle();
        self.next_tick = now.after_millis(self.cadence.entry_delay_ms());

        let kind = self.kind.clone();
        let world = match &kind {
            DemoKind::Flash(config) => World::Flash {
                grid: load_energy_grid(
                    &self.source,
                    config.rows,
                    config.cols,
                    config.fallback_max_energy,
                    &mut self.rng,
                ),
                engine: FlashEngine::new(),
            },
            DemoKind::Settle(config) => {
                let grid = match load_settle_map(&self.source, example_map(config.mode), config.rows, config.cols) {
                    Ok(grid) => grid,
                    Err(e) => {
                        self.halt(&e);
                        return Err(e);
                    }
                };
                self.direction = config.initial_direction;
                self.state.counters.load = load(&grid, self.direction);
                World::Settle {
                    grid,
                    engine: SettleEngine::from_config(config),
                }
            }
        };

        self.state.world = Some(world);
        self.state.phase = Phase::Running;
        info!(
            event = "demo_reset",
            first_tick_ms = self.next_tick.as_millis(),
            "Demo entered"
        );
        Ok(())
    }

    /// Run one step if it is due. Returns `None` when nothing happened.
    pub fn tick(&mut self, now: Timestamp) -> Option<TickResult> {
        if self.state.phase != Phase::Running || now < self.next_tick {
            return None;
        }

        self.next_tick = now.after_millis(self.cadence.tick_interval_ms);
        match self.step() {
            Ok(result) => result,
            Err(e) => {
                self.halt(&e);
                None
            }
        }
    }

    /// One unit of work regardless of the cadence.
    pub fn step(&mut self) -> Result<Option<TickResult>> {
        if self.state.phase != Phase::Running {
            return Ok(None);
        }

        let counters = &mut self.state.counters;
        match (&self.kind, self.state.world.as_mut()) {
            (DemoKind::Flash(config), Some(World::Flash { grid, engine })) => {
                if counters.step >= config.max_step {
                    info!(event = "step_limit", step = counters.step, "Flash demo reached its step limit");
                    self.state.phase = Phase::Finished;
                    return Ok(None);
                }

                counters.step += 1;
                let outcome = engine.tick(grid)?;
                counters.flashes += outcome.flash_count() as u64;

                if outcome.is_synchronized() && counters.first_sync_step.is_none() {
                    counters.first_sync_step = Some(counters.step);
                    info!(
                        event = "full_sync",
                        step = counters.step,
                        "Every cell flashed in the same step"
                    );
                }
                debug!(
                    step = counters.step,
                    flashes = outcome.flash_count(),
                    total_flashes = counters.flashes,
                    "Flash step"
                );

                Ok(Some(TickResult::Flash {
                    step: counters.step,
                    outcome,
                }))
            }
            (DemoKind::Settle(_), Some(World::Settle { grid, engine })) => {
                let event = engine.tick(grid)?;
                match event {
                    SettleEvent::Moved { .. } | SettleEvent::Spawned { .. } => {
                        counters.step += 1;
                        counters.moves = engine.moves();
                    }
                    SettleEvent::Rested { .. } => {
                        counters.step += 1;
                        counters.rested += 1;
                    }
                    SettleEvent::Stable => self.state.phase = Phase::Stable,
                    SettleEvent::Halted(_) => self.state.phase = Phase::Finished,
                }
                counters.load = load(grid, engine.direction());
                debug!(step = counters.step, event = ?event, load = counters.load, "Settle step");

                Ok(Some(TickResult::Settle {
                    step: counters.step,
                    event,
                    load: counters.load,
                }))
            }
            _ => Err(Error::InvalidState("demo has no world loaded".to_string())),
        }
    }

    /// Change the fall direction. Leaving `Stable` resumes ticking on the next
    /// due tick; the load is recomputed against the new direction.
    pub fn set_fall_direction(&mut self, direction: FallDirection) -> Result<()> {
        if !matches!(self.kind, DemoKind::Settle(_)) {
            return Err(Error::InvalidState(
                "fall direction only applies to the settle demo".to_string(),
            ));
        }
        if direction == self.direction {
            return Ok(());
        }

        self.direction = direction;
        if let Some(World::Settle { grid, engine }) = self.state.world.as_mut() {
            engine.set_direction(direction);
            self.state.counters.load = load(grid, direction);
        }
        if self.state.phase == Phase::Stable {
            self.state.phase = Phase::Running;
        }
        info!(direction = %direction, load = self.state.counters.load, "Fall direction set");
        Ok(())
    }

    /// Same as [`set_fall_direction`](Self::set_fall_direction) for a raw
    /// sensor encoding. An unknown value halts the demo.
    pub fn set_fall_direction_raw(&mut self, raw: u8) -> Result<()> {
        match FallDirection::try_from(raw) {
            Ok(direction) => self.set_fall_direction(direction),
            Err(e) => {
                self.halt(&e);
                Err(e)
            }
        }
    }

    /// Full redraw of the current grid and counters.
    pub fn paint<S: DisplaySink + ?Sized>(&self, sink: &mut S) {
        match &self.state.world {
            Some(World::Flash { grid, .. }) => paint_energy(sink, grid),
            Some(World::Settle { grid, .. }) => {
                paint_settle(sink, grid);
                if let Some(pos) = self.falling() {
                    draw(sink, HandleMap::for_grid(grid), pos, CellVisual::Falling);
                }
            }
            None => {}
        }
        self.paint_counters(sink);
    }

    /// Draw only what `result` changed.
    pub fn render<S: DisplaySink + ?Sized>(&self, result: &TickResult, sink: &mut S) {
        match (result, &self.state.world) {
            (TickResult::Flash { .. }, Some(World::Flash { grid, .. })) => {
                // Every cell gained energy, so the whole grid changed.
                paint_energy(sink, grid);
            }
            (TickResult::Settle { event, .. }, Some(World::Settle { grid, engine })) => {
                let handles = HandleMap::for_grid(grid);
                let moving = match engine {
                    SettleEngine::Drop(_) => CellVisual::Falling,
                    SettleEngine::Bulk(_) => CellVisual::Rock,
                };
                match *event {
                    SettleEvent::Spawned { at } => draw(sink, handles, at, CellVisual::Falling),
                    SettleEvent::Moved { from, to } => {
                        draw(sink, handles, from, CellVisual::Empty);
                        draw(sink, handles, to, moving);
                    }
                    SettleEvent::Rested { at } => draw(sink, handles, at, CellVisual::Rock),
                    SettleEvent::Stable | SettleEvent::Halted(_) => {}
                }
            }
            _ => {}
        }
        self.paint_counters(sink);
    }

    fn paint_counters<S: DisplaySink + ?Sized>(&self, sink: &mut S) {
        let counters = &self.state.counters;
        sink.draw_counter("step", &format_counter(counters.step, 4));
        match self.kind {
            DemoKind::Flash(_) => sink.draw_counter("flashes", &format_counter(counters.flashes, 6)),
            DemoKind::Settle(_) => sink.draw_counter("load", &format_counter(counters.load, 4)),
        }
    }

    fn halt(&mut self, err: &Error) {
        error!(event = "demo_halted", error = %err, "Demo instance halted");
        self.state.phase = Phase::Halted;
        self.state.last_error = Some(err.to_string());
    }
}

fn draw<S: DisplaySink + ?Sized>(sink: &mut S, handles: HandleMap, pos: Coord, visual: CellVisual) {
    if let Some(handle) = handles.handle(pos) {
        sink.draw_cell(handle, pos, visual);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::TextSink;
    use crate::loader::{EXAMPLE_CAVE_MAP, EXAMPLE_ROCK_MAP};
    use crate::settle::HaltReason;
    use trophy_core::SettleMode;

    const SAMPLE: &str = "\
5483143223
2745854711
5264556173
6141336146
6357385478
4167524645
2176841721
6882881134
4846848554
5283751526
";

    fn cadence() -> CadenceConfig {
        CadenceConfig {
            tick_interval_ms: 100,
            entry_delay_factor: 2,
            phase_pause_ms: 0,
        }
    }

    fn flash_driver(text: &str) -> SimulationDriver {
        let config = FlashConfig {
            seed: Some(7),
            ..Default::default()
        };
        SimulationDriver::flash(config, GridSource::Text(text.to_string()), cadence())
    }

    fn bulk_driver(text: &str, rows: usize, cols: usize, direction: FallDirection) -> SimulationDriver {
        let config = SettleConfig {
            rows,
            cols,
            mode: SettleMode::Bulk,
            initial_direction: direction,
            spawn_lane: 0,
        };
        SimulationDriver::settle(config, GridSource::Text(text.to_string()), cadence())
    }

    #[test]
    fn test_idle_until_reset() {
        let mut driver = flash_driver(SAMPLE);
        assert_eq!(driver.phase(), Phase::Idle);
        assert_eq!(driver.tick(Timestamp(10_000)), None);
    }

    #[test]
    fn test_cadence() {
        let mut driver = flash_driver(SAMPLE);
        driver.reset(Timestamp(1_000)).unwrap();
        assert_eq!(driver.phase(), Phase::Running);
        assert_eq!(driver.next_tick_at(), Timestamp(1_200));

        assert_eq!(driver.tick(Timestamp(1_199)), None);
        assert!(driver.tick(Timestamp(1_200)).is_some());
        assert_eq!(driver.tick(Timestamp(1_250)), None);
        assert!(driver.tick(Timestamp(1_300)).is_some());
        assert_eq!(driver.counters().step, 2);
    }

    #[test]
    fn test_flash_counter_matches_fired_sets() {
        let mut driver = flash_driver(SAMPLE);
        driver.reset(Timestamp(0)).unwrap();

        let mut summed = 0u64;
        for _ in 0..100 {
            if let Some(TickResult::Flash { outcome, .. }) = driver.step().unwrap() {
                summed += outcome.flash_count() as u64;
            }
            assert_eq!(summed, driver.counters().flashes);
        }
        assert_eq!(driver.counters().flashes, 1656);
        assert_eq!(driver.counters().step, 100);
    }

    #[test]
    fn test_first_sync_step_recorded() {
        let mut driver = flash_driver(SAMPLE);
        driver.reset(Timestamp(0)).unwrap();
        for _ in 0..200 {
            driver.step().unwrap();
        }
        assert_eq!(driver.counters().first_sync_step, Some(195));
    }

    #[test]
    fn test_flash_step_limit() {
        let config = FlashConfig {
            max_step: 3,
            seed: Some(1),
            ..Default::default()
        };
        let mut driver = SimulationDriver::flash(config, GridSource::Absent, cadence());
        driver.reset(Timestamp(0)).unwrap();

        for _ in 0..3 {
            assert!(driver.step().unwrap().is_some());
        }
        assert_eq!(driver.step().unwrap(), None);
        assert_eq!(driver.phase(), Phase::Finished);
        assert_eq!(driver.counters().step, 3);

        // Reset leaves the finished state.
        driver.reset(Timestamp(0)).unwrap();
        assert_eq!(driver.phase(), Phase::Running);
        assert_eq!(driver.counters().step, 0);
    }

    #[test]
    fn test_flash_falls_back_to_random() {
        let mut driver = flash_driver("garbage");
        driver.reset(Timestamp(0)).unwrap();
        let grid = driver.energy_grid().unwrap();
        assert_eq!(grid.dimensions(), (10, 10));
        assert!(grid.iter().all(|(_, v)| v <= 8));
    }

    #[test]
    fn test_settle_stable_until_direction_changes() {
        let mut driver = bulk_driver("O..\n...\n...\n", 3, 3, FallDirection::Down);
        driver.reset(Timestamp(0)).unwrap();
        assert_eq!(driver.counters().load, 1);

        let mut events = Vec::new();
        while let Some(TickResult::Settle { event, .. }) = driver.step().unwrap() {
            events.push(event);
        }
        assert_eq!(events.len(), 3);
        assert_eq!(events[2], SettleEvent::Stable);
        assert_eq!(driver.phase(), Phase::Stable);
        assert_eq!(
            driver.settle_grid().unwrap().get(Coord::new(2, 0)).unwrap(),
            trophy_core::SettleCell::Rock
        );
        assert_eq!(driver.counters().load, 3);

        // Stable does no work on later ticks.
        assert_eq!(driver.tick(Timestamp(60_000)), None);
        assert_eq!(driver.phase(), Phase::Stable);

        driver.set_fall_direction(FallDirection::Up).unwrap();
        assert_eq!(driver.phase(), Phase::Running);
        assert_eq!(driver.counters().load, 1);
        assert!(matches!(
            driver.tick(Timestamp(60_000)),
            Some(TickResult::Settle { event: SettleEvent::Moved { .. }, .. })
        ));
    }

    #[test]
    fn test_malformed_map_halts_demo() {
        let mut driver = bulk_driver("O.x\n...\n...\n", 3, 3, FallDirection::Down);
        let err = driver.reset(Timestamp(0)).unwrap_err();
        assert!(matches!(err, Error::MalformedInput { line: 1, .. }));
        assert_eq!(driver.phase(), Phase::Halted);
        assert!(driver.last_error().is_some());
        assert_eq!(driver.tick(Timestamp(10_000)), None);
        assert_eq!(driver.phase(), Phase::Halted);
    }

    #[test]
    fn test_missing_map_uses_example() {
        let config = SettleConfig::default();
        let mut driver = SimulationDriver::settle(config, GridSource::Absent, cadence());
        driver.reset(Timestamp(0)).unwrap();
        assert_eq!(driver.settle_grid().unwrap().to_string(), EXAMPLE_ROCK_MAP);

        while driver.step().unwrap().is_some() {
            if driver.phase() == Phase::Stable {
                break;
            }
        }
        assert_eq!(driver.counters().load, 136);
        assert_eq!(driver.counters().moves, 32);
    }

    #[test]
    fn test_invalid_raw_direction_halts() {
        let mut driver = bulk_driver("O..\n...\n...\n", 3, 3, FallDirection::Down);
        driver.reset(Timestamp(0)).unwrap();

        driver.set_fall_direction_raw(0).unwrap();
        assert_eq!(driver.fall_direction(), FallDirection::Up);

        let err = driver.set_fall_direction_raw(9).unwrap_err();
        assert!(matches!(err, Error::InvalidDirection(_)));
        assert_eq!(driver.phase(), Phase::Halted);
    }

    #[test]
    fn test_direction_rejected_for_flash_demo() {
        let mut driver = flash_driver(SAMPLE);
        assert!(matches!(
            driver.set_fall_direction(FallDirection::Left),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_drop_mode_finishes_and_renders() {
        let config = SettleConfig {
            rows: 3,
            cols: 3,
            mode: SettleMode::Drop,
            initial_direction: FallDirection::Down,
            spawn_lane: 1,
        };
        let mut driver =
            SimulationDriver::settle(config, GridSource::Text("...\n...\n###\n".to_string()), cadence());
        driver.reset(Timestamp(0)).unwrap();

        let mut sink = TextSink::new(3, 3);
        driver.paint(&mut sink);

        let first = driver.step().unwrap().unwrap();
        driver.render(&first, &mut sink);
        assert_eq!(sink.render().lines().next(), Some(".o."));
        assert_eq!(driver.falling(), Some(Coord::new(0, 1)));

        while let Some(result) = driver.step().unwrap() {
            driver.render(&result, &mut sink);
        }
        assert_eq!(driver.phase(), Phase::Finished);
        assert_eq!(driver.counters().rested, 4);
        assert_eq!(sink.render(), ".O.\nOOO\n###\nload: 0007\nstep: 0011\n");
    }

    #[test]
    fn test_sand_demo_without_map_uses_cave() {
        let mut driver = SimulationDriver::settle(SettleConfig::sand(), GridSource::Absent, cadence());
        driver.reset(Timestamp(0)).unwrap();
        assert_eq!(driver.settle_grid().unwrap().to_string(), EXAMPLE_CAVE_MAP);

        let mut last = None;
        while let Some(result) = driver.step().unwrap() {
            last = Some(result);
        }

        assert_eq!(driver.phase(), Phase::Finished);
        assert_eq!(driver.counters().rested, 24);
        assert!(matches!(
            last,
            Some(TickResult::Settle {
                event: SettleEvent::Halted(HaltReason::FellOut { .. }),
                ..
            })
        ));
    }

    #[test]
    fn test_tick_result_serializes() {
        let mut driver = flash_driver(SAMPLE);
        driver.reset(Timestamp(0)).unwrap();
        let result = driver.step().unwrap().unwrap();
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"Flash\""));
    }
}
