//! Button-cycled screens. Only the active screen's demo is ticked; leaving a
//! screen simply stops calling it, and entering one resets it.

use crate::display::DisplaySink;
use crate::driver::{DemoKind, SimulationDriver, TickResult};
use crate::input::{Debouncer, InputEvent, InputSource};
use tracing::{info, warn};
use trophy_core::{FallDirection, InputConfig, Timestamp};

pub enum ScreenContent {
    /// Fixed content with nothing to simulate
    Static,
    Demo(SimulationDriver),
}

pub struct Screen {
    pub name: String,
    pub content: ScreenContent,
}

impl Screen {
    pub fn fixed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: ScreenContent::Static,
        }
    }

    pub fn demo(name: impl Into<String>, driver: SimulationDriver) -> Self {
        Self {
            name: name.into(),
            content: ScreenContent::Demo(driver),
        }
    }

    pub fn driver(&self) -> Option<&SimulationDriver> {
        match &self.content {
            ScreenContent::Demo(driver) => Some(driver),
            ScreenContent::Static => None,
        }
    }

    fn driver_mut(&mut self) -> Option<&mut SimulationDriver> {
        match &mut self.content {
            ScreenContent::Demo(driver) => Some(driver),
            ScreenContent::Static => None,
        }
    }
}

pub struct Carousel {
    screens: Vec<Screen>,
    active: usize,
    debouncer: Debouncer,
    last_tilt: Option<FallDirection>,
}

impl Carousel {
    pub fn new(screens: Vec<Screen>, input: &InputConfig) -> Self {
        Self {
            screens,
            active: 0,
            debouncer: Debouncer::from_config(input),
            last_tilt: None,
        }
    }

    pub fn len(&self) -> usize {
        self.screens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active_screen(&self) -> Option<&Screen> {
        self.screens.get(self.active)
    }

    pub fn active_driver(&self) -> Option<&SimulationDriver> {
        self.active_screen().and_then(Screen::driver)
    }

    /// Make `index` the active screen and reset its demo, if any.
    pub fn enter(&mut self, index: usize, now: Timestamp) {
        let Some(screen) = self.screens.get_mut(index) else {
            warn!(index, "No such screen");
            return;
        };
        self.active = index;
        info!(event = "screen_enter", screen = %screen.name, index, "Transitioning screen");

        let tilt = self.last_tilt;
        if let Some(driver) = screen.driver_mut() {
            // A failed reset leaves the demo halted; the error is already logged.
            if driver.reset(now).is_ok() {
                if let (Some(direction), DemoKind::Settle(_)) = (tilt, driver.kind()) {
                    let _ = driver.set_fall_direction(direction);
                }
            }
        }
    }

    /// Apply one input event. Returns true when the active screen changed.
    pub fn handle_event(&mut self, event: InputEvent, now: Timestamp) -> bool {
        match event {
            InputEvent::Advance => {
                if self.screens.is_empty() || !self.debouncer.accept(now) {
                    return false;
                }
                let next = (self.active + 1) % self.screens.len();
                self.enter(next, now);
                true
            }
            InputEvent::Tilt(vector) => {
                if let Some(direction) = vector.to_direction() {
                    self.last_tilt = Some(direction);
                    if let Some(driver) = self.screens.get_mut(self.active).and_then(Screen::driver_mut) {
                        if matches!(driver.kind(), DemoKind::Settle(_)) {
                            let _ = driver.set_fall_direction(direction);
                        }
                    }
                }
                false
            }
        }
    }

    /// Tick the active demo if one is due.
    pub fn poll(&mut self, now: Timestamp) -> Option<TickResult> {
        self.screens
            .get_mut(self.active)
            .and_then(Screen::driver_mut)
            .and_then(|driver| driver.tick(now))
    }

    /// One pass of the main loop: at most one tick of work, then at most one
    /// input event. Returns the tick result, if any.
    pub fn run_once<I, S>(&mut self, now: Timestamp, input: &mut I, sink: &mut S) -> Option<TickResult>
    where
        I: InputSource + ?Sized,
        S: DisplaySink + ?Sized,
    {
        let result = self.poll(now);
        if let (Some(result), Some(driver)) = (&result, self.active_driver()) {
            driver.render(result, sink);
        }

        if let Some(event) = input.poll(now) {
            if self.handle_event(event, now) {
                match self.active_driver() {
                    Some(driver) => driver.paint(sink),
                    None => sink.begin_frame(0, 0),
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::TextSink;
    use crate::driver::Phase;
    use crate::input::{DownVector, ScriptedInput};
    use crate::loader::GridSource;
    use trophy_core::{CadenceConfig, FlashConfig, SettleConfig};

    fn cadence() -> CadenceConfig {
        CadenceConfig {
            tick_interval_ms: 100,
            entry_delay_factor: 2,
            phase_pause_ms: 0,
        }
    }

    fn carousel() -> Carousel {
        let flash = SimulationDriver::flash(
            FlashConfig {
                seed: Some(3),
                ..Default::default()
            },
            GridSource::Absent,
            cadence(),
        );
        let settle = SimulationDriver::settle(SettleConfig::default(), GridSource::Absent, cadence());

        Carousel::new(
            vec![
                Screen::fixed("leaderboard"),
                Screen::demo("octopus", flash),
                Screen::demo("rocks", settle),
            ],
            &InputConfig { debounce_ms: 500 },
        )
    }

    #[test]
    fn test_advance_cycles_and_resets() {
        let mut carousel = carousel();
        assert_eq!(carousel.active_index(), 0);
        assert!(carousel.poll(Timestamp(10_000)).is_none());

        assert!(carousel.handle_event(InputEvent::Advance, Timestamp(1_000)));
        assert_eq!(carousel.active_index(), 1);
        assert_eq!(carousel.active_driver().unwrap().phase(), Phase::Running);

        // Debounced.
        assert!(!carousel.handle_event(InputEvent::Advance, Timestamp(1_100)));
        assert_eq!(carousel.active_index(), 1);

        assert!(carousel.handle_event(InputEvent::Advance, Timestamp(1_600)));
        assert!(carousel.handle_event(InputEvent::Advance, Timestamp(2_200)));
        assert_eq!(carousel.active_index(), 0);
    }

    #[test]
    fn test_only_active_demo_ticks() {
        let mut carousel = carousel();
        carousel.enter(1, Timestamp(0));
        assert!(carousel.poll(Timestamp(200)).is_some());
        assert!(carousel.poll(Timestamp(300)).is_some());
        assert_eq!(carousel.active_driver().unwrap().counters().step, 2);

        carousel.enter(2, Timestamp(400));
        carousel.poll(Timestamp(600));

        // Re-entering restarts the flash demo from zero.
        carousel.enter(1, Timestamp(700));
        assert_eq!(carousel.active_driver().unwrap().counters().step, 0);
    }

    #[test]
    fn test_tilt_steers_settle_demo() {
        let mut carousel = carousel();
        let tilt_left = InputEvent::Tilt(DownVector::new(-5.0, 0.5));

        // Remembered while another screen is active, applied on entry.
        carousel.handle_event(tilt_left, Timestamp(0));
        carousel.enter(2, Timestamp(0));
        assert_eq!(
            carousel.active_driver().unwrap().fall_direction(),
            FallDirection::Left
        );

        carousel.handle_event(InputEvent::Tilt(DownVector::new(0.0, 9.8)), Timestamp(10));
        assert_eq!(
            carousel.active_driver().unwrap().fall_direction(),
            FallDirection::Down
        );
    }

    #[test]
    fn test_run_once_renders() {
        let mut carousel = carousel();
        let mut input = ScriptedInput::periodic_advance(1_000, 1);
        let mut sink = TextSink::new(10, 10);

        assert!(carousel.run_once(Timestamp(1_000), &mut input, &mut sink).is_none());
        assert_eq!(carousel.active_index(), 1);
        assert_eq!(sink.counter("step"), Some("0000"));

        assert!(carousel.run_once(Timestamp(1_200), &mut input, &mut sink).is_some());
        assert_eq!(sink.counter("step"), Some("0001"));
        assert!(sink.counter("flashes").is_some());
    }
}
