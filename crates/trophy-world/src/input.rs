//! Button and orientation input, reduced to the events the demos care about.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use trophy_core::{FallDirection, InputConfig, Timestamp};

/// Accelerometer reading projected onto the display plane.
///
/// `x` grows towards display right (increasing column), `y` towards display
/// bottom (increasing row).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DownVector {
    pub x: f32,
    pub y: f32,
}

impl DownVector {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Cardinal direction of the dominant axis. Ties, zero and non-finite
    /// readings give `None` so the caller keeps its current direction.
    pub fn to_direction(&self) -> Option<FallDirection> {
        if !self.x.is_finite() || !self.y.is_finite() {
            return None;
        }

        let (ax, ay) = (self.x.abs(), self.y.abs());
        if ax > ay {
            Some(if self.x > 0.0 {
                FallDirection::Right
            } else {
                FallDirection::Left
            })
        } else if ay > ax {
            Some(if self.y > 0.0 {
                FallDirection::Down
            } else {
                FallDirection::Up
            })
        } else {
            None
        }
    }
}

/// Something the user did
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    /// Move on to the next screen
    Advance,
    /// New orientation reading
    Tilt(DownVector),
}

/// Source of input events, polled once per loop iteration
pub trait InputSource {
    fn poll(&mut self, now: Timestamp) -> Option<InputEvent>;
}

/// Accepts at most one event per `min_interval`.
#[derive(Debug, Clone)]
pub struct Debouncer {
    min_interval_ms: u64,
    last_accepted: Option<Timestamp>,
}

impl Debouncer {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval_ms,
            last_accepted: None,
        }
    }

    pub fn from_config(config: &InputConfig) -> Self {
        Self::new(config.debounce_ms)
    }

    pub fn accept(&mut self, now: Timestamp) -> bool {
        let ready = self
            .last_accepted
            .map_or(true, |last| now >= last.after_millis(self.min_interval_ms));
        if ready {
            self.last_accepted = Some(now);
        }
        ready
    }
}

/// Replays a fixed list of timed events
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    events: VecDeque<(Timestamp, InputEvent)>,
}

impl ScriptedInput {
    pub fn new(mut events: Vec<(Timestamp, InputEvent)>) -> Self {
        events.sort_by_key(|(at, _)| *at);
        Self {
            events: events.into(),
        }
    }

    /// An `Advance` press every `period_ms`, `count` times.
    pub fn periodic_advance(period_ms: u64, count: usize) -> Self {
        let events = (1..=count as u64)
            .map(|i| (Timestamp::from_millis(i * period_ms), InputEvent::Advance))
            .collect();
        Self::new(events)
    }

    pub fn is_exhausted(&self) -> bool {
        self.events.is_empty()
    }

    /// When the next event becomes due.
    pub fn next_at(&self) -> Option<Timestamp> {
        self.events.front().map(|(at, _)| *at)
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self, now: Timestamp) -> Option<InputEvent> {
        match self.events.front() {
            Some((at, _)) if *at <= now => self.events.pop_front().map(|(_, event)| event),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dominant_axis() {
        assert_eq!(DownVector::new(0.1, 9.8).to_direction(), Some(FallDirection::Down));
        assert_eq!(DownVector::new(0.1, -9.8).to_direction(), Some(FallDirection::Up));
        assert_eq!(DownVector::new(9.0, -2.0).to_direction(), Some(FallDirection::Right));
        assert_eq!(DownVector::new(-9.0, 2.0).to_direction(), Some(FallDirection::Left));
    }

    #[test]
    fn test_ambiguous_readings_keep_direction() {
        assert_eq!(DownVector::new(0.0, 0.0).to_direction(), None);
        assert_eq!(DownVector::new(3.0, -3.0).to_direction(), None);
        assert_eq!(DownVector::new(f32::NAN, 1.0).to_direction(), None);
    }

    #[test]
    fn test_debouncer() {
        let mut debouncer = Debouncer::new(500);
        assert!(debouncer.accept(Timestamp(1_000)));
        assert!(!debouncer.accept(Timestamp(1_200)));
        assert!(!debouncer.accept(Timestamp(1_499)));
        assert!(debouncer.accept(Timestamp(1_500)));
    }

    #[test]
    fn test_scripted_input() {
        let mut input = ScriptedInput::new(vec![
            (Timestamp(200), InputEvent::Tilt(DownVector::new(1.0, 0.0))),
            (Timestamp(100), InputEvent::Advance),
        ]);

        assert_eq!(input.next_at(), Some(Timestamp(100)));
        assert_eq!(input.poll(Timestamp(50)), None);
        assert_eq!(input.poll(Timestamp(150)), Some(InputEvent::Advance));
        assert_eq!(input.poll(Timestamp(150)), None);
        assert!(matches!(input.poll(Timestamp(300)), Some(InputEvent::Tilt(_))));
        assert!(input.is_exhausted());
    }

    #[test]
    fn test_periodic_advance() {
        let mut input = ScriptedInput::periodic_advance(1_000, 2);
        assert_eq!(input.poll(Timestamp(999)), None);
        assert_eq!(input.poll(Timestamp(1_000)), Some(InputEvent::Advance));
        assert_eq!(input.poll(Timestamp(2_500)), Some(InputEvent::Advance));
        assert!(input.is_exhausted());
    }
}
