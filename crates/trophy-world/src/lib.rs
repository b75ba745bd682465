//! Grid simulation engines for the badge demo screens.
//!
//! This crate holds the bounded grid, the flash-propagation and settling
//! engines, their text loaders, and the driver that paces them for a display.

pub mod grid;
pub mod flash;
pub mod settle;
pub mod loader;
pub mod display;
pub mod input;
pub mod driver;
pub mod carousel;

pub use grid::Grid;
pub use flash::{FlashEngine, FlashOutcome};
pub use settle::{BulkEngine, DropEngine, HaltReason, SettleEngine, SettleEvent, SettleGrid};
pub use loader::GridSource;
pub use display::{CellLayout, CellVisual, DisplayHandle, DisplaySink, HandleMap, TextSink};
pub use input::{Debouncer, DownVector, InputEvent, InputSource, ScriptedInput};
pub use driver::{Counters, DemoKind, Phase, SimulationDriver, SimulationState, TickResult};
pub use carousel::{Carousel, Screen, ScreenContent};
