//! Mode setting: color formats, timing tables and the register protocol.

pub mod controller;
pub mod format;
pub mod params;
pub mod timing;

pub use controller::ModeController;
pub use format::{ColorFormat, ColorMode16, OutputImage};
pub use params::{DisplayMode, DisplayParams};
pub use timing::{TimingEntry, TimingTable};
