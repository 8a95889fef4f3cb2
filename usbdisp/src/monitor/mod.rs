//! Monitor presence, capability block and hotplug handling.

pub mod edid;
pub mod hotplug;
pub mod presence;

pub use edid::{CapabilityBlock, EDID_BLOCK_SIZE, EDID_MAX_BLOCKS};
pub use hotplug::{HotplugEvent, HotplugMachine};
pub use presence::Presence;
