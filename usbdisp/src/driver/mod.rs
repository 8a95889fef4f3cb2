//! Collaborator interfaces.
//!
//! The adapter's transport driver, register primitive, DDC bus and HDMI
//! companion chip are supplied by the host. This module only defines the
//! seams they plug into.

pub mod traits;
