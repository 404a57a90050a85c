//! Common device interface.
//!
//! [`Device`] is implemented by [`Keyboard`](crate::Keyboard) and
//! [`Joystick`](crate::Joystick). Each device owns one [`DeviceState`]; `update`
//! refreshes it from the native device and `state` reads it back.
//!
//! `update` is all-or-nothing: on failure the previous snapshot is kept intact.

use crate::error::Result;
use crate::metadata::DeviceInstance;
use crate::native::{CooperativeFlags, WindowHandle};
use crate::state::DeviceState;

pub trait Device {
    /// Refresh [`state`](Self::state) from the native device.
    fn update(&mut self) -> Result<()> {
        Ok(())
    }

    /// Most recent snapshot. Zeroed until the first successful `update`.
    fn state(&self) -> &DeviceState;

    /// Tell the native device which report shape to produce.
    fn set_data_format(&mut self) -> Result<()> {
        Ok(())
    }

    /// Set sharing mode relative to `window`.
    fn set_cooperative_level(&mut self, _window: WindowHandle, _flags: CooperativeFlags) -> Result<()> {
        Ok(())
    }

    fn instance(&self) -> &DeviceInstance;

    fn name(&self) -> &str {
        &self.instance().name
    }

    fn id(&self) -> &str {
        &self.instance().id
    }
}
