//! Keyboard device: a 256-entry key matrix.

use crate::device::Device;
use crate::error::Result;
use crate::metadata::DeviceInstance;
use crate::native::{CooperativeFlags, DataFormat, NativeDevice, Report, WindowHandle};
use crate::state::{DeviceState, KeyMatrix};
use tracing::{debug, trace};

/// Polled keyboard.
///
/// Owns its native device exclusively; dropping the keyboard releases it.
pub struct Keyboard {
    device: Box<dyn NativeDevice>,
    state: DeviceState,
    /// Scratch buffer filled by a poll before it is published to `state`.
    keys: KeyMatrix,
    available: bool,
}

impl Keyboard {
    /// Wrap an already-opened native keyboard.
    pub fn new(device: Box<dyn NativeDevice>) -> Self {
        Self {
            device,
            state: DeviceState::default(),
            keys: KeyMatrix::default(),
            available: true,
        }
    }

    /// `false` after a poll failed; cleared again by the next successful poll.
    pub fn available(&self) -> bool {
        self.available
    }

    #[inline]
    pub fn is_pressed(&self, code: u8) -> bool {
        self.state.keys.is_pressed(code)
    }

    pub fn pressed_keys(&self) -> impl Iterator<Item = u8> + '_ {
        self.state.keys.pressed()
    }

    /// Re-acquire after focus returns or the device reconnects.
    pub fn acquire(&mut self) -> Result<()> {
        self.device.acquire()
    }
}

impl Device for Keyboard {
    fn update(&mut self) -> Result<()> {
        let report = match self.device.poll() {
            Ok(report) => report,
            Err(e) => {
                if self.available {
                    debug!(device = %self.device.instance().id, error = %e, "keyboard unavailable");
                }
                self.available = false;
                return Err(e);
            }
        };

        match report {
            Report::Keyboard(bytes) => {
                *self.keys.as_bytes_mut() = *bytes;
            }
            Report::Joystick(_) => {
                // Data format is fixed at configuration; a joystick report here is a backend bug.
                self.available = false;
                return Err(crate::InputError::Unsupported(
                    "keyboard received a joystick-shaped report",
                ));
            }
        }

        self.available = true;
        self.state.keys.clone_from(&self.keys);
        trace!(device = %self.device.instance().id, pressed = self.keys.pressed().count(), "keyboard polled");
        Ok(())
    }

    fn state(&self) -> &DeviceState {
        &self.state
    }

    fn set_data_format(&mut self) -> Result<()> {
        self.device.set_data_format(DataFormat::Keyboard)
    }

    fn set_cooperative_level(&mut self, window: WindowHandle, flags: CooperativeFlags) -> Result<()> {
        self.device.set_cooperative_level(window, flags.validate()?)
    }

    fn instance(&self) -> &DeviceInstance {
        self.device.instance()
    }
}

impl std::fmt::Debug for Keyboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyboard")
            .field("id", &self.device.instance().id)
            .field("available", &self.available)
            .field("pressed", &self.state.keys)
            .finish()
    }
}
