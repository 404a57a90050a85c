//! Polled keyboard and joystick input with file-based force feedback.
//!
//! [`DeviceManager`] enumerates the first usable keyboard and joystick,
//! configures them against an owning window and polls them into a
//! [`DeviceState`] snapshot. [`ForceFeedbackEffect`] loads effects from a
//! TOML file onto the managed joystick.
//!
//! ```no_run
//! use stickfx::{Axis, DeviceManager, WindowHandle};
//!
//! # fn main() -> stickfx::Result<()> {
//! let mut input = DeviceManager::new();
//! input.initialize(WindowHandle(0x1234))?;
//! input.update()?;
//! let state = input.state();
//! println!("x = {}, fire = {}", state.axis(Axis::X), state.button(0));
//! # Ok(())
//! # }
//! ```
//!
//! Native access goes through [`native::InputBackend`]. The Windows subsystem
//! is used by [`DeviceManager::initialize`]; [`backends::virtual_input`] runs
//! everywhere and drives the tests.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod backends;
pub mod config;
pub mod device;
pub mod effect;
pub mod effect_file;
pub mod error;
pub mod joystick;
pub mod keyboard;
pub mod manager;
pub mod metadata;
pub mod native;
pub mod state;

pub use config::InputConfig;
pub use device::Device;
pub use effect::ForceFeedbackEffect;
pub use effect_file::{EffectKind, FileEffect};
pub use error::{InputError, Result};
pub use joystick::Joystick;
pub use keyboard::Keyboard;
pub use manager::DeviceManager;
pub use metadata::{Axis, Available, DeviceClass, DeviceInstance};
pub use native::{AxisRange, CooperativeFlags, WindowHandle};
pub use state::DeviceState;
