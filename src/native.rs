//! The native input subsystem seam.
//!
//! Everything platform-specific sits behind three traits:
//! - [`InputBackend`]: the subsystem handle: enumerate devices, open one.
//! - [`NativeDevice`]: one opened device: configure, acquire, poll, effects.
//! - [`NativeEffect`]: one effect object created on a device.
//!
//! Each boxed implementation exclusively owns its native resource and releases
//! it in `Drop`. Enumeration is closure-driven: the backend walks its list and
//! calls the visitor once per entry until the visitor returns
//! [`Enumeration::Stop`].
//!
//! Methods take `&self`; implementations that need to mutate bookkeeping use
//! interior mutability. This lets a visitor call back into the same backend
//! or device while enumeration is in progress.

use crate::effect_file::FileEffect;
use crate::error::{InputError, Result};
use crate::metadata::{Axis, DeviceClass, DeviceInstance, DeviceObject};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Opaque handle of the window that owns device acquisition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    pub const NULL: WindowHandle = WindowHandle(0);

    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

bitflags::bitflags! {
    /// Sharing mode of a device relative to its owning window.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CooperativeFlags: u32 {
        const EXCLUSIVE    = 0x01;
        const NONEXCLUSIVE = 0x02;
        const FOREGROUND   = 0x04;
        const BACKGROUND   = 0x08;
        const NO_WIN_KEY   = 0x10;
    }
}

impl CooperativeFlags {
    /// Exactly one of each pair must be present.
    pub fn validate(self) -> Result<Self> {
        let sharing = self & (Self::EXCLUSIVE | Self::NONEXCLUSIVE);
        let focus = self & (Self::FOREGROUND | Self::BACKGROUND);
        if sharing.bits().count_ones() != 1 || focus.bits().count_ones() != 1 {
            return Err(InputError::InvalidCooperativeLevel(self.bits()));
        }
        Ok(self)
    }
}

/// Shape of the data a device reports from `poll`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataFormat {
    Keyboard,
    Joystick,
}

/// Visitor verdict during enumeration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enumeration {
    Continue,
    Stop,
}

/// Inclusive signed range (calibration bounds or physical span).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

impl AxisRange {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn validate(self) -> Result<Self> {
        if self.min >= self.max {
            return Err(InputError::InvalidRange {
                min: self.min,
                max: self.max,
            });
        }
        Ok(self)
    }

    /// Linearly map `raw` from `physical` into `self`, clamped to `self`.
    ///
    /// The endpoints map exactly: `physical.max` reads as `self.max`.
    pub fn scale_from(self, raw: i32, physical: AxisRange) -> i32 {
        // Spans reach 2^32 - 1, so their product needs i128.
        let span_in = i128::from(physical.max) - i128::from(physical.min);
        if span_in <= 0 {
            return self.min;
        }
        let raw = i128::from(raw.clamp(physical.min, physical.max));
        let span_out = i128::from(self.max) - i128::from(self.min);
        let offset = (raw - i128::from(physical.min)) * span_out;
        // Round to nearest so symmetric ranges keep their centre.
        let scaled = i128::from(self.min) + (offset + span_in / 2).div_euclid(span_in);
        scaled.clamp(i128::from(self.min), i128::from(self.max)) as i32
    }
}

impl Default for AxisRange {
    fn default() -> Self {
        Self::new(-1000, 1000)
    }
}

/// Raw joystick report, already scaled into each axis's configured range.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JoystickReport {
    /// `x y z rx ry rz`.
    pub axes: [i32; 6],
    pub sliders: [i32; 2],
    /// Pressed flags, button 1 first. May be longer or shorter than 16.
    pub buttons: Vec<bool>,
    /// POV angles in hundredths of a degree; `None` = centered.
    pub povs: Vec<Option<u32>>,
}

/// What a device returns from one poll, shaped by its [`DataFormat`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Report {
    Keyboard(Box<[u8; crate::state::KEY_COUNT]>),
    Joystick(JoystickReport),
}

/// Subsystem handle.
pub trait InputBackend {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Walk the attached devices of `class`.
    fn enumerate(
        &self,
        class: DeviceClass,
        visit: &mut dyn FnMut(&DeviceInstance) -> Enumeration,
    ) -> Result<()>;

    /// Open a device previously reported by [`enumerate`](Self::enumerate).
    fn open(&self, instance: &DeviceInstance) -> Result<Box<dyn NativeDevice>>;
}

/// One opened native device. Dropping it unacquires and releases it.
pub trait NativeDevice {
    fn instance(&self) -> &DeviceInstance;

    fn set_data_format(&self, format: DataFormat) -> Result<()>;

    fn set_cooperative_level(&self, window: WindowHandle, flags: CooperativeFlags) -> Result<()>;

    /// Walk the device's objects (axes, buttons, POV hats).
    fn enumerate_objects(&self, visit: &mut dyn FnMut(&DeviceObject) -> Enumeration)
        -> Result<()>;

    /// Set calibration bounds for one axis.
    fn set_range(&self, axis: Axis, range: AxisRange) -> Result<()>;

    fn acquire(&self) -> Result<()>;

    fn unacquire(&self);

    /// Read the current state. Requires a data format and acquisition.
    fn poll(&self) -> Result<Report>;

    fn set_autocenter(&self, enabled: bool) -> Result<()>;

    /// Walk the effects stored in an effect file.
    fn enumerate_effects_in_file(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(&FileEffect) -> Enumeration,
    ) -> Result<()>;

    /// Instantiate one effect on this device.
    fn create_effect(&self, effect: &FileEffect) -> Result<Box<dyn NativeEffect>>;
}

/// One native effect object. Dropping it stops and releases it.
pub trait NativeEffect {
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    /// `gain` is in native units, `0..=10000`.
    fn set_gain(&mut self, gain: u32) -> Result<()>;
    fn is_playing(&self) -> bool;
}
