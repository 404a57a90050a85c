//! Device and device-object metadata.
//!
//! Backends describe what they find during enumeration with [`DeviceInstance`]
//! (one per device) and [`DeviceObject`] (one per axis, button, slider or POV on
//! a device). These are lightweight, cloneable and serializable so they can be
//! logged or persisted for diagnostics.
//!
//! [`Available`] is the capability mask a [`Joystick`](crate::Joystick)
//! accumulates from its objects; it decides which [`DeviceState`](crate::DeviceState)
//! fields an `update()` populates.

use serde::{Deserialize, Serialize};
use std::fmt;

bitflags::bitflags! {
    /// Which state fields the hardware actually reports.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Available: u32 {
        const X_AXIS    = 0x0000_0001;
        const Y_AXIS    = 0x0000_0002;
        const Z_AXIS    = 0x0000_0004;
        const RX_AXIS   = 0x0000_0008;
        const RY_AXIS   = 0x0000_0010;
        const RZ_AXIS   = 0x0000_0020;
        const BUTTON_01 = 0x0000_0040;
        const BUTTON_02 = 0x0000_0080;
        const BUTTON_03 = 0x0000_0100;
        const BUTTON_04 = 0x0000_0200;
        const BUTTON_05 = 0x0000_0400;
        const BUTTON_06 = 0x0000_0800;
        const BUTTON_07 = 0x0000_1000;
        const BUTTON_08 = 0x0000_2000;
        const BUTTON_09 = 0x0000_4000;
        const BUTTON_10 = 0x0000_8000;
        const BUTTON_11 = 0x0001_0000;
        const BUTTON_12 = 0x0002_0000;
        const BUTTON_13 = 0x0004_0000;
        const BUTTON_14 = 0x0008_0000;
        const BUTTON_15 = 0x0010_0000;
        const BUTTON_16 = 0x0020_0000;
        const SLIDER    = 0x0040_0000;
        const POV       = 0x0080_0000;
    }
}

impl Available {
    /// Flag for zero-based button `index`, or `None` past button 16.
    pub fn button(index: u8) -> Option<Self> {
        if index < 16 {
            Self::from_bits(Self::BUTTON_01.bits() << index)
        } else {
            None
        }
    }

    pub fn has_button(self, index: usize) -> bool {
        index < 16 && self.bits() & (Self::BUTTON_01.bits() << index) != 0
    }
}

/// Range-capable axes, sliders included.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
    Rx,
    Ry,
    Rz,
    Slider0,
    Slider1,
}

impl Axis {
    pub const ALL: [Axis; 8] = [
        Axis::X,
        Axis::Y,
        Axis::Z,
        Axis::Rx,
        Axis::Ry,
        Axis::Rz,
        Axis::Slider0,
        Axis::Slider1,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Availability bit set when this axis is discovered.
    pub fn available_flag(self) -> Available {
        match self {
            Axis::X => Available::X_AXIS,
            Axis::Y => Available::Y_AXIS,
            Axis::Z => Available::Z_AXIS,
            Axis::Rx => Available::RX_AXIS,
            Axis::Ry => Available::RY_AXIS,
            Axis::Rz => Available::RZ_AXIS,
            Axis::Slider0 | Axis::Slider1 => Available::SLIDER,
        }
    }

    pub fn is_slider(self) -> bool {
        matches!(self, Axis::Slider0 | Axis::Slider1)
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
            Axis::Rx => "RX",
            Axis::Ry => "RY",
            Axis::Rz => "RZ",
            Axis::Slider0 => "Slider0",
            Axis::Slider1 => "Slider1",
        };
        f.write_str(s)
    }
}

/// Class of device to enumerate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceClass {
    Keyboard,
    GameController,
}

/// One device found during enumeration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInstance {
    /// Stable backend-specific identity (e.g. `"xinput:0"`, `"virtual:joystick:1"`).
    pub id: String,
    /// User-facing product name.
    pub name: String,
    pub class: DeviceClass,
    /// Instance advertises force-feedback support.
    pub ff_capable: bool,
}

/// What a device object is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Axis(Axis),
    /// Zero-based button index.
    Button(u8),
    /// Zero-based POV hat index.
    Pov(u8),
}

impl ObjectKind {
    /// Availability bit contributed by this object (empty past button 16 or
    /// for POV hats other than the first).
    pub fn available_flag(self) -> Available {
        match self {
            ObjectKind::Axis(axis) => axis.available_flag(),
            ObjectKind::Button(i) => Available::button(i).unwrap_or_default(),
            ObjectKind::Pov(0) => Available::POV,
            ObjectKind::Pov(_) => Available::empty(),
        }
    }
}

/// One object (axis, button, POV) on a device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceObject {
    pub name: String,
    pub kind: ObjectKind,
}

impl DeviceObject {
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}
