//! Per-poll device state snapshot.
//!
//! [`DeviceState`] is an **owned** record of what a device reported on its most
//! recent successful `update()`. It is embedded by value inside every device and
//! overwritten wholesale; no history is kept.
//!
//! # Conventions
//! - Axes and sliders are signed values inside the range configured with
//!   [`Joystick::set_range`](crate::Joystick::set_range) (default `-1000..=1000`).
//! - `buttons[0]` is button 1. Only the first sixteen buttons are tracked.
//! - `pov` holds eight direction flags for the first POV hat, Up = 0, clockwise.
//!   At most one flag is set; all clear means centered.
//! - `keys` is the 256-byte key matrix. A byte with the high bit set is pressed.
//!
//! # Example
//! ```
//! use stickfx::{Axis, DeviceState};
//!
//! let state = DeviceState::default();
//! assert_eq!(state.axis(Axis::X), 0);
//! assert!(!state.button(0));
//! assert_eq!(state.pov_direction(), None);
//! assert_eq!(state.keys.pressed().count(), 0);
//! ```

use crate::metadata::Axis;
use serde::ser::{Serialize, Serializer};
use std::fmt;

/// Number of entries in a keyboard key matrix.
pub const KEY_COUNT: usize = 256;
/// Number of button flags carried by [`DeviceState`].
pub const BUTTON_COUNT: usize = 16;
/// Number of POV direction flags carried by [`DeviceState`].
pub const POV_DIRECTIONS: usize = 8;

/// 256-entry key state buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMatrix([u8; KEY_COUNT]);

impl KeyMatrix {
    /// Bit that marks a key as held down.
    pub const PRESSED: u8 = 0x80;

    pub fn from_bytes(bytes: [u8; KEY_COUNT]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn is_pressed(&self, code: u8) -> bool {
        self.0[code as usize] & Self::PRESSED != 0
    }

    /// Codes of every pressed key, ascending.
    pub fn pressed(&self) -> impl Iterator<Item = u8> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, b)| **b & Self::PRESSED != 0)
            .map(|(i, _)| i as u8)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; KEY_COUNT] {
        &self.0
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8; KEY_COUNT] {
        &mut self.0
    }
}

impl Default for KeyMatrix {
    fn default() -> Self {
        Self([0; KEY_COUNT])
    }
}

impl fmt::Debug for KeyMatrix {
    // 256 raw bytes are unreadable in logs; show what is held instead.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyMatrix")
            .field(&self.pressed().collect::<Vec<_>>())
            .finish()
    }
}

impl Serialize for KeyMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

/// Snapshot of one device's most recent poll.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct DeviceState {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub rx: i32,
    pub ry: i32,
    pub rz: i32,
    pub sliders: [i32; 2],
    pub buttons: [bool; BUTTON_COUNT],
    pub pov: [bool; POV_DIRECTIONS],
    pub keys: KeyMatrix,
}

impl DeviceState {
    /// Value of `axis` (sliders included).
    pub fn axis(&self, axis: Axis) -> i32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
            Axis::Rx => self.rx,
            Axis::Ry => self.ry,
            Axis::Rz => self.rz,
            Axis::Slider0 => self.sliders[0],
            Axis::Slider1 => self.sliders[1],
        }
    }

    pub(crate) fn axis_mut(&mut self, axis: Axis) -> &mut i32 {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
            Axis::Rx => &mut self.rx,
            Axis::Ry => &mut self.ry,
            Axis::Rz => &mut self.rz,
            Axis::Slider0 => &mut self.sliders[0],
            Axis::Slider1 => &mut self.sliders[1],
        }
    }

    /// Zero-based button lookup; out-of-range indices read as released.
    pub fn button(&self, index: usize) -> bool {
        self.buttons.get(index).copied().unwrap_or(false)
    }

    /// Active POV direction (`0..8`, Up = 0, clockwise) or `None` when centered.
    pub fn pov_direction(&self) -> Option<u8> {
        self.pov.iter().position(|&on| on).map(|i| i as u8)
    }
}

/// Map a POV angle in hundredths of a degree to eight direction flags.
///
/// `None` and out-of-range angles (native "centered" values such as
/// `0xFFFF_FFFF`) produce all-clear flags. Angles are bucketed into 45° sectors
/// centred on each direction: `slot = floor((deg + 22.5) / 45) mod 8`.
pub fn pov_flags(angle: Option<u32>) -> [bool; POV_DIRECTIONS] {
    let mut flags = [false; POV_DIRECTIONS];
    if let Some(slot) = angle.and_then(pov_slot) {
        flags[slot as usize] = true;
    }
    flags
}

/// Direction slot for a POV angle, `None` when centered.
pub fn pov_slot(angle: u32) -> Option<u8> {
    if angle >= 36_000 {
        return None;
    }
    Some((((angle + 2_250) / 4_500) % 8) as u8)
}

/// Inverse of [`pov_slot`]: the nominal angle of a direction slot.
pub fn pov_angle(slot: u8) -> u32 {
    u32::from(slot % 8) * 4_500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_zeroed() {
        let s = DeviceState::default();
        for axis in Axis::ALL {
            assert_eq!(s.axis(axis), 0);
        }
        assert!(s.buttons.iter().all(|b| !b));
        assert!(s.pov.iter().all(|p| !p));
        assert!(s.keys.as_bytes().iter().all(|b| *b == 0));
    }

    #[test]
    fn pov_cardinal_and_diagonal_angles() {
        assert_eq!(pov_slot(0), Some(0));
        assert_eq!(pov_slot(4_500), Some(1));
        assert_eq!(pov_slot(9_000), Some(2));
        assert_eq!(pov_slot(27_000), Some(6));
        // just short of 360 wraps back to Up
        assert_eq!(pov_slot(35_999), Some(0));
        assert_eq!(pov_slot(2_249), Some(0));
        assert_eq!(pov_slot(2_250), Some(1));
    }

    #[test]
    fn pov_centered_values_clear_all_flags() {
        assert_eq!(pov_flags(None), [false; 8]);
        assert_eq!(pov_flags(Some(u32::MAX)), [false; 8]);
        assert_eq!(pov_flags(Some(0xFFFF)), [false; 8]);
    }

    #[test]
    fn key_matrix_reports_high_bit_only() {
        let mut bytes = [0u8; KEY_COUNT];
        bytes[0x1E] = 0x80;
        bytes[0x1F] = 0x01; // toggle bit, not held
        bytes[0xFF] = 0xFF;
        let keys = KeyMatrix::from_bytes(bytes);
        assert!(keys.is_pressed(0x1E));
        assert!(!keys.is_pressed(0x1F));
        assert_eq!(keys.pressed().collect::<Vec<_>>(), vec![0x1E, 0xFF]);
    }

    #[test]
    fn out_of_range_button_reads_released() {
        let mut s = DeviceState::default();
        s.buttons[15] = true;
        assert!(s.button(15));
        assert!(!s.button(16));
    }
}
