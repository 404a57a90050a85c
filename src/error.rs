//! Error type shared by every fallible operation in the crate.
//!
//! Native failures are passed through unchanged in [`InputError::Native`]; the
//! remaining variants describe conditions this layer detects itself.

use std::path::PathBuf;

/// Result alias used throughout `stickfx`.
pub type Result<T> = std::result::Result<T, InputError>;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// A call into the native input subsystem failed.
    ///
    /// `code` is the subsystem's own status value, untouched.
    #[error("native call `{op}` failed with code {code:#x}")]
    Native { op: &'static str, code: i64 },

    /// Enumeration finished without accepting any keyboard or joystick.
    #[error("no input devices found")]
    NoDevices,

    /// Operation requires an initialized [`DeviceManager`](crate::DeviceManager).
    #[error("device manager is not initialized")]
    NotInitialized,

    /// The current platform (or backend) cannot do this.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    #[error("invalid window handle")]
    InvalidWindow,

    /// Cooperative flags must name exactly one of each
    /// exclusive/non-exclusive and foreground/background pair.
    #[error("invalid cooperative level flags {0:#x}")]
    InvalidCooperativeLevel(u32),

    #[error("invalid axis range [{min}, {max}]")]
    InvalidRange { min: i32, max: i32 },

    /// `set_range` was pointed at an object the device does not expose as an axis.
    #[error("{0} is not a range axis on this device")]
    NotAnAxis(String),

    #[error("device `{0}` is not acquired")]
    NotAcquired(String),

    /// The device stopped responding (unplugged, slot emptied, focus lost).
    #[error("device `{0}` was lost")]
    DeviceLost(String),

    /// Gain is expressed in native units and must lie in `0..=10000`.
    #[error("gain {0} is outside 0..=10000")]
    GainOutOfRange(u32),

    #[error("effect is bound to joystick `{expected}`, got `{actual}`")]
    JoystickMismatch { expected: String, actual: String },

    #[error("joystick `{0}` does not support force feedback")]
    ForceFeedbackUnsupported(String),

    #[error("effect `{name}`: {reason}")]
    InvalidEffect { name: String, reason: String },

    #[error("effect file {path}: {reason}")]
    EffectFile { path: PathBuf, reason: String },

    #[error("config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl InputError {
    /// `true` when the device has to be re-acquired (or re-plugged) before it
    /// reports again.
    pub fn is_device_lost(&self) -> bool {
        matches!(self, Self::DeviceLost(_) | Self::NotAcquired(_))
    }

    pub(crate) fn native(op: &'static str, code: impl Into<i64>) -> Self {
        Self::Native {
            op,
            code: code.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_code_is_passed_through() {
        let err = InputError::native("XInputGetState", 0x48f_u32);
        match err {
            InputError::Native { op, code } => {
                assert_eq!(op, "XInputGetState");
                assert_eq!(code, 0x48f);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn lost_and_unacquired_count_as_device_lost() {
        assert!(InputError::DeviceLost("joy".into()).is_device_lost());
        assert!(InputError::NotAcquired("joy".into()).is_device_lost());
        assert!(!InputError::NoDevices.is_device_lost());
    }
}
