//! Native input subsystems for `stickfx`.
//!
//! Implementations of [`InputBackend`](crate::native::InputBackend):
//! - [`virtual_input`]: in-memory, scriptable devices. Always available;
//!   used by tests, demos and headless tooling.
//! - `windows`: XInput controllers (rumble as force feedback) and the
//!   system keyboard. Windows only.
//!
//! [`create_default`] picks the platform subsystem used by
//! [`DeviceManager::initialize`](crate::DeviceManager::initialize).

use crate::error::Result;
use crate::native::InputBackend;

pub mod virtual_input;

#[cfg(target_os = "windows")]
#[cfg_attr(docsrs, doc(cfg(target_os = "windows")))]
pub mod windows;

/// Create the native subsystem for the current platform.
///
/// Fails with [`InputError::Unsupported`](crate::InputError::Unsupported) on
/// platforms without one.
pub fn create_default() -> Result<Box<dyn InputBackend>> {
    #[cfg(target_os = "windows")]
    {
        Ok(Box::new(windows::WindowsBackend::new()?))
    }

    #[cfg(not(target_os = "windows"))]
    {
        tracing::warn!("no native input subsystem on this platform");
        Err(crate::error::InputError::Unsupported(
            "native input subsystem (Windows only)",
        ))
    }
}

#[cfg(all(test, not(target_os = "windows")))]
mod tests {
    use super::*;
    use crate::{DeviceManager, InputError, WindowHandle};

    #[test]
    fn platform_subsystem_is_unavailable_off_windows() {
        assert!(matches!(create_default(), Err(InputError::Unsupported(_))));

        let mut mgr = DeviceManager::new();
        assert!(matches!(
            mgr.initialize(WindowHandle(1)),
            Err(InputError::Unsupported(_))
        ));
        assert!(!mgr.is_initialized());
        mgr.finalize();
    }
}
