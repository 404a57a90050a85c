#![cfg(target_os = "windows")]

//! Windows input subsystem.
//!
//! - **Game controllers** come from XInput slots `0..4` ([`xinput_devices`]).
//!   Rumble motors stand in for force feedback.
//! - **Keyboard** is the system keyboard read with `GetAsyncKeyState`
//!   ([`keyboard_device`]). Key codes are Windows virtual-key codes.
//!
//! Cooperative levels are validated against a real window (`IsWindow`). With
//! `FOREGROUND`, acquisition and polling fail with
//! [`InputError::NotAcquired`](crate::InputError::NotAcquired) while the window
//! is not in the foreground; call
//! [`DeviceManager::acquire`](crate::DeviceManager::acquire) once it is.

pub mod keyboard_device;
pub mod xinput_devices;

use crate::error::{InputError, Result};
use crate::metadata::{DeviceClass, DeviceInstance};
use crate::native::{CooperativeFlags, Enumeration, InputBackend, NativeDevice, WindowHandle};
use keyboard_device::SystemKeyboard;
use std::cell::Cell;
use tracing::debug;
use windows_sys::Win32::UI::WindowsAndMessaging::{GetForegroundWindow, IsWindow};
use xinput_devices::XInputDevice;

/// Number of XInput user slots.
pub const XINPUT_SLOTS: u32 = 4;

const KEYBOARD_ID: &str = "keyboard:system";

/// Subsystem handle for Windows.
pub struct WindowsBackend {
    _private: (),
}

impl WindowsBackend {
    pub fn new() -> Result<Self> {
        debug!("windows input subsystem created");
        Ok(Self { _private: () })
    }
}

impl InputBackend for WindowsBackend {
    fn name(&self) -> &str {
        "windows"
    }

    fn enumerate(
        &self,
        class: DeviceClass,
        visit: &mut dyn FnMut(&DeviceInstance) -> Enumeration,
    ) -> Result<()> {
        match class {
            DeviceClass::GameController => {
                for slot in 0..XINPUT_SLOTS {
                    if !xinput_devices::slot_connected(slot) {
                        continue;
                    }
                    let inst = xinput_devices::instance(slot);
                    if visit(&inst) == Enumeration::Stop {
                        break;
                    }
                }
            }
            DeviceClass::Keyboard => {
                let _ = visit(&keyboard_instance());
            }
        }
        Ok(())
    }

    fn open(&self, instance: &DeviceInstance) -> Result<Box<dyn NativeDevice>> {
        match instance.class {
            DeviceClass::Keyboard if instance.id == KEYBOARD_ID => {
                Ok(Box::new(SystemKeyboard::new(instance.clone())))
            }
            DeviceClass::GameController => {
                let slot = instance
                    .id
                    .strip_prefix("xinput:")
                    .and_then(|s| s.parse::<u32>().ok())
                    .filter(|s| *s < XINPUT_SLOTS)
                    .ok_or(InputError::Unsupported("not an XInput device id"))?;
                if !xinput_devices::slot_connected(slot) {
                    return Err(InputError::DeviceLost(instance.id.clone()));
                }
                Ok(Box::new(XInputDevice::new(slot, instance.clone())))
            }
            DeviceClass::Keyboard => Err(InputError::Unsupported("unknown keyboard id")),
        }
    }
}

fn keyboard_instance() -> DeviceInstance {
    DeviceInstance {
        id: KEYBOARD_ID.into(),
        name: "System Keyboard".into(),
        class: DeviceClass::Keyboard,
        ff_capable: false,
    }
}

/// Window binding shared by both device kinds.
#[derive(Default)]
pub(crate) struct Cooperation {
    level: Cell<Option<(WindowHandle, CooperativeFlags)>>,
    acquired: Cell<bool>,
}

impl Cooperation {
    pub(crate) fn set(&self, window: WindowHandle, flags: CooperativeFlags) -> Result<()> {
        // SAFETY: IsWindow accepts any value and only reports validity.
        let valid = unsafe { IsWindow(window.0 as _) } != 0;
        if window.is_null() || !valid {
            return Err(InputError::InvalidWindow);
        }
        self.level.set(Some((window, flags.validate()?)));
        Ok(())
    }

    fn has_focus(&self) -> bool {
        match self.level.get() {
            Some((window, flags)) if flags.contains(CooperativeFlags::FOREGROUND) => {
                // SAFETY: no arguments; returns a handle or null.
                let fg = unsafe { GetForegroundWindow() } as isize;
                fg == window.0
            }
            _ => true,
        }
    }

    pub(crate) fn acquire(&self, id: &str) -> Result<()> {
        if !self.has_focus() {
            return Err(InputError::NotAcquired(id.to_owned()));
        }
        self.acquired.set(true);
        Ok(())
    }

    pub(crate) fn unacquire(&self) {
        self.acquired.set(false);
    }

    /// Foreground devices drop acquisition as soon as focus moves away.
    pub(crate) fn check(&self, id: &str) -> Result<()> {
        if !self.acquired.get() {
            return Err(InputError::NotAcquired(id.to_owned()));
        }
        if !self.has_focus() {
            self.acquired.set(false);
            return Err(InputError::NotAcquired(id.to_owned()));
        }
        Ok(())
    }

    pub(crate) fn is_exclusive(&self) -> bool {
        self.level
            .get()
            .map(|(_, f)| f.contains(CooperativeFlags::EXCLUSIVE))
            .unwrap_or(false)
    }
}
