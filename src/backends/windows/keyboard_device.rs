#![cfg(target_os = "windows")]

//! System keyboard read through `GetAsyncKeyState`.
//!
//! The matrix is indexed by Windows virtual-key code; a held key reads `0x80`.
//! Keyboards have no axes, effects or autocenter.

use super::Cooperation;
use crate::effect_file::FileEffect;
use crate::error::{InputError, Result};
use crate::metadata::{Axis, DeviceInstance, DeviceObject};
use crate::native::{
    AxisRange, CooperativeFlags, DataFormat, Enumeration, NativeDevice, NativeEffect, Report,
    WindowHandle,
};
use crate::state::{KeyMatrix, KEY_COUNT};
use std::cell::Cell;
use std::path::Path;
use tracing::debug;
use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, VK_LWIN, VK_RWIN,
};

pub struct SystemKeyboard {
    instance: DeviceInstance,
    cooperation: Cooperation,
    format: Cell<Option<DataFormat>>,
    skip_win_keys: Cell<bool>,
}

impl SystemKeyboard {
    pub(crate) fn new(instance: DeviceInstance) -> Self {
        Self {
            instance,
            cooperation: Cooperation::default(),
            format: Cell::new(None),
            skip_win_keys: Cell::new(false),
        }
    }
}

impl NativeDevice for SystemKeyboard {
    fn instance(&self) -> &DeviceInstance {
        &self.instance
    }

    fn set_data_format(&self, format: DataFormat) -> Result<()> {
        if format != DataFormat::Keyboard {
            return Err(InputError::Unsupported("the system keyboard only reports keys"));
        }
        self.format.set(Some(format));
        Ok(())
    }

    fn set_cooperative_level(&self, window: WindowHandle, flags: CooperativeFlags) -> Result<()> {
        self.cooperation.set(window, flags)?;
        self.skip_win_keys
            .set(flags.contains(CooperativeFlags::NO_WIN_KEY));
        Ok(())
    }

    fn enumerate_objects(
        &self,
        _visit: &mut dyn FnMut(&DeviceObject) -> Enumeration,
    ) -> Result<()> {
        Ok(())
    }

    fn set_range(&self, axis: Axis, _range: AxisRange) -> Result<()> {
        Err(InputError::NotAnAxis(axis.to_string()))
    }

    fn acquire(&self) -> Result<()> {
        if self.format.get().is_none() {
            return Err(InputError::Unsupported("acquire before setting a data format"));
        }
        self.cooperation.acquire(&self.instance.id)?;
        debug!(device = %self.instance.id, "acquired");
        Ok(())
    }

    fn unacquire(&self) {
        self.cooperation.unacquire();
    }

    fn poll(&self) -> Result<Report> {
        self.cooperation.check(&self.instance.id)?;
        let mut keys = KeyMatrix::default();
        let bytes = keys.as_bytes_mut();
        for vk in 1..KEY_COUNT {
            let code = vk as u16;
            if self.skip_win_keys.get() && (code == VK_LWIN || code == VK_RWIN) {
                continue;
            }
            // SAFETY: GetAsyncKeyState accepts any virtual-key code.
            if unsafe { GetAsyncKeyState(i32::from(code)) } < 0 {
                bytes[vk] = KeyMatrix::PRESSED;
            }
        }
        Ok(Report::Keyboard(Box::new(*keys.as_bytes())))
    }

    fn set_autocenter(&self, _enabled: bool) -> Result<()> {
        Err(InputError::Unsupported("keyboards have no autocenter"))
    }

    fn enumerate_effects_in_file(
        &self,
        _path: &Path,
        _visit: &mut dyn FnMut(&FileEffect) -> Enumeration,
    ) -> Result<()> {
        Err(InputError::ForceFeedbackUnsupported(self.instance.id.clone()))
    }

    fn create_effect(&self, _effect: &FileEffect) -> Result<Box<dyn NativeEffect>> {
        Err(InputError::ForceFeedbackUnsupported(self.instance.id.clone()))
    }
}

impl Drop for SystemKeyboard {
    fn drop(&mut self) {
        self.cooperation.unacquire();
        debug!(device = %self.instance.id, "released");
    }
}
