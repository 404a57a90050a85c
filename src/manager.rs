//! Device manager: lifecycle, enumeration and aggregated polling.
//!
//! ```text
//! uninitialized --initialize--> initialized --finalize--> uninitialized
//! ```
//!
//! `initialize` picks the first usable joystick and the first usable keyboard
//! (first-match enumeration), configures them and acquires them against the
//! owning window. `update` polls whichever devices exist; `state` returns a
//! composed snapshot.
//!
//! # Composed state
//! [`DeviceManager::state`] takes axes, sliders, buttons and POV from the
//! joystick and the key matrix from the keyboard. The two devices own disjoint
//! fields, so nothing collides; an absent device contributes zeros.

use crate::backends;
use crate::config::InputConfig;
use crate::device::Device;
use crate::error::{InputError, Result};
use crate::joystick::Joystick;
use crate::keyboard::Keyboard;
use crate::metadata::{DeviceClass, DeviceInstance};
use crate::native::{Enumeration, InputBackend, NativeDevice, WindowHandle};
use crate::state::DeviceState;
use tracing::{debug, info, warn};

/// Owns at most one keyboard and at most one joystick.
pub struct DeviceManager {
    config: InputConfig,
    // Field order matters: devices drop before the subsystem that created them.
    joystick: Option<Joystick>,
    keyboard: Option<Keyboard>,
    backend: Option<Box<dyn InputBackend>>,
    window: Option<WindowHandle>,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self::with_config(InputConfig::default())
    }

    pub fn with_config(config: InputConfig) -> Self {
        Self {
            config,
            joystick: None,
            keyboard: None,
            backend: None,
            window: None,
        }
    }

    pub fn config(&self) -> &InputConfig {
        &self.config
    }

    /// Create the platform subsystem and initialize against `window`.
    pub fn initialize(&mut self, window: WindowHandle) -> Result<()> {
        let backend = backends::create_default()?;
        self.initialize_with(backend, window)
    }

    /// Initialize using an explicit subsystem.
    ///
    /// Any previous session is finalized first. On failure everything acquired
    /// along the way is released and the manager stays uninitialized.
    pub fn initialize_with(&mut self, backend: Box<dyn InputBackend>, window: WindowHandle) -> Result<()> {
        self.finalize();
        self.config.validate()?;
        if window.is_null() {
            return Err(InputError::InvalidWindow);
        }
        info!(backend = backend.name(), window = window.0, "initializing input");

        let joystick = if self.config.joystick {
            first_match(backend.as_ref(), DeviceClass::GameController)?
                .map(|(inst, dev)| self.configure_joystick(inst, dev, window))
                .transpose()?
        } else {
            None
        };

        let keyboard = if self.config.keyboard {
            first_match(backend.as_ref(), DeviceClass::Keyboard)?
                .map(|(_, dev)| self.configure_keyboard(dev, window))
                .transpose()?
        } else {
            None
        };

        if joystick.is_none() && keyboard.is_none() {
            warn!(backend = backend.name(), "no input devices found");
            return Err(InputError::NoDevices);
        }

        info!(
            joystick = joystick.as_ref().map(|j| j.id()),
            keyboard = keyboard.as_ref().map(|k| k.id()),
            "input initialized"
        );
        self.joystick = joystick;
        self.keyboard = keyboard;
        self.backend = Some(backend);
        self.window = Some(window);
        Ok(())
    }

    /// Release devices, then the subsystem. Safe to call at any time, any number of times.
    pub fn finalize(&mut self) {
        if self.backend.is_none() {
            return;
        }
        self.joystick = None;
        self.keyboard = None;
        self.backend = None;
        self.window = None;
        debug!("input finalized");
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.is_some()
    }

    pub fn window(&self) -> Option<WindowHandle> {
        self.window
    }

    pub fn joystick(&self) -> Option<&Joystick> {
        self.joystick.as_ref()
    }

    pub fn joystick_mut(&mut self) -> Option<&mut Joystick> {
        self.joystick.as_mut()
    }

    pub fn keyboard(&self) -> Option<&Keyboard> {
        self.keyboard.as_ref()
    }

    pub fn keyboard_mut(&mut self) -> Option<&mut Keyboard> {
        self.keyboard.as_mut()
    }

    /// Poll every present device. Both are attempted; the first failure is returned.
    pub fn update(&mut self) -> Result<()> {
        if !self.is_initialized() {
            return Err(InputError::NotInitialized);
        }
        let joy = self.joystick.as_mut().map_or(Ok(()), |j| j.update());
        let kb = self.keyboard.as_mut().map_or(Ok(()), |k| k.update());
        if let Err(e) = &joy {
            debug!(error = %e, "joystick update failed");
        }
        if let Err(e) = &kb {
            debug!(error = %e, "keyboard update failed");
        }
        joy.and(kb)
    }

    /// Re-acquire every present device, e.g. after the window regains focus
    /// or a device reconnects. All are attempted; the first failure is returned.
    pub fn acquire(&mut self) -> Result<()> {
        if !self.is_initialized() {
            return Err(InputError::NotInitialized);
        }
        let joy = self.joystick.as_mut().map_or(Ok(()), |j| j.acquire());
        let kb = self.keyboard.as_mut().map_or(Ok(()), |k| k.acquire());
        joy.and(kb)
    }

    /// Composed snapshot: joystick fields from the joystick, keys from the keyboard.
    pub fn state(&self) -> DeviceState {
        let mut out = self
            .joystick
            .as_ref()
            .map(|j| j.state().clone())
            .unwrap_or_default();
        if let Some(kb) = &self.keyboard {
            out.keys.clone_from(&kb.state().keys);
        }
        out
    }

    fn configure_joystick(
        &self,
        instance: DeviceInstance,
        device: Box<dyn NativeDevice>,
        window: WindowHandle,
    ) -> Result<Joystick> {
        let mut joy = Joystick::new(device);
        joy.set_data_format()?;
        joy.set_cooperative_level(window, self.config.joystick_cooperation)?;
        joy.discover_objects(self.config.axis_range)?;
        joy.set_ff_capable(instance.ff_capable);

        if let (Some(on), true) = (self.config.autocenter, joy.ff_capable()) {
            if let Err(e) = joy.set_autocenter(on) {
                warn!(device = %instance.id, error = %e, "autocenter not applied");
            }
        }

        soft_acquire(joy.acquire(), &instance.id)?;
        debug!(device = %instance.id, name = %instance.name, ff = instance.ff_capable, "joystick ready");
        Ok(joy)
    }

    fn configure_keyboard(&self, device: Box<dyn NativeDevice>, window: WindowHandle) -> Result<Keyboard> {
        let mut kb = Keyboard::new(device);
        kb.set_data_format()?;
        kb.set_cooperative_level(window, self.config.keyboard_cooperation)?;
        soft_acquire(kb.acquire(), kb.id())?;
        debug!(device = %kb.id(), name = %kb.name(), "keyboard ready");
        Ok(kb)
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        self.finalize();
    }
}

impl std::fmt::Debug for DeviceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceManager")
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .field("joystick", &self.joystick)
            .field("keyboard", &self.keyboard)
            .field("window", &self.window)
            .finish()
    }
}

/// A device that cannot be acquired yet (window in the background, device
/// unplugged) is still kept; `update` reports it until `acquire` succeeds.
fn soft_acquire(result: Result<()>, id: &str) -> Result<()> {
    match result {
        Err(e) if e.is_device_lost() => {
            warn!(device = %id, error = %e, "device not acquired yet");
            Ok(())
        }
        other => other,
    }
}

/// Open the first device of `class` that the backend lets us open.
fn first_match(
    backend: &dyn InputBackend,
    class: DeviceClass,
) -> Result<Option<(DeviceInstance, Box<dyn NativeDevice>)>> {
    let mut found = None;
    backend.enumerate(class, &mut |instance| match backend.open(instance) {
        Ok(device) => {
            debug!(device = %instance.id, name = %instance.name, ?class, "device accepted");
            found = Some((instance.clone(), device));
            Enumeration::Stop
        }
        Err(e) => {
            debug!(device = %instance.id, error = %e, ?class, "device skipped");
            Enumeration::Continue
        }
    })?;
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_input::{VirtualHub, VirtualJoystick};
    use crate::metadata::Axis;

    #[test]
    fn uninitialized_manager_has_no_devices() {
        let mut mgr = DeviceManager::new();
        assert!(!mgr.is_initialized());
        assert!(mgr.joystick().is_none());
        assert!(mgr.keyboard().is_none());
        assert!(matches!(mgr.update(), Err(InputError::NotInitialized)));
        assert_eq!(mgr.state(), DeviceState::default());
        mgr.finalize();
        mgr.finalize();
    }

    #[test]
    fn first_joystick_wins() {
        let hub = VirtualHub::new();
        hub.add_joystick(VirtualJoystick::gamepad("First"));
        hub.add_joystick(VirtualJoystick::gamepad("Second"));
        hub.add_keyboard("Keys A");
        hub.add_keyboard("Keys B");

        let mut mgr = DeviceManager::new();
        mgr.initialize_with(Box::new(hub.backend()), WindowHandle(1)).unwrap();
        assert_eq!(mgr.joystick().unwrap().name(), "First");
        assert_eq!(mgr.keyboard().unwrap().name(), "Keys A");
        // Only the accepted devices hold handles.
        assert_eq!(hub.total_open_handles(), 2);
    }

    #[test]
    fn unopenable_devices_are_skipped() {
        let hub = VirtualHub::new();
        let broken = hub.add_joystick(VirtualJoystick::gamepad("Broken"));
        hub.add_joystick(VirtualJoystick::gamepad("Working"));
        hub.refuse_open(broken);

        let mut mgr = DeviceManager::new();
        mgr.initialize_with(Box::new(hub.backend()), WindowHandle(1)).unwrap();
        assert_eq!(mgr.joystick().unwrap().name(), "Working");
    }

    #[test]
    fn no_devices_is_an_error_and_releases_backend() {
        let hub = VirtualHub::new();
        let mut mgr = DeviceManager::new();
        let err = mgr
            .initialize_with(Box::new(hub.backend()), WindowHandle(1))
            .unwrap_err();
        assert!(matches!(err, InputError::NoDevices));
        assert!(!mgr.is_initialized());
        assert_eq!(hub.live_backends(), 0);
        mgr.finalize();
    }

    #[test]
    fn null_window_is_rejected_without_opening_anything() {
        let hub = VirtualHub::new();
        hub.add_keyboard("Keys");
        let mut mgr = DeviceManager::new();
        assert!(matches!(
            mgr.initialize_with(Box::new(hub.backend()), WindowHandle::NULL),
            Err(InputError::InvalidWindow)
        ));
        assert_eq!(hub.total_open_handles(), 0);
    }

    #[test]
    fn configuration_is_applied_to_devices() {
        let hub = VirtualHub::new();
        let joy = hub.add_joystick(VirtualJoystick::flight_stick("Stick").with_force_feedback());
        let kb = hub.add_keyboard("Keys");
        let config = InputConfig {
            axis_range: crate::native::AxisRange::new(0, 255),
            autocenter: Some(false),
            ..InputConfig::default()
        };

        let mut mgr = DeviceManager::with_config(config.clone());
        mgr.initialize_with(Box::new(hub.backend()), WindowHandle(42)).unwrap();

        let j = mgr.joystick().unwrap();
        assert!(j.ff_capable());
        assert_eq!(j.range(Axis::Slider0), Some(crate::native::AxisRange::new(0, 255)));
        assert_eq!(hub.autocenter(joy), Some(false));
        assert_eq!(
            hub.cooperative_level(joy),
            Some((WindowHandle(42), config.joystick_cooperation))
        );
        assert_eq!(
            hub.cooperative_level(kb),
            Some((WindowHandle(42), config.keyboard_cooperation))
        );
        assert!(hub.is_acquired(joy));
        assert!(hub.is_acquired(kb));
        assert_eq!(mgr.window(), Some(WindowHandle(42)));
    }

    #[test]
    fn autocenter_failure_is_not_fatal() {
        let hub = VirtualHub::new();
        let joy = hub.add_joystick(VirtualJoystick::gamepad("Pad"));
        let config = InputConfig {
            autocenter: Some(true),
            ..InputConfig::default()
        };
        let mut mgr = DeviceManager::with_config(config);
        mgr.initialize_with(Box::new(hub.backend()), WindowHandle(1)).unwrap();
        // Not FF capable, so autocenter was never attempted.
        assert_eq!(hub.autocenter(joy), None);
    }

    #[test]
    fn disabled_kinds_are_not_enumerated() {
        let hub = VirtualHub::new();
        hub.add_joystick(VirtualJoystick::gamepad("Pad"));
        hub.add_keyboard("Keys");
        let config = InputConfig {
            joystick: false,
            ..InputConfig::default()
        };
        let mut mgr = DeviceManager::with_config(config);
        mgr.initialize_with(Box::new(hub.backend()), WindowHandle(1)).unwrap();
        assert!(mgr.joystick().is_none());
        assert!(mgr.keyboard().is_some());
    }

    #[test]
    fn composed_state_merges_joystick_and_keys() {
        let hub = VirtualHub::new();
        let joy = hub.add_joystick(VirtualJoystick::gamepad("Pad"));
        let kb = hub.add_keyboard("Keys");
        let mut mgr = DeviceManager::new();
        mgr.initialize_with(Box::new(hub.backend()), WindowHandle(1)).unwrap();

        hub.set_axis(joy, Axis::Y, VirtualJoystick::PHYSICAL_MIN);
        hub.set_button(joy, 4, true);
        hub.set_key(kb, 0x2C, true);
        mgr.update().unwrap();

        let s = mgr.state();
        assert_eq!(s.y, -1000);
        assert!(s.button(4));
        assert!(s.keys.is_pressed(0x2C));
        assert_eq!(&s.keys, &mgr.keyboard().unwrap().state().keys);
        assert_eq!(s.y, mgr.joystick().unwrap().state().y);
        // The keyboard's own snapshot carries no joystick data.
        assert_eq!(mgr.keyboard().unwrap().state().y, 0);
    }

    #[test]
    fn update_attempts_both_devices_when_one_fails() {
        let hub = VirtualHub::new();
        let joy = hub.add_joystick(VirtualJoystick::gamepad("Pad"));
        let kb = hub.add_keyboard("Keys");
        let mut mgr = DeviceManager::new();
        mgr.initialize_with(Box::new(hub.backend()), WindowHandle(1)).unwrap();

        hub.disconnect(joy);
        hub.set_key(kb, 0x01, true);
        assert!(mgr.update().unwrap_err().is_device_lost());
        assert!(mgr.keyboard().unwrap().is_pressed(0x01));
    }

    #[test]
    fn keyboard_failure_is_reported_after_joystick_update() {
        let hub = VirtualHub::new();
        let joy = hub.add_joystick(VirtualJoystick::gamepad("Pad"));
        let kb = hub.add_keyboard("Keys");
        let mut mgr = DeviceManager::new();
        mgr.initialize_with(Box::new(hub.backend()), WindowHandle(1)).unwrap();

        hub.fail_next_poll(kb, 0x8007_001E);
        hub.set_button(joy, 3, true);
        match mgr.update() {
            Err(InputError::Native { code, .. }) => assert_eq!(code, 0x8007_001E),
            other => panic!("unexpected {other:?}"),
        }
        assert!(mgr.state().button(3));
        assert!(!mgr.keyboard().unwrap().available());
    }

    #[test]
    fn reacquire_after_reconnect() {
        let hub = VirtualHub::new();
        let joy = hub.add_joystick(VirtualJoystick::gamepad("Pad"));
        let mut mgr = DeviceManager::new();
        mgr.initialize_with(Box::new(hub.backend()), WindowHandle(1)).unwrap();

        hub.disconnect(joy);
        assert!(matches!(mgr.update(), Err(InputError::DeviceLost(_))));
        assert!(matches!(mgr.acquire(), Err(InputError::DeviceLost(_))));

        hub.reconnect(joy);
        assert!(matches!(mgr.update(), Err(InputError::NotAcquired(_))));
        mgr.acquire().unwrap();
        hub.set_button(joy, 0, true);
        mgr.update().unwrap();
        assert!(mgr.state().button(0));
    }

    #[test]
    fn acquire_requires_initialize() {
        let mut mgr = DeviceManager::new();
        assert!(matches!(mgr.acquire(), Err(InputError::NotInitialized)));
    }

    #[test]
    fn reinitialize_replaces_previous_session() {
        let hub = VirtualHub::new();
        let joy = hub.add_joystick(VirtualJoystick::gamepad("Pad"));
        let mut mgr = DeviceManager::new();
        mgr.initialize_with(Box::new(hub.backend()), WindowHandle(1)).unwrap();
        mgr.initialize_with(Box::new(hub.backend()), WindowHandle(2)).unwrap();
        assert_eq!(hub.open_handles(joy), 1);
        assert_eq!(hub.live_backends(), 1);
        assert_eq!(mgr.window(), Some(WindowHandle(2)));
    }

    #[test]
    fn dropping_manager_releases_everything() {
        let hub = VirtualHub::new();
        hub.add_joystick(VirtualJoystick::gamepad("Pad"));
        hub.add_keyboard("Keys");
        {
            let mut mgr = DeviceManager::new();
            mgr.initialize_with(Box::new(hub.backend()), WindowHandle(1)).unwrap();
            assert_eq!(hub.total_open_handles(), 2);
        }
        assert_eq!(hub.total_open_handles(), 0);
        assert_eq!(hub.live_backends(), 0);
    }
}
