//! In-memory input subsystem.
//!
//! [`VirtualHub`] holds a scripted set of keyboards and joysticks. Hand its
//! [`backend`](VirtualHub::backend) to a [`DeviceManager`](crate::DeviceManager)
//! and keep the hub to feed input (`set_axis`, `set_key`, ...) and to inspect
//! what the native side saw (acquisition, autocenter, effect playback, open
//! handles).
//!
//! The devices behave like their native counterparts:
//! - polling needs a data format and acquisition,
//! - calibration ranges scale raw values from the physical span,
//! - effects need a force-feedback device in exclusive mode,
//! - every handle is counted while alive and released on drop.
//!
//! Effect files are read in the crate's TOML format ([`crate::effect_file`]).
//!
//! ```
//! use stickfx::backends::virtual_input::{VirtualHub, VirtualJoystick};
//! use stickfx::{Axis, DeviceManager, WindowHandle};
//!
//! let hub = VirtualHub::new();
//! let pad = hub.add_joystick(VirtualJoystick::gamepad("Virtual Pad"));
//!
//! let mut mgr = DeviceManager::new();
//! mgr.initialize_with(Box::new(hub.backend()), WindowHandle(1)).unwrap();
//!
//! hub.set_axis(pad, Axis::X, VirtualJoystick::PHYSICAL_MAX);
//! mgr.update().unwrap();
//! assert_eq!(mgr.state().x, 1000);
//! ```

use crate::effect_file::{self, FileEffect, MAX_MAGNITUDE};
use crate::error::{InputError, Result};
use crate::metadata::{Axis, DeviceClass, DeviceInstance, DeviceObject, ObjectKind};
use crate::native::{
    AxisRange, CooperativeFlags, DataFormat, Enumeration, InputBackend, JoystickReport,
    NativeDevice, NativeEffect, Report, WindowHandle,
};
use crate::state::KEY_COUNT;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use tracing::trace;

/// Index of a device inside a [`VirtualHub`].
pub type VirtualDeviceId = usize;

const E_INVALIDARG: i64 = 0x8007_0057;
const DIERR_NOTEXCLUSIVEACQUIRED: i64 = 0x8004_0205;
const DIERR_NOTINITIALIZED: i64 = 0x8007_0015;

/// Shape of a scripted joystick.
#[derive(Clone, Debug)]
pub struct VirtualJoystick {
    name: String,
    axes: Vec<Axis>,
    buttons: u8,
    povs: u8,
    ff_capable: bool,
    physical: AxisRange,
}

impl VirtualJoystick {
    /// Default physical span of every axis.
    pub const PHYSICAL_MIN: i32 = 0;
    pub const PHYSICAL_MAX: i32 = 65_535;

    /// A device with no objects at all.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            axes: Vec::new(),
            buttons: 0,
            povs: 0,
            ff_capable: false,
            physical: AxisRange::new(Self::PHYSICAL_MIN, Self::PHYSICAL_MAX),
        }
    }

    /// Two sticks (X/Y, RX/RY), ten buttons, one D-pad.
    pub fn gamepad(name: impl Into<String>) -> Self {
        Self::new(name)
            .with_axes(&[Axis::X, Axis::Y, Axis::Rx, Axis::Ry])
            .with_buttons(10)
            .with_povs(1)
    }

    /// Stick, twist, throttle slider, twelve buttons, one hat.
    pub fn flight_stick(name: impl Into<String>) -> Self {
        Self::new(name)
            .with_axes(&[Axis::X, Axis::Y, Axis::Rz, Axis::Slider0])
            .with_buttons(12)
            .with_povs(1)
    }

    pub fn with_axes(mut self, axes: &[Axis]) -> Self {
        self.axes = axes.to_vec();
        self
    }

    pub fn with_buttons(mut self, count: u8) -> Self {
        self.buttons = count;
        self
    }

    pub fn with_povs(mut self, count: u8) -> Self {
        self.povs = count;
        self
    }

    pub fn with_force_feedback(mut self) -> Self {
        self.ff_capable = true;
        self
    }

    pub fn with_physical_range(mut self, min: i32, max: i32) -> Self {
        self.physical = AxisRange::new(min, max);
        self
    }

    fn objects(&self) -> Vec<DeviceObject> {
        let mut out = Vec::new();
        for &axis in &self.axes {
            out.push(DeviceObject::new(axis.to_string(), ObjectKind::Axis(axis)));
        }
        for i in 0..self.buttons {
            out.push(DeviceObject::new(format!("Button {}", i + 1), ObjectKind::Button(i)));
        }
        for i in 0..self.povs {
            out.push(DeviceObject::new(format!("POV {}", i + 1), ObjectKind::Pov(i)));
        }
        out
    }
}

enum SlotKind {
    Keyboard {
        keys: Box<[u8; KEY_COUNT]>,
    },
    Joystick {
        spec: VirtualJoystick,
        raw: [i32; 8],
        ranges: [Option<AxisRange>; 8],
        buttons: Vec<bool>,
        povs: Vec<Option<u32>>,
    },
}

struct Slot {
    instance: DeviceInstance,
    kind: SlotKind,
    connected: bool,
    refuse_open: bool,
    open_handles: usize,
    acquired: bool,
    format: Option<DataFormat>,
    cooperation: Option<(WindowHandle, CooperativeFlags)>,
    autocenter: Option<bool>,
    fail_next_poll: Option<i64>,
}

struct EffectRecord {
    device: VirtualDeviceId,
    name: String,
    playing: bool,
    released: bool,
    gain: u32,
}

#[derive(Default)]
struct HubState {
    slots: Vec<Slot>,
    /// Released records are reused by the next `create_effect`, so the table
    /// stays as large as the peak number of live effects.
    effects: Vec<EffectRecord>,
    effect_starts: usize,
    effect_stops: usize,
    /// Effect names whose `set_gain` fails.
    refused_gains: Vec<String>,
    live_backends: usize,
}

impl HubState {
    fn slot(&self, id: VirtualDeviceId) -> &Slot {
        &self.slots[id]
    }

    fn slot_mut(&mut self, id: VirtualDeviceId) -> &mut Slot {
        &mut self.slots[id]
    }
}

/// Shared, scriptable device table. Cloning shares the same table.
#[derive(Clone, Default)]
pub struct VirtualHub {
    state: Rc<RefCell<HubState>>,
}

impl VirtualHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// A subsystem handle over this hub.
    pub fn backend(&self) -> VirtualBackend {
        self.state.borrow_mut().live_backends += 1;
        VirtualBackend { hub: self.clone() }
    }

    pub fn add_keyboard(&self, name: impl Into<String>) -> VirtualDeviceId {
        let mut st = self.state.borrow_mut();
        let id = st.slots.len();
        st.slots.push(Slot::new(
            DeviceInstance {
                id: format!("virtual:keyboard:{id}"),
                name: name.into(),
                class: DeviceClass::Keyboard,
                ff_capable: false,
            },
            SlotKind::Keyboard {
                keys: Box::new([0; KEY_COUNT]),
            },
        ));
        id
    }

    pub fn add_joystick(&self, spec: VirtualJoystick) -> VirtualDeviceId {
        let mut st = self.state.borrow_mut();
        let id = st.slots.len();
        let centre = {
            let (min, max) = (i64::from(spec.physical.min), i64::from(spec.physical.max));
            (min + (max - min) / 2) as i32
        };
        let instance = DeviceInstance {
            id: format!("virtual:joystick:{id}"),
            name: spec.name.clone(),
            class: DeviceClass::GameController,
            ff_capable: spec.ff_capable,
        };
        let kind = SlotKind::Joystick {
            raw: [centre; 8],
            ranges: [None; 8],
            buttons: vec![false; spec.buttons as usize],
            povs: vec![None; spec.povs as usize],
            spec,
        };
        st.slots.push(Slot::new(instance, kind));
        id
    }

    /// Set a raw axis value in the device's physical span.
    pub fn set_axis(&self, id: VirtualDeviceId, axis: Axis, raw: i32) {
        if let SlotKind::Joystick { raw: values, .. } = &mut self.state.borrow_mut().slot_mut(id).kind {
            values[axis.index()] = raw;
        }
    }

    pub fn set_button(&self, id: VirtualDeviceId, index: usize, pressed: bool) {
        if let SlotKind::Joystick { buttons, .. } = &mut self.state.borrow_mut().slot_mut(id).kind {
            if let Some(b) = buttons.get_mut(index) {
                *b = pressed;
            }
        }
    }

    /// Set the first POV hat (hundredths of a degree, `None` = centered).
    pub fn set_pov(&self, id: VirtualDeviceId, angle: Option<u32>) {
        if let SlotKind::Joystick { povs, .. } = &mut self.state.borrow_mut().slot_mut(id).kind {
            if let Some(p) = povs.first_mut() {
                *p = angle;
            }
        }
    }

    pub fn set_key(&self, id: VirtualDeviceId, code: u8, pressed: bool) {
        if let SlotKind::Keyboard { keys } = &mut self.state.borrow_mut().slot_mut(id).kind {
            keys[code as usize] = if pressed { 0x80 } else { 0 };
        }
    }

    /// Unplug: polls fail, enumeration skips the device, acquisition is lost.
    pub fn disconnect(&self, id: VirtualDeviceId) {
        let mut st = self.state.borrow_mut();
        let slot = st.slot_mut(id);
        slot.connected = false;
        slot.acquired = false;
    }

    /// Plug back in. The device must be acquired again.
    pub fn reconnect(&self, id: VirtualDeviceId) {
        self.state.borrow_mut().slot_mut(id).connected = true;
    }

    /// Make `open` fail for this device (enumeration still lists it).
    pub fn refuse_open(&self, id: VirtualDeviceId) {
        self.state.borrow_mut().slot_mut(id).refuse_open = true;
    }

    /// Fail the next poll with a native status `code`.
    pub fn fail_next_poll(&self, id: VirtualDeviceId, code: i64) {
        self.state.borrow_mut().slot_mut(id).fail_next_poll = Some(code);
    }

    pub fn live_backends(&self) -> usize {
        self.state.borrow().live_backends
    }

    pub fn open_handles(&self, id: VirtualDeviceId) -> usize {
        self.state.borrow().slot(id).open_handles
    }

    pub fn total_open_handles(&self) -> usize {
        self.state.borrow().slots.iter().map(|s| s.open_handles).sum()
    }

    pub fn is_acquired(&self, id: VirtualDeviceId) -> bool {
        self.state.borrow().slot(id).acquired
    }

    pub fn cooperative_level(&self, id: VirtualDeviceId) -> Option<(WindowHandle, CooperativeFlags)> {
        self.state.borrow().slot(id).cooperation
    }

    pub fn autocenter(&self, id: VirtualDeviceId) -> Option<bool> {
        self.state.borrow().slot(id).autocenter
    }

    /// Effects currently playing.
    pub fn playing_effects(&self) -> usize {
        self.state
            .borrow()
            .effects
            .iter()
            .filter(|e| e.playing && !e.released)
            .count()
    }

    /// Effects created and not yet released.
    pub fn live_effects(&self) -> usize {
        self.state.borrow().effects.iter().filter(|e| !e.released).count()
    }

    /// Total `start` calls across all effects ever created.
    pub fn effect_starts(&self) -> usize {
        self.state.borrow().effect_starts
    }

    /// Total `stop` calls across all effects ever created.
    pub fn effect_stops(&self) -> usize {
        self.state.borrow().effect_stops
    }

    /// Make `set_gain` fail on every effect called `name`.
    pub fn refuse_gain(&self, name: impl Into<String>) {
        self.state.borrow_mut().refused_gains.push(name.into());
    }

    /// `(name, gain)` of every live effect, creation order.
    pub fn effect_gains(&self) -> Vec<(String, u32)> {
        self.state
            .borrow()
            .effects
            .iter()
            .filter(|e| !e.released)
            .map(|e| (e.name.clone(), e.gain))
            .collect()
    }

    /// Device ids of every live effect, creation order.
    pub fn effect_devices(&self) -> Vec<VirtualDeviceId> {
        self.state
            .borrow()
            .effects
            .iter()
            .filter(|e| !e.released)
            .map(|e| e.device)
            .collect()
    }
}

impl Slot {
    fn new(instance: DeviceInstance, kind: SlotKind) -> Self {
        Self {
            instance,
            kind,
            connected: true,
            refuse_open: false,
            open_handles: 0,
            acquired: false,
            format: None,
            cooperation: None,
            autocenter: None,
            fail_next_poll: None,
        }
    }

    fn expected_format(&self) -> DataFormat {
        match self.kind {
            SlotKind::Keyboard { .. } => DataFormat::Keyboard,
            SlotKind::Joystick { .. } => DataFormat::Joystick,
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        if !self.connected {
            return Err(InputError::DeviceLost(self.instance.id.clone()));
        }
        if !self.acquired {
            return Err(InputError::NotAcquired(self.instance.id.clone()));
        }
        Ok(())
    }
}

/// Subsystem handle over a [`VirtualHub`].
pub struct VirtualBackend {
    hub: VirtualHub,
}

impl InputBackend for VirtualBackend {
    fn name(&self) -> &str {
        "virtual"
    }

    fn enumerate(
        &self,
        class: DeviceClass,
        visit: &mut dyn FnMut(&DeviceInstance) -> Enumeration,
    ) -> Result<()> {
        // Snapshot first: the visitor may call back into the hub.
        let candidates: Vec<DeviceInstance> = self
            .hub
            .state
            .borrow()
            .slots
            .iter()
            .filter(|s| s.connected && s.instance.class == class)
            .map(|s| s.instance.clone())
            .collect();

        for inst in &candidates {
            if visit(inst) == Enumeration::Stop {
                break;
            }
        }
        Ok(())
    }

    fn open(&self, instance: &DeviceInstance) -> Result<Box<dyn NativeDevice>> {
        let mut st = self.hub.state.borrow_mut();
        let id = st
            .slots
            .iter()
            .position(|s| s.instance.id == instance.id)
            .ok_or(InputError::native("CreateDevice", E_INVALIDARG))?;
        let slot = st.slot_mut(id);
        if !slot.connected {
            return Err(InputError::DeviceLost(instance.id.clone()));
        }
        if slot.refuse_open {
            return Err(InputError::native("CreateDevice", DIERR_NOTINITIALIZED));
        }
        slot.open_handles += 1;
        trace!(device = %instance.id, "virtual device opened");
        Ok(Box::new(VirtualDevice {
            hub: self.hub.clone(),
            id,
            instance: slot.instance.clone(),
        }))
    }
}

impl Drop for VirtualBackend {
    fn drop(&mut self) {
        self.hub.state.borrow_mut().live_backends -= 1;
    }
}

/// One opened virtual device.
pub struct VirtualDevice {
    hub: VirtualHub,
    id: VirtualDeviceId,
    instance: DeviceInstance,
}

impl VirtualDevice {
    fn with_slot<T>(&self, f: impl FnOnce(&mut Slot) -> Result<T>) -> Result<T> {
        f(self.hub.state.borrow_mut().slot_mut(self.id))
    }
}

impl NativeDevice for VirtualDevice {
    fn instance(&self) -> &DeviceInstance {
        &self.instance
    }

    fn set_data_format(&self, format: DataFormat) -> Result<()> {
        self.with_slot(|slot| {
            if format != slot.expected_format() {
                return Err(InputError::native("SetDataFormat", E_INVALIDARG));
            }
            slot.format = Some(format);
            Ok(())
        })
    }

    fn set_cooperative_level(&self, window: WindowHandle, flags: CooperativeFlags) -> Result<()> {
        if window.is_null() {
            return Err(InputError::InvalidWindow);
        }
        let flags = flags.validate()?;
        self.with_slot(|slot| {
            slot.cooperation = Some((window, flags));
            Ok(())
        })
    }

    fn enumerate_objects(&self, visit: &mut dyn FnMut(&DeviceObject) -> Enumeration) -> Result<()> {
        let objects = match &self.hub.state.borrow().slot(self.id).kind {
            SlotKind::Keyboard { .. } => Vec::new(),
            SlotKind::Joystick { spec, .. } => spec.objects(),
        };
        for object in &objects {
            if visit(object) == Enumeration::Stop {
                break;
            }
        }
        Ok(())
    }

    fn set_range(&self, axis: Axis, range: AxisRange) -> Result<()> {
        let range = range.validate()?;
        self.with_slot(|slot| match &mut slot.kind {
            SlotKind::Joystick { spec, ranges, .. } if spec.axes.contains(&axis) => {
                ranges[axis.index()] = Some(range);
                Ok(())
            }
            _ => Err(InputError::NotAnAxis(axis.to_string())),
        })
    }

    fn acquire(&self) -> Result<()> {
        self.with_slot(|slot| {
            if !slot.connected {
                return Err(InputError::DeviceLost(slot.instance.id.clone()));
            }
            if slot.format.is_none() {
                return Err(InputError::native("Acquire", DIERR_NOTINITIALIZED));
            }
            slot.acquired = true;
            Ok(())
        })
    }

    fn unacquire(&self) {
        self.hub.state.borrow_mut().slot_mut(self.id).acquired = false;
    }

    fn poll(&self) -> Result<Report> {
        self.with_slot(|slot| {
            if let Some(code) = slot.fail_next_poll.take() {
                return Err(InputError::native("GetDeviceState", code));
            }
            slot.ensure_ready()?;
            match &slot.kind {
                SlotKind::Keyboard { keys } => Ok(Report::Keyboard(keys.clone())),
                SlotKind::Joystick {
                    spec,
                    raw,
                    ranges,
                    buttons,
                    povs,
                } => {
                    let mut values = [0i32; 8];
                    for &axis in &spec.axes {
                        let i = axis.index();
                        let range = ranges[i].unwrap_or(spec.physical);
                        values[i] = range.scale_from(raw[i], spec.physical);
                    }
                    Ok(Report::Joystick(JoystickReport {
                        axes: [values[0], values[1], values[2], values[3], values[4], values[5]],
                        sliders: [values[6], values[7]],
                        buttons: buttons.clone(),
                        povs: povs.clone(),
                    }))
                }
            }
        })
    }

    fn set_autocenter(&self, enabled: bool) -> Result<()> {
        self.with_slot(|slot| {
            if !slot.instance.ff_capable {
                return Err(InputError::ForceFeedbackUnsupported(slot.instance.id.clone()));
            }
            slot.autocenter = Some(enabled);
            Ok(())
        })
    }

    fn enumerate_effects_in_file(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(&FileEffect) -> Enumeration,
    ) -> Result<()> {
        for effect in &effect_file::load(path)? {
            if visit(effect) == Enumeration::Stop {
                break;
            }
        }
        Ok(())
    }

    fn create_effect(&self, effect: &FileEffect) -> Result<Box<dyn NativeEffect>> {
        let mut st = self.hub.state.borrow_mut();
        let slot = st.slot(self.id);
        if !slot.instance.ff_capable {
            return Err(InputError::ForceFeedbackUnsupported(slot.instance.id.clone()));
        }
        let exclusive = slot
            .cooperation
            .map(|(_, f)| f.contains(CooperativeFlags::EXCLUSIVE))
            .unwrap_or(false);
        if !exclusive {
            return Err(InputError::native("CreateEffect", DIERR_NOTEXCLUSIVEACQUIRED));
        }
        let record = EffectRecord {
            device: self.id,
            name: effect.name.clone(),
            playing: false,
            released: false,
            gain: MAX_MAGNITUDE,
        };
        let index = match st.effects.iter().position(|e| e.released) {
            Some(free) => {
                st.effects[free] = record;
                free
            }
            None => {
                st.effects.push(record);
                st.effects.len() - 1
            }
        };
        Ok(Box::new(VirtualEffect {
            hub: self.hub.clone(),
            index,
        }))
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        let mut st = self.hub.state.borrow_mut();
        let slot = st.slot_mut(self.id);
        slot.acquired = false;
        slot.open_handles = slot.open_handles.saturating_sub(1);
        trace!(device = %self.instance.id, "virtual device released");
    }
}

/// One effect created on a [`VirtualDevice`].
pub struct VirtualEffect {
    hub: VirtualHub,
    index: usize,
}

impl NativeEffect for VirtualEffect {
    fn start(&mut self) -> Result<()> {
        let mut st = self.hub.state.borrow_mut();
        let device = st.effects[self.index].device;
        st.slot(device).ensure_ready()?;
        st.effects[self.index].playing = true;
        st.effect_starts += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut st = self.hub.state.borrow_mut();
        st.effects[self.index].playing = false;
        st.effect_stops += 1;
        Ok(())
    }

    fn set_gain(&mut self, gain: u32) -> Result<()> {
        let mut st = self.hub.state.borrow_mut();
        let refused = st.refused_gains.contains(&st.effects[self.index].name);
        if gain > MAX_MAGNITUDE || refused {
            return Err(InputError::native("SetParameters", E_INVALIDARG));
        }
        st.effects[self.index].gain = gain;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.hub.state.borrow().effects[self.index].playing
    }
}

impl Drop for VirtualEffect {
    fn drop(&mut self) {
        let mut st = self.hub.state.borrow_mut();
        let record = &mut st.effects[self.index];
        record.playing = false;
        record.released = true;
    }
}
