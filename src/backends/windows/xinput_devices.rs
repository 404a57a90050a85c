#![cfg(target_os = "windows")]

//! XInput game controllers as native joysticks.
//!
//! # Object layout
//! XInput has no descriptors, so every slot publishes the same objects:
//!
//! ## Axes (6)
//! - `X`: left stick X
//! - `Y`: left stick Y, **inverted** (up reads toward `min`)
//! - `Z`: left trigger
//! - `RX`: right stick X
//! - `RY`: right stick Y, **inverted**
//! - `RZ`: right trigger
//!
//! Sticks span `-32768..=32767`, triggers `0..=255`; both are scaled into the
//! range set with `set_range` (raw values when no range was set).
//!
//! ## Buttons (10)
//! A, B, X, Y, LB, RB, Back, Start, LThumb, RThumb (buttons 1..10).
//!
//! ## POV (1)
//! The D-pad, reported as an angle in hundredths of a degree (Up = 0,
//! clockwise); opposing directions held together read as centered.
//!
//! # Force feedback
//! Rumble motors only. Constant, periodic and rumble effects map to a motor
//! level of `magnitude * gain / 10000`; when several play, the strongest wins.
//! Condition effects (spring, damper, friction) and autocenter are not
//! available on XInput.

use super::Cooperation;
use crate::effect_file::{self, EffectKind, FileEffect, MAX_MAGNITUDE};
use crate::error::{InputError, Result};
use crate::metadata::{Axis, DeviceClass, DeviceInstance, DeviceObject, ObjectKind};
use crate::native::{
    AxisRange, CooperativeFlags, DataFormat, Enumeration, JoystickReport, NativeDevice,
    NativeEffect, Report, WindowHandle,
};
use crate::state::pov_angle;
use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, trace};

use windows_sys::Win32::UI::Input::XboxController::*;

const THUMB: AxisRange = AxisRange::new(-32_768, 32_767);
const TRIGGER: AxisRange = AxisRange::new(0, 255);

const AXES: [(Axis, AxisRange); 6] = [
    (Axis::X, THUMB),
    (Axis::Y, THUMB),
    (Axis::Z, TRIGGER),
    (Axis::Rx, THUMB),
    (Axis::Ry, THUMB),
    (Axis::Rz, TRIGGER),
];

const BUTTON_MAP: [(u16, &str); 10] = [
    (XINPUT_GAMEPAD_A, "A"),
    (XINPUT_GAMEPAD_B, "B"),
    (XINPUT_GAMEPAD_X, "X"),
    (XINPUT_GAMEPAD_Y, "Y"),
    (XINPUT_GAMEPAD_LEFT_SHOULDER, "LB"),
    (XINPUT_GAMEPAD_RIGHT_SHOULDER, "RB"),
    (XINPUT_GAMEPAD_BACK, "Back"),
    (XINPUT_GAMEPAD_START, "Start"),
    (XINPUT_GAMEPAD_LEFT_THUMB, "LThumb"),
    (XINPUT_GAMEPAD_RIGHT_THUMB, "RThumb"),
];

fn get_state(slot: u32) -> std::result::Result<XINPUT_STATE, u32> {
    // SAFETY: XINPUT_STATE is plain data; zeroed is a valid value.
    let mut state: XINPUT_STATE = unsafe { std::mem::zeroed() };
    // SAFETY: `state` is a valid, writable XINPUT_STATE.
    let res = unsafe { XInputGetState(slot, &mut state) };
    if res == 0 {
        Ok(state)
    } else {
        Err(res)
    }
}

pub(crate) fn slot_connected(slot: u32) -> bool {
    get_state(slot).is_ok()
}

pub(crate) fn instance(slot: u32) -> DeviceInstance {
    DeviceInstance {
        id: format!("xinput:{slot}"),
        name: format!("XInput Controller {slot}"),
        class: DeviceClass::GameController,
        ff_capable: true,
    }
}

/// Map D-pad bits to a POV angle.
fn dpad_angle(buttons: u16) -> Option<u32> {
    let up = buttons & XINPUT_GAMEPAD_DPAD_UP != 0;
    let down = buttons & XINPUT_GAMEPAD_DPAD_DOWN != 0;
    let left = buttons & XINPUT_GAMEPAD_DPAD_LEFT != 0;
    let right = buttons & XINPUT_GAMEPAD_DPAD_RIGHT != 0;

    let slot = match (up, down, left, right) {
        (true, false, false, false) => 0,
        (true, false, false, true) => 1,
        (false, false, false, true) => 2,
        (false, true, false, true) => 3,
        (false, true, false, false) => 4,
        (false, true, true, false) => 5,
        (false, false, true, false) => 6,
        (true, false, true, false) => 7,
        _ => return None,
    };
    Some(pov_angle(slot))
}

/// Invert a stick Y value inside the thumb span.
#[inline]
fn invert_thumb(v: i16) -> i32 {
    (-i32::from(v)).min(THUMB.max)
}

/// State shared between a device and the effects created on it.
struct Core {
    slot: u32,
    id: String,
    cooperation: Cooperation,
    /// Motor level per effect (`None` = stopped or released).
    levels: RefCell<Vec<Option<u32>>>,
}

impl Core {
    fn apply_motors(&self) -> Result<()> {
        let level = self.levels.borrow().iter().flatten().copied().max().unwrap_or(0);
        let speed = (u64::from(level) * u64::from(u16::MAX) / u64::from(MAX_MAGNITUDE)) as u16;
        let vibration = XINPUT_VIBRATION {
            wLeftMotorSpeed: speed,
            wRightMotorSpeed: speed,
        };
        // SAFETY: `vibration` is a valid XINPUT_VIBRATION for the call's duration.
        let res = unsafe { XInputSetState(self.slot, &vibration) };
        if res != 0 {
            return Err(InputError::native("XInputSetState", res));
        }
        trace!(device = %self.id, speed, "rumble");
        Ok(())
    }
}

/// XInput slot opened as a native joystick.
pub struct XInputDevice {
    core: Rc<Core>,
    instance: DeviceInstance,
    format: Cell<Option<DataFormat>>,
    ranges: RefCell<[Option<AxisRange>; 8]>,
}

impl XInputDevice {
    pub(crate) fn new(slot: u32, instance: DeviceInstance) -> Self {
        Self {
            core: Rc::new(Core {
                slot,
                id: instance.id.clone(),
                cooperation: Cooperation::default(),
                levels: RefCell::new(Vec::new()),
            }),
            instance,
            format: Cell::new(None),
            ranges: RefCell::new([None; 8]),
        }
    }

    fn scaled(&self, axis: Axis, raw: i32, physical: AxisRange) -> i32 {
        match self.ranges.borrow()[axis.index()] {
            Some(range) => range.scale_from(raw, physical),
            None => raw,
        }
    }
}

impl NativeDevice for XInputDevice {
    fn instance(&self) -> &DeviceInstance {
        &self.instance
    }

    fn set_data_format(&self, format: DataFormat) -> Result<()> {
        if format != DataFormat::Joystick {
            return Err(InputError::Unsupported("XInput devices only report joystick data"));
        }
        self.format.set(Some(format));
        Ok(())
    }

    fn set_cooperative_level(&self, window: WindowHandle, flags: CooperativeFlags) -> Result<()> {
        self.core.cooperation.set(window, flags)
    }

    fn enumerate_objects(&self, visit: &mut dyn FnMut(&DeviceObject) -> Enumeration) -> Result<()> {
        let axes = AXES
            .iter()
            .map(|(axis, _)| DeviceObject::new(axis.to_string(), ObjectKind::Axis(*axis)));
        let buttons = BUTTON_MAP
            .iter()
            .enumerate()
            .map(|(i, (_, name))| DeviceObject::new(*name, ObjectKind::Button(i as u8)));
        let pov = std::iter::once(DeviceObject::new("DPad", ObjectKind::Pov(0)));

        for object in axes.chain(buttons).chain(pov) {
            if visit(&object) == Enumeration::Stop {
                break;
            }
        }
        Ok(())
    }

    fn set_range(&self, axis: Axis, range: AxisRange) -> Result<()> {
        if !AXES.iter().any(|(a, _)| *a == axis) {
            return Err(InputError::NotAnAxis(axis.to_string()));
        }
        self.ranges.borrow_mut()[axis.index()] = Some(range.validate()?);
        Ok(())
    }

    fn acquire(&self) -> Result<()> {
        if self.format.get().is_none() {
            return Err(InputError::Unsupported("acquire before setting a data format"));
        }
        if !slot_connected(self.core.slot) {
            return Err(InputError::DeviceLost(self.instance.id.clone()));
        }
        self.core.cooperation.acquire(&self.instance.id)?;
        debug!(device = %self.instance.id, "acquired");
        Ok(())
    }

    fn unacquire(&self) {
        self.core.cooperation.unacquire();
    }

    fn poll(&self) -> Result<Report> {
        self.core.cooperation.check(&self.instance.id)?;
        let state = get_state(self.core.slot).map_err(|code| {
            self.core.cooperation.unacquire();
            debug!(device = %self.instance.id, code, "slot disconnected");
            InputError::DeviceLost(self.instance.id.clone())
        })?;
        let gp = state.Gamepad;

        let raw = [
            i32::from(gp.sThumbLX),
            invert_thumb(gp.sThumbLY),
            i32::from(gp.bLeftTrigger),
            i32::from(gp.sThumbRX),
            invert_thumb(gp.sThumbRY),
            i32::from(gp.bRightTrigger),
        ];
        let mut axes = [0i32; 6];
        for (i, (axis, physical)) in AXES.iter().enumerate() {
            axes[i] = self.scaled(*axis, raw[i], *physical);
        }

        let buttons = BUTTON_MAP
            .iter()
            .map(|(mask, _)| gp.wButtons & *mask != 0)
            .collect();

        Ok(Report::Joystick(JoystickReport {
            axes,
            sliders: [0, 0],
            buttons,
            povs: vec![dpad_angle(gp.wButtons)],
        }))
    }

    fn set_autocenter(&self, _enabled: bool) -> Result<()> {
        Err(InputError::Unsupported("XInput has no autocenter spring"))
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
        if matches!(
            effect.kind,
            EffectKind::Spring | EffectKind::Damper | EffectKind::Friction
        ) {
            return Err(InputError::Unsupported("condition effects need a force-feedback motor"));
        }
        if !self.core.cooperation.is_exclusive() {
            return Err(InputError::NotAcquired(self.instance.id.clone()));
        }
        let mut levels = self.core.levels.borrow_mut();
        let index = levels.len();
        levels.push(None);
        Ok(Box::new(RumbleEffect {
            core: Rc::clone(&self.core),
            index,
            magnitude: effect.magnitude,
            gain: MAX_MAGNITUDE,
            playing: false,
        }))
    }
}

impl Drop for XInputDevice {
    fn drop(&mut self) {
        self.core.cooperation.unacquire();
        self.core.levels.borrow_mut().iter_mut().for_each(|l| *l = None);
        // Leave the motors off whatever happens to outstanding effects.
        let _ = self.core.apply_motors();
        debug!(device = %self.instance.id, "released");
    }
}

/// Rumble-motor effect on an XInput slot.
pub struct RumbleEffect {
    core: Rc<Core>,
    index: usize,
    magnitude: u32,
    gain: u32,
    playing: bool,
}

impl RumbleEffect {
    fn level(&self) -> u32 {
        let level = u64::from(self.magnitude) * u64::from(self.gain) / u64::from(MAX_MAGNITUDE);
        level.min(u64::from(MAX_MAGNITUDE)) as u32
    }

    fn publish(&self) -> Result<()> {
        self.core.levels.borrow_mut()[self.index] = self.playing.then(|| self.level());
        self.core.apply_motors()
    }
}

impl NativeEffect for RumbleEffect {
    fn start(&mut self) -> Result<()> {
        self.core.cooperation.check(&self.core.id)?;
        self.playing = true;
        self.publish()
    }

    fn stop(&mut self) -> Result<()> {
        self.playing = false;
        self.publish()
    }

    fn set_gain(&mut self, gain: u32) -> Result<()> {
        if gain > MAX_MAGNITUDE {
            return Err(InputError::GainOutOfRange(gain));
        }
        self.gain = gain;
        if self.playing {
            self.publish()?;
        }
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

impl Drop for RumbleEffect {
    fn drop(&mut self) {
        self.playing = false;
        let _ = self.publish();
    }
}
