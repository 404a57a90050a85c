//! Joystick device: axes, sliders, buttons, POV and force-feedback flags.
//!
//! # Availability
//! A joystick only publishes the [`DeviceState`] fields named in its
//! [`Available`] mask. The mask starts empty and is filled during
//! configuration from the device's objects ([`Joystick::discover_objects`]) or
//! by hand with [`Joystick::add_available`]. Fields the hardware does not
//! report stay zero.
//!
//! # Ranges
//! Every discovered axis gets a calibration range on the native device
//! (default `-1000..=1000`). Values come back already scaled, so a native
//! reading at the physical maximum is reported as the configured `max`.

use crate::device::Device;
use crate::error::{InputError, Result};
use crate::metadata::{Available, Axis, DeviceInstance, ObjectKind};
use crate::native::{
    AxisRange, CooperativeFlags, DataFormat, Enumeration, JoystickReport, NativeDevice, Report,
    WindowHandle,
};
use crate::state::{pov_flags, DeviceState, BUTTON_COUNT};
use tracing::{debug, trace};

/// Polled joystick / game controller.
///
/// Owns its native device exclusively; dropping the joystick releases it.
pub struct Joystick {
    device: Box<dyn NativeDevice>,
    state: DeviceState,
    available: Available,
    ff_capable: bool,
    ranges: [Option<AxisRange>; 8],
}

impl Joystick {
    /// Wrap an already-opened native joystick.
    pub fn new(device: Box<dyn NativeDevice>) -> Self {
        Self {
            device,
            state: DeviceState::default(),
            available: Available::empty(),
            ff_capable: false,
            ranges: [None; 8],
        }
    }

    #[inline]
    pub fn add_available(&mut self, flags: Available) {
        self.available |= flags;
    }

    #[inline]
    pub fn available(&self) -> Available {
        self.available
    }

    /// Configure calibration bounds for one axis on the native device.
    pub fn set_range(&mut self, axis: Axis, min: i32, max: i32) -> Result<()> {
        let range = AxisRange::new(min, max).validate()?;
        self.device.set_range(axis, range)?;
        self.ranges[axis.index()] = Some(range);
        Ok(())
    }

    /// Range last applied to `axis`, if any.
    pub fn range(&self, axis: Axis) -> Option<AxisRange> {
        self.ranges[axis.index()]
    }

    #[inline]
    pub fn ff_capable(&self) -> bool {
        self.ff_capable
    }

    #[inline]
    pub fn set_ff_capable(&mut self, capable: bool) {
        self.ff_capable = capable;
    }

    /// Toggle the self-centering spring.
    pub fn set_autocenter(&mut self, enabled: bool) -> Result<()> {
        self.device.set_autocenter(enabled)?;
        debug!(device = %self.id(), enabled, "autocenter");
        Ok(())
    }

    /// Native device handle, used by [`ForceFeedbackEffect`](crate::ForceFeedbackEffect).
    pub fn device(&self) -> &dyn NativeDevice {
        self.device.as_ref()
    }

    /// Replace the native device. The previous one is returned to the caller
    /// (drop it to release). Snapshot and flags are kept.
    pub fn set_device(&mut self, device: Box<dyn NativeDevice>) -> Box<dyn NativeDevice> {
        std::mem::replace(&mut self.device, device)
    }

    /// Walk the native objects, accumulate availability bits and apply `range`
    /// to every axis. Returns the number of objects seen.
    pub fn discover_objects(&mut self, range: AxisRange) -> Result<usize> {
        let range = range.validate()?;
        let device = &self.device;
        let available = &mut self.available;
        let ranges = &mut self.ranges;
        let mut seen = 0usize;
        let mut failure: Option<InputError> = None;

        device.enumerate_objects(&mut |object| {
            seen += 1;
            *available |= object.kind.available_flag();
            if let ObjectKind::Axis(axis) = object.kind {
                if let Err(e) = device.set_range(axis, range) {
                    failure = Some(e);
                    return Enumeration::Stop;
                }
                ranges[axis.index()] = Some(range);
            }
            trace!(object = %object.name, kind = ?object.kind, "joystick object");
            Enumeration::Continue
        })?;

        if let Some(e) = failure {
            return Err(e);
        }
        debug!(device = %self.device.instance().id, objects = seen, available = ?self.available, "objects discovered");
        Ok(seen)
    }

    pub fn acquire(&mut self) -> Result<()> {
        self.device.acquire()
    }

    fn snapshot_from(&self, report: &JoystickReport) -> DeviceState {
        let mut next = DeviceState::default();

        for axis in Axis::ALL {
            if !self.available.contains(axis.available_flag()) {
                continue;
            }
            let i = axis.index();
            *next.axis_mut(axis) = if axis.is_slider() {
                report.sliders[i - 6]
            } else {
                report.axes[i]
            };
        }

        for (i, &pressed) in report.buttons.iter().take(BUTTON_COUNT).enumerate() {
            if self.available.has_button(i) {
                next.buttons[i] = pressed;
            }
        }

        if self.available.contains(Available::POV) {
            next.pov = pov_flags(report.povs.first().copied().flatten());
        }

        next
    }
}

impl Device for Joystick {
    fn update(&mut self) -> Result<()> {
        let report = match self.device.poll()? {
            Report::Joystick(report) => report,
            Report::Keyboard(_) => {
                return Err(InputError::Unsupported(
                    "joystick received a keyboard-shaped report",
                ))
            }
        };
        self.state = self.snapshot_from(&report);
        Ok(())
    }

    fn state(&self) -> &DeviceState {
        &self.state
    }

    fn set_data_format(&mut self) -> Result<()> {
        self.device.set_data_format(DataFormat::Joystick)
    }

    fn set_cooperative_level(&mut self, window: WindowHandle, flags: CooperativeFlags) -> Result<()> {
        self.device.set_cooperative_level(window, flags.validate()?)
    }

    fn instance(&self) -> &DeviceInstance {
        self.device.instance()
    }
}

impl std::fmt::Debug for Joystick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Joystick")
            .field("id", &self.device.instance().id)
            .field("available", &self.available)
            .field("ff_capable", &self.ff_capable)
            .finish()
    }
}
