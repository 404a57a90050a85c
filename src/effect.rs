//! Force-feedback effect playback.
//!
//! A [`ForceFeedbackEffect`] is an ordered set of native effects created on one
//! joystick. It is bound to that joystick by id: adding effects through any
//! other joystick is rejected. The set does not borrow the joystick, so the
//! manager can keep polling while effects play.
//!
//! # Gain policy
//! Gain is in native units, `0..=10000`. Values above `10000` are **rejected**
//! with [`InputError::GainOutOfRange`] and leave every effect untouched. An
//! accepted gain is remembered and applied to effects added later.

use crate::device::Device;
use crate::effect_file::{FileEffect, MAX_MAGNITUDE};
use crate::error::{InputError, Result};
use crate::joystick::Joystick;
use crate::native::{Enumeration, NativeEffect};
use std::path::Path;
use tracing::{debug, info, warn};

pub struct ForceFeedbackEffect {
    joystick_id: String,
    effects: Vec<Box<dyn NativeEffect>>,
    names: Vec<String>,
    gain: Option<u32>,
}

impl ForceFeedbackEffect {
    /// Empty set bound to `joystick`.
    pub fn new(joystick: &Joystick) -> Self {
        Self {
            joystick_id: joystick.id().to_owned(),
            effects: Vec::new(),
            names: Vec::new(),
            gain: None,
        }
    }

    /// Bind to `joystick` and load every effect stored in `path`.
    pub fn from_file(joystick: &Joystick, path: impl AsRef<Path>) -> Result<Self> {
        let mut set = Self::new(joystick);
        set.load_file(joystick, path)?;
        Ok(set)
    }

    /// Append every effect stored in `path`, in file order.
    ///
    /// All-or-nothing: if any effect fails to instantiate or to take the
    /// current gain, the ones created by this call are released and the set is
    /// unchanged.
    pub fn load_file(&mut self, joystick: &Joystick, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        self.check_target(joystick)?;

        let device = joystick.device();
        let mut created: Vec<(String, Box<dyn NativeEffect>)> = Vec::new();
        let mut failure: Option<InputError> = None;

        device.enumerate_effects_in_file(path, &mut |file_effect| {
            match device.create_effect(file_effect) {
                Ok(native) => {
                    created.push((file_effect.name.clone(), native));
                    Enumeration::Continue
                }
                Err(e) => {
                    failure = Some(e);
                    Enumeration::Stop
                }
            }
        })?;

        if let Some(e) = failure {
            warn!(path = %path.display(), error = %e, "effect file rejected");
            return Err(e);
        }

        // Apply the gain before anything is appended; a failure here drops
        // every effect created by this call.
        if let Some(gain) = self.gain {
            for (_, native) in &mut created {
                native.set_gain(gain)?;
            }
        }

        let count = created.len();
        for (name, native) in created {
            self.names.push(name);
            self.effects.push(native);
        }
        info!(path = %path.display(), effects = count, joystick = %self.joystick_id, "effects loaded");
        Ok(count)
    }

    /// Append one effect. Out-of-range magnitude or direction is rejected
    /// before the native device sees it.
    pub fn add_file_effect(&mut self, joystick: &Joystick, effect: &FileEffect) -> Result<()> {
        self.check_target(joystick)?;
        effect.validate()?;
        let native = joystick.device().create_effect(effect)?;
        self.push(effect.name.clone(), native)
    }

    /// Start every effect. All effects are attempted; the first failure is returned.
    pub fn play(&mut self) -> Result<()> {
        let result = for_each(&mut self.effects, |fx| fx.start());
        debug!(joystick = %self.joystick_id, effects = self.effects.len(), ok = result.is_ok(), "play");
        result
    }

    /// Stop every effect. All effects are attempted; the first failure is returned.
    pub fn stop(&mut self) -> Result<()> {
        let result = for_each(&mut self.effects, |fx| fx.stop());
        debug!(joystick = %self.joystick_id, effects = self.effects.len(), ok = result.is_ok(), "stop");
        result
    }

    /// Set output gain on every effect (`0..=10000`).
    pub fn set_gain(&mut self, gain: u32) -> Result<()> {
        if gain > MAX_MAGNITUDE {
            return Err(InputError::GainOutOfRange(gain));
        }
        let result = for_each(&mut self.effects, |fx| fx.set_gain(gain));
        self.gain = Some(gain);
        result
    }

    /// Last accepted gain, if one was set.
    pub fn gain(&self) -> Option<u32> {
        self.gain
    }

    pub fn joystick_id(&self) -> &str {
        &self.joystick_id
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Effect names in playback order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn playing(&self) -> usize {
        self.effects.iter().filter(|fx| fx.is_playing()).count()
    }

    fn check_target(&self, joystick: &Joystick) -> Result<()> {
        if joystick.id() != self.joystick_id {
            return Err(InputError::JoystickMismatch {
                expected: self.joystick_id.clone(),
                actual: joystick.id().to_owned(),
            });
        }
        if !joystick.ff_capable() {
            return Err(InputError::ForceFeedbackUnsupported(self.joystick_id.clone()));
        }
        Ok(())
    }

    fn push(&mut self, name: String, mut native: Box<dyn NativeEffect>) -> Result<()> {
        if let Some(gain) = self.gain {
            native.set_gain(gain)?;
        }
        self.effects.push(native);
        self.names.push(name);
        Ok(())
    }
}

impl std::fmt::Debug for ForceFeedbackEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForceFeedbackEffect")
            .field("joystick", &self.joystick_id)
            .field("effects", &self.names)
            .field("gain", &self.gain)
            .finish()
    }
}

fn for_each(
    effects: &mut [Box<dyn NativeEffect>],
    mut op: impl FnMut(&mut dyn NativeEffect) -> Result<()>,
) -> Result<()> {
    let mut first_err = None;
    for fx in effects.iter_mut() {
        if let Err(e) = op(fx.as_mut()) {
            first_err.get_or_insert(e);
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
