//! Manager configuration.
//!
//! [`InputConfig`] is plain data, usually read from TOML:
//!
//! ```toml
//! axis_range = { min = -1000, max = 1000 }
//! keyboard_cooperation = "NONEXCLUSIVE | FOREGROUND"
//! joystick_cooperation = "EXCLUSIVE | FOREGROUND"
//! autocenter = false
//! keyboard = true
//! joystick = true
//! ```
//!
//! Every key is optional; missing keys take the [`Default`] values shown above
//! (`autocenter` defaults to "leave the device alone").

use crate::error::{InputError, Result};
use crate::native::{AxisRange, CooperativeFlags};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Calibration range applied to every discovered joystick axis.
    pub axis_range: AxisRange,
    pub keyboard_cooperation: CooperativeFlags,
    /// Force feedback needs exclusive access on most drivers.
    pub joystick_cooperation: CooperativeFlags,
    /// Applied to force-feedback joysticks only. Failures are logged, not fatal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autocenter: Option<bool>,
    /// Enumerate keyboards.
    pub keyboard: bool,
    /// Enumerate joysticks.
    pub joystick: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            axis_range: AxisRange::default(),
            keyboard_cooperation: CooperativeFlags::NONEXCLUSIVE | CooperativeFlags::FOREGROUND,
            joystick_cooperation: CooperativeFlags::EXCLUSIVE | CooperativeFlags::FOREGROUND,
            autocenter: None,
            keyboard: true,
            joystick: true,
        }
    }
}

impl InputConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(text).map_err(|e| InputError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| InputError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| InputError::Config(e.to_string()))
    }

    /// Reject ranges and cooperative levels the native layer would refuse.
    pub fn validate(&self) -> Result<()> {
        self.axis_range
            .validate()
            .map_err(|e| InputError::Config(format!("axis_range: {e}")))?;
        self.keyboard_cooperation
            .validate()
            .map_err(|e| InputError::Config(format!("keyboard_cooperation: {e}")))?;
        self.joystick_cooperation
            .validate()
            .map_err(|e| InputError::Config(format!("joystick_cooperation: {e}")))?;
        if !self.keyboard && !self.joystick {
            return Err(InputError::Config(
                "both keyboard and joystick are disabled".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(InputConfig::from_toml_str("").unwrap(), InputConfig::default());
    }

    #[test]
    fn reads_every_key() {
        let cfg = InputConfig::from_toml_str(
            r#"
            axis_range = { min = -100, max = 100 }
            keyboard_cooperation = "NONEXCLUSIVE | BACKGROUND"
            joystick_cooperation = "EXCLUSIVE | BACKGROUND"
            autocenter = false
            keyboard = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.axis_range, AxisRange::new(-100, 100));
        assert_eq!(
            cfg.keyboard_cooperation,
            CooperativeFlags::NONEXCLUSIVE | CooperativeFlags::BACKGROUND
        );
        assert_eq!(
            cfg.joystick_cooperation,
            CooperativeFlags::EXCLUSIVE | CooperativeFlags::BACKGROUND
        );
        assert_eq!(cfg.autocenter, Some(false));
        assert!(!cfg.keyboard);
        assert!(cfg.joystick);
    }

    #[test]
    fn inverted_range_is_a_config_error() {
        let err = InputConfig::from_toml_str("axis_range = { min = 5, max = -5 }").unwrap_err();
        assert!(matches!(err, InputError::Config(_)), "{err}");
    }

    #[test]
    fn conflicting_cooperation_is_a_config_error() {
        let err = InputConfig::from_toml_str(r#"joystick_cooperation = "EXCLUSIVE | NONEXCLUSIVE | FOREGROUND""#)
            .unwrap_err();
        assert!(matches!(err, InputError::Config(_)));
    }

    #[test]
    fn nothing_enabled_is_a_config_error() {
        assert!(InputConfig::from_toml_str("keyboard = false\njoystick = false").is_err());
    }

    #[test]
    fn written_config_reads_back() {
        let cfg = InputConfig {
            autocenter: Some(true),
            ..InputConfig::default()
        };
        let text = cfg.to_toml_string().unwrap();
        assert_eq!(InputConfig::from_toml_str(&text).unwrap(), cfg);
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.toml");
        std::fs::write(&path, "autocenter = true\n").unwrap();
        assert_eq!(InputConfig::load(&path).unwrap().autocenter, Some(true));
        assert!(InputConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
