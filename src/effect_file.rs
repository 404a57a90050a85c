//! Effect files.
//!
//! Backends shipped with this crate store force-feedback effects as TOML:
//!
//! ```toml
//! [[effect]]
//! name = "engine"
//! kind = "sine"
//! magnitude = 6000
//! duration_ms = 1500
//! direction = 9000
//!
//! [[effect]]
//! name = "wall"
//! kind = "spring"
//! magnitude = 10000
//! ```
//!
//! `magnitude` is in native units (`0..=10000`), `direction` in hundredths of a
//! degree, and a missing `duration_ms` means the effect runs until stopped.
//! File order is preserved; it is the order effects are enumerated and played.

use crate::error::{InputError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Largest magnitude/gain in native units.
pub const MAX_MAGNITUDE: u32 = 10_000;

/// Effect waveform/condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Constant,
    Ramp,
    Square,
    Sine,
    Triangle,
    SawtoothUp,
    SawtoothDown,
    Spring,
    Damper,
    Friction,
    Rumble,
}

/// One effect as stored in an effect file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEffect {
    pub name: String,
    pub kind: EffectKind,
    pub magnitude: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub direction: u32,
}

impl FileEffect {
    pub fn new(name: impl Into<String>, kind: EffectKind, magnitude: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            magnitude,
            duration_ms: None,
            direction: 0,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = Some(duration.as_millis() as u64);
        self
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration_ms.map(Duration::from_millis)
    }

    /// Magnitude must be at most [`MAX_MAGNITUDE`], direction below 36000.
    pub fn validate(&self) -> Result<()> {
        let reason = if self.magnitude > MAX_MAGNITUDE {
            format!("magnitude {} exceeds {MAX_MAGNITUDE}", self.magnitude)
        } else if self.direction >= 36_000 {
            format!("direction {} is not below 36000", self.direction)
        } else {
            return Ok(());
        };
        Err(InputError::InvalidEffect {
            name: self.name.clone(),
            reason,
        })
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EffectDocument {
    #[serde(default)]
    effect: Vec<FileEffect>,
}

/// Parse an effect document. `origin` only labels errors.
pub fn parse_str(text: &str, origin: &Path) -> Result<Vec<FileEffect>> {
    let doc: EffectDocument = toml::from_str(text).map_err(|e| InputError::EffectFile {
        path: origin.to_path_buf(),
        reason: e.to_string(),
    })?;

    for fx in &doc.effect {
        fx.validate().map_err(|e| InputError::EffectFile {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })?;
    }
    Ok(doc.effect)
}

/// Read and parse an effect file from disk.
pub fn load(path: &Path) -> Result<Vec<FileEffect>> {
    let text = std::fs::read_to_string(path).map_err(|e| InputError::EffectFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_str(&text, path)
}

/// Render effects back into the file format.
pub fn to_string(effects: &[FileEffect]) -> Result<String> {
    let doc = EffectDocument {
        effect: effects.to_vec(),
    };
    toml::to_string(&doc).map_err(|e| InputError::EffectFile {
        path: Path::new("<memory>").to_path_buf(),
        reason: e.to_string(),
    })
}
