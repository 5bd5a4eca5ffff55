use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Per-tile metadata: the candidate children for dark and light pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TileSpec {
    pub black: Vec<String>,
    pub white: Vec<String>,
}

/// Binarized luminance of a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shade {
    Black,
    White,
}

impl Shade {
    /// Red-channel values below this are black. Source images are greyscale,
    /// so red alone stands in for luminance.
    pub const THRESHOLD: u8 = 128;

    #[inline]
    pub fn from_red(red: u8) -> Self {
        if red < Self::THRESHOLD {
            Self::Black
        } else {
            Self::White
        }
    }
}

impl TileSpec {
    /// Parse and validate the JSON payload served for `id`.
    pub fn from_json(id: &str, bytes: &[u8]) -> crate::Result<Self> {
        let spec: Self = serde_json::from_slice(bytes).map_err(|e| CoreError::MalformedSpec {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        spec.validate(id)?;
        Ok(spec)
    }

    /// At least one list must name a child. A single empty list is fine as
    /// long as the image has no pixel of that shade.
    pub fn validate(&self, id: &str) -> crate::Result<()> {
        if self.black.is_empty() && self.white.is_empty() {
            return Err(CoreError::EmptyCandidates(id.to_string()));
        }
        Ok(())
    }

    pub fn candidates(&self, shade: Shade) -> &[String] {
        match shade {
            Shade::Black => &self.black,
            Shade::White => &self.white,
        }
    }

    /// Every id mentioned by either list, in list order (black first).
    pub fn referenced_ids(&self) -> impl Iterator<Item = &str> {
        self.black.iter().chain(&self.white).map(String::as_str)
    }
}
