// Window geometry module
// Parses and formats "WxH+X+Y" geometry strings and the window-manager state vocabulary

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing a geometry string
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("geometry `{0}` is not of the form WxH+X+Y")]
    Malformed(String),
    #[error("geometry `{0}` has a zero width or height")]
    EmptyArea(String),
}

/// Window size and position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
}

impl Geometry {
    pub fn new(width: u32, height: u32, x: i32, y: i32) -> Self {
        Self {
            width,
            height,
            x,
            y,
        }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}{:+}{:+}", self.width, self.height, self.x, self.y)
    }
}

impl FromStr for Geometry {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || GeometryError::Malformed(s.to_string());
        let s_trim = s.trim();

        // Split "WxH" from the signed offsets
        let offsets_at = s_trim.find(['+', '-']).ok_or_else(malformed)?;
        let (size, offsets) = s_trim.split_at(offsets_at);
        let (w, h) = size.split_once('x').ok_or_else(malformed)?;
        let width: u32 = w.parse().map_err(|_| malformed())?;
        let height: u32 = h.parse().map_err(|_| malformed())?;

        // The second offset starts at the next sign after the first one
        let second_at = offsets[1..]
            .find(['+', '-'])
            .map(|i| i + 1)
            .ok_or_else(malformed)?;
        let (x, y) = offsets.split_at(second_at);
        let x: i32 = x.parse().map_err(|_| malformed())?;
        let y: i32 = y.parse().map_err(|_| malformed())?;

        if width == 0 || height == 0 {
            return Err(GeometryError::EmptyArea(s.to_string()));
        }
        Ok(Self::new(width, height, x, y))
    }
}

/// Window state as reported by the window manager (fullscreen is tracked separately)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WmState {
    #[default]
    Normal,
    Zoomed,
}

impl WmState {
    pub fn as_str(self) -> &'static str {
        match self {
            WmState::Normal => "normal",
            WmState::Zoomed => "zoomed",
        }
    }

    /// Parse the persisted vocabulary, `None` for anything unknown
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(WmState::Normal),
            "zoomed" => Some(WmState::Zoomed),
            _ => None,
        }
    }
}

impl fmt::Display for WmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
