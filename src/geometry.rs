//! # Logo Placement
//!
//! Maps a canvas size, a logo size and an anchor position to the top-left
//! corner of the logo. The same function drives both still images and video
//! frames so the two paths always agree on placement.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Anchor point for the logo on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    #[default]
    CenterTop,
    CenterBottom,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Position {
    pub const ALL: [Position; 6] = [
        Position::CenterTop,
        Position::CenterBottom,
        Position::TopLeft,
        Position::TopRight,
        Position::BottomLeft,
        Position::BottomRight,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Position::CenterTop => "center_top",
            Position::CenterBottom => "center_bottom",
            Position::TopLeft => "top_left",
            Position::TopRight => "top_right",
            Position::BottomLeft => "bottom_left",
            Position::BottomRight => "bottom_right",
        }
    }

    /// Parse a position name, falling back to [`Position::CenterTop`] for
    /// anything unrecognised.
    pub fn from_name(name: &str) -> Self {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|p| p.name() == normalized)
            .unwrap_or_default()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Position {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

/// Compute the top-left corner of the logo.
///
/// Coordinates are signed and never clamped: offsets larger than the free
/// space push the logo partly or fully off the canvas, and the compositor
/// clips whatever falls outside.
pub fn resolve(
    canvas_w: u32,
    canvas_h: u32,
    logo_w: u32,
    logo_h: u32,
    position: Position,
    offset_x: u32,
    offset_y: u32,
) -> (i64, i64) {
    let (cw, ch) = (canvas_w as i64, canvas_h as i64);
    let (lw, lh) = (logo_w as i64, logo_h as i64);
    let (ox, oy) = (offset_x as i64, offset_y as i64);

    // Floor, not truncation, when the logo is wider than the canvas
    let centered_x = (cw - lw).div_euclid(2);
    let right_x = cw - lw - ox;
    let bottom_y = ch - lh - oy;

    match position {
        Position::CenterTop => (centered_x, oy),
        Position::CenterBottom => (centered_x, bottom_y),
        Position::TopLeft => (ox, oy),
        Position::TopRight => (right_x, oy),
        Position::BottomLeft => (ox, bottom_y),
        Position::BottomRight => (right_x, bottom_y),
    }
}
