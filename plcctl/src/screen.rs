//! Display enumeration and capture.
//!
//! Displays are numbered from 1 in the order the platform reports them,
//! which is the numbering operators see in `plcctl displays`.

use crate::error::{Error, Result};
use image::RgbaImage;
use inputctl::Desktop;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use xcap::Monitor;

/// 1-based display selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayId(pub u32);

impl Default for DisplayId {
    fn default() -> Self {
        DisplayId(1)
    }
}

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DisplayId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let n: u32 = s
            .trim()
            .parse()
            .map_err(|_| format!("'{}' is not a display number", s))?;
        if n == 0 {
            return Err("display numbers start at 1".to_string());
        }
        Ok(DisplayId(n))
    }
}

/// Geometry of one display, in desktop coordinates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayInfo {
    pub id: DisplayId,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub primary: bool,
}

impl DisplayInfo {
    /// Map a pixel of a capture of this display to a desktop position.
    ///
    /// Captures can be larger than the logical display on HiDPI outputs, so
    /// the pixel is scaled by the ratio of the two sizes.
    pub fn to_desktop(&self, px: i32, py: i32, capture_width: u32, capture_height: u32) -> (i32, i32) {
        let sx = self.width as f64 / capture_width.max(1) as f64;
        let sy = self.height as f64 / capture_height.max(1) as f64;
        (
            self.x + (px as f64 * sx).round() as i32,
            self.y + (py as f64 * sy).round() as i32,
        )
    }
}

impl fmt::Display for DisplayInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Monitor {}: {}x{} at ({}, {}) {}{}",
            self.id,
            self.width,
            self.height,
            self.x,
            self.y,
            self.name,
            if self.primary { " [primary]" } else { "" }
        )
    }
}

/// A captured display image plus where it sits on the desktop
pub struct Capture {
    pub display: DisplayInfo,
    pub image: RgbaImage,
}

fn capture_err(what: &str) -> impl Fn(xcap::XCapError) -> Error + '_ {
    move |e| Error::Capture(format!("{}: {}", what, e))
}

fn describe(index: usize, monitor: &Monitor) -> Result<DisplayInfo> {
    Ok(DisplayInfo {
        id: DisplayId(index as u32 + 1),
        name: monitor.name().map_err(capture_err("monitor name"))?,
        x: monitor.x().map_err(capture_err("monitor x"))?,
        y: monitor.y().map_err(capture_err("monitor y"))?,
        width: monitor.width().map_err(capture_err("monitor width"))?,
        height: monitor.height().map_err(capture_err("monitor height"))?,
        primary: monitor.is_primary().map_err(capture_err("monitor primary flag"))?,
    })
}

fn monitors() -> Result<Vec<Monitor>> {
    Monitor::all().map_err(capture_err("Failed to enumerate monitors"))
}

/// List connected displays
pub fn list_displays() -> Result<Vec<DisplayInfo>> {
    monitors()?
        .iter()
        .enumerate()
        .map(|(i, m)| describe(i, m))
        .collect()
}

/// Capture one display
pub fn capture_display(id: DisplayId) -> Result<Capture> {
    let monitors = monitors()?;
    let index = id.0 as usize - 1;
    let monitor = monitors.get(index).ok_or_else(|| {
        Error::Capture(format!(
            "display {} does not exist ({} connected)",
            id,
            monitors.len()
        ))
    })?;

    let display = describe(index, monitor)?;
    let image = monitor
        .capture_image()
        .map_err(capture_err("Screenshot capture failed"))?;

    Ok(Capture { display, image })
}

/// Bounding box of all displays, used to scale absolute pointer positions
pub fn desktop_bounds(displays: &[DisplayInfo]) -> Result<Desktop> {
    if displays.is_empty() {
        return Err(Error::Capture("no displays connected".to_string()));
    }
    let min_x = displays.iter().map(|d| d.x).min().unwrap_or(0);
    let min_y = displays.iter().map(|d| d.y).min().unwrap_or(0);
    let max_x = displays.iter().map(|d| d.x + d.width as i32).max().unwrap_or(0);
    let max_y = displays.iter().map(|d| d.y + d.height as i32).max().unwrap_or(0);

    Ok(Desktop {
        x: min_x,
        y: min_y,
        width: (max_x - min_x) as u32,
        height: (max_y - min_y) as u32,
    })
}
