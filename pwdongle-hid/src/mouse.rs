//! Mouse buttons and absolute-position emulation over relative reports.

use std::fmt;
use std::str::FromStr;

/// Largest displacement one relative mouse report can carry.
pub const MAX_STEP: i32 = 127;

/// Upper bound of the tracked cursor area, also the sweep length for RESET.
pub const MOUSE_EXTENT: i32 = 4096;

/// Longest displacement emitted for a single move, per axis.
pub const MAX_TRAVEL: i32 = 2 * MOUSE_EXTENT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
}

impl MouseButton {
    /// Bit in the report's button byte
    pub fn mask(&self) -> u8 {
        match self {
            MouseButton::Left => 0x01,
            MouseButton::Right => 0x02,
            MouseButton::Middle => 0x04,
            MouseButton::Back => 0x08,
            MouseButton::Forward => 0x10,
        }
    }
}

impl FromStr for MouseButton {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" | "1" => Ok(MouseButton::Left),
            "right" | "r" | "2" => Ok(MouseButton::Right),
            "middle" | "m" | "3" => Ok(MouseButton::Middle),
            "back" | "4" => Ok(MouseButton::Back),
            "forward" | "5" => Ok(MouseButton::Forward),
            _ => Err(format!("unknown mouse button: \"{s}\"")),
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
            MouseButton::Back => "back",
            MouseButton::Forward => "forward",
        };
        f.write_str(name)
    }
}

/// Split a displacement into relative steps of at most [`MAX_STEP`] per axis.
///
/// Both axes advance together until each is exhausted. Each axis is capped
/// at [`MAX_TRAVEL`].
pub fn relative_steps(dx: i32, dy: i32) -> Vec<(i8, i8)> {
    let mut dx = dx.clamp(-MAX_TRAVEL, MAX_TRAVEL);
    let mut dy = dy.clamp(-MAX_TRAVEL, MAX_TRAVEL);
    let mut steps = Vec::new();
    while dx != 0 || dy != 0 {
        let sx = dx.clamp(-MAX_STEP, MAX_STEP);
        let sy = dy.clamp(-MAX_STEP, MAX_STEP);
        steps.push((sx as i8, sy as i8));
        dx -= sx;
        dy -= sy;
    }
    steps
}

/// Local estimate of where the host cursor is.
///
/// HID mice only report motion, so absolute moves are turned into a delta
/// against this estimate. The estimate drifts if the host accelerates
/// pointer motion; `reset` re-anchors it by sweeping into the top-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseTracker {
    x: i32,
    y: i32,
}

impl MouseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// Steps that pin the cursor at the origin, then reset the estimate.
    pub fn reset(&mut self) -> Vec<(i8, i8)> {
        self.x = 0;
        self.y = 0;
        relative_steps(-MOUSE_EXTENT, -MOUSE_EXTENT)
    }

    /// Steps to reach an absolute target (clamped to the tracked area).
    pub fn move_to(&mut self, x: i32, y: i32) -> Vec<(i8, i8)> {
        let x = x.clamp(0, MOUSE_EXTENT);
        let y = y.clamp(0, MOUSE_EXTENT);
        let steps = relative_steps(x.saturating_sub(self.x), y.saturating_sub(self.y));
        self.x = x;
        self.y = y;
        steps
    }

    /// Steps for a relative move. The estimate may leave the tracked area by
    /// up to one extent on either side, since the host clips the real cursor.
    pub fn move_by(&mut self, dx: i32, dy: i32) -> Vec<(i8, i8)> {
        let dx = dx.clamp(-MAX_TRAVEL, MAX_TRAVEL);
        let dy = dy.clamp(-MAX_TRAVEL, MAX_TRAVEL);
        self.x = (self.x + dx).clamp(-MOUSE_EXTENT, 2 * MOUSE_EXTENT);
        self.y = (self.y + dy).clamp(-MOUSE_EXTENT, 2 * MOUSE_EXTENT);
        relative_steps(dx, dy)
    }
}
