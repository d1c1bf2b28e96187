//! Gamepad buttons, axes and hat directions.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamepadButton {
    A,
    B,
    X,
    Y,
    LeftShoulder,
    RightShoulder,
    Back,
    Start,
    Guide,
    LeftStick,
    RightStick,
}

impl GamepadButton {
    /// Bit index in the gamepad report's button field.
    pub fn index(&self) -> u8 {
        *self as u8
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            GamepadButton::A => "A",
            GamepadButton::B => "B",
            GamepadButton::X => "X",
            GamepadButton::Y => "Y",
            GamepadButton::LeftShoulder => "LB",
            GamepadButton::RightShoulder => "RB",
            GamepadButton::Back => "Back",
            GamepadButton::Start => "Start",
            GamepadButton::Guide => "Guide",
            GamepadButton::LeftStick => "L3",
            GamepadButton::RightStick => "R3",
        }
    }
}

impl fmt::Display for GamepadButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for GamepadButton {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" | "CROSS" | "SOUTH" => Ok(GamepadButton::A),
            "B" | "CIRCLE" | "EAST" => Ok(GamepadButton::B),
            "X" | "SQUARE" | "WEST" => Ok(GamepadButton::X),
            "Y" | "TRIANGLE" | "NORTH" => Ok(GamepadButton::Y),
            "LB" | "L1" => Ok(GamepadButton::LeftShoulder),
            "RB" | "R1" => Ok(GamepadButton::RightShoulder),
            "BACK" | "SELECT" | "SHARE" | "VIEW" => Ok(GamepadButton::Back),
            "START" | "OPTIONS" | "MENU" => Ok(GamepadButton::Start),
            "GUIDE" | "HOME" | "PS" | "MODE" | "XBOX" => Ok(GamepadButton::Guide),
            "L3" | "LS" | "LSB" => Ok(GamepadButton::LeftStick),
            "R3" | "RS" | "RSB" => Ok(GamepadButton::RightStick),
            _ => Err(format!("unknown gamepad button: \"{s}\"")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamepadAxis {
    LeftX,
    LeftY,
    RightX,
    RightY,
    LeftTrigger,
    RightTrigger,
}

impl GamepadAxis {
    pub fn display_name(&self) -> &'static str {
        match self {
            GamepadAxis::LeftX => "LX",
            GamepadAxis::LeftY => "LY",
            GamepadAxis::RightX => "RX",
            GamepadAxis::RightY => "RY",
            GamepadAxis::LeftTrigger => "LT",
            GamepadAxis::RightTrigger => "RT",
        }
    }
}

impl fmt::Display for GamepadAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// D-pad position. Report values follow the usual clockwise hat encoding
/// starting at Up = 0, with 8 meaning centred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HatDirection {
    #[default]
    Centered,
    Up,
    UpRight,
    Right,
    DownRight,
    Down,
    DownLeft,
    Left,
    UpLeft,
}

impl HatDirection {
    pub fn hid_value(&self) -> u8 {
        match self {
            HatDirection::Up => 0,
            HatDirection::UpRight => 1,
            HatDirection::Right => 2,
            HatDirection::DownRight => 3,
            HatDirection::Down => 4,
            HatDirection::DownLeft => 5,
            HatDirection::Left => 6,
            HatDirection::UpLeft => 7,
            HatDirection::Centered => 8,
        }
    }

    /// Unit vector (x right, y down) for back-ends that expose the hat as axes.
    pub fn as_xy(&self) -> (i32, i32) {
        match self {
            HatDirection::Centered => (0, 0),
            HatDirection::Up => (0, -1),
            HatDirection::UpRight => (1, -1),
            HatDirection::Right => (1, 0),
            HatDirection::DownRight => (1, 1),
            HatDirection::Down => (0, 1),
            HatDirection::DownLeft => (-1, 1),
            HatDirection::Left => (-1, 0),
            HatDirection::UpLeft => (-1, -1),
        }
    }
}

impl fmt::Display for HatDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HatDirection::Centered => "center",
            HatDirection::Up => "up",
            HatDirection::UpRight => "up-right",
            HatDirection::Right => "right",
            HatDirection::DownRight => "down-right",
            HatDirection::Down => "down",
            HatDirection::DownLeft => "down-left",
            HatDirection::Left => "left",
            HatDirection::UpLeft => "up-left",
        };
        f.write_str(name)
    }
}

impl FromStr for HatDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "UP" | "N" => Ok(HatDirection::Up),
            "UPRIGHT" | "NE" => Ok(HatDirection::UpRight),
            "RIGHT" | "E" => Ok(HatDirection::Right),
            "DOWNRIGHT" | "SE" => Ok(HatDirection::DownRight),
            "DOWN" | "S" => Ok(HatDirection::Down),
            "DOWNLEFT" | "SW" => Ok(HatDirection::DownLeft),
            "LEFT" | "W" => Ok(HatDirection::Left),
            "UPLEFT" | "NW" => Ok(HatDirection::UpLeft),
            "CENTER" | "CENTRE" | "NONE" | "RELEASE" | "OFF" => Ok(HatDirection::Centered),
            _ => Err(format!("unknown d-pad direction: \"{s}\"")),
        }
    }
}
