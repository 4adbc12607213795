/// An RGB triple with one byte per channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

pub const BLACK: Color = Color::new(0, 0, 0);

/// Highest brightness percentage.
pub const FULL_BRIGHTNESS: u8 = 100;

impl Color {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Color { red, green, blue }
    }

    /// Scales every channel by `brightness` percent, truncating.
    ///
    /// Values above 100 are treated as 100.
    pub fn scale(self, brightness: u8) -> Color {
        let brightness = u16::from(brightness.min(FULL_BRIGHTNESS));
        let channel = |c: u8| (u16::from(c) * brightness / u16::from(FULL_BRIGHTNESS)) as u8;
        Color {
            red: channel(self.red),
            green: channel(self.green),
            blue: channel(self.blue),
        }
    }

    /// Channel-wise sum, clamped at 255. The sum is taken in `u16` first.
    pub fn saturating_add(self, other: Color) -> Color {
        let channel = |a: u8, b: u8| (u16::from(a) + u16::from(b)).min(u16::from(u8::MAX)) as u8;
        Color {
            red: channel(self.red, other.red),
            green: channel(self.green, other.green),
            blue: channel(self.blue, other.blue),
        }
    }

    pub fn is_black(&self) -> bool {
        *self == BLACK
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}
