//! RGB colours used for font colour and highlighting.
//!
//! WordprocessingML has two ways to shade text: `<w:highlight>` accepts only
//! a fixed palette of named colours, while `<w:shd w:fill="RRGGBB">` accepts
//! any RGB value. [`Color::highlight_name`] tells the writer which form to use.
use phf::phf_map;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Named highlight colours (`ST_HighlightColor`), keyed by lower-case name.
///
/// Values are the canonical attribute spelling and the packed RGB value.
static HIGHLIGHT_COLORS: phf::Map<&'static str, (&'static str, u32)> = phf_map! {
    "black" => ("black", 0x000000),
    "blue" => ("blue", 0x0000FF),
    "cyan" => ("cyan", 0x00FFFF),
    "green" => ("green", 0x00FF00),
    "magenta" => ("magenta", 0xFF00FF),
    "red" => ("red", 0xFF0000),
    "yellow" => ("yellow", 0xFFFF00),
    "white" => ("white", 0xFFFFFF),
    "darkblue" => ("darkBlue", 0x000080),
    "darkcyan" => ("darkCyan", 0x008080),
    "darkgreen" => ("darkGreen", 0x008000),
    "darkmagenta" => ("darkMagenta", 0x800080),
    "darkred" => ("darkRed", 0x800000),
    "darkyellow" => ("darkYellow", 0x808000),
    "darkgray" => ("darkGray", 0x808080),
    "lightgray" => ("lightGray", 0xC0C0C0),
};

/// An opaque 24-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0x00, 0x00, 0x00);
    pub const BLUE: Color = Color::rgb(0x00, 0x00, 0xFF);
    pub const RED: Color = Color::rgb(0xFF, 0x00, 0x00);
    pub const GREEN: Color = Color::rgb(0x00, 0xFF, 0x00);
    pub const YELLOW: Color = Color::rgb(0xFF, 0xFF, 0x00);

    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[inline]
    const fn from_packed(v: u32) -> Self {
        Self::rgb((v >> 16) as u8, (v >> 8) as u8, v as u8)
    }

    #[inline]
    fn packed(&self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// Parse a six-digit hex value, with or without a leading `#`.
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(hex, 16).ok().map(Self::from_packed)
    }

    /// Upper-case `RRGGBB`, the form used by `w:val` and `w:fill`.
    pub fn to_hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Look up a named highlight colour (case-insensitive).
    pub fn from_highlight_name(name: &str) -> Option<Self> {
        HIGHLIGHT_COLORS
            .get(name.to_ascii_lowercase().as_str())
            .map(|(_, v)| Self::from_packed(*v))
    }

    /// The `ST_HighlightColor` name for this colour, if it is in the palette.
    pub fn highlight_name(&self) -> Option<&'static str> {
        let packed = self.packed();
        HIGHLIGHT_COLORS
            .values()
            .find(|(_, v)| *v == packed)
            .map(|(name, _)| *name)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Color::from_hex(s)
            .or_else(|| Color::from_highlight_name(s))
            .ok_or_else(|| format!("invalid colour '{s}': expected #RRGGBB or a highlight name"))
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!("#0000FF".parse::<Color>().unwrap(), Color::BLUE);
        assert_eq!("ff0000".parse::<Color>().unwrap(), Color::RED);
        assert_eq!("Green".parse::<Color>().unwrap(), Color::GREEN);
        assert_eq!(
            "darkBlue".parse::<Color>().unwrap(),
            Color::rgb(0x00, 0x00, 0x80)
        );
        assert!("#12345".parse::<Color>().is_err());
        assert!("chartreuse".parse::<Color>().is_err());
    }

    #[test]
    fn test_highlight_name() {
        assert_eq!(Color::YELLOW.highlight_name(), Some("yellow"));
        assert_eq!(Color::rgb(0x80, 0x80, 0x80).highlight_name(), Some("darkGray"));
        assert_eq!(Color::rgb(0x12, 0x34, 0x56).highlight_name(), None);
    }

    #[test]
    fn test_hex_output() {
        assert_eq!(Color::rgb(0x0a, 0xbc, 0xde).to_hex(), "0ABCDE");
        assert_eq!(Color::RED.to_string(), "#FF0000");
    }
}
