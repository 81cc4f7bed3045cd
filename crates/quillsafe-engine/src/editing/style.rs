use serde::{Deserialize, Serialize};

/// Point size given to text that never had one set
pub const DEFAULT_SIZE: u16 = 12;

/// Per-character formatting tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attributes {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    /// Whole points
    pub size: u16,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            bold: false,
            italic: false,
            underline: false,
            size: DEFAULT_SIZE,
        }
    }
}

impl Attributes {
    pub fn flag(&self, flag: Flag) -> bool {
        match flag {
            Flag::Bold => self.bold,
            Flag::Italic => self.italic,
            Flag::Underline => self.underline,
        }
    }

    pub fn with_flag(mut self, flag: Flag, on: bool) -> Self {
        match flag {
            Flag::Bold => self.bold = on,
            Flag::Italic => self.italic = on,
            Flag::Underline => self.underline = on,
        }
        self
    }

    /// Derived display style; computed on every call, never stored.
    pub fn composite(&self) -> CompositeStyle {
        CompositeStyle {
            size: self.size,
            bold: self.bold,
            italic: self.italic,
        }
    }
}

/// Round a fractional point size to whole points.
///
/// Sizes below one point clamp to one; non-finite input falls back to
/// [`DEFAULT_SIZE`].
pub fn round_points(points: f64) -> u16 {
    if !points.is_finite() {
        return DEFAULT_SIZE;
    }
    points.round().clamp(1.0, f64::from(u16::MAX)) as u16
}

/// Boolean attributes that can be toggled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    Bold,
    Italic,
    Underline,
}

/// Change applied to every character of a range.
///
/// `Toggle` flips each character against its own prior state, so a mixed
/// range stays mixed. `Set` and `Size` overwrite uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleUpdate {
    Toggle(Flag),
    Set(Flag, bool),
    Size(u16),
}

impl StyleUpdate {
    pub fn apply(&self, attrs: Attributes) -> Attributes {
        match *self {
            StyleUpdate::Toggle(flag) => attrs.with_flag(flag, !attrs.flag(flag)),
            StyleUpdate::Set(flag, on) => attrs.with_flag(flag, on),
            StyleUpdate::Size(size) => Attributes {
                size: size.max(1),
                ..attrs
            },
        }
    }
}

/// Paragraph alignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

impl Alignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
        }
    }

    /// Unknown or missing values are left aligned.
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            Some(n) if n.eq_ignore_ascii_case("center") => Alignment::Center,
            Some(n) if n.eq_ignore_ascii_case("right") => Alignment::Right,
            _ => Alignment::Left,
        }
    }
}

/// Size + weight + slant merged into one renderable unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompositeStyle {
    pub size: u16,
    pub bold: bool,
    pub italic: bool,
}

impl CompositeStyle {
    /// Stable key such as `comp_14_bi`, usable as a renderer cache key
    pub fn key(&self) -> String {
        format!(
            "comp_{}_{}{}",
            self.size,
            if self.bold { "b" } else { "" },
            if self.italic { "i" } else { "" }
        )
    }
}
