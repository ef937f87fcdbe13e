//! The skeleton model value object.
//!
//! A [`SkeletonModel`] is the unit of exchange of the synchronization
//! protocol: a per-widget snapshot of one skeleton's display state. Widgets
//! never share model instances; every hand-off clones.

use std::fmt;

/// A skeleton identifier as assigned by the server.
pub type SkeletonId = arbor_sync_net::SkeletonId;

/// An opaque RGB color with components in the 0.0 to 1.0 range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    /// Create a new color from RGB components (0.0-1.0 range).
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Create a color from 8-bit RGB components (0-255 range).
    #[inline]
    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    /// Parse a `#rrggbb` hex string. Returns `None` for anything else.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#')?;
        if hex.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self::from_rgb8(r, g, b))
    }

    /// Format as a `#rrggbb` hex string.
    pub fn to_hex(self) -> String {
        format!(
            "#{:02x}{:02x}{:02x}",
            (self.r.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.g.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.b.clamp(0.0, 1.0) * 255.0).round() as u8,
        )
    }

    /// Convert to hue/saturation/lightness.
    ///
    /// Hue is in [0, 1) with 0 at red; achromatic colors report hue 0.
    pub fn to_hsl(self) -> Hsl {
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        let l = (max + min) / 2.0;

        if max == min {
            return Hsl { h: 0.0, s: 0.0, l };
        }

        let d = max - min;
        let s = if l > 0.5 {
            d / (2.0 - max - min)
        } else {
            d / (max + min)
        };
        let h = if max == self.r {
            (self.g - self.b) / d + if self.g < self.b { 6.0 } else { 0.0 }
        } else if max == self.g {
            (self.b - self.r) / d + 2.0
        } else {
            (self.r - self.g) / d + 4.0
        } / 6.0;

        Hsl { h, s, l }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Hue/saturation/lightness representation, used for color-ordered sorting.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsl {
    pub h: f32,
    pub s: f32,
    pub l: f32,
}

/// Per-widget display state of one skeleton.
///
/// `Clone` is a deep copy; the protocol relies on clones at every boundary
/// so a widget mutating its own copy never changes another widget's view.
#[derive(Clone, Debug, PartialEq)]
pub struct SkeletonModel {
    /// Server-assigned skeleton identifier. Immutable after construction.
    pub id: SkeletonId,
    /// Display label, usually the neuron name. May be refreshed.
    pub name: String,
    /// Whether the skeleton is active in the owning widget.
    pub selected: bool,
    /// Presynaptic site visibility.
    pub pre_visible: bool,
    /// Postsynaptic site visibility.
    pub post_visible: bool,
    /// Text label visibility.
    pub text_visible: bool,
    /// Display color.
    pub color: Color,
    /// Opacity from 0.0 to 1.0.
    pub opacity: f32,
}

impl SkeletonModel {
    /// Creates a model with the default visibility state: selected with
    /// both synapse kinds visible, text hidden, fully opaque.
    pub fn new(id: SkeletonId, name: impl Into<String>, color: Color) -> Self {
        Self {
            id,
            name: name.into(),
            selected: true,
            pre_visible: true,
            post_visible: true,
            text_visible: false,
            color,
            opacity: 1.0,
        }
    }

    /// Sets the overall visibility.
    ///
    /// Drives `selected`, `pre_visible` and `post_visible` together. Hiding
    /// also hides the text label; showing leaves `text_visible` untouched,
    /// so a hide/show round trip ends with the label off.
    pub fn set_visible(&mut self, visible: bool) {
        self.selected = visible;
        self.pre_visible = visible;
        self.post_visible = visible;
        if !visible {
            self.text_visible = false;
        }
    }
}
