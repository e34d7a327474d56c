use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::theme::ThemeToken;

/// A named HSL color.
///
/// `h` is in degrees `[0, 360)`, `s` and `l` are percentages `[0, 100]`,
/// `a` is opacity `[0, 1]`. `Color` is a plain value: tinting helpers return
/// a modified copy and never touch the palette entry it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub name: Cow<'static, str>,
    pub h: f64,
    pub s: f64,
    pub l: f64,
    #[serde(default = "opaque")]
    pub a: f64,
}

fn opaque() -> f64 {
    1.0
}

impl Color {
    pub const fn hsl(name: &'static str, h: f64, s: f64, l: f64) -> Self {
        Self {
            name: Cow::Borrowed(name),
            h,
            s,
            l,
            a: 1.0,
        }
    }

    /// Raise lightness by `amount` percentage points, saturating at 100.
    pub fn lighten(mut self, amount: f64) -> Self {
        self.l = (self.l + amount).clamp(0.0, 100.0);
        self
    }

    /// Lower saturation by `amount` percentage points, saturating at 0.
    pub fn desaturate(mut self, amount: f64) -> Self {
        self.s = (self.s - amount).clamp(0.0, 100.0);
        self
    }

    pub fn with_alpha(mut self, a: f64) -> Self {
        self.a = a.clamp(0.0, 1.0);
        self
    }

    /// CSS color string, e.g. `hsl(207 90% 54%)` or `hsla(...)` when
    /// translucent.
    pub fn to_css(&self) -> String {
        if self.a < 1.0 {
            format!(
                "hsla({} {}% {}% / {})",
                self.h.round(),
                self.s.round(),
                self.l.round(),
                self.a
            )
        } else {
            format!("hsl({} {}% {}%)", self.h.round(), self.s.round(), self.l.round())
        }
    }

    /// Convert to 8-bit sRGB.
    pub fn to_rgb(&self) -> [u8; 3] {
        let s = self.s / 100.0;
        let l = self.l / 100.0;
        let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
        let hp = self.h.rem_euclid(360.0) / 60.0;
        let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
        let (r, g, b) = match hp as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = l - c / 2.0;
        let to_byte = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        [to_byte(r), to_byte(g), to_byte(b)]
    }
}

/// What a fill or stroke is painted with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Paint {
    Token(ThemeToken),
    Color(Color),
}

impl From<ThemeToken> for Paint {
    fn from(token: ThemeToken) -> Self {
        Paint::Token(token)
    }
}

impl From<Color> for Paint {
    fn from(color: Color) -> Self {
        Paint::Color(color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tint_helpers_return_modified_copies() {
        let base = Color::hsl("blue", 207.0, 90.0, 54.0);
        let hover = base.clone().lighten(10.0).desaturate(20.0);
        assert_eq!(base.l, 54.0);
        assert_eq!(hover.l, 64.0);
        assert_eq!(hover.s, 70.0);
    }

    #[test]
    fn lighten_saturates() {
        let c = Color::hsl("x", 0.0, 50.0, 95.0).lighten(20.0);
        assert_eq!(c.l, 100.0);
    }

    #[test]
    fn rgb_conversion_of_primaries() {
        assert_eq!(Color::hsl("red", 0.0, 100.0, 50.0).to_rgb(), [255, 0, 0]);
        assert_eq!(Color::hsl("green", 120.0, 100.0, 50.0).to_rgb(), [0, 255, 0]);
        assert_eq!(Color::hsl("grey", 0.0, 0.0, 50.0).to_rgb(), [128, 128, 128]);
    }

    #[test]
    fn css_formatting() {
        let c = Color::hsl("teal", 174.0, 100.0, 29.0);
        assert_eq!(c.to_css(), "hsl(174 100% 29%)");
        assert_eq!(c.with_alpha(0.5).to_css(), "hsla(174 100% 29% / 0.5)");
    }

    #[test]
    fn alpha_defaults_when_missing() {
        let json = r#"{"name":"grey","h":0.0,"s":0.0,"l":62.0}"#;
        let c: Option<Color> = serde_json::from_str(json).ok();
        assert_eq!(c.map(|c| c.a), Some(1.0));
    }
}
