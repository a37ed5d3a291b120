// Hue values are expressed over the full u16 range, 65536 steps around
const HUE_STEPS: u32 = 1 << 16;
pub const BLUE_HUE: u16 = 46920; // 65% of 65535
pub const YELLOW_HUE: u16 = 12750; // 19% of 65535
pub const MAX_SATURATION: u8 = 254;

pub const BLUE_XY: (f32, f32) = (0.1691, 0.0441);
pub const YELLOW_XY: (f32, f32) = (0.5, 0.5);

// Bridges round what they report back, so compare loosely
const XY_TOLERANCE: f32 = 0.01;
const HUE_TOLERANCE: u16 = 655;
const SAT_TOLERANCE: u8 = 3;
const MIREK_TOLERANCE: u16 = 3;

/// A light color in one of the representations a bridge may speak.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Color {
    /// CIE 1931 chromaticity
    Xy { x: f32, y: f32 },
    HueSat { hue: u16, sat: u8 },
    /// White in color temperature mode
    Temperature { mirek: u16 },
}

/// The color representation a bridge uses for colored light
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorSpace {
    Xy,
    HueSat,
}

impl Color {
    pub fn xy((x, y): (f32, f32)) -> Self {
        Color::Xy { x, y }
    }

    /// Equality within what a bridge round-trip can distort. Different
    /// representations are never equal.
    pub fn approx_eq(&self, other: &Color) -> bool {
        match (self, other) {
            (Color::Xy { x: ax, y: ay }, Color::Xy { x: bx, y: by }) => {
                (ax - bx).abs() <= XY_TOLERANCE && (ay - by).abs() <= XY_TOLERANCE
            }
            (Color::HueSat { hue: ah, sat: asat }, Color::HueSat { hue: bh, sat: bsat }) => {
                // Hue wraps around at the top of the range
                let diff = u32::from(ah.abs_diff(*bh));
                let diff = diff.min(HUE_STEPS - diff);
                diff <= u32::from(HUE_TOLERANCE) && asat.abs_diff(*bsat) <= SAT_TOLERANCE
            }
            (Color::Temperature { mirek: a }, Color::Temperature { mirek: b }) => {
                a.abs_diff(*b) <= MIREK_TOLERANCE
            }
            _ => false,
        }
    }

    /// Chromaticity of this color. Temperature has no xy form here, the
    /// bridge takes it natively.
    pub fn to_xy(&self) -> Option<(f32, f32)> {
        match *self {
            Color::Xy { x, y } => Some((x, y)),
            Color::HueSat { hue, sat } => Some(hue_sat_to_xy(hue, sat)),
            Color::Temperature { .. } => None,
        }
    }
}

/// Full-value HSV to CIE xy through linear RGB and the wide gamut D65 matrix
/// Hue documents for its lamps.
fn hue_sat_to_xy(hue: u16, sat: u8) -> (f32, f32) {
    let h = hue as f32 / u16::MAX as f32 * 360.0;
    let s = sat as f32 / MAX_SATURATION as f32;

    let c = s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = 1.0 - c;
    let (r, g, b) = match h as u32 {
        0..=59 => (c, x, 0.0),
        60..=119 => (x, c, 0.0),
        120..=179 => (0.0, c, x),
        180..=239 => (0.0, x, c),
        240..=299 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    let linear = |v: f32| {
        let v = v + m;
        if v > 0.04045 {
            ((v + 0.055) / 1.055).powf(2.4)
        } else {
            v / 12.92
        }
    };
    let (r, g, b) = (linear(r), linear(g), linear(b));

    let big_x = r * 0.664_511 + g * 0.154_324 + b * 0.162_028;
    let big_y = r * 0.283_881 + g * 0.668_433 + b * 0.047_685;
    let big_z = r * 0.000_088 + g * 0.072_310 + b * 0.986_039;

    let sum = big_x + big_y + big_z;
    if sum == 0.0 {
        return (0.0, 0.0);
    }
    (big_x / sum, big_y / sum)
}

/// The two colors the effect alternates between
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Palette {
    pub blue: Color,
    pub yellow: Color,
}

impl Palette {
    pub fn for_space(space: ColorSpace) -> Self {
        match space {
            ColorSpace::Xy => Palette {
                blue: Color::xy(BLUE_XY),
                yellow: Color::xy(YELLOW_XY),
            },
            ColorSpace::HueSat => Palette {
                blue: Color::HueSat {
                    hue: BLUE_HUE,
                    sat: MAX_SATURATION,
                },
                yellow: Color::HueSat {
                    hue: YELLOW_HUE,
                    sat: MAX_SATURATION,
                },
            },
        }
    }

    pub fn contains(&self, color: &Color) -> bool {
        self.blue.approx_eq(color) || self.yellow.approx_eq(color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xy_tolerance() {
        let a = Color::xy((0.4573, 0.41));
        assert!(a.approx_eq(&Color::xy((0.4575, 0.4098))));
        assert!(!a.approx_eq(&Color::xy((0.5, 0.5))));
    }

    #[test]
    fn test_hue_wraps() {
        let a = Color::HueSat { hue: 10, sat: 254 };
        let b = Color::HueSat {
            hue: u16::MAX - 10,
            sat: 253,
        };
        assert!(a.approx_eq(&b));
    }

    #[test]
    fn test_hue_wrap_distance_is_exact() {
        let zero = Color::HueSat { hue: 0, sat: 254 };

        // 65536 - 64881 = 655 steps apart across the wrap
        let near = Color::HueSat {
            hue: 64881,
            sat: 254,
        };
        assert!(zero.approx_eq(&near));

        let far = Color::HueSat {
            hue: 64880,
            sat: 254,
        };
        assert!(!zero.approx_eq(&far));
    }

    #[test]
    fn test_representations_never_match() {
        let xy = Color::xy(BLUE_XY);
        let hs = Color::HueSat {
            hue: BLUE_HUE,
            sat: MAX_SATURATION,
        };
        assert!(!xy.approx_eq(&hs));
        assert!(!Color::Temperature { mirek: 366 }.approx_eq(&xy));
    }

    #[test]
    fn test_hue_sat_palette_lands_near_xy_palette() {
        let (x, y) = Palette::for_space(ColorSpace::HueSat).blue.to_xy().unwrap();
        assert!(x < 0.2 && y < 0.1, "blue came out as ({x}, {y})");

        let (x, y) = Palette::for_space(ColorSpace::HueSat).yellow.to_xy().unwrap();
        assert!(x > 0.35 && y > 0.5, "yellow came out as ({x}, {y})");
    }

    #[test]
    fn test_palette_contains() {
        let palette = Palette::for_space(ColorSpace::Xy);
        assert!(palette.contains(&Color::xy((0.169, 0.044))));
        assert!(!palette.contains(&Color::Temperature { mirek: 366 }));
    }
}
