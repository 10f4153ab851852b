use palette::{Hsl, IntoColor, LinSrgb, Mix, Srgb};
use plotters::style::RGBColor;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<RGBColor> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            RGBColor(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Diverging colour map: value → RGBColor
// ---------------------------------------------------------------------------

const MISSING: RGBColor = RGBColor(0x99, 0x99, 0x99);

/// ColorBrewer RdYlBu, blue end first.
const RD_YL_BU_R: [u32; 11] = [
    0x313695, 0x4575b4, 0x74add1, 0xabd9e9, 0xe0f3f8, 0xffffbf, 0xfee090, 0xfdae61, 0xf46d43,
    0xd73027, 0xa50026,
];

fn stop(hex: u32) -> LinSrgb {
    let srgb = Srgb::new((hex >> 16) as u8, (hex >> 8) as u8, hex as u8);
    srgb.into_format::<f32>().into_linear()
}

/// Reversed RdYlBu: 0 is dark blue, 1 is dark red. `t` is clamped to [0, 1].
pub fn rd_yl_bu_r(t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let pos = t * (RD_YL_BU_R.len() - 1) as f64;
    let i = (pos.floor() as usize).min(RD_YL_BU_R.len() - 2);
    let frac = (pos - i as f64) as f32;

    let mixed = stop(RD_YL_BU_R[i]).mix(stop(RD_YL_BU_R[i + 1]), frac);
    let srgb: Srgb = Srgb::from_linear(mixed);
    let c: Srgb<u8> = srgb.into_format();
    RGBColor(c.red, c.green, c.blue)
}

/// Linear mapping of a value range onto [`rd_yl_bu_r`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    pub min: f64,
    pub max: f64,
}

impl ColorScale {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Range of the finite values; `[0, 1]` when there are none.
    pub fn from_values(values: &[f64]) -> Self {
        let (min, max) = values
            .iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if min > max { Self::new(0.0, 1.0) } else { Self::new(min, max) }
    }

    /// Position of `v` inside the range, in [0, 1].
    pub fn fraction(&self, v: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.5;
        }
        ((v - self.min) / span).clamp(0.0, 1.0)
    }

    /// Colour of `v`; values without a number are drawn grey.
    pub fn color_for(&self, v: f64) -> RGBColor {
        if !v.is_finite() {
            return MISSING;
        }
        rd_yl_bu_r(self.fraction(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn palette_sizes() {
        assert!(generate_palette(0).is_empty());
        let p = generate_palette(4);
        assert_eq!(p.len(), 4);
        assert_ne!(p[0], p[1]);
    }

    #[test]
    fn colormap_ends_and_middle() {
        assert_eq!(rd_yl_bu_r(0.0), RGBColor(0x31, 0x36, 0x95));
        assert_eq!(rd_yl_bu_r(1.0), RGBColor(0xa5, 0x00, 0x26));
        assert_eq!(rd_yl_bu_r(0.5), RGBColor(0xff, 0xff, 0xbf));
        // Clamped.
        assert_eq!(rd_yl_bu_r(-3.0), rd_yl_bu_r(0.0));
        assert_eq!(rd_yl_bu_r(7.0), rd_yl_bu_r(1.0));
    }

    #[test]
    fn scale_maps_range() {
        let s = ColorScale::from_values(&[2.0, f64::NAN, 4.0, 3.0]);
        assert_eq!(s, ColorScale::new(2.0, 4.0));
        assert_eq!(s.fraction(3.0), 0.5);
        assert_eq!(s.color_for(10.0), rd_yl_bu_r(1.0));
        assert_eq!(ColorScale::new(1.0, 1.0).fraction(1.0), 0.5);
        assert_eq!(s.color_for(f64::NAN), MISSING);
        assert_eq!(ColorScale::from_values(&[]), ColorScale::new(0.0, 1.0));
    }
}
