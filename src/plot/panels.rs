use anyhow::Result;
use ndarray::Array2;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use super::png::Area;
use crate::analysis::amr::GalaxyAmr;
use crate::analysis::kde::Extent;
use crate::color::{ColorScale, generate_palette, rd_yl_bu_r};

const FONT: &str = "sans-serif";
const COLORBAR_WIDTH: u32 = 95;
const COLORBAR_STEPS: usize = 64;
const STAR_GREY: RGBColor = RGBColor(0x6b, 0x68, 0x68);

// ---------------------------------------------------------------------------
// ScatterPanel – colour-coded scatter with error bars and a colour bar
// ---------------------------------------------------------------------------

/// One cluster on a scatter panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    /// Value mapped onto the colour scale.
    pub z: f64,
    pub x_err: Option<f64>,
    pub y_err: Option<f64>,
    /// Marker radius in pixels.
    pub size: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            x_err: None,
            y_err: None,
            size: 5.0,
        }
    }

    pub fn x_err(mut self, e: Option<f64>) -> Self {
        self.x_err = e;
        self
    }

    pub fn y_err(mut self, e: Option<f64>) -> Self {
        self.y_err = e;
        self
    }

    pub fn size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }
}

/// Where the galaxy name goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    BottomRight,
}

#[derive(Debug, Clone)]
pub struct ScatterPanel {
    pub x_label: String,
    pub y_label: String,
    pub z_label: String,
    pub x_range: (f64, f64),
    /// Same as `x_range` for 1:1 panels; fitted to the data when `None`.
    pub y_range: Option<(f64, f64)>,
    pub points: Vec<Point>,
    pub one_to_one: bool,
    pub label: String,
    pub label_corner: Corner,
}

impl ScatterPanel {
    pub fn new(x_label: &str, y_label: &str, z_label: &str, x_range: (f64, f64)) -> Self {
        Self {
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            z_label: z_label.to_string(),
            x_range,
            y_range: None,
            points: Vec::new(),
            one_to_one: false,
            label: String::new(),
            label_corner: Corner::TopLeft,
        }
    }

    /// ASteCA vs reference panel: equal axes, 1:1 line, label bottom right.
    pub fn one_to_one(x_label: &str, y_label: &str, z_label: &str, range: (f64, f64)) -> Self {
        Self {
            y_range: Some(range),
            one_to_one: true,
            label_corner: Corner::BottomRight,
            ..Self::new(x_label, y_label, z_label, range)
        }
    }

    pub fn y_range(mut self, range: (f64, f64)) -> Self {
        self.y_range = Some(range);
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn points(mut self, points: Vec<Point>) -> Self {
        self.points = points;
        self
    }

    fn effective_y_range(&self) -> (f64, f64) {
        if let Some(r) = self.y_range {
            return r;
        }
        let ys: Vec<f64> = self
            .points
            .iter()
            .flat_map(|p| {
                let e = p.y_err.unwrap_or(0.0);
                [p.y - e, p.y + e]
            })
            .collect();
        padded_range(&ys)
    }

    pub fn draw(&self, area: &Area<'_>) -> Result<()> {
        let (width, _) = area.dim_in_pixel();
        let (main, bar) = area.split_horizontally(width.saturating_sub(COLORBAR_WIDTH));

        let (x0, x1) = self.x_range;
        let (y0, y1) = self.effective_y_range();
        let mut chart = ChartBuilder::on(&main)
            .margin(12)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(x0..x1, y0..y1)?;

        chart
            .configure_mesh()
            .x_desc(self.x_label.as_str())
            .y_desc(self.y_label.as_str())
            .axis_desc_style((FONT, 20))
            .light_line_style(WHITE)
            .bold_line_style(BLACK.mix(0.15))
            .draw()?;

        if self.one_to_one {
            let lo = x0.max(y0);
            let hi = x1.min(y1);
            chart.draw_series(DashedLineSeries::new(
                vec![(lo, lo), (hi, hi)],
                8,
                5,
                BLACK.stroke_width(1),
            ))?;
        }

        let err_style = BLACK.stroke_width(1);
        chart.draw_series(self.points.iter().filter_map(|p| {
            p.x_err
                .map(|e| ErrorBar::new_horizontal(p.y, p.x - e, p.x, p.x + e, err_style, 4))
        }))?;
        chart.draw_series(self.points.iter().filter_map(|p| {
            p.y_err
                .map(|e| ErrorBar::new_vertical(p.x, p.y - e, p.y, p.y + e, err_style, 4))
        }))?;

        let zs: Vec<f64> = self.points.iter().map(|p| p.z).collect();
        let scale = ColorScale::from_values(&zs);
        chart.draw_series(self.points.iter().map(|p| {
            Circle::new((p.x, p.y), p.size.round() as i32, scale.color_for(p.z).filled())
        }))?;
        chart.draw_series(
            self.points
                .iter()
                .map(|p| Circle::new((p.x, p.y), p.size.round() as i32, BLACK.mix(0.6))),
        )?;

        if !self.label.is_empty() {
            let (pos, at) = match self.label_corner {
                Corner::TopLeft => (
                    Pos::new(HPos::Left, VPos::Top),
                    (x0 + 0.03 * (x1 - x0), y1 - 0.03 * (y1 - y0)),
                ),
                Corner::BottomRight => (
                    Pos::new(HPos::Right, VPos::Bottom),
                    (x1 - 0.03 * (x1 - x0), y0 + 0.03 * (y1 - y0)),
                ),
            };
            let style = TextStyle::from((FONT, 26).into_font()).pos(pos);
            chart
                .plotting_area()
                .draw(&Text::new(self.label.clone(), at, style))?;
        }

        draw_colorbar(&bar, &scale, &self.z_label)
    }
}

/// Vertical colour bar for `scale`, labelled on its left side.
fn draw_colorbar(area: &Area<'_>, scale: &ColorScale, label: &str) -> Result<()> {
    let (lo, hi) = if scale.max > scale.min {
        (scale.min, scale.max)
    } else {
        (scale.min - 0.5, scale.min + 0.5)
    };
    let mut chart = ChartBuilder::on(area)
        .margin_top(12)
        .margin_bottom(62)
        .margin_right(8)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0..1.0, lo..hi)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .disable_x_axis()
        .y_labels(6)
        .y_desc(label)
        .axis_desc_style((FONT, 18))
        .draw()?;

    let step = (hi - lo) / COLORBAR_STEPS as f64;
    chart.draw_series((0..COLORBAR_STEPS).map(|i| {
        let y = lo + i as f64 * step;
        let t = (i as f64 + 0.5) / COLORBAR_STEPS as f64;
        Rectangle::new([(0.0, y), (1.0, y + step)], rd_yl_bu_r(t).filled())
    }))?;
    Ok(())
}

/// Data range padded by 5% on each side; `[0, 1]` without finite data.
pub fn padded_range(values: &[f64]) -> (f64, f64) {
    let (lo, hi) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return (0.0, 1.0);
    }
    if lo == hi {
        let pad = if lo == 0.0 { 0.5 } else { 0.05 * lo.abs() };
        return (lo - pad, hi + pad);
    }
    let pad = 0.05 * (hi - lo);
    (lo - pad, hi + pad)
}

// ---------------------------------------------------------------------------
// KDE density map
// ---------------------------------------------------------------------------

/// Heat map of a KDE grid (row 0 is the top edge of `ext`) with the input
/// clusters on top.
pub fn draw_density(
    area: &Area<'_>,
    z: &Array2<f64>,
    ext: Extent,
    x_label: &str,
    y_label: &str,
    stars: &[(f64, f64)],
) -> Result<()> {
    let [x0, x1, y0, y1] = ext;
    let mut chart = ChartBuilder::on(area)
        .margin(12)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    let (rows, cols) = z.dim();
    let dx = (x1 - x0) / cols as f64;
    let dy = (y1 - y0) / rows as f64;
    let scale = ColorScale::new(0.0, z.fold(0.0, |m: f64, &v| m.max(v)));
    chart.draw_series(z.indexed_iter().map(|((r, c), &v)| {
        let left = x0 + c as f64 * dx;
        let top = y1 - r as f64 * dy;
        Rectangle::new([(left, top - dy), (left + dx, top)], scale.color_for(v).filled())
    }))?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .axis_desc_style((FONT, 20))
        .draw()?;

    chart.draw_series(
        stars
            .iter()
            .map(|&(x, y)| Cross::new((x, y), 4, STAR_GREY.stroke_width(1))),
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Age-metallicity relation
// ---------------------------------------------------------------------------

/// Binned AMR of every galaxy with its error band, the input clusters and
/// the bin edges.
pub fn draw_amr(area: &Area<'_>, amrs: &[GalaxyAmr]) -> Result<()> {
    let xs: Vec<f64> = amrs
        .iter()
        .flat_map(|a| a.binned.edges.iter().copied().chain(a.clusters.age_gyr.iter().copied()))
        .collect();
    let ys: Vec<f64> = amrs
        .iter()
        .flat_map(|a| {
            a.clusters.feh.iter().copied().chain(
                a.binned
                    .feh
                    .iter()
                    .zip(&a.binned.e_feh)
                    .flat_map(|(f, e)| [f - e, f + e]),
            )
        })
        .collect();
    let (x0, x1) = padded_range(&xs);
    let (y0, y1) = padded_range(&ys);

    let mut chart = ChartBuilder::on(area)
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x0..x1, y0..y1)?;
    chart
        .configure_mesh()
        .x_desc("Age (Gyr)")
        .y_desc("[Fe/H]")
        .axis_desc_style((FONT, 20))
        .light_line_style(WHITE)
        .bold_line_style(BLACK.mix(0.15))
        .draw()?;

    let colors = generate_palette(amrs.len());
    for (amr, &color) in amrs.iter().zip(&colors) {
        let b = &amr.binned;

        for &edge in &b.edges {
            chart.draw_series(DashedLineSeries::new(
                vec![(edge, y0), (edge, y1)],
                4,
                6,
                color.mix(0.35).stroke_width(1),
            ))?;
        }

        let band: Vec<(f64, f64)> = b
            .age
            .iter()
            .zip(b.feh.iter().zip(&b.e_feh))
            .map(|(&a, (&f, &e))| (a, f + e))
            .chain(
                b.age
                    .iter()
                    .zip(b.feh.iter().zip(&b.e_feh))
                    .rev()
                    .map(|(&a, (&f, &e))| (a, f - e)),
            )
            .collect();
        chart.draw_series(std::iter::once(Polygon::new(band, color.mix(0.25).filled())))?;

        let c = &amr.clusters;
        chart.draw_series(c.age_gyr.iter().zip(&c.feh).map(|(&a, &f)| {
            Circle::new((a, f), 3, color.mix(0.7).filled())
        }))?;

        chart
            .draw_series(LineSeries::new(
                b.age.iter().copied().zip(b.feh.iter().copied()),
                color.stroke_width(3),
            ))?
            .label(format!("{} ({} clusters)", amr.galaxy, c.len()))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3)));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerLeft)
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK)
        .label_font((FONT, 18))
        .draw()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_range_cases() {
        assert_eq!(padded_range(&[0.0, 10.0]), (-0.5, 10.5));
        assert_eq!(padded_range(&[f64::NAN]), (0.0, 1.0));
        assert_eq!(padded_range(&[0.0]), (-0.5, 0.5));
        let (lo, hi) = padded_range(&[2.0, 2.0]);
        assert!(lo < 2.0 && hi > 2.0);
    }

    #[test]
    fn one_to_one_panel_shares_axes() {
        let p = ScatterPanel::one_to_one("a", "b", "c", (-2.4, 0.45)).label("SMC");
        assert_eq!(p.effective_y_range(), (-2.4, 0.45));
        assert!(p.one_to_one);
        assert_eq!(p.label_corner, Corner::BottomRight);
    }

    #[test]
    fn free_y_range_covers_error_bars() {
        let p = ScatterPanel::new("a", "b", "c", (0.0, 1.0)).points(vec![
            Point::new(0.2, 1.0, 0.0).y_err(Some(0.5)),
            Point::new(0.4, 3.0, 1.0),
        ]);
        let (lo, hi) = p.effective_y_range();
        assert!(lo < 0.5 && hi > 3.0);
    }
}
