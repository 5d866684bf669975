//! Box-and-strip plots per category, dodged by group, with brackets over
//! significant pairwise comparisons.
//!
//! Geometry is computed first ([`layout_category`]) and drawn afterwards
//! ([`draw_category`]) so the layout can be checked without a font stack.

use std::collections::HashMap;
use std::error::Error;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use polars::prelude::PolarsResult;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::helper_functions::{expand_range, unique_in_order};
use crate::models::{polars_err, Observation, PairwiseComparison};

/// Total dodge width shared by the hue groups of one letter.
const DODGE_WIDTH: f64 = 0.8;
/// Fraction of a hue slot covered by its box.
const BOX_FILL: f64 = 0.8;
/// Half-width of the strip jitter as a fraction of a hue slot.
const JITTER: f64 = 0.2;
const WHISKER_IQR: f64 = 1.5;

const LEGEND_TITLE: &str = "Group";
const LEGEND_SWATCH: i32 = 30;
const LEGEND_MARGIN: i32 = 10;

// tab10
const PALETTE: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Svg,
    Png,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Svg => "svg",
            ImageFormat::Png => "png",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlotOptions {
    pub width: u32,
    pub height: u32,
    /// Vertical spacing between stacked significance brackets, in Count units.
    pub bracket_step: f64,
    pub seed: u64,
    pub format: ImageFormat,
}

impl Default for PlotOptions {
    fn default() -> Self {
        PlotOptions {
            width: 1600,
            height: 1000,
            bracket_step: 20.0,
            seed: 42,
            format: ImageFormat::Svg,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub whisker_low: f64,
    pub whisker_high: f64,
}

/// Linear-interpolated percentile of sorted data, `p` in `[0, 1]`.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    let pos = (n as f64 - 1.0) * p;
    let idx = pos.floor() as usize;
    let frac = pos - idx as f64;
    if idx + 1 < n {
        sorted[idx] * (1.0 - frac) + sorted[idx + 1] * frac
    } else {
        sorted[idx]
    }
}

/// Quartiles plus whiskers reaching the most extreme values within 1.5 IQR.
pub fn box_stats(values: &[f64]) -> Option<BoxStats> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let q1 = percentile(&sorted, 0.25);
    let median = percentile(&sorted, 0.5);
    let q3 = percentile(&sorted, 0.75);
    let iqr = q3 - q1;

    let low_fence = q1 - WHISKER_IQR * iqr;
    let high_fence = q3 + WHISKER_IQR * iqr;
    let whisker_low = sorted.iter().copied().find(|v| *v >= low_fence).unwrap_or(q1);
    let whisker_high = sorted.iter().rev().copied().find(|v| *v <= high_fence).unwrap_or(q3);

    Some(BoxStats {
        q1,
        median,
        q3,
        whisker_low: whisker_low.min(q1),
        whisker_high: whisker_high.max(q3),
    })
}

/// Centre of hue slot `hue_idx` at letter position `letter_idx`.
pub fn slot_center(letter_idx: usize, hue_idx: usize, n_hue: usize) -> f64 {
    let slot = DODGE_WIDTH / n_hue as f64;
    letter_idx as f64 - DODGE_WIDTH / 2.0 + slot * (hue_idx as f64 + 0.5)
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxSlot {
    pub hue: usize,
    pub x: f64,
    pub half_width: f64,
    pub stats: BoxStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StripPoint {
    pub hue: usize,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bracket {
    pub x1: f64,
    pub x2: f64,
    pub y: f64,
    pub tick: f64,
    pub star_offset: f64,
}

#[derive(Debug, Clone)]
pub struct CategoryLayout {
    pub letters: Vec<String>,
    pub hue_order: Vec<String>,
    pub boxes: Vec<BoxSlot>,
    pub points: Vec<StripPoint>,
    pub brackets: Vec<Bracket>,
    pub y_range: (f64, f64),
}

/// Place boxes, jittered points and significance brackets for one category.
///
/// `comparisons` may hold the whole run; only significant comparisons of
/// `category` are turned into brackets.
pub fn layout_category(
    category: &str,
    subset: &[&Observation],
    comparisons: &[PairwiseComparison],
    options: &PlotOptions,
) -> CategoryLayout {
    let letters = unique_in_order(subset.iter().map(|o| o.letter.as_str()));
    let hue_order = unique_in_order(subset.iter().map(|o| o.group.as_str()));
    let n_hue = hue_order.len().max(1);
    let slot = DODGE_WIDTH / n_hue as f64;

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut boxes = Vec::new();
    let mut points = Vec::new();

    for (li, letter) in letters.iter().enumerate() {
        for (hi, group) in hue_order.iter().enumerate() {
            let values: Vec<f64> = subset
                .iter()
                .filter(|o| o.letter == *letter && o.group == *group)
                .map(|o| o.count)
                .collect();
            let Some(stats) = box_stats(&values) else {
                continue;
            };
            let x = slot_center(li, hi, n_hue);
            boxes.push(BoxSlot { hue: hi, x, half_width: slot * BOX_FILL / 2.0, stats });
            for y in values {
                let dx = rng.gen_range(-JITTER..=JITTER) * slot;
                points.push(StripPoint { hue: hi, x: x + dx, y });
            }
        }
    }

    let step = options.bracket_step;
    let mut y_offsets: HashMap<&str, f64> = HashMap::new();
    let mut brackets = Vec::new();

    for c in comparisons.iter().filter(|c| c.category == category && c.significant) {
        let (Some(h1), Some(h2)) = (
            hue_order.iter().position(|g| *g == c.group1),
            hue_order.iter().position(|g| *g == c.group2),
        ) else {
            warn!("Skipping bracket for {} vs {}: group not plotted", c.group1, c.group2);
            continue;
        };
        let Some(li) = letters.iter().position(|l| *l == c.letter) else {
            continue;
        };

        let y = *y_offsets
            .entry(letters[li])
            .and_modify(|y| *y += step)
            .or_insert_with(|| {
                let top = subset
                    .iter()
                    .filter(|o| o.letter == c.letter)
                    .map(|o| o.count)
                    .fold(f64::NEG_INFINITY, f64::max);
                top + step
            });

        let x1 = slot_center(li, h1, n_hue);
        let x2 = slot_center(li, h2, n_hue);
        if x1 != x2 {
            brackets.push(Bracket { x1, x2, y, tick: step / 10.0, star_offset: step / 20.0 });
        }
    }

    let y_min = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let data_max = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
    let bracket_max = brackets.iter().map(|b| b.y + step / 2.0).fold(f64::NEG_INFINITY, f64::max);
    let y_range = if y_min.is_finite() {
        expand_range(y_min, data_max.max(bracket_max), 0.05)
    } else {
        (0.0, 1.0)
    };

    debug!(
        "{category}: {} boxes, {} points, {} brackets",
        boxes.len(),
        points.len(),
        brackets.len()
    );

    CategoryLayout {
        letters: letters.into_iter().map(String::from).collect(),
        hue_order: hue_order.into_iter().map(String::from).collect(),
        boxes,
        points,
        brackets,
        y_range,
    }
}

pub fn draw_category<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    category: &str,
    layout: &CategoryLayout,
) -> Result<(), Box<dyn Error>>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let n_letters = layout.letters.len().max(1);
    let (y_lo, y_hi) = layout.y_range;

    let mut chart = ChartBuilder::on(root)
        .caption(format!("Box-Scatter Plot for {category}"), ("sans-serif", 36))
        .margin(20)
        .x_label_area_size(70)
        .y_label_area_size(90)
        .build_cartesian_2d(-0.5..(n_letters as f64 - 0.5), y_lo..y_hi)?;

    let letters = &layout.letters;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n_letters)
        .x_label_formatter(&|val: &f64| {
            let idx = val.round();
            if (val - idx).abs() > 1e-6 || idx < 0.0 {
                return String::new();
            }
            letters.get(idx as usize).cloned().unwrap_or_default()
        })
        .label_style(("sans-serif", 22))
        .x_desc("LETTER")
        .y_desc("Count")
        .axis_desc_style(("sans-serif", 26))
        .draw()?;

    for (hi, group) in layout.hue_order.iter().enumerate() {
        let color = PALETTE[hi % PALETTE.len()];
        chart
            .draw_series(layout.boxes.iter().filter(|b| b.hue == hi).map(|b| {
                Rectangle::new(
                    [(b.x - b.half_width, b.stats.q1), (b.x + b.half_width, b.stats.q3)],
                    color.mix(0.85).filled(),
                )
            }))?
            .label(group.clone())
            .legend(move |(x, y)| Rectangle::new([(x, y - 7), (x + 14, y + 7)], color.filled()));
    }

    // outlines, medians, whiskers and caps
    let line = BLACK.stroke_width(1);
    chart.draw_series(layout.boxes.iter().map(|b| {
        Rectangle::new([(b.x - b.half_width, b.stats.q1), (b.x + b.half_width, b.stats.q3)], line)
    }))?;
    chart.draw_series(layout.boxes.iter().flat_map(|b| {
        let (l, r) = (b.x - b.half_width, b.x + b.half_width);
        let (cl, cr) = (b.x - b.half_width / 2.0, b.x + b.half_width / 2.0);
        let s = &b.stats;
        [
            PathElement::new(vec![(l, s.median), (r, s.median)], BLACK.stroke_width(2)),
            PathElement::new(vec![(b.x, s.q3), (b.x, s.whisker_high)], line),
            PathElement::new(vec![(b.x, s.q1), (b.x, s.whisker_low)], line),
            PathElement::new(vec![(cl, s.whisker_high), (cr, s.whisker_high)], line),
            PathElement::new(vec![(cl, s.whisker_low), (cr, s.whisker_low)], line),
        ]
    }))?;

    chart.draw_series(layout.points.iter().map(|p| {
        Circle::new((p.x, p.y), 4, PALETTE[p.hue % PALETTE.len()].mix(0.6).filled())
    }))?;
    chart.draw_series(
        layout
            .points
            .iter()
            .map(|p| Circle::new((p.x, p.y), 4, BLACK.mix(0.4).stroke_width(1))),
    )?;

    let star_style = ("sans-serif", 28)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Bottom));
    for b in &layout.brackets {
        chart.draw_series([
            PathElement::new(vec![(b.x1, b.y), (b.x2, b.y)], BLACK.stroke_width(2)),
            PathElement::new(vec![(b.x1, b.y - b.tick), (b.x1, b.y)], line),
            PathElement::new(vec![(b.x2, b.y - b.tick), (b.x2, b.y)], line),
        ])?;
        chart.draw_series(std::iter::once(Text::new(
            "*".to_string(),
            ((b.x1 + b.x2) / 2.0, b.y + b.star_offset),
            star_style.clone(),
        )))?;
    }

    // legend placed by hand so its title can sit above the box
    let legend_font: TextStyle = ("sans-serif", 22).into_font().color(&BLACK);
    let plot_area = chart.plotting_area().strip_coord_spec();
    let mut label_w = 0;
    for group in &layout.hue_order {
        label_w = label_w.max(plot_area.estimate_text_size(group, &legend_font)?.0 as i32);
    }
    let (title_w, title_h) = plot_area.estimate_text_size(LEGEND_TITLE, &legend_font)?;
    let box_w = (label_w + LEGEND_SWATCH + 2 * LEGEND_MARGIN).max(title_w as i32 + 2 * LEGEND_MARGIN);
    let legend_x = plot_area.dim_in_pixel().0 as i32 - box_w - 5;
    let legend_y = 5 + title_h as i32 + 6;

    plot_area.draw(&Text::new(
        LEGEND_TITLE.to_string(),
        (legend_x + box_w / 2, 5),
        legend_font.clone().pos(Pos::new(HPos::Center, VPos::Top)),
    ))?;
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(legend_font)
        .legend_area_size(LEGEND_SWATCH)
        .margin(LEGEND_MARGIN)
        .position(SeriesLabelPosition::Coordinate(legend_x, legend_y))
        .draw()?;

    root.present()?;
    Ok(())
}

/// `boxplot_<category>.<ext>` with spaces replaced by underscores.
pub fn plot_filename(category: &str, format: ImageFormat) -> String {
    format!("boxplot_{}.{}", category.replace(' ', "_"), format.extension())
}

/// Lay out and render one category into `output_dir`.
pub fn plot_category(
    output_dir: &Path,
    category: &str,
    subset: &[&Observation],
    comparisons: &[PairwiseComparison],
    options: &PlotOptions,
) -> PolarsResult<PathBuf> {
    let layout = layout_category(category, subset, comparisons, options);
    let path = output_dir.join(plot_filename(category, options.format));
    let size = (options.width, options.height);

    match options.format {
        ImageFormat::Svg => {
            let root = SVGBackend::new(&path, size).into_drawing_area();
            draw_category(&root, category, &layout).map_err(polars_err)?;
        }
        ImageFormat::Png => {
            let root = BitMapBackend::new(&path, size).into_drawing_area();
            draw_category(&root, category, &layout).map_err(polars_err)?;
        }
    }

    info!("Saved plot to {}", path.display());
    Ok(path)
}
