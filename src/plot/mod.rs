//! The rendering collaborator: heatmap drawing and class color generation.
//!
//! Matrix cells are drawn in grayscale, with class regions shaded by
//! translucent per-class colors. Labels are not rasterized; the row and
//! column orders are written as sidecar TSV files next to the image.

use crate::matrix::Matrix;
use crate::utils;

use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use itertools::Itertools;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use raqote::{DrawOptions, DrawTarget, SolidSource, Source};
use std::fmt::Debug;
use std::path::{Path, PathBuf};

// ----------------------------------------------------------------------------
// PlotArgs
// ----------------------------------------------------------------------------

/// Display options for the heatmap.
#[derive(Clone, Debug)]
pub struct PlotArgs {
    /// Cell width in pixels.
    pub cell_width: u32,
    /// Cell height in pixels.
    pub cell_height: u32,
    /// Draw grid lines between cells.
    pub grid: bool,
    /// Use only this color index for class shading.
    pub color_index: Option<usize>,
    /// Seed for color generation.
    pub seed: u64,
    /// Shade one region across all columns instead of per-class regions
    /// (used when columns were clustered and classes are no longer
    /// contiguous).
    pub single_region: bool,
}

impl Default for PlotArgs {
    fn default() -> Self {
        PlotArgs {
            cell_width: 12,
            cell_height: 12,
            grid: true,
            color_index: None,
            seed: 99,
            single_region: false,
        }
    }
}

// ----------------------------------------------------------------------------
// Colors
// ----------------------------------------------------------------------------

/// Generate `n` distinct colors by walking the hue wheel in golden-ratio
/// steps from a seeded starting point.
///
/// The seed is an explicit parameter so runs are reproducible and no global
/// random state is involved.
pub fn generate_colors(n: usize, seed: u64) -> Vec<(u8, u8, u8)> {
    const GOLDEN_RATIO_CONJUGATE: f64 = 0.618_033_988_749_895;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut h: f64 = rng.gen();
    (0..n)
        .map(|_| {
            h = (h + GOLDEN_RATIO_CONJUGATE) % 1.0;
            hsv_to_rgb(h, 0.5, 0.6)
        })
        .collect()
}

/// Convert HSV (each in `[0, 1]`) to RGB bytes.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (u8, u8, u8) {
    let h_i = (h * 6.0).floor() as i64;
    let f = h * 6.0 - h_i as f64;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);
    let (r, g, b) = match h_i {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    let byte = |x: f64| (x * 255.0).round().clamp(0.0, 255.0) as u8;
    (byte(r), byte(g), byte(b))
}

// ----------------------------------------------------------------------------
// Regions
// ----------------------------------------------------------------------------

/// Contiguous class blocks as `(start_column, end_column_exclusive, class)`.
pub fn class_regions(classes: &[String]) -> Vec<(usize, usize, String)> {
    let mut regions: Vec<(usize, usize, String)> = Vec::new();
    for (col, class) in classes.iter().enumerate() {
        match regions.last_mut() {
            Some((_, end, last)) if last == class => *end = col + 1,
            _ => regions.push((col, col + 1, class.clone())),
        }
    }
    regions
}

// ----------------------------------------------------------------------------
// Rendering
// ----------------------------------------------------------------------------

/// Render the heatmap to a PNG file.
///
/// Cells are grayscale (low scores dark, high scores light), class regions
/// are overlaid with translucent colors, and optional grid lines separate
/// the cells.
pub fn render<P>(
    matrix: &Matrix,
    classes: &[String],
    args: &PlotArgs,
    output: &P,
) -> Result<PathBuf, Report>
where
    P: AsRef<Path> + Debug,
{
    let (rows, cols) = (matrix.num_rows(), matrix.num_cols());
    if rows == 0 || cols == 0 {
        return Err(eyre!("Cannot render an empty matrix."));
    }

    let (cw, ch) = (args.cell_width as f32, args.cell_height as f32);
    let width = cols as i32 * args.cell_width as i32;
    let height = rows as i32 * args.cell_height as i32;
    let mut target = DrawTarget::new(width, height);

    // grayscale cells
    let min = matrix.values.iter().flatten().copied().fold(f64::INFINITY, f64::min);
    let max = matrix.values.iter().flatten().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = if max > min { max - min } else { 1.0 };
    for (row, values) in matrix.values.iter().enumerate() {
        for (col, value) in values.iter().enumerate() {
            let gray = (((value - min) / span) * 255.0).round() as u8;
            let source =
                Source::Solid(SolidSource::from_unpremultiplied_argb(255, gray, gray, gray));
            target.fill_rect(col as f32 * cw, row as f32 * ch, cw, ch, &source, &DrawOptions::new());
        }
    }

    // translucent class region overlays
    let regions = match args.single_region {
        true => vec![(0, cols, String::new())],
        false => class_regions(classes),
    };
    let mut colors = generate_colors(regions.len(), args.seed);
    if let Some(index) = args.color_index {
        let color = *colors
            .get(index)
            .ok_or_else(|| eyre!("Color index {index} is out of range (0..{}).", colors.len()))?;
        colors = vec![color; regions.len()];
    }
    for ((start, end, _class), (r, g, b)) in regions.iter().zip(colors) {
        let source = Source::Solid(SolidSource::from_unpremultiplied_argb(25, r, g, b));
        target.fill_rect(
            *start as f32 * cw,
            0.0,
            (end - start) as f32 * cw,
            height as f32,
            &source,
            &DrawOptions::new(),
        );
    }

    // grid lines between cells
    if args.grid {
        let source = Source::Solid(SolidSource::from_unpremultiplied_argb(255, 120, 120, 120));
        for col in 1..cols {
            target.fill_rect(col as f32 * cw, 0.0, 1.0, height as f32, &source, &DrawOptions::new());
        }
        for row in 1..rows {
            target.fill_rect(0.0, row as f32 * ch, width as f32, 1.0, &source, &DrawOptions::new());
        }
    }

    utils::create_parent_dir(output)?;
    target
        .write_png(output.as_ref())
        .map_err(|e| eyre!("Failed to write PNG {output:?}: {e}"))?;
    info!("Heatmap written to: {output:?}");
    Ok(output.as_ref().to_path_buf())
}

/// Write the row and column label orders as TSV files next to the image.
///
/// Returns the `(rows, columns)` sidecar paths.
pub fn write_label_sidecars<P>(
    image: &P,
    row_labels: &[String],
    ids: &[String],
    classes: &[String],
) -> Result<(PathBuf, PathBuf), Report>
where
    P: AsRef<Path> + Debug,
{
    let rows_path = image.as_ref().with_extension("rows.tsv");
    let columns_path = image.as_ref().with_extension("columns.tsv");

    let rows = row_labels.join("\n") + "\n";
    std::fs::write(&rows_path, rows).wrap_err(format!("Failed to write: {rows_path:?}"))?;

    let columns = ids
        .iter()
        .zip(classes.iter())
        .map(|(id, class)| format!("{id}\t{class}"))
        .join("\n")
        + "\n";
    std::fs::write(&columns_path, columns)
        .wrap_err(format!("Failed to write: {columns_path:?}"))?;

    Ok((rows_path, columns_path))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
