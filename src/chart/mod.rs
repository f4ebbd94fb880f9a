//! Bar chart rendering
//!
//! One search produces one SVG chart with a single bar. The file name is
//! derived from the zip code and date, so repeated searches overwrite the same
//! artifact. Each render goes to its own temporary file first and is renamed
//! into place, so concurrent renders of the same pair never leave a torn file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use plotters::prelude::*;
use thiserror::Error;

use crate::config::ChartConfig;

const BAR_MARGIN: u32 = 60;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("chart file error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to draw chart: {0}")]
    Draw(String),
}

/// A rendered chart on disk and the URL it is served under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartArtifact {
    pub path: PathBuf,
    pub url: String,
}

pub struct ChartRenderer {
    output_dir: PathBuf,
    url_prefix: String,
    width: u32,
    height: u32,
    sequence: AtomicU64,
}

impl ChartRenderer {
    pub fn new(config: &ChartConfig) -> Self {
        Self {
            output_dir: PathBuf::from(&config.output_dir),
            url_prefix: config.url_prefix.trim_end_matches('/').to_string(),
            width: config.width,
            height: config.height,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Create the output directory if it is missing
    pub fn ensure_output_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.output_dir)
    }

    /// Render the chart for one (zipcode, date, cases) result
    pub fn render(&self, zipcode: &str, date: &str, cases: i64) -> Result<ChartArtifact, ChartError> {
        self.ensure_output_dir()?;

        let file_name = format!("{}.svg", artifact_stem(zipcode, date));
        let path = self.output_dir.join(&file_name);
        let tmp_path = self.output_dir.join(format!(
            ".{file_name}.{}.{}.tmp",
            std::process::id(),
            self.sequence.fetch_add(1, Ordering::Relaxed)
        ));

        let drawn = draw_bar_chart(&tmp_path, (self.width, self.height), zipcode, date, cases)
            .map_err(|e| ChartError::Draw(e.to_string()))
            .and_then(|()| fs::rename(&tmp_path, &path).map_err(ChartError::from));
        if drawn.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        drawn?;

        Ok(ChartArtifact {
            url: format!("{}/{file_name}", self.url_prefix),
            path,
        })
    }
}

/// `{zipcode}_{date}` with anything outside `[A-Za-z0-9_-]` replaced by `_`
pub fn artifact_stem(zipcode: &str, date: &str) -> String {
    format!("{zipcode}_{date}")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn draw_bar_chart(
    path: &Path,
    size: (u32, u32),
    zipcode: &str,
    date: &str,
    cases: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    // The axis is f64 so headroom and tick computation cannot overflow for any count
    #[allow(clippy::cast_precision_loss)]
    let height = cases.max(0) as f64;
    // Headroom above the bar, at least one unit so an all-zero chart still has an axis
    let y_max = (height * 1.1).max(height + 1.0);

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("COVID-19 Cases for Zip Code {zipcode} on {date}"),
            ("sans-serif", 24),
        )
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d((0u32..1u32).into_segmented(), 0f64..y_max)?;

    let date_label = |value: &SegmentValue<u32>| match value {
        SegmentValue::Exact(_) | SegmentValue::CenterOf(_) => date.to_string(),
        SegmentValue::Last => String::new(),
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Date")
        .y_desc("Number of Cases")
        .x_label_formatter(&date_label)
        .y_label_formatter(&|v: &f64| format!("{v:.0}"))
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(BLUE.filled())
            .margin(BAR_MARGIN)
            .data(std::iter::once((0u32, height))),
    )?;

    root.present()?;
    Ok(())
}
