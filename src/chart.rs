use super::{
    min_and_max, relative_to_first, select, valid_mask, PacketTable, FIELD_BYTES_IN_FLIGHT,
    FIELD_LEN, FIELD_SEQ, FIELD_TIME, MIN_SAMPLES,
};
use log::{debug, error, info, warn};
use plotters::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};

/// The two graphs drawn from a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// relative sequence number against relative time
    TimeSequence,
    /// tcp.analysis.bytes_in_flight against relative time
    BytesInFlight,
}

impl ChartKind {
    pub const ALL: [ChartKind; 2] = [ChartKind::TimeSequence, ChartKind::BytesInFlight];

    pub fn required_fields(self) -> [&'static str; 2] {
        match self {
            ChartKind::TimeSequence => [FIELD_TIME, FIELD_SEQ],
            ChartKind::BytesInFlight => [FIELD_TIME, FIELD_BYTES_IN_FLIGHT],
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            ChartKind::TimeSequence => "_timeseq.png",
            ChartKind::BytesInFlight => "_bytes_in_flight.png",
        }
    }

    /// `<prefix>_timeseq.png` or `<prefix>_bytes_in_flight.png`
    pub fn output_path(self, prefix: &Path) -> PathBuf {
        let mut name = prefix.as_os_str().to_os_string();
        name.push(self.suffix());
        PathBuf::from(name)
    }

    pub fn title(self) -> &'static str {
        match self {
            ChartKind::TimeSequence => "Time-Sequence Graph (relative time)",
            ChartKind::BytesInFlight => "I/O Graph: tcp.analysis.bytes_in_flight",
        }
    }

    pub fn y_desc(self) -> &'static str {
        match self {
            ChartKind::TimeSequence => "Sequence number (relative)",
            ChartKind::BytesInFlight => "Bytes in flight",
        }
    }

    fn color(self) -> RGBColor {
        match self {
            ChartKind::TimeSequence => RGBColor(31, 119, 180),
            ChartKind::BytesInFlight => RGBColor(44, 160, 44),
        }
    }

    fn has_markers(self) -> bool {
        self == ChartKind::TimeSequence
    }

    fn insufficient_message(self) -> &'static str {
        match self {
            ChartKind::TimeSequence => {
                "No valid seq packets to plot time-sequence (insufficient samples)."
            }
            ChartKind::BytesInFlight => {
                "No valid bytes_in_flight samples to plot (insufficient samples)."
            }
        }
    }

    /// Filter the table down to the rows this chart can use.
    /// Returns None when a required column is absent.
    pub fn samples(self, table: &PacketTable) -> Option<Samples> {
        let [time_field, value_field] = self.required_fields();
        let time = table.numeric(time_field)?;
        let value = table.numeric(value_field)?;
        let mask = valid_mask(&[&time[..], &value[..]]);
        let time: Vec<f64> = select(&time, &mask).into_iter().flatten().collect();
        let value: Vec<f64> = select(&value, &mask).into_iter().flatten().collect();
        match self {
            ChartKind::TimeSequence => {
                let payload = match table.numeric(FIELD_LEN) {
                    Some(len) => select(&len, &mask),
                    None => vec![Some(0.); time.len()],
                };
                Some(Samples {
                    time,
                    value: relative_to_first(&value),
                    payload,
                })
            }
            ChartKind::BytesInFlight => Some(Samples {
                time,
                value,
                payload: Vec::new(),
            }),
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartKind::TimeSequence => write!(f, "time-sequence"),
            ChartKind::BytesInFlight => write!(f, "bytes_in_flight"),
        }
    }
}

/// The points of one chart, in capture order.
#[derive(Debug, Clone, PartialEq)]
pub struct Samples {
    pub time: Vec<f64>,
    pub value: Vec<f64>,
    /// tcp.len of each time-sequence sample, zeros when the column is absent;
    /// not drawn
    pub payload: Vec<Option<f64>>,
}

/// What happened to one chart.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartOutcome {
    Rendered(PathBuf),
    SkippedMissingFields,
    SkippedInsufficientSamples { valid: usize, required: usize },
    RenderError(String),
}

/// Rendering parameters shared by both charts.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotConfig {
    pub min_samples: usize,
    pub width: u32,
    pub height: u32,
}

impl Default for PlotConfig {
    fn default() -> Self {
        PlotConfig {
            min_samples: MIN_SAMPLES,
            width: 1000,
            height: 400,
        }
    }
}

/// Draw both charts next to the prefix, time-sequence first.
/// A skipped or failed chart does not stop the other one.
pub fn render_charts(
    table: &PacketTable,
    prefix: &Path,
    config: &PlotConfig,
) -> Vec<ChartOutcome> {
    ChartKind::ALL
        .iter()
        .map(|&kind| render_chart(table, kind, &kind.output_path(prefix), config))
        .collect()
}

pub fn render_chart(
    table: &PacketTable,
    kind: ChartKind,
    fout: &Path,
    config: &PlotConfig,
) -> ChartOutcome {
    let samples = match kind.samples(table) {
        Some(s) => s,
        None => {
            warn!("Required fields for {} missing, skipping.", kind);
            return ChartOutcome::SkippedMissingFields;
        }
    };
    if samples.len() < config.min_samples {
        warn!("{}", kind.insufficient_message());
        debug!(
            "{} valid {} samples, {} required",
            samples.len(),
            kind,
            config.min_samples
        );
        return ChartOutcome::SkippedInsufficientSamples {
            valid: samples.len(),
            required: config.min_samples,
        };
    }
    if kind == ChartKind::TimeSequence {
        let payload: f64 = samples.payload.iter().flatten().sum();
        debug!("{} segments carry {} payload bytes", samples.len(), payload);
    }
    match samples.plot_step(kind, fout, config) {
        Ok(()) => {
            info!("Wrote {} graph: {}", kind, fout.display());
            ChartOutcome::Rendered(fout.to_path_buf())
        }
        Err(e) => {
            error!("Failed to plot {} for {}: {}", kind, fout.display(), e);
            ChartOutcome::RenderError(e.to_string())
        }
    }
}

impl Samples {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// plots the samples as a post step line to png
    pub fn plot_step(
        &self,
        kind: ChartKind,
        fout: &Path,
        config: &PlotConfig,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (xmin, xmax) = min_and_max(&self.time[..]).ok_or("no samples to plot")?;
        let (ymin, ymax) = min_and_max(&self.value[..]).ok_or("no samples to plot")?;
        let xfmt = suitable_precision(xmax - xmin);
        let (xmin, xmax) = padded_range(xmin, xmax, 20.);
        let (ymin, ymax) = padded_range(ymin, ymax, 10.);
        debug!("{} axes: x {}..{}, y {}..{}", kind, xmin, xmax, ymin, ymax);
        let bounds = [xmax - xmin, ymax - ymin, xmin, xmax, ymin, ymax];
        if !bounds.iter().all(|b| b.is_finite()) {
            return Err("non-finite axis range".into());
        }
        if !fits_bitmap(config.width, config.height) {
            return Err(format!(
                "image size {}x{} is too large",
                config.width, config.height
            )
            .into());
        }

        let root = BitMapBackend::new(fout, (config.width, config.height)).into_drawing_area();
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(kind.title(), ("sans-serif", 20))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(80)
            .build_cartesian_2d(xmin..xmax, ymin..ymax)?;
        chart
            .configure_mesh()
            .label_style(("sans-serif", 13))
            .x_desc("Time (s) (relative)")
            .y_desc(kind.y_desc())
            .x_labels(12)
            .x_label_formatter(&|x: &f64| format!("{:.*}", xfmt, x))
            .y_label_formatter(&|y: &f64| format!("{:.0}", y))
            .draw()?;

        let color = kind.color();
        chart.draw_series(LineSeries::new(
            step_post(&self.time, &self.value),
            color.stroke_width(2),
        ))?;
        if kind.has_markers() {
            chart.draw_series(
                self.time
                    .iter()
                    .zip(self.value.iter())
                    .map(|(&x, &y)| Circle::new((x, y), 2, color.filled())),
            )?;
        }
        root.present()?;
        Ok(())
    }
}

/// Path of a right-continuous step line: each value holds until the next
/// sample's time, where the line jumps vertically.
pub fn step_post(xs: &[f64], ys: &[f64]) -> Vec<(f64, f64)> {
    let mut path: Vec<(f64, f64)> = Vec::with_capacity(2 * xs.len());
    for (&x, &y) in xs.iter().zip(ys.iter()) {
        if let Some(&(_, prev_y)) = path.last() {
            path.push((x, prev_y));
        }
        path.push((x, y));
    }
    path
}

/// widens min..max by span/parts on each side, never returning an empty range
pub fn padded_range(min: f64, max: f64, parts: f64) -> (f64, f64) {
    let span = max - min;
    let pad = if span > 0. {
        span / parts
    } else if min != 0. {
        min.abs() / parts
    } else {
        1.
    };
    (min - pad, max + pad)
}

/// Largest accepted width or height of the png, in pixels.
pub const MAX_IMAGE_SIDE: u32 = 10000;

/// true when an RGB buffer of this size can be allocated by the bitmap backend
pub fn fits_bitmap(width: u32, height: u32) -> bool {
    width > 0
        && height > 0
        && width <= MAX_IMAGE_SIDE
        && height <= MAX_IMAGE_SIDE
        && (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(3))
            .is_some()
}

/// decimals for the time labels given the time span, in seconds
pub fn suitable_precision(span: f64) -> usize {
    if span >= 100. {
        0
    } else if span >= 1. {
        2
    } else {
        4
    }
}
