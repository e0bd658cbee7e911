//! Plots of connection lifetimes and congestion windows

use std::path::Path;

use plotters::prelude::*;

use crate::connections::ConnectionSummary;
use crate::cwnd::CwndSeries;
use crate::error::{ReportError, ReportResult};

const CWND_COLOR: RGBColor = RGBColor(0x25, 0x4e, 0x8a);

/// Vertical reference line on a time axis
#[derive(Debug, Clone)]
pub struct Marker {
    /// Seconds after the first connection
    pub offset: f64,
    /// Legend label
    pub label: String,
    /// Line color
    pub color: RGBColor,
}

impl Marker {
    /// Create a marker
    pub fn new(offset: f64, label: impl Into<String>, color: RGBColor) -> Self {
        Self {
            offset,
            label: label.into(),
            color,
        }
    }
}

/// Scatter plot of connection duration against start time
pub struct ConnectionPlotter;

impl ConnectionPlotter {
    /// Plot `summaries` to a PNG at `path`
    ///
    /// Start times are shown relative to the first connection.
    pub fn plot(
        summaries: &[ConnectionSummary],
        markers: &[Marker],
        path: &Path,
    ) -> ReportResult<()> {
        let first = summaries
            .iter()
            .map(|s| s.start)
            .reduce(f64::min)
            .ok_or(ReportError::Empty("connections"))?;

        let points: Vec<(f64, f64)> = summaries
            .iter()
            .map(|s| (s.start - first, s.duration))
            .collect();

        let max_x = points
            .iter()
            .map(|(x, _)| *x)
            .chain(markers.iter().map(|m| m.offset))
            .fold(1.0, f64::max);
        let max_y = points.iter().map(|(_, y)| *y).fold(1.0, f64::max);

        let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
        root.fill(&WHITE).map_err(ReportError::plot)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Connection Duration vs. Connection Start Time", ("sans-serif", 30))
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(0f64..(max_x * 1.05), 0f64..(max_y * 1.1))
            .map_err(ReportError::plot)?;

        chart
            .configure_mesh()
            .x_desc("Connection Start (seconds after first connection)")
            .y_desc("Connection Duration (seconds)")
            .x_label_formatter(&|x| format!("{:.0}", x))
            .y_label_formatter(&|y| format!("{:.1}", y))
            .draw()
            .map_err(ReportError::plot)?;

        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 3, BLUE.filled())),
            )
            .map_err(ReportError::plot)?
            .label("Connection Duration")
            .legend(|(x, y)| Circle::new((x + 10, y), 3, BLUE.filled()));

        for marker in markers {
            let color = marker.color;
            chart
                .draw_series(LineSeries::new(
                    vec![(marker.offset, 0.0), (marker.offset, max_y * 1.1)],
                    color.stroke_width(2),
                ))
                .map_err(ReportError::plot)?
                .label(marker.label.clone())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(ReportError::plot)?;

        root.present().map_err(ReportError::plot)?;
        Ok(())
    }
}

/// Line plot of one congestion-window series
pub struct CwndPlotter;

impl CwndPlotter {
    /// Plot `series` to a PNG at `path`
    pub fn plot(series: &CwndSeries, path: &Path) -> ReportResult<()> {
        let max_cwnd = series.max_cwnd().ok_or(ReportError::Empty("cwnd samples"))?;
        let max_time = series
            .samples
            .iter()
            .map(|s| s.time)
            .fold(1.0, f64::max);

        let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
        root.fill(&WHITE).map_err(ReportError::plot)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("CWND vs Time", ("sans-serif", 30))
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(0f64..max_time, 0f64..(max_cwnd * 1.1))
            .map_err(ReportError::plot)?;

        chart
            .configure_mesh()
            .x_desc("Time (seconds)")
            .y_desc("CWND (KBytes)")
            .x_label_formatter(&|x| format!("{:.0}", x))
            .y_label_formatter(&|y| format!("{:.0}", y))
            .draw()
            .map_err(ReportError::plot)?;

        let points: Vec<(f64, f64)> = series
            .samples
            .iter()
            .map(|s| (s.time, s.cwnd_kbytes))
            .collect();

        chart
            .draw_series(LineSeries::new(points.clone(), &CWND_COLOR))
            .map_err(ReportError::plot)?;
        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 2, CWND_COLOR.filled())),
            )
            .map_err(ReportError::plot)?;

        root.present().map_err(ReportError::plot)?;
        Ok(())
    }
}
