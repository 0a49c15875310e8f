#![cfg(not(tarpaulin_include))]
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use std::path::Path;

use crate::cell::{CellValue, parse_timestamp};
use crate::error::Result;
use crate::loader::load_workbook;
use crate::spreadsheet::{ACTUAL_LENGTH_COLUMN, SensorSheet, SensorWorkbook, TIME_COLUMN};

/// Fixed y-axis range of the wear chart in millimetres
pub const Y_RANGE: [f64; 2] = [0.0, 450.0];

static BLANK: CellValue = CellValue::Empty;

/// Stroke pattern of a reference line
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineDash {
    Solid,
    Dash,
}

/// Colours used for reference lines
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineColor {
    Orange,
    Red,
}

/// A horizontal wear-limit line drawn across the whole chart
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThresholdLine {
    /// Height of the line in millimetres
    pub value: f64,
    /// Annotation text drawn next to the line
    pub label: String,
    pub color: LineColor,
    pub dash: LineDash,
    /// Stroke width in pixels
    pub width: u32,
}

impl ThresholdLine {
    fn new(value: f64, label: &str, color: LineColor, dash: LineDash, width: u32) -> Self {
        Self {
            value,
            label: label.to_string(),
            color,
            dash,
            width,
        }
    }
}

/// Lifter and plate reline/failure limits, top to bottom
pub fn wear_limits() -> Vec<ThresholdLine> {
    vec![
        ThresholdLine::new(150.0, "Lifter Reline Limit 150mm", LineColor::Orange, LineDash::Dash, 2),
        ThresholdLine::new(120.0, "Lifter Failure Limit 120mm", LineColor::Red, LineDash::Solid, 3),
        ThresholdLine::new(40.0, "Plate Reline Limit 40mm", LineColor::Orange, LineDash::Dash, 2),
        ThresholdLine::new(30.0, "Plate Failure Limit 30mm", LineColor::Red, LineDash::Solid, 3),
    ]
}

/// One plotted observation; `length` is `None` where the cell was blank or not numeric
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartPoint {
    pub time: NaiveDateTime,
    pub length: Option<f64>,
}

/// Measured length over time for one sensor (one sheet)
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartSeries {
    pub name: String,
    pub mode: &'static str,
    pub points: Vec<ChartPoint>,
}

impl ChartSeries {
    /// Runs of consecutive points that have a length; blank lengths break the line
    pub fn segments(&self) -> Vec<Vec<(NaiveDateTime, f64)>> {
        let mut segments = Vec::new();
        let mut current = Vec::new();
        for point in &self.points {
            match point.length {
                Some(length) => current.push((point.time, length)),
                None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
                None => {}
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }
        segments
    }
}

/// Legend placement: horizontal, anchored at the top right of the plot
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Legend {
    pub orientation: &'static str,
    pub x: f64,
    pub y: f64,
    pub xanchor: &'static str,
    pub yanchor: &'static str,
}

impl Default for Legend {
    fn default() -> Self {
        Self {
            orientation: "h",
            x: 1.0,
            y: 0.9,
            xanchor: "right",
            yanchor: "bottom",
        }
    }
}

/// Renderable description of a wear chart
///
/// Serialized as JSON for the browser and drawn to PNG by [`render_png`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SensorChart {
    pub series: Vec<ChartSeries>,
    pub thresholds: Vec<ThresholdLine>,
    pub x_title: String,
    pub y_title: String,
    pub y_range: [f64; 2],
    pub legend: Legend,
}

impl SensorChart {
    /// Wraps the series with the fixed limits, titles, range and legend
    pub fn new(series: Vec<ChartSeries>) -> Self {
        Self {
            series,
            thresholds: wear_limits(),
            x_title: "Date and Time".to_string(),
            y_title: "Sensor Length - mm".to_string(),
            y_range: Y_RANGE,
            legend: Legend::default(),
        }
    }

    /// Earliest and latest timestamp across all series
    ///
    /// Falls back to a one-day window at the Unix epoch when there are no
    /// points, and widens a single instant by an hour on each side.
    pub fn time_bounds(&self) -> (NaiveDateTime, NaiveDateTime) {
        let mut times = self.series.iter().flat_map(|s| s.points.iter().map(|p| p.time));
        let Some(first) = times.next() else {
            let start = NaiveDateTime::default();
            return (start, start + Duration::days(1));
        };

        let (min, max) = times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
        if min == max {
            (min - Duration::hours(1), max + Duration::hours(1))
        } else {
            (min, max)
        }
    }
}

/// Build the wear chart for a sensor database workbook
///
/// One series per sheet, named after the sheet, plotting `time` against the
/// measured length after sentinel rows are removed.
///
/// # Errors
/// * `WearError::FileNotFound` / `WearError::Workbook` when the file cannot be read
/// * `WearError::MissingColumn` when a sheet lacks the nominal length, time or
///   measured length column
/// * `WearError::MalformedTimestamp` when a time cell cannot be parsed
///
/// # Examples
/// ```no_run
/// use millwear::graph::build_chart;
///
/// let chart = build_chart("FE2025May_Database_update.xlsx").unwrap();
/// println!("{} sensors plotted", chart.series.len());
/// ```
pub fn build_chart(file_path: impl AsRef<Path>) -> Result<SensorChart> {
    let workbook = load_workbook(file_path)?;
    chart_from_workbook(&workbook)
}

/// Build the wear chart from an already loaded workbook
pub fn chart_from_workbook(workbook: &SensorWorkbook) -> Result<SensorChart> {
    let series = workbook
        .sheets
        .iter()
        .map(series_from_sheet)
        .collect::<Result<Vec<_>>>()?;

    Ok(SensorChart::new(series))
}

fn series_from_sheet(sheet: &SensorSheet) -> Result<ChartSeries> {
    let rows = sheet.without_sentinel_rows(true)?;
    let time_col = sheet.require_column(TIME_COLUMN)?;
    let length_col = sheet.require_column(ACTUAL_LENGTH_COLUMN)?;

    let mut points = Vec::with_capacity(rows.len());
    for (row_number, row) in rows {
        let time_cell = row.get(time_col).unwrap_or(&BLANK);
        // blank timestamps are skipped like missing points
        let Some(time) = parse_timestamp(time_cell, &sheet.name, row_number)? else {
            continue;
        };
        points.push(ChartPoint {
            time,
            length: row.get(length_col).and_then(CellValue::as_f64),
        });
    }

    Ok(ChartSeries {
        name: sheet.name.clone(),
        mode: "lines+markers",
        points,
    })
}

#[cfg(feature = "web")]
mod render {
    use chrono::NaiveDateTime;
    use plotters::coord::Shift;
    use plotters::prelude::*;
    use plotters_backend::{
        BackendColor, BackendCoord, BackendStyle, BackendTextStyle, DrawingErrorKind,
    };
    use std::error::Error;
    use std::io::Cursor;
    use std::panic;

    use super::{LineColor, LineDash, SensorChart};
    use crate::error::{Result, WearError};

    impl LineColor {
        fn rgb(self) -> RGBColor {
            match self {
                LineColor::Orange => RGBColor(255, 165, 0),
                LineColor::Red => RED,
            }
        }
    }

    /// Draw a wear chart into a PNG image
    ///
    /// Rendering happens into an in-memory RGB buffer that is then encoded
    /// as PNG; nothing touches the filesystem.
    ///
    /// # Arguments
    /// * `chart` - The chart description
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    ///
    /// # Returns
    /// * `Result<Vec<u8>>` - PNG bytes
    pub fn render_png(chart: &SensorChart, width: u32, height: u32) -> Result<Vec<u8>> {
        let mut pixels = vec![0u8; width as usize * height as usize * 3];
        {
            let backend = BitMapBackend::with_buffer(&mut pixels, (width, height));
            let root = TextTolerantBackend::new(backend).into_drawing_area();
            draw_chart(&root, chart).map_err(|e| WearError::Render(e.to_string()))?;
            root.present().map_err(|e| WearError::Render(e.to_string()))?;
        }

        let image = image::RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| WearError::Render("pixel buffer does not match image size".into()))?;

        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)
            .map_err(|e| WearError::Render(e.to_string()))?;
        Ok(png)
    }

    /// Backend wrapper that keeps drawing when no font can be loaded
    ///
    /// Labels that fail to render are left out and their size is estimated
    /// from the font size, so lines, markers and limits still come out.
    struct TextTolerantBackend<DB> {
        inner: DB,
    }

    impl<DB> TextTolerantBackend<DB> {
        fn new(inner: DB) -> Self {
            Self { inner }
        }
    }

    impl<DB: DrawingBackend> DrawingBackend for TextTolerantBackend<DB> {
        type ErrorType = DB::ErrorType;

        fn get_size(&self) -> (u32, u32) {
            self.inner.get_size()
        }

        fn ensure_prepared(&mut self) -> std::result::Result<(), DrawingErrorKind<Self::ErrorType>> {
            self.inner.ensure_prepared()
        }

        fn present(&mut self) -> std::result::Result<(), DrawingErrorKind<Self::ErrorType>> {
            self.inner.present()
        }

        fn draw_pixel(
            &mut self,
            point: BackendCoord,
            color: BackendColor,
        ) -> std::result::Result<(), DrawingErrorKind<Self::ErrorType>> {
            self.inner.draw_pixel(point, color)
        }

        fn draw_line<S: BackendStyle>(
            &mut self,
            from: BackendCoord,
            to: BackendCoord,
            style: &S,
        ) -> std::result::Result<(), DrawingErrorKind<Self::ErrorType>> {
            self.inner.draw_line(from, to, style)
        }

        fn draw_rect<S: BackendStyle>(
            &mut self,
            upper_left: BackendCoord,
            bottom_right: BackendCoord,
            style: &S,
            fill: bool,
        ) -> std::result::Result<(), DrawingErrorKind<Self::ErrorType>> {
            self.inner.draw_rect(upper_left, bottom_right, style, fill)
        }

        fn draw_path<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
            &mut self,
            path: I,
            style: &S,
        ) -> std::result::Result<(), DrawingErrorKind<Self::ErrorType>> {
            self.inner.draw_path(path, style)
        }

        fn draw_circle<S: BackendStyle>(
            &mut self,
            center: BackendCoord,
            radius: u32,
            style: &S,
            fill: bool,
        ) -> std::result::Result<(), DrawingErrorKind<Self::ErrorType>> {
            self.inner.draw_circle(center, radius, style, fill)
        }

        fn fill_polygon<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
            &mut self,
            vert: I,
            style: &S,
        ) -> std::result::Result<(), DrawingErrorKind<Self::ErrorType>> {
            self.inner.fill_polygon(vert, style)
        }

        fn blit_bitmap(
            &mut self,
            pos: BackendCoord,
            size: (u32, u32),
            src: &[u8],
        ) -> std::result::Result<(), DrawingErrorKind<Self::ErrorType>> {
            self.inner.blit_bitmap(pos, size, src)
        }

        fn draw_text<TStyle: BackendTextStyle>(
            &mut self,
            text: &str,
            style: &TStyle,
            pos: BackendCoord,
        ) -> std::result::Result<(), DrawingErrorKind<Self::ErrorType>> {
            let drawn = panic::catch_unwind(panic::AssertUnwindSafe(|| {
                self.inner.draw_text(text, style, pos)
            }));
            match drawn {
                Ok(Err(DrawingErrorKind::DrawingError(e))) => Err(DrawingErrorKind::DrawingError(e)),
                // font missing or unusable: leave the label out
                Ok(Err(DrawingErrorKind::FontError(_))) | Err(_) => Ok(()),
                Ok(Ok(())) => Ok(()),
            }
        }

        fn estimate_text_size<TStyle: BackendTextStyle>(
            &self,
            text: &str,
            style: &TStyle,
        ) -> std::result::Result<(u32, u32), DrawingErrorKind<Self::ErrorType>> {
            let measured = panic::catch_unwind(panic::AssertUnwindSafe(|| {
                self.inner.estimate_text_size(text, style)
            }));
            match measured {
                Ok(Ok(size)) => Ok(size),
                _ => {
                    let size = style.size().max(1.0);
                    let width = text.chars().count() as f64 * size * 0.6;
                    Ok((width.ceil() as u32, size.ceil() as u32))
                }
            }
        }
    }

    fn draw_chart<DB>(
        root: &DrawingArea<DB, Shift>,
        chart: &SensorChart,
    ) -> std::result::Result<(), Box<dyn Error>>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;

        let (start, end) = chart.time_bounds();
        let mut ctx = ChartBuilder::on(root)
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(
                RangedDateTime::from(start..end),
                chart.y_range[0]..chart.y_range[1],
            )?;

        ctx.configure_mesh()
            .x_desc(chart.x_title.as_str())
            .y_desc(chart.y_title.as_str())
            .x_labels(6)
            .x_label_formatter(&|dt: &NaiveDateTime| dt.format("%m-%d %H:%M").to_string())
            .draw()?;

        for line in &chart.thresholds {
            let color = line.color.rgb();
            let style = plotters::style::Color::stroke_width(&color, line.width);
            let ends = vec![(start, line.value), (end, line.value)];
            match line.dash {
                LineDash::Solid => {
                    ctx.draw_series(LineSeries::new(ends, style))?;
                }
                LineDash::Dash => {
                    ctx.draw_series(DashedLineSeries::new(ends, 8, 6, style))?;
                }
            }
            let font = ("sans-serif", 14).into_font().color(&color);
            ctx.draw_series(std::iter::once(Text::new(
                line.label.clone(),
                (start, line.value + 12.0),
                font,
            )))?;
        }

        for (i, series) in chart.series.iter().enumerate() {
            let color = Palette99::pick(i).to_rgba();

            // empty series carries the legend entry so gaps don't duplicate it
            ctx.draw_series(LineSeries::new(
                Vec::<(NaiveDateTime, f64)>::new(),
                plotters::style::Color::stroke_width(&color, 2),
            ))?
            .label(series.name.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], plotters::style::Color::stroke_width(&color, 2)));

            for segment in series.segments() {
                ctx.draw_series(
                    segment
                        .iter()
                        .map(|&(t, y)| Circle::new((t, y), 3, color.filled())),
                )?;
                ctx.draw_series(LineSeries::new(segment, plotters::style::Color::stroke_width(&color, 2)))?;
            }
        }

        ctx.configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;

        Ok(())
    }
}

#[cfg(feature = "web")]
pub use render::render_png;
