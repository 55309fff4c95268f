use std::collections::BTreeSet;
use std::path::Path;

use chrono::NaiveDate;
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::models::ForecastPoint;

const WIDTH: u32 = 1200;
const HEIGHT: u32 = 1000;
const SECONDS_PER_DAY: u32 = 24 * 3600;

/// Renders the two-panel forecast chart (temperature on top, wind speed
/// below) to a PNG file. One line per calendar date, x axis is time of day.
pub fn render_chart(points: &[ForecastPoint], out: &Path) -> anyhow::Result<()> {
    let root = BitMapBackend::new(out, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;
    let (upper, lower) = root.split_vertically((HEIGHT / 2) as i32);

    draw_panel(&upper, points, "Temperature (°C)", |point| point.temp_c)?;
    draw_panel(&lower, points, "Wind speed (m/s)", |point| {
        point.wind_speed_ms
    })?;

    root.present()?;
    Ok(())
}

fn draw_panel(
    area: &DrawingArea<BitMapBackend, Shift>,
    points: &[ForecastPoint],
    title: &str,
    value: impl Fn(&ForecastPoint) -> f64,
) -> anyhow::Result<()> {
    let y_max = points.iter().map(&value).fold(1.0f64, f64::max) * 1.1;

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0u32..SECONDS_PER_DAY, 0f64..y_max)?;

    chart
        .configure_mesh()
        .x_labels(9)
        .x_label_formatter(&|seconds| {
            format!("{:02}:{:02}", seconds / 3600, (seconds % 3600) / 60)
        })
        .x_desc("Time of day")
        .y_desc(title)
        .draw()?;

    let dates: BTreeSet<NaiveDate> = points.iter().map(|point| point.date).collect();

    for (index, date) in dates.iter().enumerate() {
        let color = Palette99::pick(index).mix(0.9);
        let mut series: Vec<(u32, f64)> = points
            .iter()
            .filter(|point| point.date == *date)
            .map(|point| (point.seconds_since_midnight, value(point)))
            .collect();
        series.sort_by_key(|(seconds, _)| *seconds);

        chart
            .draw_series(LineSeries::new(series.clone(), color.stroke_width(2)))?
            .label(date.to_string())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
            });
        chart.draw_series(
            series
                .iter()
                .map(|(seconds, sample)| Circle::new((*seconds, *sample), 3, color.filled())),
        )?;
    }

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .draw()?;

    Ok(())
}
