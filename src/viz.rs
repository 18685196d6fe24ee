//! SVG charts of the elbow curve and of a query's segment scatter using Plotters

use std::path::Path;

use log::info;
use plotters::prelude::*;

use crate::elbow::ElbowCurve;
use crate::error::{Error, Result};
use crate::query::ScatterPoint;

/// Color palette for payment methods
const PAYMENT_COLORS: [RGBColor; 6] = [
    RED,
    BLUE,
    GREEN,
    MAGENTA,
    CYAN,
    RGBColor(255, 140, 0),
];

fn plot_err(err: impl std::fmt::Display) -> Error {
    Error::plot(err.to_string())
}

/// Draw the inertia-vs-k line chart
///
/// # Arguments
/// * `curve` - Elbow curve to draw
/// * `output_path` - Path of the SVG file to write
pub fn render_elbow_curve(curve: &ElbowCurve, output_path: impl AsRef<Path>) -> Result<()> {
    let output_path = output_path.as_ref();
    let points = curve.points();
    if points.is_empty() {
        return Err(Error::plot("elbow curve has no points"));
    }

    let k_min = points.first().map_or(1, |point| point.k) as f64;
    let k_max = points.last().map_or(1, |point| point.k) as f64;
    let max_inertia = points.iter().fold(0.0f64, |acc, point| acc.max(point.inertia));
    let y_max = if max_inertia > 0.0 { max_inertia * 1.1 } else { 1.0 };

    let root = SVGBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Elbow method for optimal k", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d((k_min - 0.5)..(k_max + 0.5), 0f64..y_max)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("Number of clusters k")
        .y_desc("WCSS (within-cluster sum of squares)")
        .axis_desc_style(("sans-serif", 15))
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(
            points.iter().map(|point| (point.k as f64, point.inertia)),
            &BLUE,
        ))
        .map_err(plot_err)?;
    chart
        .draw_series(
            points
                .iter()
                .map(|point| Circle::new((point.k as f64, point.inertia), 4, BLUE.filled())),
        )
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    info!("Elbow chart saved to: {}", output_path.display());

    Ok(())
}

/// Draw annual income against spending score for one query subset
///
/// Points are colored by payment method; circles mark even segment labels
/// and squares odd ones so mixed-segment subsets stay readable.
pub fn render_segment_scatter(points: &[ScatterPoint], title: &str, output_path: impl AsRef<Path>) -> Result<()> {
    let output_path = output_path.as_ref();

    let income_max = points.iter().fold(0.0f64, |acc, point| acc.max(point.annual_income));
    let income_min = points.iter().fold(income_max, |acc, point| acc.min(point.annual_income));
    let padding = ((income_max - income_min) * 0.05).max(1.0);

    let root = SVGBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d((income_min - padding)..(income_max + padding), 0f64..105f64)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("Annual income")
        .y_desc("Spending score (1-100)")
        .axis_desc_style(("sans-serif", 15))
        .draw()
        .map_err(plot_err)?;

    let mut methods: Vec<&str> = Vec::new();
    for point in points {
        if !methods.contains(&point.payment_method.as_str()) {
            methods.push(point.payment_method.as_str());
        }
    }

    for (i, method) in methods.iter().enumerate() {
        let color = PAYMENT_COLORS[i % PAYMENT_COLORS.len()];
        let members: Vec<&ScatterPoint> = points
            .iter()
            .filter(|point| point.payment_method == *method)
            .collect();

        chart
            .draw_series(
                members
                    .iter()
                    .filter(|point| point.segment % 2 == 0)
                    .map(|point| Circle::new((point.annual_income, point.spending_score), 4, color.filled())),
            )
            .map_err(plot_err)?
            .label(method.to_string())
            .legend(move |(x, y)| Circle::new((x + 5, y), 4, color.filled()));

        let half_width = padding * 0.1;
        chart
            .draw_series(members.iter().filter(|point| point.segment % 2 == 1).map(|point| {
                Rectangle::new(
                    [
                        (point.annual_income - half_width, point.spending_score - 1.0),
                        (point.annual_income + half_width, point.spending_score + 1.0),
                    ],
                    color.filled(),
                )
            }))
            .map_err(plot_err)?;
    }

    if !methods.is_empty() {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(plot_err)?;
    }

    root.present().map_err(plot_err)?;
    info!("Segment scatter saved to: {}", output_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SegmentationConfig;
    use crate::elbow::ElbowSweep;
    use crate::features::FeatureMatrix;
    use ndarray::array;
    use tempfile::tempdir;

    fn create_test_curve() -> ElbowCurve {
        let features = array![
            [20.0, 15.0, 80.0],
            [22.0, 16.0, 82.0],
            [60.0, 90.0, 10.0],
            [62.0, 88.0, 12.0],
        ];
        let matrix = FeatureMatrix {
            record_ids: vec![0, 1, 2, 3],
            features,
            excluded: 0,
        };
        let config = SegmentationConfig::default().k_range(1, 3).n_init(2);
        ElbowSweep::new(&config).sweep(&matrix).unwrap()
    }

    #[test]
    fn test_render_elbow_curve() {
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("elbow.svg");

        render_elbow_curve(&create_test_curve(), &output_path).unwrap();
        assert!(output_path.exists());
    }

    #[test]
    fn test_render_segment_scatter() {
        let points = vec![
            ScatterPoint {
                record_id: 0,
                annual_income: 15.0,
                spending_score: 80.0,
                payment_method: "Cash".to_string(),
                segment: 0,
            },
            ScatterPoint {
                record_id: 1,
                annual_income: 25.0,
                spending_score: 60.0,
                payment_method: "Card".to_string(),
                segment: 1,
            },
        ];
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("scatter.svg");

        render_segment_scatter(&points, "Segment 0", &output_path).unwrap();
        assert!(output_path.exists());
    }

    #[test]
    fn test_empty_curve_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("empty.svg");
        assert!(render_elbow_curve(&ElbowCurve::default(), &output_path).is_err());
    }
}
