//! SegmentForge: consumer segmentation CLI using K-Means clustering
//!
//! This is the main entrypoint that orchestrates data loading, the elbow
//! sweep, segment fitting, one filtered query and optional chart export.

use std::fs;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};
use segmentforge::{viz, Args, Pipeline, QueryResult};

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let default_level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    let config = args.resolve_config()?;
    let start_time = Instant::now();

    let pipeline = Pipeline::from_csv(&args.input, config)
        .with_context(|| format!("failed to initialize from {}", args.input.display()))?;
    info!("Initialization finished in {:.2}s", start_time.elapsed().as_secs_f64());

    let engine = pipeline.query_engine();
    // Without segments the query still reports the dataset-wide statistics
    let default_segment = engine.segment_ids().into_iter().next().unwrap_or(0);
    let criteria = args.criteria(default_segment, engine.payment_methods())?;
    let result = engine.query(&criteria);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_report(&pipeline, &result);
    }

    if let Some(plot_dir) = &args.plot_dir {
        fs::create_dir_all(plot_dir)
            .with_context(|| format!("failed to create {}", plot_dir.display()))?;
        if pipeline.elbow.points().is_empty() {
            warn!("No cluster count could be fitted, skipping the elbow chart");
        } else {
            viz::render_elbow_curve(&pipeline.elbow, plot_dir.join("elbow.svg"))?;
        }
        viz::render_segment_scatter(
            &result.scatter,
            &format!("Segment {}", criteria.segment),
            plot_dir.join(format!("segment_{}.svg", criteria.segment)),
        )?;
    }

    Ok(())
}

/// Print the pipeline and query summary to the console
fn print_report(pipeline: &Pipeline, result: &QueryResult) {
    let report = pipeline.dataset.report();
    println!("=== Data ===");
    println!("Rows read: {}", report.total_rows);
    println!("Records kept: {}", pipeline.dataset.len());
    println!("Rows dropped: {}", report.dropped_count());
    println!("Income values nulled: {}", report.coercion_count());
    println!("Records clustered: {}", pipeline.features.nrows());

    println!("\n=== Elbow Method ===");
    for point in pipeline.elbow.points() {
        println!("  k = {:2}: WCSS {:.2}", point.k, point.inertia);
    }
    for skipped in pipeline.elbow.skipped() {
        println!("  k = {:2}: skipped ({})", skipped.k, skipped.reason);
    }

    match &pipeline.segmentation {
        Some(segmentation) => {
            let model = &segmentation.primary_model;
            println!("\n=== Segments (k = {}) ===", model.n_clusters);
            println!("Within-cluster sum of squares: {:.2}", model.inertia);
            let total = pipeline.features.nrows().max(1);
            for (i, &size) in model.cluster_sizes().iter().enumerate() {
                let percentage = (size as f64 / total as f64) * 100.0;
                println!("Segment {}: {} consumers ({:.1}%)", i, size, percentage);
            }
        }
        None => {
            println!("\n=== Segments ===");
            println!(
                "Unavailable: {}",
                pipeline.segmentation_error.as_deref().unwrap_or("no segmentation")
            );
        }
    }

    let criteria = &result.criteria;
    let methods: Vec<&str> = criteria.payment_methods.iter().map(String::as_str).collect();
    println!("\n=== Query ===");
    println!(
        "Segment {}, ages {}..={}, payment methods [{}]",
        criteria.segment,
        criteria.age_min,
        criteria.age_max,
        methods.join(", ")
    );

    let scoped = &result.summary.scoped;
    let global = &result.summary.global;
    println!("Consumers: {}", scoped.record_count);
    println!("Average age of cash payers: {}", scoped.average_payment_age);
    println!("Average age with income above 20k (all data): {}", global.average_high_income_age);
    println!("Preferred payment method (all data): {}", global.preferred_payment_method);
    println!("{}", global.potential_consumers);
}
