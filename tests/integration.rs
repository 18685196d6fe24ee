//! Integration tests for SegmentForge

use segmentforge::{
    load_csv, Config, FeatureMatrix, FilterCriteria, Pipeline, SegmentationConfig, Stat,
};
use std::io::Write;
use tempfile::NamedTempFile;

const METHODS: [&str; 3] = ["Cash", "Card", "Paypal"];

/// Create a test CSV file with sample data
fn create_test_csv(header: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", header).unwrap();

    for i in 0..36usize {
        let age = 18 + (i * 7) % 50;
        let income = 10 + (i * 13) % 60;
        let spending = 1 + (i * 37) % 100;
        let method = METHODS[i % METHODS.len()];
        writeln!(file, "{},{},{},{},{},Lima", i, age, income, spending, method).unwrap();
    }

    // Unparsable incomes stay in the dataset but never reach the clustering
    writeln!(file, "100,45,\"20,000\",75,Cash,Lima").unwrap();
    writeln!(file, "101,52,abc,88,Card,Cusco").unwrap();

    file
}

fn create_default_csv() -> NamedTempFile {
    create_test_csv("CustomerID,Age,Annual_Income,Spending Score (1-100),Payment_Methods,City")
}

fn test_config() -> Config {
    Config {
        segmentation: SegmentationConfig::default()
            .k_range(1, 6)
            .n_clusters(3)
            .n_init(3)
            .max_iter(200),
        ..Default::default()
    }
}

#[test]
fn test_end_to_end_pipeline() {
    let test_file = create_default_csv();
    let pipeline = Pipeline::from_csv(test_file.path(), test_config()).unwrap();

    // Verify data loading
    assert_eq!(pipeline.dataset.len(), 38);
    assert_eq!(pipeline.features.nrows(), 36);
    assert_eq!(pipeline.features.excluded, 2);

    // Verify elbow curve
    assert_eq!(pipeline.elbow.points().len(), 6);
    assert!(pipeline.elbow.is_non_increasing());

    // Verify all clusterable consumers are assigned to a segment
    let segmentation = pipeline.segmentation.as_ref().unwrap();
    let primary = &segmentation.primary;
    assert_eq!(primary.assigned_count(), 36);
    for record in pipeline.dataset.records() {
        match record.annual_income {
            Some(_) => assert!(primary.label_of(record.id).unwrap() < 3),
            None => assert_eq!(primary.label_of(record.id), None),
        }
    }

    let sizes = segmentation.primary_model.cluster_sizes();
    assert_eq!(sizes.iter().sum::<usize>(), 36);
}

#[test]
fn test_income_coercion() {
    let test_file = create_default_csv();
    let dataset = load_csv(test_file.path()).unwrap();

    assert_eq!(dataset.report().coercion_count(), 2);
    assert_eq!(dataset.report().dropped_count(), 0);

    let unparsable: Vec<_> = dataset
        .records()
        .iter()
        .filter(|record| record.annual_income.is_none())
        .map(|record| record.age)
        .collect();
    assert_eq!(unparsable, vec![45, 52]);

    let matrix = FeatureMatrix::from_dataset(&dataset);
    assert!(!matrix.record_ids.contains(&36));
    assert!(!matrix.record_ids.contains(&37));
}

#[test]
fn test_padded_column_names_behave_identically() {
    let plain = create_default_csv();
    let padded = create_test_csv(
        " CustomerID , Age,Annual_Income  ,  Spending Score (1-100),Payment_Methods ,City ",
    );

    let plain = Pipeline::from_csv(plain.path(), test_config()).unwrap();
    let padded = Pipeline::from_csv(padded.path(), test_config()).unwrap();

    assert_eq!(plain.elbow, padded.elbow);
    assert_eq!(
        plain.segmentation.as_ref().unwrap().primary,
        padded.segmentation.as_ref().unwrap().primary
    );

    let plain_engine = plain.query_engine();
    let padded_engine = padded.query_engine();
    let criteria = plain_engine.default_criteria().unwrap();
    assert_eq!(
        serde_json::to_string(&plain_engine.query(&criteria)).unwrap(),
        serde_json::to_string(&padded_engine.query(&criteria)).unwrap()
    );
}

#[test]
fn test_global_statistics_do_not_follow_filters() {
    let test_file = create_default_csv();
    let pipeline = Pipeline::from_csv(test_file.path(), test_config()).unwrap();
    let engine = pipeline.query_engine();
    let segments = engine.segment_ids();
    assert_eq!(segments.len(), 3);

    let first = engine.query(&FilterCriteria::new(segments[0]).payment_methods(METHODS));
    let second = engine.query(
        &FilterCriteria::new(segments[1])
            .age_range(30, 40)
            .payment_methods(["Cash"]),
    );

    assert_eq!(first.summary.global, second.summary.global);
    assert!(first.summary.global.average_high_income_age.is_available());
    assert!(first.summary.global.preferred_payment_method.is_available());
    assert!(first.subset.iter().all(|row| row.segment == segments[0]));
    assert!(second
        .subset
        .iter()
        .all(|row| row.segment == segments[1] && (30..=40).contains(&row.record.age)));
}

#[test]
fn test_empty_selection_reports_sentinels() {
    let test_file = create_default_csv();
    let pipeline = Pipeline::from_csv(test_file.path(), test_config()).unwrap();
    let engine = pipeline.query_engine();

    let result = engine.query(&FilterCriteria::new(0).age_range(90, 99).payment_methods(METHODS));
    assert!(result.subset.is_empty());
    assert!(result.scatter.is_empty());
    assert_eq!(result.summary.scoped.record_count, 0);
    assert_eq!(result.summary.scoped.average_payment_age, Stat::NotAvailable);
    assert_eq!(result.summary.scoped.average_payment_age.to_string(), "N/A");
}

#[test]
fn test_query_is_idempotent() {
    let test_file = create_default_csv();
    let pipeline = Pipeline::from_csv(test_file.path(), test_config()).unwrap();
    let engine = pipeline.query_engine();
    let criteria = engine.default_criteria().unwrap();

    let first = serde_json::to_vec(&engine.query(&criteria)).unwrap();
    let second = serde_json::to_vec(&engine.query(&criteria)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_unclusterable_csv_still_serves_global_statistics() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Age,Annual_Income,Spending Score (1-100),Payment_Methods").unwrap();
    writeln!(file, "25,abc,80,Cash").unwrap();
    writeln!(file, "40,,60,Card").unwrap();
    writeln!(file, "33,\"20,000\",75,Cash").unwrap();

    let pipeline = Pipeline::from_csv(file.path(), test_config()).unwrap();
    assert_eq!(pipeline.dataset.len(), 3);
    assert!(pipeline.features.is_empty());
    assert!(pipeline.segmentation.is_none());
    assert_eq!(pipeline.elbow.skipped().len(), 6);

    let engine = pipeline.query_engine();
    let result = engine.query(&FilterCriteria::new(0).payment_methods(METHODS));
    assert!(result.subset.is_empty());
    assert_eq!(
        result.summary.global.preferred_payment_method,
        Stat::Available("Cash".to_string())
    );
    assert_eq!(result.summary.global.potential_consumers, Stat::NotAvailable);
}

#[test]
fn test_missing_column_aborts_initialization() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Age,Spending Score (1-100),Payment_Methods").unwrap();
    writeln!(file, "25,80,Cash").unwrap();

    assert!(Pipeline::from_csv(file.path(), test_config()).is_err());
}
