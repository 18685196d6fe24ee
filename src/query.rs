//! Filtered segment views and their summary statistics
//!
//! A query never mutates the fitted state: it scans the dataset once and
//! returns an owned [`QueryResult`]. Statistics are split into a part scoped
//! to the filtered subset and a part computed over the whole dataset, so a
//! caller can never mistake one for the other.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

use crate::config::AggregationConfig;
use crate::data::{ConsumerRecord, Dataset};
use crate::segment::SegmentAssignment;

/// A statistic that may be undefined for lack of data
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Stat<T> {
    Available(T),
    NotAvailable,
}

impl<T> Stat<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Stat::Available(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Stat::Available(value) => Some(value),
            Stat::NotAvailable => None,
        }
    }
}

impl<T> From<Option<T>> for Stat<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Stat::NotAvailable, Stat::Available)
    }
}

impl fmt::Display for Stat<f64> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stat::Available(value) => write!(f, "{:.2}", value),
            Stat::NotAvailable => f.write_str("N/A"),
        }
    }
}

impl fmt::Display for Stat<String> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stat::Available(value) => f.write_str(value),
            Stat::NotAvailable => f.write_str("N/A"),
        }
    }
}

impl fmt::Display for Stat<PotentialConsumers> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stat::Available(summary) => write!(
                f,
                "Potential consumers: {}, mean age: {:.2}, preferred payment method: {}",
                summary.count, summary.mean_age, summary.preferred_payment_method
            ),
            Stat::NotAvailable => f.write_str("N/A"),
        }
    }
}

/// Operator selection: one segment, an inclusive age range and accepted payment methods
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterCriteria {
    pub segment: usize,
    pub age_min: i64,
    pub age_max: i64,
    pub payment_methods: BTreeSet<String>,
}

impl FilterCriteria {
    /// Criteria for `segment` over ages 18..=70 accepting no payment method yet
    pub fn new(segment: usize) -> Self {
        Self {
            segment,
            age_min: 18,
            age_max: 70,
            payment_methods: BTreeSet::new(),
        }
    }

    pub fn age_range(mut self, age_min: i64, age_max: i64) -> Self {
        self.age_min = age_min;
        self.age_max = age_max;
        self
    }

    pub fn payment_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.payment_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    fn matches(&self, record: &ConsumerRecord, segment: Option<usize>) -> bool {
        segment == Some(self.segment)
            && (self.age_min..=self.age_max).contains(&record.age)
            && self.payment_methods.contains(&record.payment_method)
    }
}

/// One record of a query subset with its labels
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentedRecord {
    #[serde(flatten)]
    pub record: ConsumerRecord,
    pub segment: usize,
    /// Label of the same record in the reference segmentation
    pub reference_segment: Option<usize>,
}

/// Income vs spending projection of a subset record, for scatter charts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub record_id: usize,
    pub annual_income: f64,
    pub spending_score: f64,
    pub payment_method: String,
    pub segment: usize,
}

/// Statistics over the filtered subset only
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopedSummary {
    pub record_count: usize,
    /// Mean age of subset records paying with the cash method
    pub average_payment_age: Stat<f64>,
}

/// High-income, high-spending consumers across the whole dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PotentialConsumers {
    pub count: usize,
    pub mean_age: f64,
    pub preferred_payment_method: String,
}

/// Statistics over the whole dataset, independent of the filter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalSummary {
    pub average_high_income_age: Stat<f64>,
    /// Most frequent payment method; equal counts resolve to the
    /// lexicographically smallest method, independent of row order
    pub preferred_payment_method: Stat<String>,
    pub potential_consumers: Stat<PotentialConsumers>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSummary {
    pub scoped: ScopedSummary,
    pub global: GlobalSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub criteria: FilterCriteria,
    pub subset: Vec<SegmentedRecord>,
    pub summary: AggregateSummary,
    pub scatter: Vec<ScatterPoint>,
}

/// Read-only query interface over a fitted segmentation
#[derive(Debug, Clone)]
pub struct QueryEngine<'a> {
    dataset: &'a Dataset,
    primary: Option<&'a SegmentAssignment>,
    reference: Option<&'a SegmentAssignment>,
    config: AggregationConfig,
}

impl<'a> QueryEngine<'a> {
    pub fn new(dataset: &'a Dataset, primary: &'a SegmentAssignment) -> Self {
        Self {
            dataset,
            primary: Some(primary),
            reference: None,
            config: AggregationConfig::default(),
        }
    }

    /// Engine over a dataset that could not be segmented; no record matches a segment
    pub fn unsegmented(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            primary: None,
            reference: None,
            config: AggregationConfig::default(),
        }
    }

    /// Attach the reference segmentation so subset rows carry both labels
    pub fn with_reference(mut self, reference: &'a SegmentAssignment) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_config(mut self, config: AggregationConfig) -> Self {
        self.config = config;
        self
    }

    /// Segment choices: primary labels in order of first appearance
    pub fn segment_ids(&self) -> Vec<usize> {
        self.primary.map(SegmentAssignment::segment_ids).unwrap_or_default()
    }

    /// Payment method choices in order of first appearance
    pub fn payment_methods(&self) -> Vec<String> {
        self.dataset.payment_methods()
    }

    /// Initial dashboard selection: first segment, ages 18..=70, every payment method
    pub fn default_criteria(&self) -> Option<FilterCriteria> {
        let segment = self.segment_ids().into_iter().next()?;
        Some(FilterCriteria::new(segment).payment_methods(self.payment_methods()))
    }

    /// Filter the dataset and compute the scoped and global summaries
    pub fn query(&self, criteria: &FilterCriteria) -> QueryResult {
        let subset: Vec<SegmentedRecord> = self
            .dataset
            .records()
            .iter()
            .filter_map(|record| {
                let segment = self.primary.and_then(|primary| primary.label_of(record.id));
                if !criteria.matches(record, segment) {
                    return None;
                }
                Some(SegmentedRecord {
                    record: record.clone(),
                    segment: segment?,
                    reference_segment: self.reference.and_then(|reference| reference.label_of(record.id)),
                })
            })
            .collect();

        let scatter = subset
            .iter()
            .filter_map(|row| {
                Some(ScatterPoint {
                    record_id: row.record.id,
                    annual_income: row.record.annual_income?,
                    spending_score: row.record.spending_score,
                    payment_method: row.record.payment_method.clone(),
                    segment: row.segment,
                })
            })
            .collect();

        let summary = AggregateSummary {
            scoped: self.scoped_summary(&subset),
            global: self.global_summary(),
        };

        QueryResult {
            criteria: criteria.clone(),
            subset,
            summary,
            scatter,
        }
    }

    fn scoped_summary(&self, subset: &[SegmentedRecord]) -> ScopedSummary {
        let cash_ages = subset
            .iter()
            .filter(|row| row.record.payment_method == self.config.cash_method)
            .map(|row| row.record.age);

        ScopedSummary {
            record_count: subset.len(),
            average_payment_age: mean_age(cash_ages).into(),
        }
    }

    /// Dataset-wide statistics; identical for every criteria
    pub fn global_summary(&self) -> GlobalSummary {
        let records = self.dataset.records();
        let high_income = |record: &ConsumerRecord| {
            record
                .annual_income
                .is_some_and(|income| income > self.config.high_income_threshold)
        };

        let average_high_income_age = mean_age(records.iter().filter(|record| high_income(*record)).map(|record| record.age));
        let preferred_payment_method = payment_mode(records.iter());

        let potential: Vec<&ConsumerRecord> = records
            .iter()
            .filter(|record| high_income(*record))
            .filter(|record| record.spending_score > self.config.spending_threshold)
            .collect();
        let potential_consumers = mean_age(potential.iter().map(|record| record.age)).and_then(|mean_age| {
            Some(PotentialConsumers {
                count: potential.len(),
                mean_age,
                preferred_payment_method: payment_mode(potential.iter().copied())?,
            })
        });

        GlobalSummary {
            average_high_income_age: average_high_income_age.into(),
            preferred_payment_method: preferred_payment_method.into(),
            potential_consumers: potential_consumers.into(),
        }
    }
}

fn mean_age(ages: impl Iterator<Item = i64>) -> Option<f64> {
    let (sum, count) = ages.fold((0i64, 0usize), |(sum, count), age| (sum + age, count + 1));
    (count > 0).then(|| sum as f64 / count as f64)
}

/// Most frequent payment method; ties go to the lexicographically smallest
fn payment_mode<'r>(records: impl Iterator<Item = &'r ConsumerRecord>) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.payment_method.as_str()).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(method, _)| method.to_string())
}
