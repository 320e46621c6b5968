//! Chart aggregations over the loaded cases.
//!
//! Everything here is a pure function of the record slice and the
//! [`Selection`]; nothing is cached between calls.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use num::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::filter::CaseFilter;
use crate::records::CaseRecord;

pub const NO_MORTALITY: &str = "No Mortality";
pub const MORTALITY: &str = "Mortality";

/// d3's schemeCategory10.
pub const CATEGORY10: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Survived vs. died in hospital
    Mortality,
    /// Operation type
    Optype,
    /// Anesthesia type
    AneType,
    /// Cases per age group
    Count,
    /// Count, mean duration, mean ICU stay and mortality rate
    Overview,
    /// Surgery duration against ICU stay, one point per case
    Scatter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub filter: CaseFilter,
    pub metric: Metric,
}

/// Colors used by the chart summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub survived: String,
    pub died: String,
    /// Bar of the selected age group
    pub highlight: String,
    pub base: String,
    pub scatter_survived: String,
    pub scatter_died: String,
    pub categorical: Vec<String>,
}

impl Default for Palette {
    fn default() -> Self {
        Palette {
            survived: "#4daf4a".to_string(),
            died: "#e41a1c".to_string(),
            highlight: "red".to_string(),
            base: "steelblue".to_string(),
            scatter_survived: "steelblue".to_string(),
            scatter_died: "orange".to_string(),
            categorical: CATEGORY10.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Palette {
    fn ordinal(&self, index: usize) -> String {
        if self.categorical.is_empty() {
            return self.base.clone();
        }
        self.categorical[index % self.categorical.len()].clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub label: String,
    pub value: usize,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalarSummary {
    pub count: usize,
    /// Mean surgery duration in hours
    pub avg_duration: Option<f64>,
    /// Mean ICU stay in days
    pub avg_icu_stay: Option<f64>,
    /// In-hospital mortality in percent
    pub mortality_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub subjectid: String,
    pub age: f64,
    pub department: String,
    pub opname: String,
    pub asa: u8,
    pub duration_hours: f64,
    pub icu_days: f64,
    pub blood_loss_ml: f64,
    pub died: bool,
    pub color: String,
    /// Whether the case passes the current filter
    pub highlighted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPlot {
    pub max_duration_hours: f64,
    pub max_icu_days: f64,
    pub points: Vec<ScatterPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Summary {
    Categories(Vec<CategorySummary>),
    Scalar(ScalarSummary),
    Scatter(ScatterPlot),
}

pub fn summarize(records: &[CaseRecord], selection: &Selection) -> Summary {
    summarize_with(records, selection, &Palette::default())
}

pub fn summarize_with(records: &[CaseRecord], selection: &Selection, palette: &Palette) -> Summary {
    let filter = &selection.filter;
    match selection.metric {
        Metric::Mortality => Summary::Categories(mortality(&filter.apply(records), palette)),
        Metric::Optype => {
            Summary::Categories(rollup(&filter.apply(records), |r| r.optype.as_str(), palette))
        }
        Metric::AneType => {
            Summary::Categories(rollup(&filter.apply(records), |r| r.ane_type.as_str(), palette))
        }
        Metric::Count => Summary::Categories(age_histogram(records, filter, palette)),
        Metric::Overview => Summary::Scalar(overview(&filter.apply(records))),
        Metric::Scatter => Summary::Scatter(scatter(records, filter, palette)),
    }
}

/// Both outcomes are always present, survivors first.
pub fn mortality(records: &[&CaseRecord], palette: &Palette) -> Vec<CategorySummary> {
    let died = records.iter().filter(|r| r.death_inhosp).count();
    vec![
        CategorySummary {
            label: NO_MORTALITY.to_string(),
            value: records.len() - died,
            color: palette.survived.clone(),
        },
        CategorySummary {
            label: MORTALITY.to_string(),
            value: died,
            color: palette.died.clone(),
        },
    ]
}

/// Count records per key, in order of first appearance.
pub fn rollup<F>(records: &[&CaseRecord], key: F, palette: &Palette) -> Vec<CategorySummary>
where
    F: Fn(&CaseRecord) -> &str,
{
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<CategorySummary> = Vec::new();

    for record in records {
        let label = key(*record);
        match index.get(label) {
            Some(&i) => groups[i].value += 1,
            None => {
                index.insert(label, groups.len());
                groups.push(CategorySummary {
                    label: label.to_string(),
                    value: 1,
                    color: palette.ordinal(groups.len()),
                });
            }
        }
    }

    groups
}

/// Cases per age group, ascending. The age dimension of the filter only
/// picks the highlighted bar.
pub fn age_histogram(
    records: &[CaseRecord],
    filter: &CaseFilter,
    palette: &Palette,
) -> Vec<CategorySummary> {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();

    for record in filter.without_age().apply(records) {
        *counts.entry(record.age_group()).or_default() += 1;
    }

    counts
        .into_iter()
        .map(|(group, value)| CategorySummary {
            label: group.to_string(),
            value,
            color: if filter.age_group == Some(group) {
                palette.highlight.clone()
            } else {
                palette.base.clone()
            },
        })
        .collect()
}

pub fn overview(records: &[&CaseRecord]) -> ScalarSummary {
    ScalarSummary {
        count: records.len(),
        avg_duration: mean(records.iter().map(|r| r.duration_hours())),
        avg_icu_stay: mean(records.iter().map(|r| r.icu_days)),
        mortality_rate: mean(records.iter().map(|r| u8::from(r.death_inhosp))).map(|m| m * 100.0),
    }
}

pub fn scatter(records: &[CaseRecord], filter: &CaseFilter, palette: &Palette) -> ScatterPlot {
    let points: Vec<ScatterPoint> = records
        .iter()
        .map(|r| ScatterPoint {
            subjectid: r.subjectid.clone(),
            age: r.age,
            department: r.department.clone(),
            opname: r.opname.clone(),
            asa: r.asa,
            duration_hours: r.duration_hours(),
            icu_days: r.icu_days,
            blood_loss_ml: r.intraop_ebl,
            died: r.death_inhosp,
            color: if r.death_inhosp {
                palette.scatter_died.clone()
            } else {
                palette.scatter_survived.clone()
            },
            highlighted: filter.matches(r),
        })
        .collect();

    ScatterPlot {
        max_duration_hours: points.iter().map(|p| p.duration_hours).fold(0.0, f64::max),
        max_icu_days: points.iter().map(|p| p.icu_days).fold(0.0, f64::max),
        points,
    }
}

/// Arithmetic mean, `None` for an empty input.
pub fn mean<I, T>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = T>,
    T: ToPrimitive,
{
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in values {
        sum += value.to_f64()?;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

impl CategorySummary {
    /// Percentage of `total`, as shown in the pie tooltip.
    pub fn share(&self, total: usize) -> Option<f64> {
        if total == 0 {
            None
        } else {
            Some(self.value as f64 / total as f64 * 100.0)
        }
    }
}

pub fn total(categories: &[CategorySummary]) -> usize {
    categories.iter().map(|c| c.value).sum()
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Mortality => "Mortality",
            Metric::Optype => "Operation Type",
            Metric::AneType => "Anesthesia Type",
            Metric::Count => "Count",
            Metric::Overview => "Overview",
            Metric::Scatter => "Duration vs. ICU Stay",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::case;

    fn sample() -> Vec<CaseRecord> {
        let mut died = case(25.0, "General surgery", "Colorectal", "General");
        died.death_inhosp = true;
        died.icu_days = 4.0;
        died.opend = 7200.0;

        let mut spinal = case(68.0, "Urology", "Others", "Spinal");
        spinal.asa = 3;

        vec![
            case(21.0, "General surgery", "Colorectal", "General"),
            case(29.0, "General surgery", "Biliary/Pancreas", "General"),
            died,
            case(64.0, "Thoracic surgery", "Lung", "General"),
            spinal,
            case(5.0, "General surgery", "Colorectal", "Sedationalgesia"),
        ]
    }

    fn select(metric: Metric, filter: CaseFilter) -> Selection {
        Selection { filter, metric }
    }

    fn categories(summary: Summary) -> Vec<CategorySummary> {
        match summary {
            Summary::Categories(c) => c,
            other => panic!("expected categories, got {:?}", other),
        }
    }

    #[test]
    fn test_mortality_always_two_entries() {
        let records = sample();
        let filter = CaseFilter {
            age_group: Some(60),
            ..Default::default()
        };
        let result = categories(summarize(&records, &select(Metric::Mortality, filter)));

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].label, NO_MORTALITY);
        assert_eq!(result[0].value, 2);
        assert_eq!(result[1].label, MORTALITY);
        assert_eq!(result[1].value, 0);
        assert_eq!(result[1].color, "#e41a1c");
    }

    #[test]
    fn test_mortality_on_empty_selection() {
        let records = sample();
        let filter = CaseFilter {
            age_group: Some(90),
            ..Default::default()
        };
        let result = categories(summarize(&records, &select(Metric::Mortality, filter)));
        assert_eq!(result.len(), 2);
        assert_eq!(total(&result), 0);
        assert_eq!(result[0].share(total(&result)), None);
    }

    #[test]
    fn test_rollup_first_appearance_order_and_colors() {
        let records = sample();
        let filter = CaseFilter {
            age_group: Some(20),
            ..Default::default()
        };
        let result = categories(summarize(&records, &select(Metric::Optype, filter)));

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].label, "Colorectal");
        assert_eq!(result[0].value, 2);
        assert_eq!(result[0].color, CATEGORY10[0]);
        assert_eq!(result[1].label, "Biliary/Pancreas");
        assert_eq!(result[1].color, CATEGORY10[1]);
    }

    #[test]
    fn test_ordinal_colors_cycle() {
        let palette = Palette {
            categorical: vec!["a".to_string(), "b".to_string()],
            ..Default::default()
        };
        let records: Vec<CaseRecord> = ["x", "y", "z"]
            .iter()
            .map(|t| case(30.0, "Urology", t, "General"))
            .collect();
        let refs: Vec<&CaseRecord> = records.iter().collect();
        let result = rollup(&refs, |r| r.optype.as_str(), &palette);
        let colors: Vec<&str> = result.iter().map(|c| c.color.as_str()).collect();
        assert_eq!(colors, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_category_counts_sum_to_filtered_count() {
        let records = sample();
        let filters = vec![
            CaseFilter::default(),
            CaseFilter {
                department: Some("General surgery".to_string()),
                ..Default::default()
            },
            CaseFilter {
                age_group: Some(20),
                ..Default::default()
            },
            CaseFilter {
                asa: Some(3),
                ..Default::default()
            },
            CaseFilter {
                age_group: Some(40),
                ..Default::default()
            },
        ];

        for filter in filters {
            let expected = filter.apply(&records).len();
            for metric in [Metric::Mortality, Metric::Optype, Metric::AneType] {
                let result = categories(summarize(&records, &select(metric, filter.clone())));
                assert_eq!(total(&result), expected, "{metric:?} with {filter:?}");
            }

            let expected = filter.without_age().apply(&records).len();
            let result = categories(summarize(&records, &select(Metric::Count, filter.clone())));
            assert_eq!(total(&result), expected);
        }
    }

    #[test]
    fn test_age_histogram_sorted_with_highlight() {
        let records = sample();
        let filter = CaseFilter {
            age_group: Some(20),
            ..Default::default()
        };
        let result = categories(summarize(&records, &select(Metric::Count, filter)));

        let labels: Vec<&str> = result.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["0", "20", "60"]);
        assert_eq!(result[1].value, 3);
        assert_eq!(result[1].color, "red");
        assert_eq!(result[0].color, "steelblue");
        assert_eq!(result[2].value, 2);
    }

    #[test]
    fn test_overview_means() {
        let records = sample();
        let filter = CaseFilter {
            age_group: Some(20),
            ..Default::default()
        };
        let summary = match summarize(&records, &select(Metric::Overview, filter)) {
            Summary::Scalar(s) => s,
            other => panic!("expected scalar, got {:?}", other),
        };

        assert_eq!(summary.count, 3);
        let duration = summary.avg_duration.unwrap();
        assert!((duration - 4.0 / 3.0).abs() < 1e-9);
        assert!((summary.avg_icu_stay.unwrap() - 4.0 / 3.0).abs() < 1e-9);
        assert!((summary.mortality_rate.unwrap() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_overview_not_available_iff_empty() {
        let records = sample();
        let empty = overview(&[]);
        assert_eq!(empty.count, 0);
        assert_eq!(empty.avg_duration, None);
        assert_eq!(empty.avg_icu_stay, None);
        assert_eq!(empty.mortality_rate, None);

        // zero-valued means are still available
        let survivors: Vec<&CaseRecord> = records.iter().filter(|r| !r.death_inhosp).collect();
        let summary = overview(&survivors);
        assert_eq!(summary.mortality_rate, Some(0.0));
        assert_eq!(summary.avg_icu_stay, Some(0.0));
    }

    #[test]
    fn test_scatter_highlights_filtered_cases() {
        let records = sample();
        let filter = CaseFilter {
            department: Some("Urology".to_string()),
            ..Default::default()
        };
        let plot = match summarize(&records, &select(Metric::Scatter, filter)) {
            Summary::Scatter(p) => p,
            other => panic!("expected scatter, got {:?}", other),
        };

        assert_eq!(plot.points.len(), records.len());
        assert_eq!(plot.points.iter().filter(|p| p.highlighted).count(), 1);
        assert_eq!(plot.max_duration_hours, 2.0);
        assert_eq!(plot.max_icu_days, 4.0);
        let died: Vec<&ScatterPoint> = plot.points.iter().filter(|p| p.died).collect();
        assert_eq!(died.len(), 1);
        assert_eq!(died[0].color, "orange");
    }

    #[test]
    fn test_summarize_is_idempotent() {
        let records = sample();
        let before = records.clone();
        for metric in [
            Metric::Mortality,
            Metric::Optype,
            Metric::AneType,
            Metric::Count,
            Metric::Overview,
            Metric::Scatter,
        ] {
            let selection = select(metric, CaseFilter::default());
            assert_eq!(summarize(&records, &selection), summarize(&records, &selection));
        }
        assert_eq!(records, before);
    }

    #[test]
    fn test_mean_empty_is_none() {
        assert_eq!(mean(Vec::<f64>::new()), None);
        assert_eq!(mean(vec![1u8, 0, 1, 0]), Some(0.5));
    }

    #[test]
    fn test_age_histogram_extreme_age_bucket() {
        let records = vec![
            case(1e12, "Urology", "Others", "Spinal"),
            case(12.0, "Urology", "Others", "Spinal"),
        ];
        let result = age_histogram(&records, &CaseFilter::default(), &Palette::default());
        let labels: Vec<&str> = result.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["10".to_string(), u32::MAX.to_string()]);
    }
}
