//! One summary per school, with a "before" and an "after" snapshot.
//!
//! ```text
//! A 13-14 ─┐                       A: info (first row), before = 13-14, after = 14-15
//! A 14-15 ─┤ ──── single pass ───▶ B: info (first row), before = 13-14, after = none
//! B 13-14 ─┘
//! ```
//!
//! Descriptive fields always come from a school's first row in input order,
//! and schools are listed in first-seen order. Which rows become `before` and
//! `after` is configured by [`JoinOptions`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_COMPARISON_YEAR;
use crate::models::{DemographicRecord, SchoolSummary, Snapshot};

/// How the `before` snapshot is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BeforePolicy {
    /// Smallest year label; ties keep the earlier row.
    #[default]
    EarliestYear,
    /// The school's first row, whatever its year.
    FirstSeen,
}

/// Which year fills the `after` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonYear {
    /// Rows whose short label equals this one.
    Label(String),
    /// Each school's greatest year label.
    Latest,
}

impl Default for ComparisonYear {
    fn default() -> Self {
        Self::Label(DEFAULT_COMPARISON_YEAR.to_string())
    }
}

impl ComparisonYear {
    /// `"latest"` (any case) selects [`ComparisonYear::Latest`], anything else is a label.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("latest") {
            Self::Latest
        } else {
            Self::Label(raw.to_string())
        }
    }
}

impl std::fmt::Display for ComparisonYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Label(label) => write!(f, "{}", label),
            Self::Latest => write!(f, "latest"),
        }
    }
}

/// Which row wins when several match the comparison year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DuplicatePolicy {
    #[default]
    LastWins,
    FirstWins,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOptions {
    pub comparison_year: ComparisonYear,
    pub before: BeforePolicy,
    pub duplicates: DuplicatePolicy,
}

impl JoinOptions {
    pub fn comparing(year: impl Into<String>) -> Self {
        Self {
            comparison_year: ComparisonYear::Label(year.into()),
            ..Self::default()
        }
    }
}

/// Build one summary per distinct school id.
pub fn join_schools(records: &[DemographicRecord], options: &JoinOptions) -> Vec<SchoolSummary> {
    let mut summaries: Vec<SchoolSummary> = Vec::new();
    let mut index_by_id: HashMap<&str, usize> = HashMap::new();
    // Year label behind each summary's `after`, for `Latest` comparisons.
    let mut after_years: Vec<Option<&str>> = Vec::new();

    for record in records {
        let idx = match index_by_id.get(record.school_id.as_str()) {
            Some(&idx) => {
                if options.before == BeforePolicy::EarliestYear {
                    let summary = &mut summaries[idx];
                    let is_earlier = summary
                        .before
                        .as_ref()
                        .map_or(true, |b| record.year.short < b.short_year);
                    if is_earlier {
                        summary.before = Some(Snapshot::from(record));
                    }
                }
                idx
            }
            None => {
                let idx = summaries.len();
                index_by_id.insert(record.school_id.as_str(), idx);
                summaries.push(SchoolSummary {
                    school_id: record.school_id.clone(),
                    info: record.info.clone(),
                    before: Some(Snapshot::from(record)),
                    after: None,
                });
                after_years.push(None);
                idx
            }
        };

        let takes_after = match &options.comparison_year {
            ComparisonYear::Label(label) => {
                record.year.short == *label
                    && (options.duplicates == DuplicatePolicy::LastWins || summaries[idx].after.is_none())
            }
            ComparisonYear::Latest => match after_years[idx] {
                None => true,
                Some(current) => match options.duplicates {
                    DuplicatePolicy::LastWins => record.year.short.as_str() >= current,
                    DuplicatePolicy::FirstWins => record.year.short.as_str() > current,
                },
            },
        };

        if takes_after {
            summaries[idx].after = Some(Snapshot::from(record));
            after_years[idx] = Some(record.year.short.as_str());
        }
    }

    summaries
}

/// Distinct year labels, ascending.
pub fn available_years(records: &[DemographicRecord]) -> Vec<String> {
    let mut years: Vec<String> = records.iter().map(|r| r.year.short.clone()).collect();
    years.sort();
    years.dedup();
    years
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AcademicYear, Demographics, SchoolInfo};

    fn rec(id: &str, year: &str, w: u64, b: u64) -> DemographicRecord {
        DemographicRecord::new(id, AcademicYear::new(year), Demographics::new(w, b, 0, 0))
    }

    fn named(id: &str, year: &str, w: u64, name: &str) -> DemographicRecord {
        rec(id, year, w, 0).with_info(SchoolInfo {
            name: name.to_string(),
            ..SchoolInfo::default()
        })
    }

    #[test]
    fn test_before_and_after() {
        let records = vec![rec("A", "13-14", 10, 5), rec("A", "14-15", 8, 6)];
        let schools = join_schools(&records, &JoinOptions::comparing("14-15"));

        assert_eq!(schools.len(), 1);
        let a = &schools[0];
        assert_eq!(a.school_id, "A");
        assert_eq!(a.before.as_ref().unwrap().total, 15);
        assert_eq!(a.after.as_ref().unwrap().total, 14);
        assert!(a.has_comparison());
        assert_eq!(a.delta(crate::models::Category::White), Some(-2));
    }

    #[test]
    fn test_missing_comparison_year_is_absent() {
        let schools = join_schools(&[rec("B", "13-14", 1, 1)], &JoinOptions::comparing("14-15"));

        assert_eq!(schools.len(), 1);
        assert!(schools[0].before.is_some());
        assert!(schools[0].after.is_none());
        assert!(!schools[0].has_comparison());
    }

    #[test]
    fn test_first_seen_order_and_descriptive_fields() {
        let records = vec![
            named("B", "13-14", 1, "Beta"),
            named("A", "13-14", 2, "Alpha"),
            named("B", "14-15", 3, "Beta (renamed)"),
        ];
        let schools = join_schools(&records, &JoinOptions::default());

        let ids: Vec<&str> = schools.iter().map(|s| s.school_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A"]);
        assert_eq!(schools[0].info.name, "Beta");
    }

    #[test]
    fn test_before_policy() {
        let records = vec![rec("A", "14-15", 8, 6), rec("A", "13-14", 10, 5)];

        let earliest = join_schools(&records, &JoinOptions::default());
        assert_eq!(earliest[0].before.as_ref().unwrap().short_year, "13-14");

        let first_seen = JoinOptions {
            before: BeforePolicy::FirstSeen,
            ..JoinOptions::default()
        };
        let schools = join_schools(&records, &first_seen);
        assert_eq!(schools[0].before.as_ref().unwrap().short_year, "14-15");
    }

    #[test]
    fn test_duplicate_policy() {
        let records = vec![rec("A", "13-14", 1, 0), rec("A", "14-15", 5, 0), rec("A", "14-15", 7, 0)];

        let last = join_schools(&records, &JoinOptions::comparing("14-15"));
        assert_eq!(last[0].after.as_ref().unwrap().counts.white, 7);

        let first = JoinOptions {
            duplicates: DuplicatePolicy::FirstWins,
            ..JoinOptions::comparing("14-15")
        };
        let schools = join_schools(&records, &first);
        assert_eq!(schools[0].after.as_ref().unwrap().counts.white, 5);
    }

    #[test]
    fn test_latest_comparison() {
        let records = vec![
            rec("A", "15-16", 9, 0),
            rec("A", "13-14", 1, 0),
            rec("A", "14-15", 5, 0),
            rec("B", "13-14", 2, 0),
        ];
        let options = JoinOptions {
            comparison_year: ComparisonYear::Latest,
            ..JoinOptions::default()
        };
        let schools = join_schools(&records, &options);

        assert_eq!(schools[0].before.as_ref().unwrap().short_year, "13-14");
        assert_eq!(schools[0].after.as_ref().unwrap().short_year, "15-16");
        // A single-year school compares its only year with itself.
        assert_eq!(schools[1].after.as_ref().unwrap().short_year, "13-14");
    }

    #[test]
    fn test_latest_duplicate_policy() {
        let records = vec![rec("A", "13-14", 1, 0), rec("A", "15-16", 5, 0), rec("A", "15-16", 7, 0)];
        let latest = JoinOptions {
            comparison_year: ComparisonYear::Latest,
            ..JoinOptions::default()
        };

        let last = join_schools(&records, &latest);
        assert_eq!(last[0].after.as_ref().unwrap().short_year, "15-16");
        assert_eq!(last[0].after.as_ref().unwrap().counts.white, 7);

        let first = JoinOptions {
            duplicates: DuplicatePolicy::FirstWins,
            ..latest.clone()
        };
        let schools = join_schools(&records, &first);
        assert_eq!(schools[0].after.as_ref().unwrap().counts.white, 5);
        assert_eq!(schools[0].before.as_ref().unwrap().counts.white, 1);
    }

    #[test]
    fn test_snapshots_come_from_input() {
        let records = vec![rec("A", "13-14", 10, 5), rec("B", "14-15", 3, 3), rec("A", "14-15", 8, 6)];
        let schools = join_schools(&records, &JoinOptions::default());

        for school in &schools {
            for snap in school.before.iter().chain(school.after.iter()) {
                assert!(records.iter().any(|r| r.school_id == school.school_id
                    && r.year.short == snap.short_year
                    && r.counts == snap.counts));
            }
        }
    }

    #[test]
    fn test_empty_and_idempotent() {
        assert!(join_schools(&[], &JoinOptions::default()).is_empty());

        let records = vec![rec("A", "13-14", 10, 5), rec("A", "14-15", 8, 6)];
        let options = JoinOptions::default();
        let first = serde_json::to_value(join_schools(&records, &options)).unwrap();
        let second = serde_json::to_value(join_schools(&records, &options)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_available_years() {
        let records = vec![rec("A", "14-15", 0, 0), rec("B", "13-14", 0, 0), rec("C", "14-15", 0, 0)];
        assert_eq!(available_years(&records), vec!["13-14", "14-15"]);
    }

    #[test]
    fn test_comparison_year_display() {
        assert_eq!(ComparisonYear::default().to_string(), "14-15");
        assert_eq!(ComparisonYear::Latest.to_string(), "latest");
    }

    #[test]
    fn test_comparison_year_parse() {
        assert_eq!(ComparisonYear::parse(" 15-16 "), ComparisonYear::Label("15-16".into()));
        assert_eq!(ComparisonYear::parse("Latest"), ComparisonYear::Latest);
    }
}
