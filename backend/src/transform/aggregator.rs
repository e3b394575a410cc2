//! Roll records up by academic year for the stacked-bar chart.
//!
//! ```text
//! A 13-14 (10,5,0,0) ┐                 13-14  white [0,12) black [12,20) other [20,20) hispanic [20,23)
//! B 13-14 ( 2,3,0,3) ┘ ──────────▶
//! A 14-15 ( 8,6,0,0) ───────────▶      14-15  white [0,8)  black [8,14)  other [14,14) hispanic [14,14)
//! ```
//!
//! The category domain is fixed once from the first aggregate and reused for
//! every year so stack order and colors never shift between bars.

use std::collections::BTreeMap;

use crate::models::{Category, DemographicRecord, Demographics, LegendEntry, StackSegment, YearlyAggregate};

/// Group records by short year label, ascending, and stack each year.
///
/// Empty input yields an empty vector.
pub fn aggregate_by_year(records: &[DemographicRecord]) -> Vec<YearlyAggregate> {
    let mut by_year: BTreeMap<&str, Demographics> = BTreeMap::new();
    for record in records {
        by_year
            .entry(record.year.short.as_str())
            .or_default()
            .accumulate(&record.counts);
    }

    let Some(first) = by_year.values().next() else {
        return Vec::new();
    };
    let domain: Vec<Category> = first.entries().map(|(category, _)| category).collect();

    by_year
        .iter()
        .map(|(year, counts)| {
            let segments = stack_segments(counts, &domain);
            let total = segments.last().map_or(0, |s| s.end);
            YearlyAggregate {
                year: year.to_string(),
                counts: *counts,
                total,
                stack_segments: segments,
            }
        })
        .collect()
}

/// Walk `domain` in order, one contiguous `[start, end)` band per category.
///
/// Zero counts still yield a zero-width band.
pub fn stack_segments(counts: &Demographics, domain: &[Category]) -> Vec<StackSegment> {
    let mut offset = 0u64;
    domain
        .iter()
        .map(|&category| {
            let start = offset;
            offset = offset.saturating_add(counts.get(category));
            StackSegment {
                category,
                start,
                end: offset,
            }
        })
        .collect()
}

/// The fixed category domain, read back from the first aggregate.
pub fn category_domain(aggregates: &[YearlyAggregate]) -> Vec<Category> {
    aggregates
        .first()
        .map(|a| a.stack_segments.iter().map(|s| s.category).collect())
        .unwrap_or_default()
}

pub fn legend(aggregates: &[YearlyAggregate]) -> Vec<LegendEntry> {
    category_domain(aggregates).into_iter().map(LegendEntry::from).collect()
}

/// Largest yearly total, for the chart's y-domain.
pub fn max_total(aggregates: &[YearlyAggregate]) -> u64 {
    aggregates.iter().map(|a| a.total).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AcademicYear;

    fn rec(id: &str, year: &str, w: u64, b: u64, o: u64, h: u64) -> DemographicRecord {
        DemographicRecord::new(id, AcademicYear::new(year), Demographics::new(w, b, o, h))
    }

    fn assert_contiguous(agg: &YearlyAggregate) {
        assert_eq!(agg.stack_segments[0].start, 0);
        for pair in agg.stack_segments.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(agg.stack_segments.last().unwrap().end, agg.total);
    }

    #[test]
    fn test_two_years_one_school() {
        let records = vec![rec("A", "13-14", 10, 5, 0, 0), rec("A", "14-15", 8, 6, 0, 0)];
        let aggs = aggregate_by_year(&records);

        assert_eq!(aggs.len(), 2);
        assert_eq!(aggs[0].year, "13-14");
        assert_eq!(aggs[0].total, 15);
        assert_eq!(aggs[1].year, "14-15");
        assert_eq!(aggs[1].total, 14);
    }

    #[test]
    fn test_sums_across_schools_and_sorts_years() {
        let records = vec![
            rec("A", "14-15", 8, 6, 0, 0),
            rec("A", "13-14", 10, 5, 0, 0),
            rec("B", "13-14", 2, 3, 0, 3),
            rec("C", "12-13", 1, 0, 0, 0),
        ];
        let aggs = aggregate_by_year(&records);

        let years: Vec<&str> = aggs.iter().map(|a| a.year.as_str()).collect();
        assert_eq!(years, vec!["12-13", "13-14", "14-15"]);

        let y1314 = &aggs[1];
        assert_eq!(y1314.counts, Demographics::new(12, 8, 0, 3));
        assert_eq!(y1314.total, 23);
        assert_eq!(
            y1314.stack_segments,
            vec![
                StackSegment { category: Category::White, start: 0, end: 12 },
                StackSegment { category: Category::Black, start: 12, end: 20 },
                StackSegment { category: Category::Other, start: 20, end: 20 },
                StackSegment { category: Category::Hispanic, start: 20, end: 23 },
            ]
        );
        for agg in &aggs {
            assert_contiguous(agg);
        }
    }

    #[test]
    fn test_total_matches_input_sum_per_year() {
        let records = vec![
            rec("A", "13-14", 3, 4, 5, 6),
            rec("B", "13-14", 7, 0, 1, 2),
            rec("C", "14-15", 9, 9, 9, 9),
        ];
        let aggs = aggregate_by_year(&records);

        for agg in &aggs {
            let expected: u64 = records
                .iter()
                .filter(|r| r.year.short == agg.year)
                .map(|r| r.total())
                .sum();
            assert_eq!(agg.total, expected);
            assert_eq!(agg.counts.total(), expected);
        }
    }

    #[test]
    fn test_zero_category_keeps_segment() {
        let aggs = aggregate_by_year(&[rec("A", "13-14", 0, 0, 0, 0)]);

        assert_eq!(aggs[0].stack_segments.len(), 4);
        assert!(aggs[0].stack_segments.iter().all(|s| s.width() == 0));
        assert_eq!(aggs[0].total, 0);
        assert_eq!(aggs[0].share(Category::White), None);
    }

    #[test]
    fn test_domain_is_stable_across_years() {
        let aggs = aggregate_by_year(&[rec("A", "13-14", 1, 0, 0, 0), rec("A", "14-15", 0, 0, 0, 7)]);
        let domain = category_domain(&aggs);

        assert_eq!(domain, Category::ALL.to_vec());
        for agg in &aggs {
            let order: Vec<Category> = agg.stack_segments.iter().map(|s| s.category).collect();
            assert_eq!(order, domain);
        }
        assert_eq!(legend(&aggs)[3].color, "#ff8c00");
    }

    #[test]
    fn test_empty_input() {
        let aggs = aggregate_by_year(&[]);
        assert!(aggs.is_empty());
        assert!(category_domain(&aggs).is_empty());
        assert_eq!(max_total(&aggs), 0);
    }

    #[test]
    fn test_idempotent() {
        let records = vec![rec("A", "13-14", 10, 5, 0, 0), rec("B", "14-15", 1, 2, 3, 4)];
        assert_eq!(aggregate_by_year(&records), aggregate_by_year(&records));
        assert_eq!(max_total(&aggregate_by_year(&records)), 15);
    }
}
