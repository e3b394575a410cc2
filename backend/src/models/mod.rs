//! Domain models for the schoolmix pipeline.
//!
//! - [`DemographicRecord`] - one school's counts for one academic year (canonical input)
//! - [`AcademicYear`] - short (`14-15`) and full (`2014-2015`) year labels
//! - [`Demographics`] - race/ethnicity counts
//! - [`Category`] - the four demographic categories
//! - [`SchoolLevel`] / [`SchoolInfo`] / [`Coordinates`] - descriptive school fields
//! - [`YearlyAggregate`] / [`StackSegment`] - stacked-bar view
//! - [`SchoolSummary`] / [`Snapshot`] - before/after view

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// =============================================================================
// Category
// =============================================================================

/// A race/ethnicity category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    White,
    Black,
    Other,
    Hispanic,
}

impl Category {
    /// Field order of [`Demographics`].
    pub const ALL: [Category; 4] = [
        Category::White,
        Category::Black,
        Category::Other,
        Category::Hispanic,
    ];

    /// Column / JSON key.
    pub fn key(&self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Black => "black",
            Self::Other => "other",
            Self::Hispanic => "hispanic",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::White => "White",
            Self::Black => "Black",
            Self::Other => "Other",
            Self::Hispanic => "Hispanic",
        }
    }

    /// Legend and stack band color.
    pub fn color(&self) -> &'static str {
        match self {
            Self::White => "#98abc5",
            Self::Black => "#8a89a6",
            Self::Other => "#a05d56",
            Self::Hispanic => "#ff8c00",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.key().eq_ignore_ascii_case(key.trim()))
    }
}

// =============================================================================
// Demographics
// =============================================================================

/// Counts per category. The total is always derived, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demographics {
    pub white: u64,
    pub black: u64,
    pub other: u64,
    pub hispanic: u64,
}

impl Demographics {
    pub fn new(white: u64, black: u64, other: u64, hispanic: u64) -> Self {
        Self {
            white,
            black,
            other,
            hispanic,
        }
    }

    pub fn get(&self, category: Category) -> u64 {
        match category {
            Category::White => self.white,
            Category::Black => self.black,
            Category::Other => self.other,
            Category::Hispanic => self.hispanic,
        }
    }

    pub fn set(&mut self, category: Category, value: u64) {
        match category {
            Category::White => self.white = value,
            Category::Black => self.black = value,
            Category::Other => self.other = value,
            Category::Hispanic => self.hispanic = value,
        }
    }

    /// Category/count pairs in field order.
    pub fn entries(&self) -> impl Iterator<Item = (Category, u64)> + '_ {
        Category::ALL.into_iter().map(move |c| (c, self.get(c)))
    }

    /// Adds `other` into `self`, saturating.
    pub fn accumulate(&mut self, other: &Demographics) {
        for category in Category::ALL {
            let sum = self.get(category).saturating_add(other.get(category));
            self.set(category, sum);
        }
    }

    pub fn total(&self) -> u64 {
        self.entries()
            .fold(0u64, |acc, (_, count)| acc.saturating_add(count))
    }
}

// =============================================================================
// Academic Year
// =============================================================================

static SHORT_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{2}-\d{2}$").expect("static pattern")
});

static FULL_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\d{2})?(\d{2})\s*[-/]\s*(?:\d{2})?(\d{2})$")
        .expect("static pattern")
});

/// An academic year. Ordering and grouping use `short` only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AcademicYear {
    /// Compact label, e.g. `14-15`.
    pub short: String,
    /// Long label, e.g. `2014-2015`, when the source provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full: Option<String>,
}

impl AcademicYear {
    pub fn new(short: impl Into<String>) -> Self {
        Self {
            short: short.into(),
            full: None,
        }
    }

    pub fn with_full(mut self, full: impl Into<String>) -> Self {
        self.full = Some(full.into());
        self
    }

    /// Builds a year from whichever labels are present.
    ///
    /// A missing short label is derived from the full one
    /// (`2014-2015` → `14-15`). Returns `None` when neither yields a label.
    pub fn from_labels(short: Option<&str>, full: Option<&str>) -> Option<Self> {
        let full = full.map(str::trim).filter(|s| !s.is_empty());
        let short = match short.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => s.to_string(),
            None => Self::short_from_full(full?)?,
        };
        Some(Self {
            short,
            full: full.map(String::from),
        })
    }

    /// `2014-2015`, `2014/15` or `14-15` → `14-15`.
    pub fn short_from_full(full: &str) -> Option<String> {
        let caps = FULL_YEAR.captures(full.trim())?;
        Some(format!("{}-{}", &caps[1], &caps[2]))
    }

    /// Whether `short` has the `NN-NN` shape that sorts correctly as a string.
    pub fn is_well_formed(&self) -> bool {
        SHORT_YEAR.is_match(&self.short)
    }
}

// =============================================================================
// School descriptive fields
// =============================================================================

/// School level, parsed from `E`/`M`/`H` codes or words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchoolLevel {
    Elementary,
    Middle,
    High,
    #[default]
    Other,
}

impl SchoolLevel {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "E" | "ES" | "ELEMENTARY" => Self::Elementary,
            "M" | "MS" | "MIDDLE" => Self::Middle,
            "H" | "HS" | "HIGH" => Self::High,
            _ => Self::Other,
        }
    }

    /// Map marker fill color.
    pub fn marker_color(&self) -> &'static str {
        match self {
            Self::Elementary => "#A34E24",
            Self::Middle => "#EA7D24",
            Self::High => "#796E24",
            Self::Other => "#9B539C",
        }
    }
}

/// Geographic position. `NaN` marks an unlocated school.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn unlocated() -> Self {
        Self::new(f64::NAN, f64::NAN)
    }

    /// True when both values are finite and within WGS84 bounds.
    pub fn is_located(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl Default for Coordinates {
    fn default() -> Self {
        Self::unlocated()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SchoolInfo {
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub level: SchoolLevel,
    pub coordinates: Coordinates,
}

// =============================================================================
// Demographic Record (canonical input)
// =============================================================================

/// One school's counts for one academic year, after normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemographicRecord {
    pub school_id: String,
    pub year: AcademicYear,
    pub counts: Demographics,
    /// Total as supplied by the source; kept for validation only.
    pub reported_total: Option<u64>,
    pub info: SchoolInfo,
}

impl DemographicRecord {
    pub fn new(school_id: impl Into<String>, year: AcademicYear, counts: Demographics) -> Self {
        Self {
            school_id: school_id.into(),
            year,
            counts,
            reported_total: None,
            info: SchoolInfo::default(),
        }
    }

    pub fn with_info(mut self, info: SchoolInfo) -> Self {
        self.info = info;
        self
    }

    pub fn with_reported_total(mut self, total: u64) -> Self {
        self.reported_total = Some(total);
        self
    }

    /// Sum of the category counts.
    pub fn total(&self) -> u64 {
        self.counts.total()
    }

    /// False only when a total was supplied and disagrees with the counts.
    pub fn total_is_consistent(&self) -> bool {
        self.reported_total.map_or(true, |t| t == self.total())
    }
}

// =============================================================================
// Stacked-bar view
// =============================================================================

/// One category's band inside a yearly stacked bar: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StackSegment {
    pub category: Category,
    pub start: u64,
    pub end: u64,
}

impl StackSegment {
    pub fn width(&self) -> u64 {
        self.end - self.start
    }
}

/// Counts summed across all schools for one academic year.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyAggregate {
    pub year: String,
    #[serde(flatten)]
    pub counts: Demographics,
    pub total: u64,
    pub stack_segments: Vec<StackSegment>,
}

impl YearlyAggregate {
    /// Category share in percent, `None` for an empty year.
    pub fn share(&self, category: Category) -> Option<f64> {
        percentage(self.counts.get(category), self.total)
    }
}

/// Legend entry, one per category of the fixed domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendEntry {
    pub category: Category,
    pub label: &'static str,
    pub color: &'static str,
}

impl From<Category> for LegendEntry {
    fn from(category: Category) -> Self {
        Self {
            category,
            label: category.label(),
            color: category.color(),
        }
    }
}

// =============================================================================
// Before/after view
// =============================================================================

/// A school's counts for one year, as shown in the comparison table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub short_year: String,
    #[serde(flatten)]
    pub counts: Demographics,
    pub total: u64,
}

impl Snapshot {
    pub fn share(&self, category: Category) -> Option<f64> {
        percentage(self.counts.get(category), self.total)
    }
}

impl From<&DemographicRecord> for Snapshot {
    fn from(record: &DemographicRecord) -> Self {
        Self {
            short_year: record.year.short.clone(),
            counts: record.counts,
            total: record.total(),
        }
    }
}

/// One school with its before and after snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolSummary {
    pub school_id: String,
    pub info: SchoolInfo,
    pub before: Option<Snapshot>,
    /// `None` means "no comparison data" for this school.
    pub after: Option<Snapshot>,
}

impl SchoolSummary {
    pub fn has_comparison(&self) -> bool {
        self.before.is_some() && self.after.is_some()
    }

    /// Change in a category's count from before to after.
    pub fn delta(&self, category: Category) -> Option<i128> {
        let before = self.before.as_ref()?.counts.get(category) as i128;
        let after = self.after.as_ref()?.counts.get(category) as i128;
        Some(after - before)
    }
}

fn percentage(part: u64, total: u64) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(part as f64 / total as f64 * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demographics_total_and_accumulate() {
        let mut a = Demographics::new(10, 5, 0, 2);
        assert_eq!(a.total(), 17);

        a.accumulate(&Demographics::new(1, 1, 1, 1));
        assert_eq!(a, Demographics::new(11, 6, 1, 3));
        assert_eq!(a.total(), 21);
    }

    #[test]
    fn test_demographics_saturates() {
        let mut a = Demographics::new(u64::MAX, 0, 0, 0);
        a.accumulate(&Demographics::new(1, 0, 0, 0));
        assert_eq!(a.white, u64::MAX);
        assert_eq!(Demographics::new(u64::MAX, 1, 0, 0).total(), u64::MAX);
    }

    #[test]
    fn test_entries_follow_field_order() {
        let keys: Vec<&str> = Demographics::default()
            .entries()
            .map(|(c, _)| c.key())
            .collect();
        assert_eq!(keys, vec!["white", "black", "other", "hispanic"]);
    }

    #[test]
    fn test_category_from_key() {
        assert_eq!(Category::from_key("Hispanic"), Some(Category::Hispanic));
        assert_eq!(Category::from_key(" black "), Some(Category::Black));
        assert_eq!(Category::from_key("asian"), None);
    }

    #[test]
    fn test_academic_year_from_full() {
        assert_eq!(AcademicYear::short_from_full("2014-2015").as_deref(), Some("14-15"));
        assert_eq!(AcademicYear::short_from_full("2014/15").as_deref(), Some("14-15"));
        assert_eq!(AcademicYear::short_from_full("fall 2014"), None);

        let year = AcademicYear::from_labels(None, Some("2013-2014")).unwrap();
        assert_eq!(year.short, "13-14");
        assert_eq!(year.full.as_deref(), Some("2013-2014"));

        let year = AcademicYear::from_labels(Some("14-15"), Some("")).unwrap();
        assert_eq!(year, AcademicYear::new("14-15"));

        assert!(AcademicYear::from_labels(Some("  "), None).is_none());
    }

    #[test]
    fn test_academic_year_well_formed() {
        assert!(AcademicYear::new("13-14").is_well_formed());
        assert!(!AcademicYear::new("2013").is_well_formed());
    }

    #[test]
    fn test_school_level_parse() {
        assert_eq!(SchoolLevel::parse("E"), SchoolLevel::Elementary);
        assert_eq!(SchoolLevel::parse("middle"), SchoolLevel::Middle);
        assert_eq!(SchoolLevel::parse(" h "), SchoolLevel::High);
        assert_eq!(SchoolLevel::parse("Alternative"), SchoolLevel::Other);
        assert_eq!(SchoolLevel::High.marker_color(), "#796E24");
    }

    #[test]
    fn test_coordinates_located() {
        assert!(Coordinates::new(38.52, -76.97).is_located());
        assert!(!Coordinates::unlocated().is_located());
        assert!(!Coordinates::new(120.0, 0.0).is_located());
    }

    #[test]
    fn test_record_total_consistency() {
        let rec = DemographicRecord::new(
            "A",
            AcademicYear::new("13-14"),
            Demographics::new(10, 5, 0, 0),
        );
        assert_eq!(rec.total(), 15);
        assert!(rec.total_is_consistent());
        assert!(rec.clone().with_reported_total(15).total_is_consistent());
        assert!(!rec.with_reported_total(99).total_is_consistent());
    }

    #[test]
    fn test_snapshot_share() {
        let rec = DemographicRecord::new(
            "A",
            AcademicYear::new("13-14"),
            Demographics::new(3, 1, 0, 0),
        );
        let snap = Snapshot::from(&rec);
        assert_eq!(snap.total, 4);
        assert_eq!(snap.share(Category::White), Some(75.0));

        let empty = Snapshot::from(&DemographicRecord::new(
            "B",
            AcademicYear::new("13-14"),
            Demographics::default(),
        ));
        assert_eq!(empty.share(Category::White), None);
    }

    #[test]
    fn test_snapshot_serializes_flat() {
        let rec = DemographicRecord::new(
            "A",
            AcademicYear::new("14-15"),
            Demographics::new(8, 6, 0, 0),
        );
        let json = serde_json::to_value(Snapshot::from(&rec)).unwrap();
        assert_eq!(json["shortYear"], "14-15");
        assert_eq!(json["white"], 8);
        assert_eq!(json["total"], 14);
    }

    #[test]
    fn test_unlocated_serializes_as_null() {
        let json = serde_json::to_value(Coordinates::unlocated()).unwrap();
        assert!(json["latitude"].is_null());
    }
}
