//! Enumeration types shared across the Stasis workspace.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ParseEnumError;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// The kind of good a demand asks for.
///
/// Encoded on the wire with a leading capital (`"Water"`); lowercase is
/// accepted on input so hand-written payloads and query strings work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Category {
    /// Drinking water.
    #[serde(alias = "water")]
    Water,
    /// Food of any kind.
    #[serde(alias = "food")]
    Food,
    /// Shelter.
    #[serde(alias = "housing")]
    Housing,
    /// Anything else.
    #[serde(alias = "other")]
    Other,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Self; 4] = [Self::Water, Self::Food, Self::Housing, Self::Other];

    /// Wire/display name of the category.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Water => "Water",
            Self::Food => "Food",
            Self::Housing => "Housing",
            Self::Other => "Other",
        }
    }
}

impl core::fmt::Display for Category {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Category {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError::new("category", s))
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Visual severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Severity {
    /// A positive outcome (submission delivered, ranked first).
    Success,
    /// Neutral milestone.
    Info,
    /// Something the citizen should act on.
    Warning,
    /// A global problem such as a shortage.
    Danger,
    /// Greeting shown once per newcomer.
    Primary,
}

// ---------------------------------------------------------------------------
// Chart selectors
// ---------------------------------------------------------------------------

/// Time window rendered by the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Period {
    /// Last hour in 10 minute buckets.
    #[default]
    Hour,
    /// Last day in hourly buckets.
    Day,
    /// Last week in daily buckets.
    Week,
    /// Last 30 days in daily buckets.
    Month,
    /// Last 360 days in 30 day buckets.
    Year,
    /// Caller-supplied bucket count and width.
    Custom,
}

impl core::str::FromStr for Period {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "custom" => Ok(Self::Custom),
            _ => Err(ParseEnumError::new("period", s)),
        }
    }
}

/// Whose records the chart is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum StatsScope {
    /// Every record in the ledger.
    #[default]
    Global,
    /// Only records requested by the local citizen.
    Personal,
}

impl core::str::FromStr for StatsScope {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "personal" => Ok(Self::Personal),
            _ => Err(ParseEnumError::new("scope", s)),
        }
    }
}

/// Category selector for the chart: everything, or a single category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CategoryFilter {
    /// All categories.
    #[default]
    All,
    /// A single category.
    Only(Category),
}

impl CategoryFilter {
    /// Whether a record of `category` passes the filter.
    pub fn matches(self, category: Category) -> bool {
        match self {
            Self::All => true,
            Self::Only(c) => c == category,
        }
    }
}

impl core::str::FromStr for CategoryFilter {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse::<Category>().map(Self::Only)
    }
}

impl TryFrom<String> for CategoryFilter {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CategoryFilter> for String {
    fn from(value: CategoryFilter) -> Self {
        match value {
            CategoryFilter::All => "all".to_owned(),
            CategoryFilter::Only(c) => c.as_str().to_ascii_lowercase(),
        }
    }
}
