//! Renderable chart output produced by the aggregator.
//!
//! Everything here lives for a single aggregation pass; nothing is
//! persisted.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Category, CategoryFilter, Period, StatsScope};

/// Screen position of a chart point in the chart's pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Position {
    /// Horizontal offset from the left edge.
    pub x: f64,
    /// Vertical offset from the top edge.
    pub y: f64,
}

/// Line segment joining a point to its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Connector {
    /// Euclidean length of the segment.
    pub distance: f64,
    /// Rotation of the segment in degrees.
    pub angle: f64,
}

/// One merged bucket of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChartPoint {
    /// 1-based bucket index; the newest bucket has the highest index.
    pub bucket_index: u32,
    /// Records merged into this point.
    pub count: u32,
    /// How many of them are fulfilled.
    pub fulfilled_count: u32,
    /// `fulfilled_count / count`.
    pub fulfillment_ratio: f64,
    /// Where to draw the point.
    pub position: Position,
    /// Segment to the previous point; `None` on the first point.
    #[ts(optional)]
    pub connector: Option<Connector>,
    /// Category of the last record merged into the point.
    pub category: Category,
}

/// A gridline or tick label on one of the chart axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AxisLabel {
    /// Pixel offset along the axis.
    pub offset: f64,
    /// Text to render.
    pub label: String,
}

/// Raised when recent fulfillment for a category falls below threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ShortageSignal {
    /// The category in short supply.
    pub category: Category,
    /// The ratio that triggered the signal.
    pub fulfillment_ratio: f64,
    /// Bucket the signal was derived from.
    pub bucket_index: u32,
}

/// Bucket layout for [`Period::Custom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CustomLayout {
    /// Number of buckets.
    pub bucket_count: u32,
    /// Width of each bucket in seconds.
    pub bucket_width_secs: u32,
}

/// Selects which records an aggregation pass looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChartFilter {
    /// Time window.
    #[serde(default)]
    pub period: Period,
    /// Category selector (`"all"` or a category name).
    #[serde(default)]
    #[ts(type = "string")]
    pub category: CategoryFilter,
    /// Global or personal statistics.
    #[serde(default)]
    pub scope: StatsScope,
    /// Layout used when `period` is [`Period::Custom`].
    #[serde(default)]
    #[ts(optional)]
    pub custom: Option<CustomLayout>,
}

/// Complete output of one aggregation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Chart {
    /// The filter the chart was built for.
    pub filter: ChartFilter,
    /// Merged bucket points in id order.
    pub points: Vec<ChartPoint>,
    /// Tick labels along the time axis.
    pub time_axis: Vec<AxisLabel>,
    /// Gridlines along the fulfillment-ratio axis.
    pub ratio_axis: Vec<AxisLabel>,
    /// Shortage detected in the most recent buckets, if any.
    #[ts(optional)]
    pub shortage: Option<ShortageSignal>,
}
