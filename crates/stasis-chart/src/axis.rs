//! Time-axis tick labels and fulfillment-ratio gridlines.

use chrono::{DateTime, TimeDelta, Utc};

use stasis_types::{AxisLabel, Period};

use crate::layout::BucketLayout;

/// Vertical pixel offset of a zero fulfillment ratio.
pub const BASELINE_Y: f64 = 390.0;

/// Pixels spanned by the full `[0, 1]` ratio range.
pub const RATIO_AXIS_HEIGHT: f64 = 400.0;

/// Tick labels for each bucket of the window starting at `start`.
pub fn time_axis(period: Period, layout: &BucketLayout, start: DateTime<Utc>) -> Vec<AxisLabel> {
    (1..=layout.count)
        .filter_map(|i| {
            let bucket_start = layout.bucket_start(start, i)?;
            let bucket_end = layout.bucket_end(start, i)?;
            let label = match period {
                Period::Hour => bucket_end.format("%-H:%M").to_string(),
                Period::Day => format!("{i}:00"),
                Period::Week | Period::Month => bucket_start.format("%-d. %B").to_string(),
                Period::Year => bucket_start.format("%B. %Y").to_string(),
                Period::Custom if layout.width < TimeDelta::days(1) => {
                    bucket_end.format("%-H:%M").to_string()
                }
                Period::Custom => bucket_start.format("%-d. %B").to_string(),
            };
            Some(AxisLabel {
                offset: f64::from(i) * layout.scale,
                label,
            })
        })
        .collect()
}

/// Gridlines at ratios 0.1 through 1.0.
pub fn ratio_axis() -> Vec<AxisLabel> {
    (1..=10_u8)
        .map(|i| {
            let ratio = f64::from(i) / 10.0;
            AxisLabel {
                offset: ratio_to_y(ratio),
                label: format!("{ratio:.1}"),
            }
        })
        .collect()
}

/// Vertical offset of a fulfillment ratio; higher ratios sit higher.
pub fn ratio_to_y(ratio: f64) -> f64 {
    ratio.mul_add(-RATIO_AXIS_HEIGHT, BASELINE_Y)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)]

    use chrono::TimeZone;
    use stasis_types::ChartFilter;

    use super::*;

    fn layout(period: Period) -> BucketLayout {
        BucketLayout::for_filter(&ChartFilter {
            period,
            ..ChartFilter::default()
        })
        .unwrap()
    }

    #[test]
    fn hour_labels_are_bucket_ends() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 11, 40, 0).unwrap();
        let labels = time_axis(Period::Hour, &layout(Period::Hour), start);
        let text: Vec<&str> = labels.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(text, vec!["11:50", "12:00", "12:10", "12:20", "12:30", "12:40"]);
        assert_eq!(labels[0].offset, 132.0);
    }

    #[test]
    fn day_labels_count_hours() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let labels = time_axis(Period::Day, &layout(Period::Day), start);
        assert_eq!(labels.len(), 24);
        assert_eq!(labels[0].label, "1:00");
        assert_eq!(labels[23].label, "24:00");
    }

    #[test]
    fn week_and_year_labels_use_calendar_names() {
        let start = Utc.with_ymd_and_hms(2024, 2, 24, 0, 0, 0).unwrap();
        let week = time_axis(Period::Week, &layout(Period::Week), start);
        assert_eq!(week[0].label, "24. February");
        assert_eq!(week[6].label, "1. March");

        let year = time_axis(Period::Year, &layout(Period::Year), start);
        assert_eq!(year.len(), 12);
        assert_eq!(year[0].label, "February. 2024");
    }

    #[test]
    fn ratio_axis_spans_tenths() {
        let axis = ratio_axis();
        assert_eq!(axis.len(), 10);
        assert_eq!(axis[0].label, "0.1");
        assert_eq!(axis[0].offset, 350.0);
        assert_eq!(axis[9].label, "1.0");
        assert_eq!(axis[9].offset, -10.0);
    }
}
