//! Bucket layouts and window anchoring per chart period.
//!
//! | Period | Buckets | Width | Scale (px) |
//! |--------|---------|-------|------------|
//! | hour | 6 | 10 min | 132 |
//! | day | 24 | 1 h | 33 |
//! | week | 7 | 24 h | 113 |
//! | month | 30 | 24 h | 26 |
//! | year | 12 | 30 d | 66 |
//! | custom | caller | caller | 792 / buckets |

use chrono::{DateTime, DurationRound, NaiveTime, TimeDelta, Utc};

use stasis_types::{ChartFilter, Period};

use crate::ChartError;

/// Total horizontal extent shared by custom layouts.
const CUSTOM_CHART_WIDTH: f64 = 792.0;

/// How the end of the window is found from "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnchorUnit {
    /// End of the bucket containing "now".
    Bucket,
    /// End of the current UTC day.
    Day,
}

/// Bucket count, width, and horizontal scale for one period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketLayout {
    /// Number of buckets in the window.
    pub count: u32,
    /// Width of one bucket.
    pub width: TimeDelta,
    /// Pixels per bucket index along the time axis.
    pub scale: f64,
    anchor_unit: AnchorUnit,
}

impl BucketLayout {
    /// Resolve the layout selected by `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::MissingCustomLayout`] for a custom period
    /// without a layout and [`ChartError::EmptyLayout`] for a custom layout
    /// with no buckets or zero width.
    pub fn for_filter(filter: &ChartFilter) -> Result<Self, ChartError> {
        let fixed = |count, width, scale| Self {
            count,
            width,
            scale,
            anchor_unit: AnchorUnit::Day,
        };
        match filter.period {
            Period::Hour => Ok(Self {
                anchor_unit: AnchorUnit::Bucket,
                ..fixed(6, TimeDelta::minutes(10), 132.0)
            }),
            Period::Day => Ok(fixed(24, TimeDelta::hours(1), 33.0)),
            Period::Week => Ok(fixed(7, TimeDelta::days(1), 113.0)),
            Period::Month => Ok(fixed(30, TimeDelta::days(1), 26.0)),
            Period::Year => Ok(fixed(12, TimeDelta::days(30), 66.0)),
            Period::Custom => {
                let custom = filter.custom.ok_or(ChartError::MissingCustomLayout)?;
                if custom.bucket_count == 0 || custom.bucket_width_secs == 0 {
                    return Err(ChartError::EmptyLayout);
                }
                Ok(Self {
                    count: custom.bucket_count,
                    width: TimeDelta::seconds(i64::from(custom.bucket_width_secs)),
                    scale: CUSTOM_CHART_WIDTH / f64::from(custom.bucket_count),
                    anchor_unit: AnchorUnit::Bucket,
                })
            }
        }
    }

    /// Exclusive end of the window containing `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::TimeOutOfRange`] if the anchor cannot be
    /// represented.
    pub fn anchor(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ChartError> {
        let (floor, unit) = match self.anchor_unit {
            AnchorUnit::Bucket => (
                now.duration_trunc(self.width)
                    .map_err(|e| ChartError::TimeOutOfRange(e.to_string()))?,
                self.width,
            ),
            AnchorUnit::Day => (
                now.date_naive().and_time(NaiveTime::MIN).and_utc(),
                TimeDelta::days(1),
            ),
        };
        floor
            .checked_add_signed(unit)
            .ok_or_else(|| ChartError::TimeOutOfRange(format!("anchor after {now}")))
    }

    /// Inclusive start of the window ending at `anchor`.
    pub fn window_start(&self, anchor: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let span = self.width.checked_mul(i32::try_from(self.count).ok()?)?;
        anchor.checked_sub_signed(span)
    }

    /// 1-based bucket index of `created_at`, or `None` if it falls outside
    /// `[start, start + count * width)`.
    pub fn bucket_of(&self, start: DateTime<Utc>, created_at: DateTime<Utc>) -> Option<u32> {
        let offset = created_at.signed_duration_since(start).num_milliseconds();
        if offset < 0 {
            return None;
        }
        let slot = offset.checked_div(self.width.num_milliseconds())?;
        let slot = u32::try_from(slot).ok()?;
        if slot >= self.count {
            return None;
        }
        slot.checked_add(1)
    }

    /// Start of bucket `index` (1-based).
    pub fn bucket_start(&self, start: DateTime<Utc>, index: u32) -> Option<DateTime<Utc>> {
        let slots = i32::try_from(index.checked_sub(1)?).ok()?;
        start.checked_add_signed(self.width.checked_mul(slots)?)
    }

    /// Exclusive end of bucket `index` (1-based).
    pub fn bucket_end(&self, start: DateTime<Utc>, index: u32) -> Option<DateTime<Utc>> {
        let slots = i32::try_from(index).ok()?;
        start.checked_add_signed(self.width.checked_mul(slots)?)
    }
}
