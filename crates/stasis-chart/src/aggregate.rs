//! Folding ledger records into chart points.
//!
//! Records are walked in ascending id order. Consecutive records that land
//! in the same bucket merge into one point; a record in any other bucket
//! closes the current point and opens a new one. Each closed point gets its
//! fulfillment ratio, a screen position, and a connector back to the
//! previous point.
//!
//! The pass keeps all of its running state in a [`PassState`] local to the
//! call, so the same ledger, filter, and clock always produce the same
//! chart.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use stasis_ledger::Ledger;
use stasis_types::{
    Category, Chart, ChartFilter, ChartPoint, CitizenId, Connector, Position, Record,
    ShortageSignal, StatsScope,
};

use crate::ChartError;
use crate::axis::{ratio_axis, ratio_to_y, time_axis};
use crate::layout::BucketLayout;

/// Fulfillment ratio below which a recent bucket signals a shortage.
pub const SHORTAGE_THRESHOLD: f64 = 0.6;

/// How far back a bucket may have closed and still count as recent.
pub fn recent_window() -> TimeDelta {
    TimeDelta::minutes(10)
}

// ---------------------------------------------------------------------------
// Accumulators
// ---------------------------------------------------------------------------

/// Tally for the point currently being built.
#[derive(Debug, Clone, Copy)]
struct OpenPoint {
    bucket_index: u32,
    count: u32,
    fulfilled_count: u32,
    category: Category,
}

impl OpenPoint {
    fn start(bucket_index: u32, record: &Record) -> Self {
        Self {
            bucket_index,
            count: 1,
            fulfilled_count: u32::from(record.fulfilled),
            category: record.category,
        }
    }

    fn absorb(&mut self, record: &Record) {
        self.count = self.count.saturating_add(1);
        self.fulfilled_count = self
            .fulfilled_count
            .saturating_add(u32::from(record.fulfilled));
        self.category = record.category;
    }

    fn ratio(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            f64::from(self.fulfilled_count) / f64::from(self.count)
        }
    }
}

/// Running state of one aggregation pass.
#[derive(Debug)]
struct PassState<'a> {
    layout: &'a BucketLayout,
    open: Option<OpenPoint>,
    points: Vec<ChartPoint>,
}

impl<'a> PassState<'a> {
    const fn new(layout: &'a BucketLayout) -> Self {
        Self {
            layout,
            open: None,
            points: Vec::new(),
        }
    }

    fn push(&mut self, bucket_index: u32, record: &Record) {
        match self.open.as_mut() {
            Some(open) if open.bucket_index == bucket_index => open.absorb(record),
            _ => {
                self.close();
                self.open = Some(OpenPoint::start(bucket_index, record));
            }
        }
    }

    fn close(&mut self) {
        let Some(open) = self.open.take() else {
            return;
        };
        let ratio = open.ratio();
        let position = Position {
            x: f64::from(open.bucket_index) * self.layout.scale,
            y: ratio_to_y(ratio),
        };
        let connector = self.points.last().map(|prev| connect(prev.position, position));
        self.points.push(ChartPoint {
            bucket_index: open.bucket_index,
            count: open.count,
            fulfilled_count: open.fulfilled_count,
            fulfillment_ratio: ratio,
            position,
            connector,
            category: open.category,
        });
    }

    fn finish(mut self) -> Vec<ChartPoint> {
        self.close();
        self.points
    }
}

/// Segment from `prev` to `next`, angle in degrees.
fn connect(prev: Position, next: Position) -> Connector {
    let dx = next.x - prev.x;
    let dy = next.y - prev.y;
    Connector {
        distance: dx.hypot(dy),
        angle: (prev.y - next.y).atan2(prev.x - next.x).to_degrees(),
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Build the chart for `filter` from `ledger` as seen by `local` at `now`.
///
/// # Errors
///
/// Returns [`ChartError`] if the filter selects an unusable layout or the
/// window cannot be placed on the time line.
pub fn aggregate(
    ledger: &Ledger,
    filter: &ChartFilter,
    local: &CitizenId,
    now: DateTime<Utc>,
) -> Result<Chart, ChartError> {
    let layout = BucketLayout::for_filter(filter)?;
    let anchor = layout.anchor(now)?;
    let start = layout
        .window_start(anchor)
        .ok_or_else(|| ChartError::TimeOutOfRange(format!("window before {anchor}")))?;

    let mut pass = PassState::new(&layout);
    for record in ledger.iter() {
        if !filter.category.matches(record.category) {
            continue;
        }
        if filter.scope == StatsScope::Personal && &record.citizen_id != local {
            continue;
        }
        if let Some(bucket) = layout.bucket_of(start, record.created_at) {
            pass.push(bucket, record);
        }
    }
    let points = pass.finish();

    let shortage = detect_shortage(&points, &layout, start, now);
    debug!(
        period = ?filter.period,
        points = points.len(),
        shortage = shortage.is_some(),
        "chart aggregated"
    );

    Ok(Chart {
        filter: *filter,
        time_axis: time_axis(filter.period, &layout, start),
        ratio_axis: ratio_axis(),
        points,
        shortage,
    })
}

/// Lowest-ratio recent point under [`SHORTAGE_THRESHOLD`], if any.
///
/// A point is recent when its bucket closed no earlier than
/// [`recent_window`] before `now`. When several recent points fall under
/// the threshold, the one with the lowest ratio wins.
fn detect_shortage(
    points: &[ChartPoint],
    layout: &BucketLayout,
    start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<ShortageSignal> {
    let cutoff = now.checked_sub_signed(recent_window())?;
    points
        .iter()
        .filter(|p| {
            layout
                .bucket_end(start, p.bucket_index)
                .is_some_and(|end| end >= cutoff)
        })
        .filter(|p| p.fulfillment_ratio < SHORTAGE_THRESHOLD)
        .reduce(|best, p| {
            if p.fulfillment_ratio < best.fulfillment_ratio {
                p
            } else {
                best
            }
        })
        .map(|p| ShortageSignal {
            category: p.category,
            fulfillment_ratio: p.fulfillment_ratio,
            bucket_index: p.bucket_index,
        })
}
