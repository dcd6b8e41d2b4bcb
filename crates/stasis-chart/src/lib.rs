//! Fulfillment chart aggregation for the Cyber Stasis ledger.
//!
//! Turns the ledger into a list of renderable points for a period, a
//! category filter, and a statistics scope, and flags a shortage when
//! recent buckets fall below the fulfillment threshold.
//!
//! # Architecture
//!
//! - [`layout`] -- [`BucketLayout`] per period and window anchoring.
//! - [`aggregate`](mod@aggregate) -- The single-pass fold into chart points.
//! - [`axis`] -- Time labels and ratio gridlines.
//!
//! # Coordinates
//!
//! ```text
//! x = bucket_index * scale
//! y = 390 - fulfillment_ratio * 400
//! ```

pub mod aggregate;
pub mod axis;
pub mod layout;

pub use aggregate::{SHORTAGE_THRESHOLD, aggregate};
pub use layout::BucketLayout;

/// Errors that can occur when building a chart.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChartError {
    /// A custom period was requested without a bucket layout.
    #[error("custom period requires a bucket layout")]
    MissingCustomLayout,

    /// The custom layout has no buckets or zero-width buckets.
    #[error("custom layout must have at least one bucket of non-zero width")]
    EmptyLayout,

    /// The window could not be placed on the time line.
    #[error("time out of range: {0}")]
    TimeOutOfRange(String),
}
