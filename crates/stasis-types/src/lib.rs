//! Shared type definitions for the Cyber Stasis demand/supply ledger.
//!
//! This crate is the single source of truth for the types exchanged between
//! peers and handed to the presentation layer. Types flow downstream to
//! `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Sequential record/notification ids and opaque citizen ids
//! - [`enums`] -- Categories, severities, and chart selectors
//! - [`structs`] -- Records, rankings, notifications
//! - [`chart`] -- Aggregation output (points, connectors, axes, shortage)
//! - [`error`] -- Validation errors

pub mod chart;
pub mod enums;
pub mod error;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use chart::{
    AxisLabel, Chart, ChartFilter, ChartPoint, Connector, CustomLayout, Position, ShortageSignal,
};
pub use enums::{Category, CategoryFilter, Period, Severity, StatsScope};
pub use error::{ParseEnumError, RecordError};
pub use ids::{CitizenId, NotificationId, RecordId};
pub use structs::{DemandDraft, Notification, Ranking, Record};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // Files land in `bindings/` relative to the crate root.
        use ts_rs::TS;

        let _ = crate::RecordId::export_all();
        let _ = crate::NotificationId::export_all();
        let _ = crate::CitizenId::export_all();
        let _ = crate::Category::export_all();
        let _ = crate::Severity::export_all();
        let _ = crate::Period::export_all();
        let _ = crate::StatsScope::export_all();
        let _ = crate::Record::export_all();
        let _ = crate::DemandDraft::export_all();
        let _ = crate::Ranking::export_all();
        let _ = crate::Notification::export_all();
        let _ = crate::Chart::export_all();
        let _ = crate::ChartFilter::export_all();
        let _ = crate::ChartPoint::export_all();
    }
}
