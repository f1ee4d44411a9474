//! Date-range and region selection over normalized records.

use chrono::NaiveDateTime;
use energy_core::models::EnergyRecord;

/// Predicates applied to the concatenated record set. Absent fields match
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowFilter {
    /// Inclusive lower bound.
    pub start: Option<NaiveDateTime>,
    /// Exclusive upper bound.
    pub end: Option<NaiveDateTime>,
    /// Exact region name.
    pub region: Option<String>,
}

impl WindowFilter {
    pub fn matches(&self, record: &EnergyRecord) -> bool {
        self.start.map_or(true, |s| record.timestamp >= s)
            && self.end.map_or(true, |e| record.timestamp < e)
            && self.region.as_deref().map_or(true, |r| record.region == r)
    }

    /// Keep the records that satisfy every predicate, preserving order.
    pub fn apply(&self, records: Vec<EnergyRecord>) -> Vec<EnergyRecord> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}
