use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use super::SnapshotModifier;
use crate::error::CardLiveError;
use crate::snapshot::Snapshot;

/// Region code used when the submitter picked no region.
pub const NO_REGION_CODE: i64 = -10;

const ANTARCTICA_CODE: i64 = 10;

/// Antarctica was preselected in the submission form until the cutoff date, so
/// older submissions with that code really carry no region.
#[derive(Debug, Clone)]
pub struct HistoricalRegionModifier {
    cutoff: DateTime<Utc>,
}

impl HistoricalRegionModifier {
    pub fn new(cutoff: DateTime<Utc>) -> Self {
        Self { cutoff }
    }

    pub fn from_date(cutoff: NaiveDate) -> Self {
        Self::new(cutoff.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    pub fn cutoff(&self) -> DateTime<Utc> {
        self.cutoff
    }
}

impl SnapshotModifier for HistoricalRegionModifier {
    fn name(&self) -> &'static str {
        "historical-region"
    }

    fn modify(&self, snapshot: &Snapshot) -> Result<Snapshot, CardLiveError> {
        let mut corrected = 0usize;
        let main = snapshot.main().map_rows(|row| {
            let mut row = row.clone();
            if row.geo_area_code == Some(ANTARCTICA_CODE) && row.timestamp < self.cutoff {
                row.geo_area_code = Some(NO_REGION_CODE);
                corrected += 1;
            }
            row
        });
        debug!(corrected, cutoff = %self.cutoff, "remapped preselected region codes");
        snapshot.with_main(main)
    }
}
