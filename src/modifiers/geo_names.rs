use std::sync::Arc;

use super::SnapshotModifier;
use crate::error::CardLiveError;
use crate::geo::RegionCodes;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone)]
pub struct GeographicNamesModifier {
    codes: Arc<RegionCodes>,
}

impl GeographicNamesModifier {
    pub fn new(codes: Arc<RegionCodes>) -> Self {
        Self { codes }
    }
}

impl SnapshotModifier for GeographicNamesModifier {
    fn name(&self) -> &'static str {
        "geographic-names"
    }

    fn modify(&self, snapshot: &Snapshot) -> Result<Snapshot, CardLiveError> {
        let main = snapshot.main().map_rows(|row| {
            let mut row = row.clone();
            row.geo_area_name_standard = self.codes.resolve(row.geo_area_code);
            row
        });
        snapshot.with_main(main)
    }
}
