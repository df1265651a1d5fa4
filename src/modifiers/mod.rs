mod geo_names;
mod historical_region;
mod taxonomy;

pub use geo_names::GeographicNamesModifier;
pub use historical_region::{HistoricalRegionModifier, NO_REGION_CODE};
pub use taxonomy::TaxonomyModifier;

use crate::error::CardLiveError;
use crate::snapshot::Snapshot;

/// One enrichment step run by the loader after every full load.
///
/// A modifier returns a new snapshot and must keep the sample key set unchanged.
pub trait SnapshotModifier: Send + Sync {
    fn name(&self) -> &'static str;
    fn modify(&self, snapshot: &Snapshot) -> Result<Snapshot, CardLiveError>;
}
