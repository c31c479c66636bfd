pub mod fs;

use crate::app::Result;
use crate::domain::{CandidateItem, DownloadedItem, NewSource, SourceKind, TrackedSource};

pub use fs::FsStore;

pub trait Store: Send + Sync {
    // Source operations
    fn list_tracked(&self, kind: SourceKind) -> Result<Vec<TrackedSource>>;
    fn get_source(&self, kind: SourceKind, name: &str) -> Result<Option<TrackedSource>>;
    fn create(&self, source: &NewSource) -> Result<TrackedSource>;

    // Ledger operations
    fn append_downloaded(&self, source: &mut TrackedSource, item: &CandidateItem) -> Result<()>;
    fn mark_synced(&self, source: &mut TrackedSource) -> Result<()>;
    fn all_downloaded(&self) -> Result<Vec<(String, DownloadedItem)>>;
}
