pub mod item;
pub mod source;
pub mod task;

pub use item::{normalize_title, sanitize_name, CandidateItem, DownloadedItem, LedgerDocument};
pub use source::{NewSource, SourceKind, TrackedSource};
pub use task::{DownloadState, DownloadTask, SessionId};
