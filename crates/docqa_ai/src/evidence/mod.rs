pub mod pacing;
mod persist;
pub mod store;

pub use pacing::{IngestPacing, Pause, ThreadPause};
pub use persist::IndexStatus;
pub use store::{EvidenceStore, IngestReport, LoadTrust};
