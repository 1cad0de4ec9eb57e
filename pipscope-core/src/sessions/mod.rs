//! Per-day session attribution and its cache.
/// Attribution of daily extremes to session windows.
pub mod attributor;
/// Backings for cached daily session records.
pub mod store;

pub use attributor::{DailySessionRecord, SessionAttributor, SessionExtremes};
pub use store::{FileRecordStore, MemoryRecordStore, SessionRecordStore};
