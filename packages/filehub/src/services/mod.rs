pub mod deletion;
pub mod physical;
pub mod registry;
pub mod stats;

pub use deletion::{DeleteOutcome, DeletionCoordinator, ReclaimStatus, SweepSummary};
pub use physical::PhysicalObjects;
pub use registry::FileRegistry;
pub use stats::{StorageStats, storage_stats};
