pub mod batch;
pub mod resolution;

pub use batch::{BatchConfig, BatchReconciler, BatchReport, BatchStatistics, ResolvedMarket};
pub use resolution::{ReconcileNote, ReconcileOutcome, ResolutionReconciler};
