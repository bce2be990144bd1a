//! Recording subsystem — CSV serialization and the buffered flush worker.

pub mod format;
pub mod writer;

pub use format::{RayHit, RecordSpace, SessionPaths, TrackedElement};
pub use writer::{FlushOutcome, FlushWorker, WriterConfig, WriterStatsSnapshot};
