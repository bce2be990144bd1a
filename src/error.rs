//! Error taxonomy for the acquisition pipeline.
//!
//! Configuration errors refuse the offending call; provider failures fall
//! back to the simulated provider; transient writer I/O is contained and
//! logged at the flush site. Nothing here escalates to process exit.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcquireError {
    /// `start_recording` was called before an output folder was configured.
    #[error("no output folder configured; call set_output_folder first")]
    OutputFolderUnset,

    /// `start_recording` was called while a session is already active.
    #[error("a recording session is already active")]
    RecordingActive,

    /// A vendor driver could not be brought up.
    #[error("provider initialization failed: {0}")]
    ProviderInit(String),

    /// Creating or writing a session file header failed.
    #[error("failed to create session file {path}: {source}")]
    SessionFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
