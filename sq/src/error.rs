//! Queue error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::bundle::{BundleKind, SegmentRole};

/// Errors from queue and bundle operations
///
/// The public queue surface logs these and degrades to an empty result;
/// they surface directly only from [`crate::Bundle::load`].
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Not a bundle identifier: {0}")]
    InvalidId(String),

    #[error("Bundle {id} is missing its {role} segment")]
    MissingSegment { id: String, role: SegmentRole },

    #[error("Bundle {id} of kind {kind} needs {needed} middle segments, found {found}")]
    TooFewMiddles {
        id: String,
        kind: BundleKind,
        needed: usize,
        found: usize,
    },

    #[error("Bundle {id} has an unreadable manifest: {source}")]
    Manifest {
        id: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Bundle {0} is not checked out")]
    NotCheckedOut(String),

    #[error("Bundle {0} is held by a running consumer")]
    InUse(String),

    #[error("Failed to {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl QueueError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { op, path, source }
    }
}
