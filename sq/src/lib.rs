//! SegmentQueue - crash-safe filesystem queue of speech bundles
//!
//! An external producer stages pre-rendered speech on disk as one directory
//! per bundle. A single consumer checks bundles out by renaming them, plays
//! them, and archives them when done. The rename is the lock: two consumers
//! racing for the same bundle cannot both win. An owner lock file inside the
//! checked-out directory marks it as live, so recovery only touches bundles
//! whose consumer is gone.
//!
//! # Layout
//!
//! ```text
//! queue/
//! ├── 20250327143022/          # pending, named YYYYMMDDHHMMSS
//! │   ├── opening.audio
//! │   ├── middle1.audio        # optional, contiguous from 1
//! │   ├── middle2.audio
//! │   ├── closing.audio
//! │   └── bundle.yml           # optional, `kind: attention`
//! ├── 20250327143510.inuse/    # checked out by a consumer
//! │   └── .owner.lock          # locked while that consumer runs
//! └── archive/
//!     └── 20250327140001/      # completed, original name
//! ```
//!
//! # Example
//!
//! ```ignore
//! use segmentqueue::SegmentQueue;
//!
//! let queue = SegmentQueue::open("/var/lib/robosanta/queue")?;
//! queue.recover_orphans();
//! if let Some(bundle) = queue.checkout() {
//!     // play bundle.opening, bundle.middles, bundle.closing
//!     queue.complete(&bundle);
//! }
//! ```

pub mod bundle;
pub mod cli;
pub mod config;
mod error;
mod queue;

pub use bundle::{Bundle, BundleKind, Segment, SegmentRole};
pub use error::QueueError;
pub use queue::{QueueSnapshot, RecoveryStats, SegmentQueue};

/// Suffix appended to a bundle directory while it is checked out
pub const CHECKOUT_MARKER: &str = ".inuse";

/// Lock file inside a bundle directory, held by the consumer that checked it out
pub const OWNER_LOCK: &str = ".owner.lock";

/// Name of the archive subdirectory inside the queue root
pub const ARCHIVE_DIR: &str = "archive";

/// Default number of archived bundles kept by pruning
pub const DEFAULT_ARCHIVE_KEEP: usize = 50;
