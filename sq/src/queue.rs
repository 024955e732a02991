//! Core SegmentQueue implementation

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use fs2::FileExt;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bundle::Bundle;
use crate::error::QueueError;
use crate::{ARCHIVE_DIR, CHECKOUT_MARKER, DEFAULT_ARCHIVE_KEEP, OWNER_LOCK};

/// Outcome of an orphan recovery pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Orphans renamed back to pending
    pub restored: usize,
    /// Orphans deleted because the pending name was taken
    pub removed: usize,
    /// Orphans that could not be touched
    pub failed: usize,
    /// Checked-out entries still held by a running consumer
    pub live: usize,
}

impl RecoveryStats {
    /// Entries acted on or attempted; live entries are left alone
    pub fn total(&self) -> usize {
        self.restored + self.removed + self.failed
    }
}

impl fmt::Display for RecoveryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "restored: {}, removed: {}, failed: {}, live: {}",
            self.restored, self.removed, self.failed, self.live
        )
    }
}

/// Point-in-time counts for status display
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub pending: usize,
    #[serde(rename = "checked-out")]
    pub checked_out: usize,
    pub archived: usize,
    /// Identifier the next checkout would take
    pub next: Option<String>,
}

/// Filesystem queue of speech bundles
///
/// Cheap to clone; every clone addresses the same directory and shares the
/// owner locks of the bundles it has checked out. The rename keeps the
/// at-most-one-consumer guarantee between consumers; the owner lock inside a
/// checked-out bundle tells recovery in another process that its consumer is
/// still alive.
#[derive(Debug, Clone)]
pub struct SegmentQueue {
    root: PathBuf,
    archive: PathBuf,
    archive_keep: usize,
    held: Arc<Mutex<HashMap<String, File>>>,
}

impl SegmentQueue {
    /// Open or create a queue rooted at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, QueueError> {
        let root = path.as_ref().to_path_buf();
        let archive = root.join(ARCHIVE_DIR);
        fs::create_dir_all(&archive).map_err(QueueError::io("create", &archive))?;
        debug!(?root, "Opened segment queue");
        Ok(Self {
            root,
            archive,
            archive_keep: DEFAULT_ARCHIVE_KEEP,
            held: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Number of archived bundles kept after each completion
    pub fn with_archive_keep(mut self, keep: usize) -> Self {
        self.archive_keep = keep;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive
    }

    pub fn archive_keep(&self) -> usize {
        self.archive_keep
    }

    fn checked_out_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}{CHECKOUT_MARKER}"))
    }

    fn pending_path(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn held(&self) -> MutexGuard<'_, HashMap<String, File>> {
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether this queue (or a clone of it) holds the owner lock of `id`
    pub fn holds(&self, id: &str) -> bool {
        self.held().contains_key(id)
    }

    /// Take the owner lock of the bundle directory `dir`
    ///
    /// `Ok(None)` means another consumer holds it.
    fn lock_owner(dir: &Path) -> Result<Option<File>, QueueError> {
        let path = dir.join(OWNER_LOCK);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(QueueError::io("open", &path))?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(file)),
            Err(e) if is_contended(&e) => Ok(None),
            Err(e) => Err(QueueError::io("lock", &path)(e)),
        }
    }

    /// Owner lock for a checked-out bundle: ours if we hold it, otherwise
    /// taken over from a consumer that is gone
    fn claim(&self, id: &str) -> Result<File, QueueError> {
        if let Some(file) = self.held().remove(id) {
            return Ok(file);
        }
        Self::lock_owner(&self.checked_out_path(id))?.ok_or_else(|| QueueError::InUse(id.to_string()))
    }

    /// Names of entries that could be pending bundles
    fn candidates(&self) -> Result<impl Iterator<Item = (String, PathBuf)>, QueueError> {
        let entries = fs::read_dir(&self.root).map_err(QueueError::io("list", &self.root))?;

        Ok(entries.flatten().filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            if name == ARCHIVE_DIR || name.ends_with(CHECKOUT_MARKER) {
                return None;
            }
            let path = entry.path();
            path.is_dir().then_some((name, path))
        }))
    }

    /// Valid pending bundles, oldest first
    ///
    /// Half-written or malformed entries are expected while a producer is
    /// staging them, so they are skipped rather than reported.
    pub fn scan(&self) -> Vec<Bundle> {
        match self.try_scan() {
            Ok(bundles) => bundles,
            Err(e) => {
                warn!(error = %e, "scan: failed to list queue");
                Vec::new()
            }
        }
    }

    fn try_scan(&self) -> Result<Vec<Bundle>, QueueError> {
        let mut bundles = Vec::new();
        for (name, path) in self.candidates()? {
            match Bundle::load(&name, &path) {
                Ok(bundle) => bundles.push(bundle),
                Err(e) => debug!(%name, reason = %e, "scan: skipping entry"),
            }
        }

        bundles.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(bundles)
    }

    /// Whether any valid bundle is pending; stops at the first one found
    pub fn has_pending(&self) -> bool {
        match self.candidates() {
            Ok(mut candidates) => candidates.any(|(name, path)| Bundle::load(&name, &path).is_ok()),
            Err(e) => {
                warn!(error = %e, "has_pending: failed to list queue");
                false
            }
        }
    }

    /// Number of valid pending bundles
    pub fn len(&self) -> usize {
        self.scan().len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_pending()
    }

    /// Reserve the oldest pending bundle
    ///
    /// Returns `None` when nothing is pending, another consumer holds the
    /// bundle, or the rename loses a race; callers try again on their next
    /// cycle. The owner lock taken here is held until the bundle is
    /// completed, released or discarded.
    pub fn checkout(&self) -> Option<Bundle> {
        let candidate = self.scan().into_iter().next()?;
        let target = self.checked_out_path(&candidate.id);

        // Locked before the rename so a checked-out entry is never unowned
        let owner = match Self::lock_owner(&candidate.path) {
            Ok(Some(owner)) => owner,
            Ok(None) => {
                debug!(id = %candidate.id, "checkout: held by another consumer");
                return None;
            }
            Err(e) => {
                warn!(id = %candidate.id, error = %e, "checkout: failed to take owner lock");
                return None;
            }
        };

        if let Err(e) = fs::rename(&candidate.path, &target) {
            warn!(id = %candidate.id, error = %e, "checkout: rename failed");
            return None;
        }

        match Bundle::load(&candidate.id, &target) {
            Ok(bundle) => {
                info!(id = %bundle.id, kind = %bundle.kind, middles = bundle.middles.len(), "Checked out bundle");
                self.held().insert(bundle.id.clone(), owner);
                Some(bundle)
            }
            Err(e) => {
                warn!(id = %candidate.id, reason = %e, "checkout: bundle changed under us, discarding");
                if let Err(e) = fs::remove_dir_all(&target) {
                    warn!(id = %candidate.id, error = %e, "checkout: failed to discard");
                }
                None
            }
        }
    }

    /// Load a bundle that is currently checked out
    pub fn checked_out_bundle(&self, id: &str) -> Option<Bundle> {
        let path = self.checked_out_path(id);
        if !path.is_dir() {
            return None;
        }
        match Bundle::load(id, &path) {
            Ok(bundle) => Some(bundle),
            Err(e) => {
                debug!(%id, reason = %e, "checked_out_bundle: invalid");
                None
            }
        }
    }

    /// Archive a finished bundle and prune the archive in the background
    pub fn complete(&self, bundle: &Bundle) -> bool {
        match self.try_complete(bundle) {
            Ok(()) => {
                info!(id = %bundle.id, "Completed bundle");
                self.schedule_prune();
                true
            }
            Err(e) => {
                warn!(id = %bundle.id, error = %e, "complete: failed");
                false
            }
        }
    }

    fn try_complete(&self, bundle: &Bundle) -> Result<(), QueueError> {
        let source = self.checked_out_path(&bundle.id);
        if !source.is_dir() {
            return Err(QueueError::NotCheckedOut(bundle.id.clone()));
        }
        let owner = self.claim(&bundle.id)?;

        let dest = self.archive.join(&bundle.id);
        let archived = (|| {
            if dest.exists() {
                debug!(id = %bundle.id, "complete: replacing stale archive entry");
                fs::remove_dir_all(&dest).map_err(QueueError::io("remove", &dest))?;
            }
            fs::rename(&source, &dest).map_err(QueueError::io("archive", &source))
        })();

        if archived.is_err() {
            // Still checked out; keep owning it
            self.held().insert(bundle.id.clone(), owner);
            return archived;
        }

        drop(owner);
        let _ = fs::remove_file(dest.join(OWNER_LOCK));
        Ok(())
    }

    fn schedule_prune(&self) {
        let queue = self.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || {
                    queue.prune(queue.archive_keep);
                });
            }
            Err(_) => {
                queue.prune(queue.archive_keep);
            }
        }
    }

    /// Delete a checked-out bundle without archiving it
    pub fn discard(&self, bundle: &Bundle) -> bool {
        let path = self.checked_out_path(&bundle.id);
        let result = self
            .claim(&bundle.id)
            .and_then(|_owner| fs::remove_dir_all(&path).map_err(QueueError::io("remove", &path)));
        match result {
            Ok(()) => {
                info!(id = %bundle.id, "Discarded bundle");
                true
            }
            Err(e) => {
                warn!(id = %bundle.id, error = %e, "discard: failed");
                false
            }
        }
    }

    /// Return a checked-out bundle to pending so a later run retries it
    pub fn release(&self, bundle: &Bundle) -> bool {
        let result = self.claim(&bundle.id).and_then(|_owner| self.restore(&bundle.id));
        match result {
            Ok(Restore::Restored) => {
                info!(id = %bundle.id, "Released bundle");
                true
            }
            Ok(Restore::Removed) => {
                warn!(id = %bundle.id, "release: pending name taken, dropped checked-out copy");
                false
            }
            Err(e) => {
                warn!(id = %bundle.id, error = %e, "release: failed");
                false
            }
        }
    }

    /// Strip the marker from `id`, or delete the marked copy on a name collision
    ///
    /// Callers hold the owner lock.
    fn restore(&self, id: &str) -> Result<Restore, QueueError> {
        let marked = self.checked_out_path(id);
        let pending = self.pending_path(id);

        if pending.exists() {
            fs::remove_dir_all(&marked).map_err(QueueError::io("remove", &marked))?;
            return Ok(Restore::Removed);
        }

        fs::rename(&marked, &pending).map_err(QueueError::io("restore", &marked))?;
        Ok(Restore::Restored)
    }

    /// Identifiers of all checked-out entries, sorted
    pub fn checked_out(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "checked_out: failed to list queue");
                return Vec::new();
            }
        };

        let mut ids: Vec<String> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                name.strip_suffix(CHECKOUT_MARKER).map(str::to_string)
            })
            .collect();
        ids.sort();
        ids
    }

    /// Restore bundles left checked out by a consumer that died
    ///
    /// An entry whose owner lock is still held belongs to a running consumer
    /// (in this process or another) and is left alone.
    pub fn recover_orphans(&self) -> RecoveryStats {
        let mut stats = RecoveryStats::default();

        for id in self.checked_out() {
            if self.holds(&id) {
                stats.live += 1;
                continue;
            }
            let result = self.claim(&id).and_then(|_owner| self.restore(&id));
            match result {
                Ok(Restore::Restored) => {
                    warn!(%id, "Restored orphaned bundle to pending");
                    stats.restored += 1;
                }
                Ok(Restore::Removed) => {
                    warn!(%id, "Removed orphaned bundle shadowed by a pending copy");
                    stats.removed += 1;
                }
                Err(QueueError::InUse(_)) => {
                    debug!(%id, "recover_orphans: owned by a live consumer, skipping");
                    stats.live += 1;
                }
                Err(e) => {
                    warn!(%id, error = %e, "recover_orphans: failed");
                    stats.failed += 1;
                }
            }
        }

        if stats.total() > 0 {
            info!("Orphan recovery complete: {}", stats);
        } else {
            debug!(live = stats.live, "Orphan recovery found nothing");
        }
        stats
    }

    /// Archived identifiers, oldest first
    pub fn archived(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.archive) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "archived: failed to list archive");
                return Vec::new();
            }
        };

        let mut ids: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();
        ids.sort();
        ids
    }

    /// Delete archive entries beyond the `keep_last` most recent
    pub fn prune(&self, keep_last: usize) -> usize {
        let ids = self.archived();
        let excess = ids.len().saturating_sub(keep_last);

        let mut removed = 0;
        for id in ids.iter().take(excess) {
            let path = self.archive.join(id);
            match fs::remove_dir_all(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(%id, error = %e, "prune: failed to remove"),
            }
        }

        if removed > 0 {
            debug!(removed, keep_last, "Pruned archive");
        }
        removed
    }

    /// Counts across all three locations
    pub fn snapshot(&self) -> QueueSnapshot {
        let pending = self.scan();
        QueueSnapshot {
            pending: pending.len(),
            checked_out: self.checked_out().len(),
            archived: self.archived().len(),
            next: pending.into_iter().next().map(|b| b.id),
        }
    }
}

enum Restore {
    Restored,
    Removed,
}

fn is_contended(e: &io::Error) -> bool {
    let contended = fs2::lock_contended_error();
    e.kind() == io::ErrorKind::WouldBlock
        || (e.raw_os_error().is_some() && e.raw_os_error() == contended.raw_os_error())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const T1: &str = "20250327143022";
    const T2: &str = "20250327150000";
    const T3: &str = "20250328090000";

    fn stage(root: &Path, name: &str, segments: &[&str]) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for segment in segments {
            fs::write(dir.join(format!("{segment}.audio")), b"RIFF").unwrap();
        }
        dir
    }

    fn stage_valid(root: &Path, name: &str) -> PathBuf {
        stage(root, name, &["opening", "middle1", "closing"])
    }

    fn ids(bundles: &[Bundle]) -> Vec<&str> {
        bundles.iter().map(|b| b.id.as_str()).collect()
    }

    #[test]
    fn test_open_creates_archive() {
        let temp = TempDir::new().unwrap();
        let queue = SegmentQueue::open(temp.path().join("queue")).unwrap();
        assert!(queue.archive_dir().is_dir());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_scan_orders_and_filters() {
        let temp = TempDir::new().unwrap();
        let queue = SegmentQueue::open(temp.path()).unwrap();

        // Staged out of order on purpose
        stage_valid(temp.path(), T3);
        stage_valid(temp.path(), T1);
        stage_valid(temp.path(), T2);
        stage(temp.path(), "20250327120000", &["opening"]);
        stage_valid(temp.path(), "not-a-bundle");
        fs::write(temp.path().join("20250327110000"), b"stray file").unwrap();
        stage_valid(queue.archive_dir(), "20250101000000");

        let bundles = queue.scan();
        assert_eq!(ids(&bundles), vec![T1, T2, T3]);
    }

    #[test]
    fn test_checkout_is_single_consumer() {
        let temp = TempDir::new().unwrap();
        let queue = SegmentQueue::open(temp.path()).unwrap();
        stage_valid(temp.path(), T1);
        stage_valid(temp.path(), T2);
        stage_valid(temp.path(), T3);

        let first = queue.checkout().unwrap();
        let second = queue.checkout().unwrap();
        assert_eq!(first.id, T1);
        assert_eq!(second.id, T2);

        assert_eq!(ids(&queue.scan()), vec![T3]);
        assert!(first.path.ends_with(format!("{T1}{CHECKOUT_MARKER}")));
        assert!(first.opening.path.starts_with(&first.path));
        assert_eq!(queue.checked_out(), vec![T1.to_string(), T2.to_string()]);
    }

    #[test]
    fn test_checkout_empty_queue() {
        let temp = TempDir::new().unwrap();
        let queue = SegmentQueue::open(temp.path()).unwrap();
        assert!(queue.checkout().is_none());
    }

    #[test]
    fn test_second_queue_instance_cannot_take_same_bundle() {
        let temp = TempDir::new().unwrap();
        let a = SegmentQueue::open(temp.path()).unwrap();
        let b = SegmentQueue::open(temp.path()).unwrap();
        stage_valid(temp.path(), T1);

        let stale = a.scan().into_iter().next().unwrap();
        assert!(b.checkout().is_some());
        // `a` saw T1 before `b` took it; its rename now fails
        assert!(fs::rename(&stale.path, temp.path().join("elsewhere")).is_err());
        assert!(a.checkout().is_none());
    }

    #[test]
    fn test_complete_archives_under_original_name() {
        let temp = TempDir::new().unwrap();
        let queue = SegmentQueue::open(temp.path()).unwrap();
        stage_valid(temp.path(), T1);

        let bundle = queue.checkout().unwrap();
        assert!(queue.complete(&bundle));

        assert_eq!(queue.archived(), vec![T1.to_string()]);
        assert!(queue.checked_out().is_empty());
        assert!(queue.archive_dir().join(T1).join("opening.audio").is_file());
    }

    #[test]
    fn test_complete_twice_leaves_one_archive_entry() {
        let temp = TempDir::new().unwrap();
        let queue = SegmentQueue::open(temp.path()).unwrap();
        stage_valid(temp.path(), T1);

        let bundle = queue.checkout().unwrap();
        assert!(queue.complete(&bundle));
        assert!(!queue.complete(&bundle));
        assert_eq!(queue.archived(), vec![T1.to_string()]);
    }

    #[test]
    fn test_complete_replaces_stale_archive_entry() {
        let temp = TempDir::new().unwrap();
        let queue = SegmentQueue::open(temp.path()).unwrap();
        let stale = stage(queue.archive_dir(), T1, &["opening", "closing"]);
        fs::write(stale.join("leftover.txt"), b"old").unwrap();

        stage_valid(temp.path(), T1);
        let bundle = queue.checkout().unwrap();
        assert!(queue.complete(&bundle));

        assert_eq!(queue.archived(), vec![T1.to_string()]);
        assert!(!queue.archive_dir().join(T1).join("leftover.txt").exists());
        assert!(queue.archive_dir().join(T1).join("middle1.audio").is_file());
    }

    #[test]
    fn test_discard_deletes_without_archiving() {
        let temp = TempDir::new().unwrap();
        let queue = SegmentQueue::open(temp.path()).unwrap();
        stage_valid(temp.path(), T1);

        let bundle = queue.checkout().unwrap();
        assert!(queue.discard(&bundle));
        assert!(queue.archived().is_empty());
        assert!(queue.checked_out().is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_release_returns_bundle_to_pending() {
        let temp = TempDir::new().unwrap();
        let queue = SegmentQueue::open(temp.path()).unwrap();
        stage_valid(temp.path(), T1);

        let bundle = queue.checkout().unwrap();
        assert!(queue.is_empty());
        assert!(queue.release(&bundle));
        assert_eq!(ids(&queue.scan()), vec![T1]);
        assert!(queue.archived().is_empty());
    }

    #[test]
    fn test_recover_orphan_restores_to_pending() {
        let temp = TempDir::new().unwrap();
        let queue = SegmentQueue::open(temp.path()).unwrap();
        stage_valid(temp.path(), &format!("{T1}{CHECKOUT_MARKER}"));

        let stats = queue.recover_orphans();
        assert_eq!(stats.restored, 1);
        assert_eq!(stats.removed, 0);
        assert_eq!(ids(&queue.scan()), vec![T1]);
        assert!(queue.checked_out().is_empty());
    }

    #[test]
    fn test_recover_orphan_with_collision_deletes_marker() {
        let temp = TempDir::new().unwrap();
        let queue = SegmentQueue::open(temp.path()).unwrap();
        let pending = stage_valid(temp.path(), T1);
        fs::write(pending.join("middle2.audio"), b"RIFF").unwrap();
        stage(temp.path(), &format!("{T1}{CHECKOUT_MARKER}"), &["opening", "closing"]);

        let stats = queue.recover_orphans();
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.restored, 0);

        let bundles = queue.scan();
        assert_eq!(ids(&bundles), vec![T1]);
        assert_eq!(bundles[0].middles.len(), 2);
        assert!(queue.checked_out().is_empty());
    }

    #[test]
    fn test_recover_skips_bundle_held_by_another_instance() {
        let temp = TempDir::new().unwrap();
        let a = SegmentQueue::open(temp.path()).unwrap();
        stage_valid(temp.path(), T1);
        let bundle = a.checkout().unwrap();

        // A second consumer starting up while `a` is still playing T1
        let b = SegmentQueue::open(temp.path()).unwrap();
        let stats = b.recover_orphans();
        assert_eq!(stats.live, 1);
        assert_eq!(stats.total(), 0);
        assert!(b.checkout().is_none());
        assert_eq!(a.checked_out(), vec![T1.to_string()]);

        assert!(!b.release(&bundle));
        assert!(!b.complete(&bundle));
        assert!(a.complete(&bundle));
        assert_eq!(a.archived(), vec![T1.to_string()]);
        assert!(!a.archive_dir().join(T1).join(OWNER_LOCK).exists());
    }

    #[test]
    fn test_recover_takes_over_after_consumer_is_gone() {
        let temp = TempDir::new().unwrap();
        stage_valid(temp.path(), T1);
        {
            let a = SegmentQueue::open(temp.path()).unwrap();
            assert!(a.checkout().is_some());
        }

        let b = SegmentQueue::open(temp.path()).unwrap();
        let stats = b.recover_orphans();
        assert_eq!(stats.restored, 1);
        assert_eq!(stats.live, 0);
        assert_eq!(b.checkout().unwrap().id, T1);
    }

    #[test]
    fn test_recover_leaves_own_checkout_alone() {
        let temp = TempDir::new().unwrap();
        let queue = SegmentQueue::open(temp.path()).unwrap();
        stage_valid(temp.path(), T1);
        let bundle = queue.checkout().unwrap();

        let stats = queue.clone().recover_orphans();
        assert_eq!(stats.live, 1);
        assert!(queue.holds(T1));
        assert!(queue.release(&bundle));
        assert!(!queue.holds(T1));
        assert_eq!(ids(&queue.scan()), vec![T1]);
    }

    #[test]
    fn test_has_pending_ignores_invalid_entries() {
        let temp = TempDir::new().unwrap();
        let queue = SegmentQueue::open(temp.path()).unwrap();
        stage(temp.path(), T2, &["opening"]);
        stage_valid(temp.path(), &format!("{T1}{CHECKOUT_MARKER}"));
        assert!(!queue.has_pending());

        stage_valid(temp.path(), T3);
        assert!(queue.has_pending());
    }

    #[test]
    fn test_prune_keeps_most_recent() {
        let temp = TempDir::new().unwrap();
        let queue = SegmentQueue::open(temp.path()).unwrap();
        let keep = 3;
        let names: Vec<String> = (0..keep + 5).map(|i| format!("202501010000{:02}", i)).collect();
        for name in &names {
            stage_valid(queue.archive_dir(), name);
        }

        assert_eq!(queue.prune(keep), 5);
        assert_eq!(queue.archived(), names[5..].to_vec());
    }

    #[test]
    fn test_complete_prunes_inline_without_runtime() {
        let temp = TempDir::new().unwrap();
        let queue = SegmentQueue::open(temp.path()).unwrap().with_archive_keep(1);
        stage_valid(queue.archive_dir(), "20240101000000");
        stage_valid(temp.path(), T1);

        let bundle = queue.checkout().unwrap();
        assert!(queue.complete(&bundle));
        assert_eq!(queue.archived(), vec![T1.to_string()]);
    }

    #[test]
    fn test_snapshot_counts() {
        let temp = TempDir::new().unwrap();
        let queue = SegmentQueue::open(temp.path()).unwrap();
        stage_valid(temp.path(), T1);
        stage_valid(temp.path(), T2);
        stage_valid(temp.path(), T3);

        let first = queue.checkout().unwrap();
        let second = queue.checkout().unwrap();
        queue.complete(&first);

        let snapshot = queue.snapshot();
        assert_eq!(snapshot.pending, 1);
        assert_eq!(snapshot.checked_out, 1);
        assert_eq!(snapshot.archived, 1);
        assert_eq!(snapshot.next.as_deref(), Some(T3));
        assert_eq!(queue.checked_out_bundle(T2).unwrap(), second);
    }
}
