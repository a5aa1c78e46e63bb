//! Pending payment-receipt queue.
//!
//! Users asking for a subscription send a screenshot of the payment receipt;
//! it waits here until the administrator approves or rejects it. The pending
//! set is persisted as JSON, the photo bytes as one file per user.

use std::{
    collections::BTreeSet,
    fs,
    path::PathBuf,
    sync::Mutex,
};

use crate::{domain::UserId, store::JsonStore, Result};

pub struct ReceiptQueue {
    store: JsonStore,
    blob_dir: PathBuf,
    pending: Mutex<BTreeSet<i64>>,
}

impl ReceiptQueue {
    pub fn new(store: JsonStore, blob_dir: impl Into<PathBuf>) -> Self {
        let pending = store.load_or_default();
        Self {
            store,
            blob_dir: blob_dir.into(),
            pending: Mutex::new(pending),
        }
    }

    /// Queue a receipt. Returns `false` without overwriting anything when the
    /// user already has one pending.
    pub fn submit(&self, user: UserId, photo: &[u8]) -> Result<bool> {
        let mut pending = self.pending.lock().expect("receipt lock");
        if pending.contains(&user.0) {
            return Ok(false);
        }
        fs::create_dir_all(&self.blob_dir)?;
        fs::write(self.blob_path(user), photo)?;
        pending.insert(user.0);
        self.store.save(&*pending)?;
        Ok(true)
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.pending.lock().expect("receipt lock").contains(&user.0)
    }

    /// Pending user ids in ascending order.
    pub fn pending(&self) -> Vec<UserId> {
        self.pending
            .lock()
            .expect("receipt lock")
            .iter()
            .map(|id| UserId(*id))
            .collect()
    }

    /// Stored receipt photo, if both the queue entry and the blob survive.
    pub fn photo(&self, user: UserId) -> Option<Vec<u8>> {
        if !self.contains(user) {
            return None;
        }
        fs::read(self.blob_path(user)).ok()
    }

    /// Drop the queue entry and its blob after a verdict.
    pub fn remove(&self, user: UserId) -> Result<()> {
        let mut pending = self.pending.lock().expect("receipt lock");
        if !pending.remove(&user.0) {
            return Ok(());
        }
        self.store.save(&*pending)?;
        match fs::remove_file(self.blob_path(user)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn blob_path(&self, user: UserId) -> PathBuf {
        self.blob_dir.join(format!("{}.jpg", user.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(dir: &std::path::Path) -> ReceiptQueue {
        ReceiptQueue::new(
            JsonStore::new(dir.join("receipts.json")),
            dir.join("receipts"),
        )
    }

    #[test]
    fn submit_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(dir.path());

        assert!(q.submit(UserId(1), b"jpegbytes").unwrap());
        assert!(q.contains(UserId(1)));
        assert_eq!(q.photo(UserId(1)).as_deref(), Some(b"jpegbytes".as_ref()));
    }

    #[test]
    fn duplicate_submission_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(dir.path());

        assert!(q.submit(UserId(1), b"first").unwrap());
        assert!(!q.submit(UserId(1), b"second").unwrap());
        assert_eq!(q.photo(UserId(1)).as_deref(), Some(b"first".as_ref()));
    }

    #[test]
    fn remove_clears_entry_and_blob() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(dir.path());

        q.submit(UserId(1), b"x").unwrap();
        q.remove(UserId(1)).unwrap();
        assert!(!q.contains(UserId(1)));
        assert!(q.photo(UserId(1)).is_none());
        // second remove is a no-op
        q.remove(UserId(1)).unwrap();
    }

    #[test]
    fn queue_persists_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let q = queue(dir.path());
            q.submit(UserId(5), b"r").unwrap();
            q.submit(UserId(3), b"r").unwrap();
        }
        let q = queue(dir.path());
        assert_eq!(q.pending(), vec![UserId(3), UserId(5)]);
        assert_eq!(q.photo(UserId(5)).as_deref(), Some(b"r".as_ref()));
    }
}
