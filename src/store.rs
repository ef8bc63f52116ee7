//! Durable envelope storage.
//!
//! One file per envelope in a designated directory. Writes go through a
//! temporary path and a rename, so a reader enumerating the directory at
//! any moment sees either the prior state or the fully-written file,
//! never a partial one. All disk writes run on a single background worker
//! thread; callers are never blocked on IO.
//!
//! # Safety Guarantees
//! - Temp file fsync'd before rename: the visible file is always complete
//! - Corrupt files are removed on sight, never retried
//! - Enumeration never aborts on one bad file
//!
//! Durability is best-effort: a failed write is logged at Error level and
//! the envelope dropped, with no retry (worst outcome is the loss of one
//! telemetry record).

use crate::codec;
use crate::envelope::Envelope;
use crate::error::Result;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};

/// Extension of complete envelope files. Temporaries use `tmp` and are
/// never visible to enumeration.
pub const ENVELOPE_EXT: &str = "envelope";
const TMP_EXT: &str = "tmp";

enum Job {
    Write { envelope: Envelope, path: PathBuf },
    Flush(Sender<()>),
    Shutdown,
}

/// Envelope store bound to one directory.
///
/// The store exclusively owns on-disk files between [`save`] and their
/// deletion through [`remove`] by the transport-acknowledgement path.
///
/// [`save`]: EnvelopeStore::save
/// [`remove`]: EnvelopeStore::remove
pub struct EnvelopeStore {
    dir: PathBuf,
    seq: AtomicU64,
    tx: Sender<Job>,
    worker: Option<JoinHandle<()>>,
}

impl EnvelopeStore {
    /// Opens a store over `dir`, creating the directory and spawning the
    /// background writer.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let (tx, rx) = mpsc::channel::<Job>();
        let worker = thread::Builder::new()
            .name("beacon-envelope-writer".to_string())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    match job {
                        Job::Write { envelope, path } => write_envelope(&envelope, &path),
                        Job::Flush(ack) => {
                            let _ = ack.send(());
                        }
                        Job::Shutdown => break,
                    }
                }
            })?;

        Ok(Self {
            dir,
            seq: AtomicU64::new(0),
            tx,
            worker: Some(worker),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Queues the envelope for persistence and returns the path it will
    /// appear at once the background write completes.
    ///
    /// Envelopes saved by one thread are written in call order relative
    /// to each other (single FIFO worker). Failures are logged at Error
    /// level and the envelope is dropped.
    pub fn save(&self, envelope: Envelope) -> PathBuf {
        let path = self.next_path();
        let job = Job::Write {
            envelope,
            path: path.clone(),
        };
        if self.tx.send(job).is_err() {
            crate::log_error!(
                "envelope writer is gone, dropping envelope for {}",
                path.display()
            );
        }
        path
    }

    /// Blocks until every write queued before this call has been
    /// processed.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = mpsc::channel();
        if self.tx.send(Job::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Reads and decodes one envelope file.
    ///
    /// Corrupt or truncated content is unrecoverable: the file is removed
    /// and the error returned, never retried.
    pub fn load(&self, path: &Path) -> Result<Envelope> {
        let bytes = fs::read(path)?;
        match codec::decode(&bytes) {
            Ok(envelope) => Ok(envelope),
            Err(e) if e.is_corrupt() => {
                crate::log_error!("removing unrecoverable envelope {}: {e}", path.display());
                let _ = fs::remove_file(path);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Lazily decodes all complete files in arrival order, oldest first.
    ///
    /// Corrupt entries are removed and logged; entries this build cannot
    /// decode for other reasons are skipped and logged. The sequence
    /// never fails because of one bad file.
    pub fn pending(&self) -> Pending {
        let mut files: Vec<PathBuf> = match fs::read_dir(&self.dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == ENVELOPE_EXT))
                .collect(),
            Err(e) => {
                crate::log_error!("cannot enumerate {}: {e}", self.dir.display());
                Vec::new()
            }
        };
        // Names are zero-padded timestamp + sequence, so lexicographic
        // order is arrival order.
        files.sort();
        Pending {
            files: files.into_iter(),
        }
    }

    /// Deletes one persisted envelope after the transport layer has
    /// acknowledged delivery.
    pub fn remove(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    fn next_path(&self) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.dir
            .join(format!("{nanos:024}-{seq:08}.{ENVELOPE_EXT}"))
    }
}

impl Drop for EnvelopeStore {
    // Drains queued writes, then stops the worker.
    fn drop(&mut self) {
        let _ = self.tx.send(Job::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Iterator returned by [`EnvelopeStore::pending`].
pub struct Pending {
    files: std::vec::IntoIter<PathBuf>,
}

impl Iterator for Pending {
    type Item = Envelope;

    fn next(&mut self) -> Option<Envelope> {
        loop {
            let path = self.files.next()?;
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    crate::log_error!("skipping unreadable envelope {}: {e}", path.display());
                    continue;
                }
            };
            match codec::decode(&bytes) {
                Ok(envelope) => return Some(envelope),
                Err(e) if e.is_corrupt() => {
                    crate::log_error!("removing corrupt envelope {}: {e}", path.display());
                    let _ = fs::remove_file(&path);
                    continue;
                }
                Err(e) => {
                    crate::log_warning!("skipping undecodable envelope {}: {e}", path.display());
                    continue;
                }
            }
        }
    }
}

/// Runs on the worker thread: encode, write temp, fsync, rename.
fn write_envelope(envelope: &Envelope, path: &Path) {
    let bytes = match codec::encode(envelope) {
        Ok(bytes) => bytes,
        Err(e) => {
            crate::log_error!("dropping unencodable envelope for {}: {e}", path.display());
            return;
        }
    };

    let tmp = path.with_extension(TMP_EXT);
    if let Err(e) = write_atomic(&bytes, &tmp, path) {
        crate::log_error!("failed to persist envelope to {}: {e}", path.display());
        let _ = fs::remove_file(&tmp);
    }
}

fn write_atomic(bytes: &[u8], tmp: &Path, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(tmp)?;
    file.write_all(bytes)?;
    // fsync before rename so the rename only ever publishes complete bytes.
    file.sync_all()?;
    fs::rename(tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EventEnvelope;
    use tempfile::tempdir;

    fn envelope_with(key: &str, value: f64) -> Envelope {
        let mut event = EventEnvelope::new();
        event.set_measurement(key, value);
        Envelope::Event(event)
    }

    #[test]
    fn test_save_produces_one_complete_file() {
        let dir = tempdir().unwrap();
        let store = EnvelopeStore::open(dir.path()).unwrap();

        let path = store.save(envelope_with("duration", 125.0));
        store.flush();

        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), ENVELOPE_EXT);

        // No temporary left behind.
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());

        let loaded = store.load(&path).unwrap();
        assert_eq!(loaded.measurements()["duration"], 125.0);
    }

    #[test]
    fn test_pending_yields_arrival_order() {
        let dir = tempdir().unwrap();
        let store = EnvelopeStore::open(dir.path()).unwrap();

        for i in 0..5 {
            store.save(envelope_with("seq", i as f64));
        }
        store.flush();

        let order: Vec<f64> = store
            .pending()
            .map(|envelope| envelope.measurements()["seq"])
            .collect();
        assert_eq!(order, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_load_removes_corrupt_file() {
        let dir = tempdir().unwrap();
        let store = EnvelopeStore::open(dir.path()).unwrap();

        let path = store.save(envelope_with("duration", 1.0));
        store.flush();

        // Truncate to half: unrecoverable.
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        let result = store.load(&path);
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_load_keeps_file_on_unknown_discriminator() {
        let dir = tempdir().unwrap();
        let store = EnvelopeStore::open(dir.path()).unwrap();

        let path = store.save(envelope_with("duration", 1.0));
        store.flush();

        // Rewrite the discriminator to a name no variant claims, fixing
        // up the checksum so the frame itself stays intact.
        let valid = fs::read(&path).unwrap();
        let rewritten = reframe_with_name(&valid, "GhostEnvelope");
        fs::write(&path, rewritten).unwrap();

        let result = store.load(&path);
        assert!(matches!(
            result,
            Err(crate::error::EnvelopeError::UnknownDiscriminator(_))
        ));
        // A newer deployment may understand it; the file stays.
        assert!(path.exists());
    }

    #[test]
    fn test_drop_drains_queued_writes() {
        let dir = tempdir().unwrap();
        let paths: Vec<PathBuf> = {
            let store = EnvelopeStore::open(dir.path()).unwrap();
            (0..10)
                .map(|i| store.save(envelope_with("n", i as f64)))
                .collect()
        };
        for path in paths {
            assert!(path.exists());
        }
    }

    #[test]
    fn test_remove_deletes_acknowledged_envelope() {
        let dir = tempdir().unwrap();
        let store = EnvelopeStore::open(dir.path()).unwrap();

        let path = store.save(envelope_with("duration", 1.0));
        store.flush();
        assert!(path.exists());

        store.remove(&path).unwrap();
        assert!(!path.exists());
        assert_eq!(store.pending().count(), 0);
    }

    /// Rebuilds a valid frame around a different discriminator string.
    fn reframe_with_name(valid: &[u8], name: &str) -> Vec<u8> {
        let body_len = u32::from_le_bytes(valid[8..12].try_into().unwrap()) as usize;
        let old_name_len = u16::from_le_bytes(valid[6..8].try_into().unwrap()) as usize;
        let body = &valid[20 + old_name_len..20 + old_name_len + body_len];

        let mut digest = crc64fast::Digest::new();
        digest.write(name.as_bytes());
        digest.write(body);

        let mut out = Vec::new();
        out.extend_from_slice(&valid[0..6]); // magic + version
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&digest.sum64().to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(body);
        out
    }
}
