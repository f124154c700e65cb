//! Short-lived tickets for synthesized audio.
//!
//! A chat reply's audio is synthesized once and then fetched by separate
//! requests (playback, lip-sync). The audio is parked in a file and handed
//! out as a [`TicketId`] that expires after a fixed lifetime.
//!
//! # Examples
//!
//! ```no_run
//! # async fn demo() -> lipbridge::Result<()> {
//! use std::time::Duration;
//! use lipbridge::ticket::TicketStore;
//!
//! let store = TicketStore::new(std::env::temp_dir().join("tickets"), Duration::from_secs(60));
//! let id = store.issue(b"ID3...", "mp3").await?;
//! assert!(store.read(&id).await.is_some());
//! assert!(store.redeem(&id).await.is_some());
//! assert!(store.redeem(&id).await.is_none());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Opaque ticket identifier.
pub type TicketId = String;

#[derive(Debug, Clone)]
struct Ticket {
    path: PathBuf,
    expires_at: Instant,
}

/// Concurrent map of ticket → parked audio file. Cheaply cloneable.
#[derive(Debug, Clone)]
pub struct TicketStore {
    dir: PathBuf,
    ttl: Duration,
    tickets: Arc<RwLock<HashMap<TicketId, Ticket>>>,
}

impl TicketStore {
    /// Create a store that parks files in `dir` for `ttl`.
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
            tickets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Directory holding parked audio.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Park `audio` and return a fresh ticket for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub async fn issue(&self, audio: &[u8], extension: &str) -> Result<TicketId> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        let path = self.dir.join(format!("{id}.{extension}"));
        tokio::fs::write(&path, audio).await?;

        let ticket = Ticket {
            path,
            expires_at: Instant::now() + self.ttl,
        };
        self.tickets.write().await.insert(id.clone(), ticket);
        debug!(ticket = %id, bytes = audio.len(), "issued audio ticket");
        Ok(id)
    }

    /// Read the parked audio without consuming the ticket.
    ///
    /// Unknown, expired, or missing-on-disk tickets yield `None`.
    pub async fn read(&self, id: &str) -> Option<Vec<u8>> {
        let path = {
            let tickets = self.tickets.read().await;
            let ticket = tickets.get(id)?;
            if ticket.expires_at <= Instant::now() {
                return None;
            }
            ticket.path.clone()
        };
        tokio::fs::read(&path).await.ok()
    }

    /// Consume the ticket: return its audio and delete the file.
    ///
    /// A ticket can be redeemed at most once.
    pub async fn redeem(&self, id: &str) -> Option<Vec<u8>> {
        let ticket = self.tickets.write().await.remove(id)?;
        let audio = if ticket.expires_at > Instant::now() {
            tokio::fs::read(&ticket.path).await.ok()
        } else {
            None
        };
        remove_file_logged(&ticket.path).await;
        audio
    }

    /// Drop every expired ticket and its file. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<Ticket> = {
            let mut tickets = self.tickets.write().await;
            let ids: Vec<TicketId> = tickets
                .iter()
                .filter(|(_, t)| t.expires_at <= now)
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| tickets.remove(id)).collect()
        };
        for ticket in &expired {
            remove_file_logged(&ticket.path).await;
        }
        if !expired.is_empty() {
            info!(removed = expired.len(), "swept expired audio tickets");
        }
        expired.len()
    }

    /// Number of live entries (including not-yet-swept expired ones).
    pub async fn len(&self) -> usize {
        self.tickets.read().await.len()
    }

    /// Whether the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.tickets.read().await.is_empty()
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `interval` until
    /// `cancel` fires.
    pub fn spawn_sweeper(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("ticket sweeper cancelled");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        store.sweep_expired().await;
                    }
                }
            }
        })
    }
}

async fn remove_file_logged(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "failed to remove ticket audio");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[tokio::test]
    async fn issue_read_redeem() {
        let dir = tempfile::tempdir().unwrap();
        let store = TicketStore::new(dir.path(), Duration::from_secs(60));

        let id = store.issue(b"audio-bytes", "mp3").await.unwrap();
        assert_eq!(store.read(&id).await.as_deref(), Some(&b"audio-bytes"[..]));
        assert_eq!(store.read(&id).await.as_deref(), Some(&b"audio-bytes"[..]));

        let file = dir.path().join(format!("{id}.mp3"));
        assert!(file.exists());

        assert_eq!(store.redeem(&id).await.as_deref(), Some(&b"audio-bytes"[..]));
        assert!(!file.exists());
        assert!(store.redeem(&id).await.is_none());
        assert!(store.read(&id).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn unknown_ticket_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = TicketStore::new(dir.path(), Duration::from_secs(60));
        assert!(store.read("nope").await.is_none());
        assert!(store.redeem("nope").await.is_none());
    }

    #[tokio::test]
    async fn expired_tickets_are_invisible_and_swept() {
        let dir = tempfile::tempdir().unwrap();
        let store = TicketStore::new(dir.path(), Duration::ZERO);

        let a = store.issue(b"a", "mp3").await.unwrap();
        let b = store.issue(b"b", "mp3").await.unwrap();
        assert!(store.read(&a).await.is_none());
        assert_eq!(store.len().await, 2);

        assert_eq!(store.sweep_expired().await, 2);
        assert!(store.is_empty().await);
        assert!(!dir.path().join(format!("{a}.mp3")).exists());
        assert!(store.redeem(&b).await.is_none());
    }

    #[tokio::test]
    async fn expired_redeem_still_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = TicketStore::new(dir.path(), Duration::ZERO);
        let id = store.issue(b"x", "wav").await.unwrap();
        assert!(store.redeem(&id).await.is_none());
        assert!(!dir.path().join(format!("{id}.wav")).exists());
    }

    #[tokio::test]
    async fn concurrent_issue_and_redeem() {
        let dir = tempfile::tempdir().unwrap();
        let store = TicketStore::new(dir.path(), Duration::from_secs(60));

        let mut handles = Vec::new();
        for i in 0..16u8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let id = store.issue(&[i; 8], "mp3").await.unwrap();
                let audio = store.redeem(&id).await.unwrap();
                assert_eq!(audio, vec![i; 8]);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn sweeper_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let store = TicketStore::new(dir.path(), Duration::ZERO);
        store.issue(b"x", "mp3").await.unwrap();

        let cancel = CancellationToken::new();
        let handle = store.spawn_sweeper(Duration::from_millis(10), cancel.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.is_empty().await);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
