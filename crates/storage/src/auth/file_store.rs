//! Directory-backed [`TicketStore`].
//!
//! Each service owns one file, `<dir>/<service>.ticket`, holding the
//! ticket as JSON. Writes go to a temporary file in the same directory
//! which is then renamed over the slot, so readers see either the old or
//! the new ticket and never a partial one.
//!
//! ```text
//! tickets/
//! ├── wsfe.ticket
//! ├── wsfecred.ticket
//! └── ws_sr_padron_a10.ticket
//! ```

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tempfile::NamedTempFile;

use crate::{
    auth::{Ticket, TicketStore, store::ensure_ticket_for, validate_service_name},
    error::{StorageError, StorageResult},
};

/// File extension used for ticket slots.
pub const TICKET_FILE_EXTENSION: &str = "ticket";

/// [`TicketStore`] persisting one JSON file per service under a directory.
///
/// The directory is created on the first save. On Unix the temporary file
/// is created with mode `0600` and keeps it after the rename, so tickets
/// are readable only by the owning user.
///
/// # Examples
///
/// ```no_run
/// use arca_wsaa_storage::auth::{FileTicketStore, TicketStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = FileTicketStore::new("data/tickets");
/// assert!(store.slot_path("wsfe")?.ends_with("wsfe.ticket"));
///
/// if let Some(ticket) = store.load("wsfe").await? {
///     println!("cached ticket expires at {}", ticket.expires_at());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileTicketStore {
    dir: PathBuf,
}

impl FileTicketStore {
    /// Creates a store rooted at `dir`.
    ///
    /// No I/O happens until the first load or save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the ticket files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the slot for `service`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidServiceName`] if `service` cannot be
    /// used as a file stem.
    pub fn slot_path(&self, service: &str) -> StorageResult<PathBuf> {
        validate_service_name(service)?;
        Ok(self.dir.join(format!("{service}.{TICKET_FILE_EXTENSION}")))
    }
}

#[async_trait]
impl TicketStore for FileTicketStore {
    #[tracing::instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn load(&self, service: &str) -> StorageResult<Option<Ticket>> {
        let path = self.slot_path(service)?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no persisted ticket");
                return Ok(None);
            },
            Err(err) => {
                return Err(StorageError::io_with_source(
                    format!("reading {}", path.display()),
                    err,
                ));
            },
        };

        let ticket: Ticket = serde_json::from_slice(&bytes).map_err(|err| {
            StorageError::serialization_with_source(format!("decoding {}", path.display()), err)
        })?;

        if ticket.service() != service {
            return Err(StorageError::invalid_ticket(format!(
                "{} holds a ticket for service {:?}",
                path.display(),
                ticket.service()
            )));
        }

        Ok(Some(ticket))
    }

    #[tracing::instrument(
        skip(self, ticket),
        fields(dir = %self.dir.display(), expires_at = %ticket.expires_at())
    )]
    async fn save(&self, service: &str, ticket: &Ticket) -> StorageResult<()> {
        let path = self.slot_path(service)?;
        ensure_ticket_for(service, ticket)?;
        let bytes = serde_json::to_vec_pretty(ticket).map_err(|err| {
            StorageError::serialization_with_source(format!("encoding ticket for {service}"), err)
        })?;
        let dir = self.dir.clone();

        tokio::task::spawn_blocking(move || write_atomically(&dir, &path, &bytes))
            .await
            .map_err(|err| StorageError::internal_with_source("ticket write task failed", err))?
    }
}

/// Writes `bytes` to `path` through a synced temporary file in `dir`.
fn write_atomically(dir: &Path, path: &Path, bytes: &[u8]) -> StorageResult<()> {
    std::fs::create_dir_all(dir).map_err(|err| {
        StorageError::io_with_source(format!("creating {}", dir.display()), err)
    })?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|err| {
        StorageError::io_with_source(format!("creating temporary file in {}", dir.display()), err)
    })?;
    tmp.write_all(bytes)
        .map_err(|err| StorageError::io_with_source("writing temporary ticket file", err))?;
    tmp.as_file()
        .sync_all()
        .map_err(|err| StorageError::io_with_source("syncing temporary ticket file", err))?;

    // Dropping the temporary file on error removes it.
    tmp.persist(path).map_err(|err| {
        StorageError::io_with_source(format!("replacing {}", path.display()), err.error)
    })?;

    tracing::debug!(path = %path.display(), "ticket persisted");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeDelta, Utc};

    use super::*;

    fn ticket(service: &str, token: &str) -> Ticket {
        Ticket::builder()
            .service(service)
            .raw_response("<loginTicketResponse><token>t</token></loginTicketResponse>")
            .server_expires_at(Utc::now() + TimeDelta::hours(12))
            .safety_margin(Duration::from_secs(600))
            .token(token)
            .sign("sign")
            .build()
            .expect("valid ticket")
    }

    #[test]
    fn test_slot_path_uses_service_name() {
        let store = FileTicketStore::new("/var/lib/arca");
        assert_eq!(
            store.slot_path("wsfe").expect("valid name"),
            PathBuf::from("/var/lib/arca/wsfe.ticket")
        );
    }

    #[test]
    fn test_slot_path_rejects_traversal() {
        let store = FileTicketStore::new("/var/lib/arca");
        assert!(store.slot_path("../../etc/passwd").is_err());
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileTicketStore::new(dir.path());
        let original = ticket("wsfe", "token-1");

        store.save("wsfe", &original).await.expect("save");
        let loaded = store.load("wsfe").await.expect("load").expect("persisted");

        assert_eq!(loaded.token(), original.token());
        assert_eq!(loaded.sign(), original.sign());
        assert_eq!(loaded.expires_at(), original.expires_at());
        assert_eq!(loaded.raw_response(), original.raw_response());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_slot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileTicketStore::new(dir.path().join("not-created-yet"));

        assert_eq!(store.load("wsfe").await.expect("load"), None);
    }

    #[tokio::test]
    async fn test_save_creates_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("a").join("b");
        let store = FileTicketStore::new(&nested);

        store.save("wsfe", &ticket("wsfe", "t")).await.expect("save");
        assert!(nested.join("wsfe.ticket").is_file());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_serialization_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("wsfe.ticket"), b"{\"service\": \"wsf").expect("write");
        let store = FileTicketStore::new(dir.path());

        let result = store.load("wsfe").await;
        assert!(matches!(result, Err(StorageError::Serialization { .. })), "got {result:?}");
    }

    #[tokio::test]
    async fn test_ticket_for_other_service_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileTicketStore::new(dir.path());
        store.save("wsfe", &ticket("wsfe", "t")).await.expect("save");
        std::fs::rename(dir.path().join("wsfe.ticket"), dir.path().join("wslpg.ticket"))
            .expect("rename");

        let result = store.load("wslpg").await;
        assert!(matches!(result, Err(StorageError::InvalidTicket { .. })), "got {result:?}");
    }

    #[tokio::test]
    async fn test_save_rejects_ticket_for_other_service() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileTicketStore::new(dir.path());

        let result = store.save("wsfe", &ticket("wslpg", "t")).await;

        assert!(matches!(result, Err(StorageError::InvalidTicket { .. })), "got {result:?}");
        assert!(!dir.path().join("wsfe.ticket").exists());
    }

    #[tokio::test]
    async fn test_overwrite_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileTicketStore::new(dir.path());

        for i in 0..5 {
            store.save("wsfe", &ticket("wsfe", &format!("token-{i}"))).await.expect("save");
        }

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read_dir")
            .map(|e| e.expect("entry").file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("wsfe.ticket")]);

        let loaded = store.load("wsfe").await.expect("load").expect("persisted");
        assert_eq!(loaded.token(), "token-4");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ticket_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileTicketStore::new(dir.path());
        store.save("wsfe", &ticket("wsfe", "t")).await.expect("save");

        let mode = std::fs::metadata(dir.path().join("wsfe.ticket"))
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
