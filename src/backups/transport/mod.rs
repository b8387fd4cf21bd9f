//! Content-fetch/content-push strategies for backup and restore.
//!
//! Credential shape is resolved once per website into a closed variant:
//! SSH command execution (preferred), plain SFTP transfer, or none. The
//! engines dispatch through the `Transport` trait and never re-inspect
//! credentials.

use async_trait::async_trait;
use thiserror::Error;

use crate::db::entities::website;

pub mod sftp;
pub mod ssh;

pub use sftp::SftpTransport;
pub use ssh::SshTransport;

pub(crate) const CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);
/// libssh2 per-operation timeout, milliseconds.
pub(crate) const SESSION_TIMEOUT_MS: u32 = 120_000;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("remote command failed: {0}")]
    CommandFailed(String),
    #[error("archive error: {0}")]
    Archive(String),
    #[error("no restore method available (provide SSH or SFTP credentials)")]
    NoRestoreMethod,
    #[error("transfer task failed: {0}")]
    Task(String),
}

impl From<ssh2::Error> for TransportError {
    fn from(e: ssh2::Error) -> Self {
        TransportError::Connection(e.to_string())
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Connection(e.to_string())
    }
}

impl From<zip::result::ZipError> for TransportError {
    fn from(e: zip::result::ZipError) -> Self {
        TransportError::Archive(e.to_string())
    }
}

/// A captured point-in-time content snapshot, ready for upload.
pub struct Snapshot {
    pub file_name: String,
    pub content: Vec<u8>,
    pub content_type: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Bundle extracted on the origin host, remote temp file removed.
    Completed,
    /// Archive uploaded over plain file transfer; unattended extraction is
    /// not possible without command execution.
    ManualExtractionRequired,
}

impl RestoreOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            RestoreOutcome::Completed => "Restore completed successfully",
            RestoreOutcome::ManualExtractionRequired => {
                "Backup uploaded. Please extract and restore manually on your server."
            }
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn capture(&self) -> Result<Snapshot, TransportError>;
    async fn restore(&self, archive: Vec<u8>) -> Result<RestoreOutcome, TransportError>;
}

/// Credential shape for a website, resolved once. Preference order: SSH,
/// then SFTP, then none.
pub enum TransportKind {
    Ssh(SshTransport),
    Sftp(SftpTransport),
    None,
}

impl TransportKind {
    pub fn resolve(website: &website::Model) -> Self {
        if let Some(transport) = SshTransport::from_website(website) {
            return TransportKind::Ssh(transport);
        }
        if let Some(transport) = SftpTransport::from_website(website) {
            return TransportKind::Sftp(transport);
        }
        TransportKind::None
    }

    pub fn name(&self) -> &'static str {
        match self {
            TransportKind::Ssh(_) => "ssh",
            TransportKind::Sftp(_) => "sftp",
            TransportKind::None => "none",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::enums::WebsiteStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn bare_website() -> website::Model {
        website::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Shop".to_string(),
            url: "https://shop.example".to_string(),
            status: WebsiteStatus::Pending,
            last_checked: None,
            uptime_percentage: None,
            ssh_host: None,
            ssh_port: None,
            ssh_user: None,
            ssh_private_key: None,
            ftp_host: None,
            ftp_port: None,
            ftp_user: None,
            ftp_password: None,
            content_root: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn no_credentials_resolves_to_none() {
        assert_eq!(TransportKind::resolve(&bare_website()).name(), "none");
    }

    #[test]
    fn ssh_credentials_take_precedence() {
        let mut website = bare_website();
        website.ssh_host = Some("origin.example".to_string());
        website.ssh_user = Some("deploy".to_string());
        website.ftp_host = Some("origin.example".to_string());
        website.ftp_user = Some("deploy".to_string());
        assert_eq!(TransportKind::resolve(&website).name(), "ssh");
    }

    #[test]
    fn sftp_is_used_without_ssh() {
        let mut website = bare_website();
        website.ftp_host = Some("origin.example".to_string());
        website.ftp_user = Some("deploy".to_string());
        website.ftp_password = Some("secret".to_string());
        assert_eq!(TransportKind::resolve(&website).name(), "sftp");
    }

    #[test]
    fn partial_credentials_do_not_count() {
        let mut website = bare_website();
        website.ssh_host = Some("origin.example".to_string());
        // No ssh_user; host alone is not a usable credential set.
        assert_eq!(TransportKind::resolve(&website).name(), "none");
    }
}
