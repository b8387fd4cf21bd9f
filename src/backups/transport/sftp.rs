//! Best-effort backup over plain SFTP.
//!
//! Without command execution there is no server-side archiving, so the
//! transport lists the content root, downloads up to a bounded number of
//! files, and zips them in memory. Unreadable entries are skipped rather
//! than failing the whole snapshot.

use std::io::{Cursor, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use ssh2::Session;
use tracing::{debug, warn};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::db::entities::website;

use super::{
    RestoreOutcome, Snapshot, Transport, TransportError, CONNECT_TIMEOUT, SESSION_TIMEOUT_MS,
};

const DEFAULT_PORT: u16 = 22;
const DEFAULT_CONTENT_ROOT: &str = "/public_html";
/// Cap on files per snapshot; shared hosts routinely expose huge trees.
const MAX_FILES: usize = 100;

#[derive(Clone)]
pub struct SftpTransport {
    website_id: Uuid,
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    content_root: String,
}

impl SftpTransport {
    pub fn from_website(website: &website::Model) -> Option<Self> {
        let host = website.ftp_host.clone()?;
        let user = website.ftp_user.clone()?;
        Some(Self {
            website_id: website.id,
            host,
            port: website.ftp_port.map(|p| p as u16).unwrap_or(DEFAULT_PORT),
            user,
            password: website.ftp_password.clone(),
            content_root: website
                .content_root
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTENT_ROOT.to_string()),
        })
    }

    fn connect(&self) -> Result<Session, TransportError> {
        let addr = format!("{}:{}", self.host, self.port)
            .to_socket_addrs()
            .map_err(|e| TransportError::Connection(e.to_string()))?
            .next()
            .ok_or_else(|| {
                TransportError::Connection(format!("{} did not resolve", self.host))
            })?;
        let tcp = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.handshake()?;
        session.set_timeout(SESSION_TIMEOUT_MS);
        session
            .userauth_password(&self.user, self.password.as_deref().unwrap_or(""))
            .map_err(|e| TransportError::Auth(e.to_string()))?;
        Ok(session)
    }

    fn capture_blocking(&self) -> Result<Snapshot, TransportError> {
        let session = self.connect()?;
        let sftp = session.sftp()?;
        let entries = sftp.readdir(Path::new(&self.content_root))?;

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut archived = 0usize;

        for (path, stat) in entries {
            if archived >= MAX_FILES {
                break;
            }
            if !stat.is_file() {
                continue;
            }
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned())
            else {
                continue;
            };
            let mut content = Vec::new();
            let readable = sftp
                .open(&path)
                .map_err(TransportError::from)
                .and_then(|mut f| f.read_to_end(&mut content).map_err(TransportError::from));
            if let Err(e) = readable {
                warn!(file = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
            writer.start_file(name, options)?;
            writer
                .write_all(&content)
                .map_err(|e| TransportError::Archive(e.to_string()))?;
            archived += 1;
        }

        let cursor = writer.finish()?;
        debug!(host = %self.host, files = archived, "sftp snapshot archived");
        Ok(Snapshot {
            file_name: format!(
                "backup-{}-{}.zip",
                self.website_id,
                Utc::now().timestamp_millis()
            ),
            content: cursor.into_inner(),
            content_type: "application/zip",
        })
    }

    fn restore_blocking(&self, archive: Vec<u8>) -> Result<RestoreOutcome, TransportError> {
        let session = self.connect()?;
        let sftp = session.sftp()?;
        let remote_path = format!(
            "{}/restore-{}.zip",
            self.content_root,
            Utc::now().timestamp_millis()
        );
        let mut remote = sftp.create(Path::new(&remote_path))?;
        remote.write_all(&archive)?;
        Ok(RestoreOutcome::ManualExtractionRequired)
    }
}

#[async_trait]
impl Transport for SftpTransport {
    async fn capture(&self) -> Result<Snapshot, TransportError> {
        let transport = self.clone();
        tokio::task::spawn_blocking(move || transport.capture_blocking())
            .await
            .map_err(|e| TransportError::Task(e.to_string()))?
    }

    async fn restore(&self, archive: Vec<u8>) -> Result<RestoreOutcome, TransportError> {
        let transport = self.clone();
        tokio::task::spawn_blocking(move || transport.restore_blocking(archive))
            .await
            .map_err(|e| TransportError::Task(e.to_string()))?
    }
}
