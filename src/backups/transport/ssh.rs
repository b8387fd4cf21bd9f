//! Full-fidelity backup over SSH.
//!
//! The bundle is built on the origin host with `tar` and fetched over the
//! session's SFTP channel, so only one compressed stream crosses the wire.
//! libssh2 is blocking; every session lives inside `spawn_blocking`.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use ssh2::Session;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::entities::website;

use super::{
    RestoreOutcome, Snapshot, Transport, TransportError, CONNECT_TIMEOUT, SESSION_TIMEOUT_MS,
};

const DEFAULT_PORT: u16 = 22;
const DEFAULT_CONTENT_ROOT: &str = "/var/www/html";

#[derive(Clone)]
pub struct SshTransport {
    website_id: Uuid,
    host: String,
    port: u16,
    user: String,
    private_key: Option<String>,
    content_root: String,
}

impl SshTransport {
    /// Requires at least a host and a user. Without a private key the
    /// session falls back to agent authentication.
    pub fn from_website(website: &website::Model) -> Option<Self> {
        let host = website.ssh_host.clone()?;
        let user = website.ssh_user.clone()?;
        Some(Self {
            website_id: website.id,
            host,
            port: website.ssh_port.map(|p| p as u16).unwrap_or(DEFAULT_PORT),
            user,
            private_key: website.ssh_private_key.clone(),
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

        match &self.private_key {
            Some(key) => session
                .userauth_pubkey_memory(&self.user, None, key, None)
                .map_err(|e| TransportError::Auth(e.to_string()))?,
            None => session
                .userauth_agent(&self.user)
                .map_err(|e| TransportError::Auth(e.to_string()))?,
        }
        Ok(session)
    }

    fn exec(session: &Session, command: &str) -> Result<(i32, String), TransportError> {
        let mut channel = session.channel_session()?;
        channel.exec(command)?;
        let mut stdout = String::new();
        channel.read_to_string(&mut stdout)?;
        let mut stderr = String::new();
        channel.stderr().read_to_string(&mut stderr)?;
        channel.wait_close()?;
        Ok((channel.exit_status()?, stderr))
    }

    fn capture_blocking(&self) -> Result<Snapshot, TransportError> {
        let session = self.connect()?;
        let stamp = Utc::now().timestamp_millis();
        let bundle = format!("{}/backup-{}.tar.gz", self.content_root, stamp);

        let (code, stderr) = Self::exec(
            &session,
            &format!("tar -czf {} -C {} .", bundle, self.content_root),
        )?;
        if code != 0 {
            return Err(TransportError::CommandFailed(format!(
                "tar exited with {code}: {}",
                stderr.trim()
            )));
        }

        let sftp = session.sftp()?;
        let mut remote = sftp.open(Path::new(&bundle))?;
        let mut content = Vec::new();
        remote.read_to_end(&mut content)?;
        drop(remote);

        // Best-effort removal; the bundle is already in memory.
        if let Err(e) = Self::exec(&session, &format!("rm -f {bundle}")) {
            warn!(host = %self.host, error = %e, "failed to remove remote bundle");
        }

        debug!(host = %self.host, bytes = content.len(), "ssh bundle fetched");
        Ok(Snapshot {
            file_name: format!("backup-{}-{}.tar.gz", self.website_id, stamp),
            content,
            content_type: "application/gzip",
        })
    }

    fn restore_blocking(&self, archive: Vec<u8>) -> Result<RestoreOutcome, TransportError> {
        let session = self.connect()?;
        let stamp = Utc::now().timestamp_millis();
        let remote_path = format!("{}/restore-{}.tar.gz", self.content_root, stamp);

        let sftp = session.sftp()?;
        let mut remote = sftp.create(Path::new(&remote_path))?;
        remote.write_all(&archive)?;
        drop(remote);

        let (code, stderr) = Self::exec(
            &session,
            &format!(
                "cd {} && tar -xzf {} && rm -f {}",
                self.content_root, remote_path, remote_path
            ),
        )?;
        if code != 0 {
            return Err(TransportError::CommandFailed(format!(
                "extraction exited with {code}: {}",
                stderr.trim()
            )));
        }
        Ok(RestoreOutcome::Completed)
    }
}

#[async_trait]
impl Transport for SshTransport {
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
