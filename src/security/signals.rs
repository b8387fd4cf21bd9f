//! Remote security signals: TLS health, response headers, URL reputation,
//! and cheap misconfiguration probes.
//!
//! Every signal degrades to a neutral value when its remote side cannot be
//! reached. Unreachable is not the same as insecure; only positive evidence
//! raises the risk score.

use std::sync::Arc;
use std::time::Duration;

use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::ServerName;
use serde::Deserialize;
use tokio_rustls::TlsConnector;
use tracing::debug;
use x509_parser::prelude::FromDer;
use x509_parser::certificate::X509Certificate;

const TLS_TIMEOUT: Duration = Duration::from_secs(10);
const HEADER_TIMEOUT: Duration = Duration::from_secs(5);
const INTEL_TIMEOUT: Duration = Duration::from_secs(10);
const EXPOSURE_TIMEOUT: Duration = Duration::from_secs(2);

const EXPIRY_WARNING_DAYS: i64 = 30;

/// Response headers every hardened site is expected to set.
const REQUIRED_HEADERS: [&str; 4] = [
    "x-content-type-options",
    "x-frame-options",
    "strict-transport-security",
    "content-security-policy",
];

/// Paths that must never be reachable on a production host.
const SENSITIVE_PATHS: [&str; 4] = ["/.git/", "/.env", "/wp-config.php.bak", "/config.php.bak"];

/// Server banners with well-known unpatched lines.
const OUTDATED_BANNERS: [&str; 2] = ["apache/2.2", "nginx/1."];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsSignal {
    Valid { days_until_expiry: i64 },
    ExpiringSoon { days_until_expiry: i64 },
    Invalid { reason: String },
    /// Host unreachable or response unparsable; contributes nothing.
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UrlIntelligence {
    pub malicious: u64,
    pub suspicious: u64,
}

/// Performs a real TLS handshake against port 443 and inspects the leaf
/// certificate. A rejected certificate is a finding; a connection that
/// never reaches the handshake is `Unknown`.
pub async fn check_tls(host: &str, now: chrono::DateTime<chrono::Utc>) -> TlsSignal {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));

    let Ok(server_name) = ServerName::try_from(host.to_string()) else {
        return TlsSignal::Unknown;
    };

    let tcp = match tokio::time::timeout(
        TLS_TIMEOUT,
        tokio::net::TcpStream::connect((host, 443)),
    )
    .await
    {
        Ok(Ok(stream)) => stream,
        _ => {
            debug!(host, "tls probe: host unreachable on 443");
            return TlsSignal::Unknown;
        }
    };

    let stream = match tokio::time::timeout(TLS_TIMEOUT, connector.connect(server_name, tcp)).await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            // Certificate rejection surfaces as an io::Error wrapping a
            // rustls error; anything else is a transport problem.
            let rejected = e
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<rustls::Error>())
                .is_some_and(|re| matches!(re, rustls::Error::InvalidCertificate(_)));
            if rejected {
                return TlsSignal::Invalid {
                    reason: e.to_string(),
                };
            }
            debug!(host, error = %e, "tls probe: handshake aborted");
            return TlsSignal::Unknown;
        }
        Err(_) => return TlsSignal::Unknown,
    };

    let (_, connection) = stream.get_ref();
    let Some(leaf) = connection.peer_certificates().and_then(|certs| certs.first()) else {
        return TlsSignal::Unknown;
    };
    let Ok((_, certificate)) = X509Certificate::from_der(leaf.as_ref()) else {
        return TlsSignal::Unknown;
    };

    let not_after = certificate.validity().not_after.timestamp();
    let days_until_expiry = (not_after - now.timestamp()) / 86_400;
    if days_until_expiry < 0 {
        TlsSignal::Invalid {
            reason: "certificate has expired".to_string(),
        }
    } else if days_until_expiry < EXPIRY_WARNING_DAYS {
        TlsSignal::ExpiringSoon { days_until_expiry }
    } else {
        TlsSignal::Valid { days_until_expiry }
    }
}

/// Headers from `REQUIRED_HEADERS` absent from the response. An
/// unreachable site reports none missing.
pub async fn check_security_headers(client: &reqwest::Client, url: &str) -> Vec<String> {
    let response = match client.head(url).timeout(HEADER_TIMEOUT).send().await {
        Ok(response) => response,
        Err(e) => {
            debug!(url, error = %e, "header probe failed");
            return Vec::new();
        }
    };
    REQUIRED_HEADERS
        .iter()
        .filter(|header| !response.headers().contains_key(**header))
        .map(|header| header.to_string())
        .collect()
}

#[derive(Deserialize)]
struct VtResponse {
    data: Vec<VtEntry>,
}

#[derive(Deserialize)]
struct VtEntry {
    attributes: VtAttributes,
}

#[derive(Deserialize)]
struct VtAttributes {
    #[serde(default)]
    last_analysis_stats: VtStats,
}

#[derive(Deserialize, Default)]
struct VtStats {
    #[serde(default)]
    malicious: u64,
    #[serde(default)]
    suspicious: u64,
}

/// Queries VirusTotal for engine verdicts on the URL. Any failure, and an
/// empty result set, count as neutral.
pub async fn check_url_intelligence(
    client: &reqwest::Client,
    api_key: &str,
    url: &str,
) -> UrlIntelligence {
    let request = client
        .get("https://www.virustotal.com/api/v3/urls/search")
        .query(&[("query", url)])
        .header("x-apikey", api_key)
        .timeout(INTEL_TIMEOUT);

    let parsed: VtResponse = match request.send().await {
        Ok(response) => match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(url, error = %e, "url intelligence response unparsable");
                return UrlIntelligence::default();
            }
        },
        Err(e) => {
            debug!(url, error = %e, "url intelligence lookup failed");
            return UrlIntelligence::default();
        }
    };

    parsed
        .data
        .first()
        .map(|entry| UrlIntelligence {
            malicious: entry.attributes.last_analysis_stats.malicious,
            suspicious: entry.attributes.last_analysis_stats.suspicious,
        })
        .unwrap_or_default()
}

/// Probes for exposed server banners and reachable sensitive paths.
pub async fn probe_exposures(client: &reqwest::Client, url: &str) -> Vec<String> {
    let mut findings = Vec::new();

    if let Ok(response) = client.head(url).timeout(HEADER_TIMEOUT).send().await {
        if let Some(banner) = response
            .headers()
            .get("server")
            .and_then(|v| v.to_str().ok())
        {
            let lowered = banner.to_ascii_lowercase();
            if OUTDATED_BANNERS.iter().any(|b| lowered.contains(b)) {
                findings.push(format!("Outdated server software exposed: {banner}"));
            }
        }
    }

    let base = url.trim_end_matches('/');
    for path in SENSITIVE_PATHS {
        let probe = format!("{base}{path}");
        if let Ok(response) = client.head(&probe).timeout(EXPOSURE_TIMEOUT).send().await {
            if response.status().as_u16() < 400 {
                findings.push(format!("Sensitive path is publicly reachable: {path}"));
            }
        }
    }
    findings
}

/// Host portion of an http(s) URL, without port or path.
pub fn host_from_url(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.split('@').next_back()?;
    let host = host.split(':').next()?;
    if host.is_empty() { None } else { Some(host) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_extraction_handles_ports_and_paths() {
        assert_eq!(host_from_url("https://shop.example/a/b"), Some("shop.example"));
        assert_eq!(host_from_url("http://shop.example:8080"), Some("shop.example"));
        assert_eq!(host_from_url("https://shop.example"), Some("shop.example"));
        assert_eq!(host_from_url("ftp://shop.example"), None);
        assert_eq!(host_from_url("https://"), None);
    }

    #[test]
    fn intelligence_defaults_to_neutral() {
        let neutral = UrlIntelligence::default();
        assert_eq!(neutral.malicious, 0);
        assert_eq!(neutral.suspicious, 0);
    }
}
