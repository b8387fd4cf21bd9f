//! Security engine: gathers remote signals, scores them, persists the scan,
//! and alerts above the risk threshold.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::SharedClock;
use crate::db::entities::{security_scan, website};
use crate::db::enums::AlertSeverity;
use crate::db::services::{alert_service, scan_service, user_service, website_service};
use crate::error::ServiceError;
use crate::notifications::NotificationService;

use super::signals::{self, TlsSignal, UrlIntelligence};

const ALERT_THRESHOLD: i32 = 30;
const MAX_RISK_SCORE: i32 = 100;
const SCAN_LIST_LIMIT: u64 = 30;
const DASHBOARD_SCAN_LIMIT: u64 = 5;

pub struct SecurityService {
    db: Arc<DatabaseConnection>,
    notifier: Arc<NotificationService>,
    clock: SharedClock,
    client: reqwest::Client,
    virustotal_api_key: Option<String>,
}

impl SecurityService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        notifier: Arc<NotificationService>,
        clock: SharedClock,
        virustotal_api_key: Option<String>,
    ) -> Self {
        Self {
            db,
            notifier,
            clock,
            client: reqwest::Client::new(),
            virustotal_api_key,
        }
    }

    /// Runs the full signal sweep for one website and records a scan row.
    /// A score at or above the threshold raises a critical alert and an
    /// owner email.
    pub async fn scan_website(
        &self,
        website_id: Uuid,
    ) -> Result<security_scan::Model, ServiceError> {
        let website = website_service::get_website(&self.db, website_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Website not found".to_string()))?;

        info!(url = %website.url, "starting security scan");
        let now = self.clock.now();

        let tls = match signals::host_from_url(&website.url) {
            Some(host) => signals::check_tls(host, now).await,
            None => TlsSignal::Unknown,
        };
        let missing_headers = signals::check_security_headers(&self.client, &website.url).await;
        let intelligence = match &self.virustotal_api_key {
            Some(key) => signals::check_url_intelligence(&self.client, key, &website.url).await,
            None => UrlIntelligence::default(),
        };
        let exposures = signals::probe_exposures(&self.client, &website.url).await;

        let (risk_score, findings) =
            compose_findings(&tls, &missing_headers, intelligence, &exposures);

        let scan = scan_service::create_scan(
            &self.db,
            scan_service::NewScan {
                website_id,
                risk_score,
                findings: findings.join("\n"),
                scanned_at: now,
            },
        )
        .await?;

        if risk_score >= ALERT_THRESHOLD {
            self.raise_alert(&website, risk_score, &findings).await?;
        }
        info!(url = %website.url, risk_score, findings = findings.len(), "security scan finished");
        Ok(scan)
    }

    async fn raise_alert(
        &self,
        website: &website::Model,
        risk_score: i32,
        findings: &[String],
    ) -> Result<(), ServiceError> {
        warn!(url = %website.url, risk_score, "security risk above threshold");

        alert_service::create_alert(
            &self.db,
            alert_service::NewAlert {
                user_id: website.user_id,
                website_id: website.id,
                alert_type: "security".to_string(),
                severity: AlertSeverity::Critical,
                message: format!(
                    "Security scan for {} scored {risk_score}/100: {}",
                    website.name,
                    findings.join("; ")
                ),
                sent_at: self.clock.now(),
            },
        )
        .await?;

        if let Some(owner) = user_service::get_user(&self.db, website.user_id).await? {
            self.notifier
                .send_security_alert(&owner.email, &website.name, findings)
                .await;
        }
        Ok(())
    }

    /// On-demand scan for the external HTTP layer, ownership-checked.
    pub async fn manual_scan(
        &self,
        user_id: Uuid,
        website_id: Uuid,
    ) -> Result<security_scan::Model, ServiceError> {
        website_service::get_owned_website(&self.db, user_id, website_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Website not found".to_string()))?;
        self.scan_website(website_id).await
    }

    pub async fn get_scans(
        &self,
        user_id: Uuid,
        website_id: Uuid,
    ) -> Result<Vec<security_scan::Model>, ServiceError> {
        website_service::get_owned_website(&self.db, user_id, website_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Website not found".to_string()))?;
        Ok(scan_service::recent_scans(&self.db, website_id, SCAN_LIST_LIMIT).await?)
    }

    pub async fn get_latest_scans(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<security_scan::Model>, ServiceError> {
        Ok(scan_service::latest_scans_for_user(&self.db, user_id, DASHBOARD_SCAN_LIMIT).await?)
    }
}

/// Turns raw signals into a clamped risk score plus human-readable findings.
///
/// Weights: invalid certificate 30, expiring certificate 10, any missing
/// hardening header 15 (flat, regardless of how many), malicious verdicts
/// 50, suspicious verdicts 15, each exposure 5.
pub(crate) fn compose_findings(
    tls: &TlsSignal,
    missing_headers: &[String],
    intelligence: UrlIntelligence,
    exposures: &[String],
) -> (i32, Vec<String>) {
    let mut score = 0i32;
    let mut findings = Vec::new();

    match tls {
        TlsSignal::Invalid { reason } => {
            score += 30;
            findings.push(format!("SSL certificate is invalid or expired ({reason})"));
        }
        TlsSignal::ExpiringSoon { days_until_expiry } => {
            score += 10;
            findings.push(format!(
                "SSL certificate expires in {days_until_expiry} days"
            ));
        }
        TlsSignal::Valid { .. } | TlsSignal::Unknown => {}
    }

    if !missing_headers.is_empty() {
        score += 15;
        for header in missing_headers {
            findings.push(format!("Missing security header: {header}"));
        }
    }

    // Malicious verdicts subsume suspicious ones; the increments are
    // mutually exclusive.
    if intelligence.malicious > 0 {
        score += 50;
        findings.push(format!(
            "Flagged as malicious by {} scanning engines",
            intelligence.malicious
        ));
    } else if intelligence.suspicious > 0 {
        score += 15;
        findings.push(format!(
            "Flagged as suspicious by {} scanning engines",
            intelligence.suspicious
        ));
    }

    score += exposures.len() as i32 * 5;
    findings.extend_from_slice(exposures);

    (score.clamp(0, MAX_RISK_SCORE), findings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_site_scores_zero() {
        let (score, findings) = compose_findings(
            &TlsSignal::Valid {
                days_until_expiry: 200,
            },
            &[],
            UrlIntelligence::default(),
            &[],
        );
        assert_eq!(score, 0);
        assert!(findings.is_empty());
    }

    #[test]
    fn invalid_certificate_crosses_alert_threshold() {
        let (score, findings) = compose_findings(
            &TlsSignal::Invalid {
                reason: "expired".to_string(),
            },
            &[],
            UrlIntelligence::default(),
            &[],
        );
        assert_eq!(score, 30);
        assert!(findings[0].contains("SSL certificate"));
        assert!(score >= ALERT_THRESHOLD);
    }

    #[test]
    fn missing_headers_score_flat_fifteen() {
        let headers = vec![
            "x-frame-options".to_string(),
            "content-security-policy".to_string(),
        ];
        let (score, findings) =
            compose_findings(&TlsSignal::Unknown, &headers, UrlIntelligence::default(), &[]);
        // Two missing headers still score 15, below the alert threshold.
        assert_eq!(score, 15);
        assert_eq!(findings.len(), 2);
        assert!(score < ALERT_THRESHOLD);
    }

    #[test]
    fn score_is_clamped_at_one_hundred() {
        let exposures: Vec<String> = (0..10).map(|i| format!("exposure {i}")).collect();
        let (score, _) = compose_findings(
            &TlsSignal::Invalid {
                reason: "expired".to_string(),
            },
            &["x-frame-options".to_string()],
            UrlIntelligence {
                malicious: 12,
                suspicious: 3,
            },
            &exposures,
        );
        assert_eq!(score, 100);
    }

    #[test]
    fn malicious_verdicts_subsume_suspicious_ones() {
        let (score, findings) = compose_findings(
            &TlsSignal::Unknown,
            &[],
            UrlIntelligence {
                malicious: 5,
                suspicious: 2,
            },
            &[],
        );
        assert_eq!(score, 50);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].contains("malicious"));
    }

    #[test]
    fn suspicious_alone_scores_fifteen() {
        let (score, findings) = compose_findings(
            &TlsSignal::Unknown,
            &[],
            UrlIntelligence {
                malicious: 0,
                suspicious: 3,
            },
            &[],
        );
        assert_eq!(score, 15);
        assert!(findings[0].contains("suspicious"));
    }

    #[test]
    fn expiring_certificate_alone_stays_below_threshold() {
        let (score, _) = compose_findings(
            &TlsSignal::ExpiringSoon {
                days_until_expiry: 7,
            },
            &[],
            UrlIntelligence::default(),
            &[],
        );
        assert_eq!(score, 10);
        assert!(score < ALERT_THRESHOLD);
    }

    #[test]
    fn unknown_tls_contributes_nothing() {
        let (score, findings) =
            compose_findings(&TlsSignal::Unknown, &[], UrlIntelligence::default(), &[]);
        assert_eq!(score, 0);
        assert!(findings.is_empty());
    }
}
