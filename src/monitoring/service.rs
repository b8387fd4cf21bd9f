use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::SharedClock;
use crate::db::entities::check;
use crate::db::enums::{AlertSeverity, WebsiteStatus};
use crate::db::services::{alert_service, check_service, user_service, website_service};
use crate::error::ServiceError;
use crate::notifications::NotificationService;

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);
const UPTIME_WINDOW_DAYS: i64 = 30;
const RECENT_CHECK_LIMIT: u64 = 100;

/// Status transition worth alerting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatusChange {
    WentDown,
    Recovered,
}

/// Per-website reachability probe, uptime aggregation, and online/offline
/// transition handling.
pub struct MonitoringService {
    db: Arc<DatabaseConnection>,
    notifier: Arc<NotificationService>,
    clock: SharedClock,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
pub struct WebsiteStatusReport {
    pub website_id: Uuid,
    pub status: WebsiteStatus,
    pub uptime_percentage: Option<f64>,
    pub last_checked: Option<DateTime<Utc>>,
    pub checks: Vec<check::Model>,
}

impl MonitoringService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        notifier: Arc<NotificationService>,
        clock: SharedClock,
    ) -> Self {
        Self {
            db,
            notifier,
            clock,
            client: reqwest::Client::new(),
        }
    }

    /// Probes the website once and persists the outcome.
    ///
    /// Network failures and bad statuses become failed Checks, never errors;
    /// only store failures propagate. Returns `None` when the website no
    /// longer exists (it may have been deleted after the job was enqueued).
    pub async fn check_website(
        &self,
        website_id: Uuid,
    ) -> Result<Option<check::Model>, ServiceError> {
        let Some(website) = website_service::get_website(&self.db, website_id).await? else {
            warn!(%website_id, "skipping check: website no longer exists");
            return Ok(None);
        };

        let started = Instant::now();
        let probe = self
            .client
            .get(&website.url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;
        let response_time_ms = started.elapsed().as_millis() as i32;

        let (status_code, success, error_message) = match probe {
            Ok(response) => {
                let code = response.status().as_u16() as i32;
                (code, probe_success(code), None)
            }
            Err(e) => (0, false, Some(e.to_string())),
        };

        let now = self.clock.now();
        let recorded = check_service::record_check(
            &self.db,
            check_service::NewCheck {
                website_id,
                status_code,
                response_time_ms,
                success,
                error_message,
                checked_at: now,
            },
        )
        .await?;

        let previous = website.status;
        let (new_status, change) = plan_transition(previous, success);
        let website = website_service::update_status(&self.db, website, new_status, now).await?;
        self.recompute_uptime(&website).await?;

        match change {
            Some(StatusChange::WentDown) => {
                self.emit_downtime(&website, &recorded).await?;
            }
            Some(StatusChange::Recovered) => {
                self.emit_recovery(&website).await?;
            }
            None => {}
        }

        info!(
            url = %website.url,
            status_code,
            response_time_ms,
            success,
            "website checked"
        );
        Ok(Some(recorded))
    }

    /// On-demand probe for the external HTTP layer; runs the exact same
    /// logic synchronously.
    pub async fn manual_check(&self, website_id: Uuid) -> Result<check::Model, ServiceError> {
        self.check_website(website_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Website not found".to_string()))
    }

    pub async fn get_checks_and_status(
        &self,
        website_id: Uuid,
    ) -> Result<WebsiteStatusReport, ServiceError> {
        let website = website_service::get_website(&self.db, website_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Website not found".to_string()))?;
        let checks =
            check_service::recent_checks(&self.db, website_id, RECENT_CHECK_LIMIT).await?;
        Ok(WebsiteStatusReport {
            website_id,
            status: website.status,
            uptime_percentage: website.uptime_percentage,
            last_checked: website.last_checked,
            checks,
        })
    }

    /// Recomputes the trailing-window uptime. An empty window leaves the
    /// stored percentage untouched.
    async fn recompute_uptime(
        &self,
        website: &crate::db::entities::website::Model,
    ) -> Result<(), ServiceError> {
        let since = self.clock.now() - chrono::Duration::days(UPTIME_WINDOW_DAYS);
        let checks = check_service::checks_in_window(&self.db, website.id, since).await?;
        let successful = checks.iter().filter(|c| c.success).count();
        if let Some(uptime) = uptime_percentage(successful, checks.len()) {
            website_service::update_uptime(&self.db, website.clone(), uptime).await?;
        }
        Ok(())
    }

    async fn emit_downtime(
        &self,
        website: &crate::db::entities::website::Model,
        check: &check::Model,
    ) -> Result<(), ServiceError> {
        let detail = if check.status_code > 0 {
            format!("Status: {}", check.status_code)
        } else {
            "Status: Timeout".to_string()
        };
        warn!(url = %website.url, %detail, "website DOWN");

        alert_service::create_alert(
            &self.db,
            alert_service::NewAlert {
                user_id: website.user_id,
                website_id: website.id,
                alert_type: "downtime".to_string(),
                severity: AlertSeverity::Critical,
                message: format!(
                    "Website {} ({}) is down. {}",
                    website.name, website.url, detail
                ),
                sent_at: self.clock.now(),
            },
        )
        .await?;

        if let Some(owner) = user_service::get_user(&self.db, website.user_id).await? {
            self.notifier
                .send_downtime_alert(&owner.email, &website.name, &website.url, &detail)
                .await;
        }
        Ok(())
    }

    async fn emit_recovery(
        &self,
        website: &crate::db::entities::website::Model,
    ) -> Result<(), ServiceError> {
        info!(url = %website.url, "website recovered");

        alert_service::create_alert(
            &self.db,
            alert_service::NewAlert {
                user_id: website.user_id,
                website_id: website.id,
                alert_type: "downtime".to_string(),
                severity: AlertSeverity::Info,
                message: format!(
                    "Website {} ({}) is back online.",
                    website.name, website.url
                ),
                sent_at: self.clock.now(),
            },
        )
        .await?;

        if let Some(owner) = user_service::get_user(&self.db, website.user_id).await? {
            self.notifier
                .send_recovery_alert(&owner.email, &website.name, &website.url)
                .await;
        }
        Ok(())
    }
}

fn probe_success(status_code: i32) -> bool {
    (200..400).contains(&status_code)
}

/// The transition table. Only online->offline and offline->online are
/// alertable; a first result on a pending website sets the status silently.
pub(crate) fn plan_transition(
    previous: WebsiteStatus,
    success: bool,
) -> (WebsiteStatus, Option<StatusChange>) {
    let next = if success {
        WebsiteStatus::Online
    } else {
        WebsiteStatus::Offline
    };
    let change = match (previous, next) {
        (WebsiteStatus::Online, WebsiteStatus::Offline) => Some(StatusChange::WentDown),
        (WebsiteStatus::Offline, WebsiteStatus::Online) => Some(StatusChange::Recovered),
        _ => None,
    };
    (next, change)
}

/// `success / total * 100`, rounded to two decimals; `None` when the window
/// holds no checks (the stored value must then be left unchanged).
pub(crate) fn uptime_percentage(successful: usize, total: usize) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let raw = successful as f64 / total as f64 * 100.0;
    Some((raw * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_in_success_range() {
        assert!(probe_success(200));
        assert!(probe_success(301));
        assert!(probe_success(399));
        assert!(!probe_success(400));
        assert!(!probe_success(503));
        assert!(!probe_success(0));
    }

    #[test]
    fn transition_table_is_exact() {
        use WebsiteStatus::*;

        assert_eq!(
            plan_transition(Online, false),
            (Offline, Some(StatusChange::WentDown))
        );
        assert_eq!(
            plan_transition(Offline, true),
            (Online, Some(StatusChange::Recovered))
        );
        // Unchanged states never alert.
        assert_eq!(plan_transition(Online, true), (Online, None));
        assert_eq!(plan_transition(Offline, false), (Offline, None));
        // First results on a pending website are silent.
        assert_eq!(plan_transition(Pending, true), (Online, None));
        assert_eq!(plan_transition(Pending, false), (Offline, None));
    }

    #[test]
    fn uptime_rounds_to_two_decimals() {
        assert_eq!(uptime_percentage(1, 3), Some(33.33));
        assert_eq!(uptime_percentage(2, 3), Some(66.67));
        assert_eq!(uptime_percentage(10, 10), Some(100.0));
        assert_eq!(uptime_percentage(0, 4), Some(0.0));
    }

    #[test]
    fn empty_window_leaves_uptime_unchanged() {
        assert_eq!(uptime_percentage(0, 0), None);
    }

    #[test]
    fn uptime_is_idempotent_for_same_window() {
        let first = uptime_percentage(7, 9);
        let second = uptime_percentage(7, 9);
        assert_eq!(first, second);
    }
}
