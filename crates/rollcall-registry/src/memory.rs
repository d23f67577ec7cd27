//! In-process reference registry.
//!
//! `MemoryRegistry` implements the full collaborator contract against
//! plain hash maps. It exists for two reasons:
//!
//! 1. **Tests and demos** — the redemption engine, alert workflow, and
//!    end-to-end suites run against it without a network.
//! 2. **A normative reference** — single-redemption and expiry belong
//!    to the registry, and this impl is the executable statement of
//!    what the remote service must enforce. A client-only check is not
//!    race-safe across devices, so the checks here are the ones that
//!    actually count.
//!
//! Identity validation stays out of scope: any non-empty bearer is
//! accepted and the `Identity` fields are trusted. The real service sits
//! behind an identity provider; this one sits behind your test.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rollcall_protocol::{
    AlertId, AlertStatus, AlertType, AttendanceId, AttendanceRecord,
    EmergencyAlert, Identity, JsonTokenCodec, Role, Session, SessionId,
    SessionRef, StudentId, TimeSlot, TokenCodec,
};
use tokio::sync::RwLock;

use crate::{Issued, IssueRequest, RegistryError, SessionRegistry};

/// Everything the registry stores, guarded by one lock.
///
/// A single `RwLock` (not one per map) so that redemption's
/// check-then-insert is atomic — that atomicity *is* the duplicate
/// detection guarantee.
#[derive(Default)]
struct Store {
    sessions: HashMap<SessionId, Session>,
    records: Vec<AttendanceRecord>,
    /// Fast membership index for duplicate detection, kept in sync with
    /// `records`.
    redeemed: HashSet<(SessionId, StudentId)>,
    alerts: HashMap<AlertId, EmergencyAlert>,
}

/// The registry's time source. Every expiry decision and timestamp goes
/// through this, so tests can move time without sleeping.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// An in-memory [`SessionRegistry`].
pub struct MemoryRegistry {
    store: RwLock<Store>,
    codec: JsonTokenCodec,
    /// Fixed session lifetime; when `None`, expiry is derived from the
    /// issued time slot (falling back to one hour for unparsable slots).
    ttl: Option<Duration>,
    clock: Clock,
}

impl MemoryRegistry {
    /// Creates an empty registry deriving expiry from time slots.
    pub fn new() -> Self {
        Self::build(None, Arc::new(Utc::now))
    }

    /// Creates a registry that gives every session a fixed lifetime.
    ///
    /// Deterministic tests use this the way a grace-period of zero or an
    /// hour pins down time-dependent behavior: `Duration::zero()` makes
    /// every session already expired on the next clock read, and a long
    /// TTL makes expiry unreachable within a test.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self::build(Some(ttl), Arc::new(Utc::now))
    }

    /// Creates a registry with a fixed lifetime and an injected clock.
    ///
    /// Tests that need a session to expire mid-test hand in a manual
    /// clock and advance it past the deadline instead of sleeping.
    pub fn with_ttl_and_clock(ttl: Duration, clock: Clock) -> Self {
        Self::build(Some(ttl), clock)
    }

    fn build(ttl: Option<Duration>, clock: Clock) -> Self {
        Self {
            store: RwLock::new(Store::default()),
            codec: JsonTokenCodec,
            ttl,
            clock,
        }
    }

    fn expiry_for(&self, time_slot: &str, now: DateTime<Utc>) -> DateTime<Utc> {
        if let Some(ttl) = self.ttl {
            return now + ttl;
        }
        match time_slot.parse::<TimeSlot>() {
            Ok(slot) => slot.expiry_after(now),
            // Unparsable slot (e.g. an ad-hoc extra class): one hour.
            Err(_) => now + Duration::hours(1),
        }
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Uniform bearer check: absence of a token is the one identity failure
/// this impl can actually detect.
fn authorize(identity: &Identity) -> Result<(), RegistryError> {
    if identity.bearer.trim().is_empty() {
        return Err(RegistryError::Unauthorized);
    }
    Ok(())
}

/// Pulls the student id out of a student identity.
fn student_id(identity: &Identity) -> Result<StudentId, RegistryError> {
    if identity.role != Role::Student {
        return Err(RegistryError::Forbidden(
            "only students can perform this operation".into(),
        ));
    }
    identity.student_id.clone().ok_or_else(|| {
        RegistryError::Forbidden("student identity has no student id".into())
    })
}

impl SessionRegistry for MemoryRegistry {
    async fn issue_session(
        &self,
        identity: &Identity,
        request: IssueRequest,
    ) -> Result<Issued, RegistryError> {
        authorize(identity)?;
        if !identity.role.can_issue_sessions() {
            return Err(RegistryError::Forbidden(
                "only teachers can generate attendance sessions".into(),
            ));
        }

        let now = (self.clock)();
        let expires_at = self.expiry_for(&request.time_slot, now);
        let session = Session {
            id: SessionId::new(),
            class_section: request.class_section,
            subject: request.subject,
            class_code: request.class_code,
            time_slot: request.time_slot,
            issued_at: now,
            expires_at,
            is_active: true,
        };

        let token = self
            .codec
            .encode(&SessionRef::for_session(&session))
            .map_err(|e| RegistryError::Unexpected {
                status: 500,
                message: e.to_string(),
            })?;

        let mut store = self.store.write().await;

        // Reissuing the same window supersedes the previous session:
        // its tokens stop redeeming immediately.
        for old in store.sessions.values_mut() {
            if old.is_active
                && old.class_section == session.class_section
                && old.subject == session.subject
                && old.time_slot == session.time_slot
            {
                old.is_active = false;
                tracing::info!(
                    superseded = %old.id,
                    by = %session.id,
                    "session superseded by reissue"
                );
            }
        }

        store.sessions.insert(session.id, session.clone());
        tracing::info!(
            session_id = %session.id,
            class_section = %session.class_section,
            subject = %session.subject,
            expires_at = %session.expires_at,
            "session issued"
        );

        Ok(Issued { session, token })
    }

    async fn session(
        &self,
        identity: &Identity,
        id: SessionId,
    ) -> Result<Option<Session>, RegistryError> {
        authorize(identity)?;
        Ok(self.store.read().await.sessions.get(&id).cloned())
    }

    async fn sessions(
        &self,
        identity: &Identity,
    ) -> Result<Vec<Session>, RegistryError> {
        authorize(identity)?;
        let store = self.store.read().await;
        let mut sessions: Vec<Session> =
            store.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(sessions)
    }

    async fn redeem(
        &self,
        identity: &Identity,
        token: &SessionRef,
    ) -> Result<AttendanceRecord, RegistryError> {
        authorize(identity)?;
        let student = student_id(identity)?;

        let now = (self.clock)();
        let mut store = self.store.write().await;

        let session = store
            .sessions
            .get(&token.session_id)
            .ok_or(RegistryError::UnknownSession(token.session_id))?
            .clone();

        // Expiry before duplicate: an expired duplicate reports Expired,
        // which is the actionable half of the story.
        if !session.is_redeemable(now) {
            return Err(RegistryError::Expired);
        }

        if identity.class_section.as_deref() != Some(&session.class_section) {
            return Err(RegistryError::NotEnrolled(
                session.class_section.clone(),
            ));
        }

        if store.redeemed.contains(&(session.id, student.clone())) {
            return Err(RegistryError::Duplicate);
        }

        let record = AttendanceRecord {
            id: AttendanceId::new(),
            session_id: session.id,
            student_id: student.clone(),
            student_name: identity.display_name.clone(),
            class_section: session.class_section.clone(),
            subject: session.subject.clone(),
            class_code: session.class_code.clone(),
            time_slot: session.time_slot.clone(),
            timestamp: now,
        };

        store.redeemed.insert((session.id, student));
        store.records.push(record.clone());
        tracing::info!(
            record_id = %record.id,
            session_id = %session.id,
            student_id = %record.student_id,
            "attendance recorded"
        );

        Ok(record)
    }

    async fn attendance(
        &self,
        identity: &Identity,
    ) -> Result<Vec<AttendanceRecord>, RegistryError> {
        authorize(identity)?;
        let store = self.store.read().await;
        let records = match identity.role {
            // Students see their own marks only.
            Role::Student => {
                let student = student_id(identity)?;
                store
                    .records
                    .iter()
                    .filter(|r| r.student_id == student)
                    .cloned()
                    .collect()
            }
            Role::Teacher | Role::Principal => store.records.clone(),
        };
        Ok(records)
    }

    async fn create_alert(
        &self,
        identity: &Identity,
        alert_type: AlertType,
        description: Option<String>,
    ) -> Result<EmergencyAlert, RegistryError> {
        authorize(identity)?;
        let student = student_id(identity)?;
        let class_section =
            identity.class_section.clone().ok_or_else(|| {
                RegistryError::InvalidAlert(
                    "student identity has no class section".into(),
                )
            })?;

        // Defense in depth: the workflow validates this before calling,
        // but the registry is authoritative.
        let description =
            description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
        if alert_type.requires_description() && description.is_none() {
            return Err(RegistryError::InvalidAlert(
                "alert type 'other' requires a description".into(),
            ));
        }

        let alert = EmergencyAlert {
            id: AlertId::new(),
            student_id: student,
            student_name: identity.display_name.clone(),
            class_section,
            alert_type,
            description,
            status: AlertStatus::Pending,
            created_at: (self.clock)(),
            resolved_at: None,
            resolver_name: None,
        };

        self.store.write().await.alerts.insert(alert.id, alert.clone());
        tracing::warn!(
            alert_id = %alert.id,
            %alert_type,
            class_section = %alert.class_section,
            "emergency alert filed"
        );
        Ok(alert)
    }

    async fn alerts(
        &self,
        identity: &Identity,
    ) -> Result<Vec<EmergencyAlert>, RegistryError> {
        authorize(identity)?;
        if !identity.role.can_view_alerts() {
            return Err(RegistryError::Forbidden(
                "students cannot list emergency alerts".into(),
            ));
        }
        let store = self.store.read().await;
        let mut alerts: Vec<EmergencyAlert> =
            store.alerts.values().cloned().collect();
        // Most recent first so responders see new emergencies on top.
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }

    async fn update_alert_status(
        &self,
        identity: &Identity,
        id: AlertId,
        status: AlertStatus,
    ) -> Result<EmergencyAlert, RegistryError> {
        authorize(identity)?;
        if !identity.role.can_transition_alerts() {
            return Err(RegistryError::Forbidden(
                "only the principal can update alert status".into(),
            ));
        }

        let mut store = self.store.write().await;
        let alert = store
            .alerts
            .get_mut(&id)
            .ok_or(RegistryError::AlertNotFound)?;

        if !alert.status.can_transition_to(status) {
            return Err(RegistryError::InvalidTransition {
                from: alert.status,
                to: status,
            });
        }

        alert.status = status;
        if status == AlertStatus::Resolved {
            alert.resolved_at = Some((self.clock)());
            alert.resolver_name = Some(identity.display_name.clone());
        }
        tracing::info!(alert_id = %id, %status, "alert status updated");
        Ok(alert.clone())
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `MemoryRegistry`.
    //!
    //! Time-dependent behavior (expiry) is pinned without sleeping:
    //! `Duration::zero()` makes sessions expire on the next clock read,
    //! `Duration::hours(1)` keeps them alive for the whole test, and
    //! tests that need time to pass mid-test advance a manual clock.

    use std::sync::Mutex;

    use super::*;

    // -- Helpers ----------------------------------------------------------

    fn live_registry() -> MemoryRegistry {
        MemoryRegistry::with_ttl(Duration::hours(1))
    }

    fn expired_registry() -> MemoryRegistry {
        MemoryRegistry::with_ttl(Duration::zero())
    }

    /// A clock the test advances by hand.
    fn manual_clock() -> (Arc<Mutex<DateTime<Utc>>>, Clock) {
        let now = Arc::new(Mutex::new(Utc::now()));
        let handle = Arc::clone(&now);
        (now, Arc::new(move || *handle.lock().unwrap()))
    }

    fn teacher() -> Identity {
        Identity::teacher("tok-teacher", "T-1", "R. Atkins")
    }

    fn principal() -> Identity {
        Identity::principal("tok-principal", "P-1", "M. Okafor")
    }

    fn student_a5() -> Identity {
        Identity::student("tok-student", "STU-1042", "J. Mwangi", "A5")
    }

    fn math_request() -> IssueRequest {
        IssueRequest {
            class_section: "A5".into(),
            subject: "Mathematics".into(),
            class_code: "MC".into(),
            time_slot: "09:30-10:30".into(),
        }
    }

    async fn issue(reg: &MemoryRegistry) -> (Session, SessionRef) {
        let issued =
            reg.issue_session(&teacher(), math_request()).await.unwrap();
        let token: SessionRef =
            serde_json::from_str(&issued.token).unwrap();
        (issued.session, token)
    }

    // =====================================================================
    // issue_session()
    // =====================================================================

    #[tokio::test]
    async fn test_issue_session_teacher_gets_active_session_and_token() {
        let reg = live_registry();

        let issued =
            reg.issue_session(&teacher(), math_request()).await.unwrap();

        assert!(issued.session.is_active);
        assert_eq!(issued.session.subject, "Mathematics");
        // The token decodes back to the session's identity.
        let token: SessionRef =
            serde_json::from_str(&issued.token).unwrap();
        assert_eq!(token.session_id, issued.session.id);
        assert_eq!(token.expires_at, issued.session.expires_at);
    }

    #[tokio::test]
    async fn test_issue_session_student_is_forbidden() {
        let reg = live_registry();

        let result = reg.issue_session(&student_a5(), math_request()).await;

        assert!(matches!(result, Err(RegistryError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_issue_session_principal_allowed() {
        let reg = live_registry();

        let result = reg.issue_session(&principal(), math_request()).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_issue_session_empty_bearer_is_unauthorized() {
        let reg = live_registry();
        let mut anon = teacher();
        anon.bearer = String::new();

        let result = reg.issue_session(&anon, math_request()).await;

        assert!(matches!(result, Err(RegistryError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_issue_session_reissue_supersedes_previous_window() {
        let reg = live_registry();
        let (first, first_token) = issue(&reg).await;

        // Same section/subject/slot again: the old session deactivates.
        let (second, _) = issue(&reg).await;
        assert_ne!(first.id, second.id);

        let stored =
            reg.session(&teacher(), first.id).await.unwrap().unwrap();
        assert!(!stored.is_active, "superseded session must deactivate");

        // And the superseded token now reports Expired.
        let result = reg.redeem(&student_a5(), &first_token).await;
        assert!(matches!(result, Err(RegistryError::Expired)));
    }

    #[tokio::test]
    async fn test_issue_session_derives_expiry_from_slot_without_ttl() {
        let reg = MemoryRegistry::new();

        let issued =
            reg.issue_session(&teacher(), math_request()).await.unwrap();

        // Whatever date it lands on, the deadline is the slot end.
        let end = issued.session.expires_at.time();
        assert_eq!(end.format("%H:%M").to_string(), "10:30");
        assert!(issued.session.expires_at > issued.session.issued_at);
    }

    #[tokio::test]
    async fn test_issue_session_unparsable_slot_falls_back_to_one_hour() {
        let reg = MemoryRegistry::new();
        let mut request = math_request();
        request.time_slot = "after lunch".into();

        let issued =
            reg.issue_session(&teacher(), request).await.unwrap();

        let lifetime = issued.session.expires_at - issued.session.issued_at;
        assert_eq!(lifetime, Duration::hours(1));
    }

    // =====================================================================
    // redeem()
    // =====================================================================

    #[tokio::test]
    async fn test_redeem_first_attempt_creates_record() {
        let reg = live_registry();
        let (session, token) = issue(&reg).await;

        let record = reg.redeem(&student_a5(), &token).await.unwrap();

        assert_eq!(record.session_id, session.id);
        assert_eq!(record.student_id, StudentId::new("STU-1042"));
        assert_eq!(record.subject, "Mathematics");
        assert_eq!(record.class_section, "A5");
    }

    #[tokio::test]
    async fn test_redeem_second_attempt_same_student_is_duplicate() {
        let reg = live_registry();
        let (_, token) = issue(&reg).await;
        reg.redeem(&student_a5(), &token).await.unwrap();

        let result = reg.redeem(&student_a5(), &token).await;

        assert!(matches!(result, Err(RegistryError::Duplicate)));
    }

    #[tokio::test]
    async fn test_redeem_different_students_both_succeed() {
        let reg = live_registry();
        let (session, token) = issue(&reg).await;
        let other = Identity::student("tok-2", "STU-2077", "A. Chen", "A5");

        reg.redeem(&student_a5(), &token).await.unwrap();
        reg.redeem(&other, &token).await.unwrap();

        let records = reg.attendance(&teacher()).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.session_id == session.id));
    }

    #[tokio::test]
    async fn test_redeem_expired_session_returns_expired() {
        let reg = expired_registry();
        let (_, token) = issue(&reg).await;

        let result = reg.redeem(&student_a5(), &token).await;

        assert!(matches!(result, Err(RegistryError::Expired)));
    }

    #[tokio::test]
    async fn test_redeem_expired_duplicate_reports_expired_not_duplicate() {
        // Redeem while live, then retry after the deadline: expiry wins.
        let (now, clock) = manual_clock();
        let reg =
            MemoryRegistry::with_ttl_and_clock(Duration::minutes(10), clock);
        let (_, token) = issue(&reg).await;
        reg.redeem(&student_a5(), &token).await.unwrap();

        *now.lock().unwrap() += Duration::hours(1);
        let result = reg.redeem(&student_a5(), &token).await;

        assert!(
            matches!(result, Err(RegistryError::Expired)),
            "expired duplicate must report Expired, got {result:?}"
        );
    }

    #[tokio::test]
    async fn test_redeem_wrong_section_returns_not_enrolled() {
        let reg = live_registry();
        let (_, token) = issue(&reg).await;
        let outsider = Identity::student("tok-3", "STU-9", "B. Ruiz", "A6");

        let result = reg.redeem(&outsider, &token).await;

        assert!(
            matches!(result, Err(RegistryError::NotEnrolled(ref s)) if s == "A5")
        );
    }

    #[tokio::test]
    async fn test_redeem_unknown_session_returns_unknown() {
        let reg = live_registry();
        let (_, mut token) = issue(&reg).await;
        token.session_id = SessionId::new(); // never issued

        let result = reg.redeem(&student_a5(), &token).await;

        assert!(matches!(result, Err(RegistryError::UnknownSession(_))));
    }

    #[tokio::test]
    async fn test_redeem_by_teacher_is_forbidden() {
        let reg = live_registry();
        let (_, token) = issue(&reg).await;

        let result = reg.redeem(&teacher(), &token).await;

        assert!(matches!(result, Err(RegistryError::Forbidden(_))));
    }

    // =====================================================================
    // attendance()
    // =====================================================================

    #[tokio::test]
    async fn test_attendance_student_sees_only_own_records() {
        let reg = live_registry();
        let (_, token) = issue(&reg).await;
        let other = Identity::student("tok-2", "STU-2077", "A. Chen", "A5");
        reg.redeem(&student_a5(), &token).await.unwrap();
        reg.redeem(&other, &token).await.unwrap();

        let own = reg.attendance(&student_a5()).await.unwrap();

        assert_eq!(own.len(), 1);
        assert_eq!(own[0].student_id, StudentId::new("STU-1042"));
    }

    // =====================================================================
    // Alerts
    // =====================================================================

    #[tokio::test]
    async fn test_create_alert_fire_without_description_succeeds() {
        let reg = live_registry();

        let alert = reg
            .create_alert(&student_a5(), AlertType::Fire, None)
            .await
            .unwrap();

        assert_eq!(alert.status, AlertStatus::Pending);
        assert_eq!(alert.class_section, "A5");
        assert!(alert.description.is_none());
    }

    #[tokio::test]
    async fn test_create_alert_other_requires_description() {
        let reg = live_registry();

        let missing = reg
            .create_alert(&student_a5(), AlertType::Other, None)
            .await;
        let blank = reg
            .create_alert(&student_a5(), AlertType::Other, Some("   ".into()))
            .await;

        assert!(matches!(missing, Err(RegistryError::InvalidAlert(_))));
        assert!(matches!(blank, Err(RegistryError::InvalidAlert(_))));
    }

    #[tokio::test]
    async fn test_create_alert_teacher_is_forbidden() {
        let reg = live_registry();

        let result =
            reg.create_alert(&teacher(), AlertType::Fire, None).await;

        assert!(matches!(result, Err(RegistryError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_alerts_listing_most_recent_first() {
        let reg = live_registry();
        let first = reg
            .create_alert(&student_a5(), AlertType::Fire, None)
            .await
            .unwrap();
        let second = reg
            .create_alert(
                &student_a5(),
                AlertType::Other,
                Some("gas smell in lab".into()),
            )
            .await
            .unwrap();

        let listed = reg.alerts(&principal()).await.unwrap();

        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id, "newest alert first");
        assert_eq!(listed[1].id, first.id);
    }

    #[tokio::test]
    async fn test_alerts_listing_forbidden_for_students() {
        let reg = live_registry();

        let result = reg.alerts(&student_a5()).await;

        assert!(matches!(result, Err(RegistryError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_update_alert_status_principal_full_lifecycle() {
        let reg = live_registry();
        let alert = reg
            .create_alert(&student_a5(), AlertType::Fire, None)
            .await
            .unwrap();

        let acked = reg
            .update_alert_status(
                &principal(),
                alert.id,
                AlertStatus::Acknowledged,
            )
            .await
            .unwrap();
        assert_eq!(acked.status, AlertStatus::Acknowledged);
        assert!(acked.resolved_at.is_none());

        let resolved = reg
            .update_alert_status(&principal(), alert.id, AlertStatus::Resolved)
            .await
            .unwrap();
        assert_eq!(resolved.status, AlertStatus::Resolved);
        assert!(resolved.resolved_at.is_some());
        assert_eq!(resolved.resolver_name.as_deref(), Some("M. Okafor"));
    }

    #[tokio::test]
    async fn test_update_alert_status_teacher_is_forbidden() {
        let reg = live_registry();
        let alert = reg
            .create_alert(&student_a5(), AlertType::Fire, None)
            .await
            .unwrap();

        let result = reg
            .update_alert_status(
                &teacher(),
                alert.id,
                AlertStatus::Acknowledged,
            )
            .await;

        assert!(matches!(result, Err(RegistryError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_update_alert_status_resolved_is_absorbing() {
        let reg = live_registry();
        let alert = reg
            .create_alert(&student_a5(), AlertType::Fire, None)
            .await
            .unwrap();
        reg.update_alert_status(&principal(), alert.id, AlertStatus::Resolved)
            .await
            .unwrap();

        for target in [
            AlertStatus::Pending,
            AlertStatus::Acknowledged,
            AlertStatus::Resolved,
        ] {
            let result = reg
                .update_alert_status(&principal(), alert.id, target)
                .await;
            assert!(
                matches!(
                    result,
                    Err(RegistryError::InvalidTransition { .. })
                ),
                "resolved -> {target} must be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_update_alert_status_unknown_alert_not_found() {
        let reg = live_registry();

        let result = reg
            .update_alert_status(
                &principal(),
                AlertId::new(),
                AlertStatus::Acknowledged,
            )
            .await;

        assert!(matches!(result, Err(RegistryError::AlertNotFound)));
    }
}
