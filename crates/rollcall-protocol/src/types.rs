//! Core types for the Rollcall attendance protocol.
//!
//! Everything here is either stored by the session registry or carried
//! inside the QR token, so every type derives `Serialize`/`Deserialize`
//! and uses absolute UTC timestamps (`chrono::DateTime<Utc>`) rather than
//! process-local clocks.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for an attendance session.
///
/// Newtype over `Uuid` so a `SessionId` can never be confused with an
/// [`AttendanceId`] or [`AlertId`] even though all three are UUIDs
/// underneath. `#[serde(transparent)]` keeps the wire form a plain UUID
/// string, matching what the registry stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// A unique identifier for an attendance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttendanceId(pub Uuid);

impl AttendanceId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AttendanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttendanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "REC-{}", self.0)
    }
}

/// A unique identifier for an emergency alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(pub Uuid);

impl AlertId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AlertId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AL-{}", self.0)
    }
}

/// An institution-assigned student identifier (e.g. `"STU-1042"`).
///
/// Kept as a string newtype: the format is owned by the institution, not
/// by us, so we never parse it — we only compare and display it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub String);

impl StudentId {
    /// Wraps a raw institution identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Role — who is acting?
// ---------------------------------------------------------------------------

/// The role attached to an authenticated identity.
///
/// A tagged enum instead of a role string: permission checks below are
/// exhaustive matches, so adding a role forces every gate to be revisited
/// at compile time and a typo can't silently grant or deny access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Redeems tokens and reports emergency alerts.
    Student,
    /// Issues sessions and views attendance/alerts for their classes.
    Teacher,
    /// Full access, including alert acknowledgement and resolution.
    Principal,
}

impl Role {
    /// `true` for roles allowed to mint attendance sessions.
    pub fn can_issue_sessions(self) -> bool {
        match self {
            Role::Teacher | Role::Principal => true,
            Role::Student => false,
        }
    }

    /// `true` for roles allowed to list emergency alerts.
    pub fn can_view_alerts(self) -> bool {
        match self {
            Role::Teacher | Role::Principal => true,
            Role::Student => false,
        }
    }

    /// `true` for roles allowed to move an alert through its lifecycle.
    ///
    /// Only the principal responds to emergencies; the reporting student
    /// has no transition rights after creation, and teachers may only
    /// observe.
    pub fn can_transition_alerts(self) -> bool {
        match self {
            Role::Principal => true,
            Role::Student | Role::Teacher => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Teacher => write!(f, "teacher"),
            Role::Principal => write!(f, "principal"),
        }
    }
}

// ---------------------------------------------------------------------------
// Identity — the bearer-token caller
// ---------------------------------------------------------------------------

/// The authenticated caller attached to every registry operation.
///
/// Rollcall treats authentication as an external concern: some identity
/// service issued the `bearer` token, and the registry validates it on
/// every call. This struct is what the rest of the system needs to know
/// about the caller — never the credentials behind the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque bearer token, forwarded verbatim in the `Authorization`
    /// header. Absent or invalid tokens yield `Unauthorized` uniformly.
    pub bearer: String,
    /// The identity service's user id.
    pub user_id: String,
    /// Display name, denormalized into attendance records and alerts.
    pub display_name: String,
    /// The caller's role.
    pub role: Role,
    /// Institution student id. Present only for students.
    pub student_id: Option<StudentId>,
    /// Class section the caller belongs to (students) or is issuing for.
    pub class_section: Option<String>,
}

impl Identity {
    /// Convenience constructor for a student identity.
    pub fn student(
        bearer: impl Into<String>,
        student_id: impl Into<String>,
        display_name: impl Into<String>,
        class_section: impl Into<String>,
    ) -> Self {
        let student_id = StudentId::new(student_id);
        Self {
            bearer: bearer.into(),
            user_id: student_id.0.clone(),
            display_name: display_name.into(),
            role: Role::Student,
            student_id: Some(student_id),
            class_section: Some(class_section.into()),
        }
    }

    /// Convenience constructor for a teacher identity.
    pub fn teacher(
        bearer: impl Into<String>,
        user_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            bearer: bearer.into(),
            user_id: user_id.into(),
            display_name: display_name.into(),
            role: Role::Teacher,
            student_id: None,
            class_section: None,
        }
    }

    /// Convenience constructor for a principal identity.
    pub fn principal(
        bearer: impl Into<String>,
        user_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            bearer: bearer.into(),
            user_id: user_id.into(),
            display_name: display_name.into(),
            role: Role::Principal,
            student_id: None,
            class_section: None,
        }
    }
}

// ---------------------------------------------------------------------------
// TimeSlot
// ---------------------------------------------------------------------------

/// A timetable slot like `"09:30-10:30"`.
///
/// Sessions store the slot as the raw string they were issued for (it is
/// display data as far as the registry is concerned); `TimeSlot` is the
/// parsed form used once, at issuance, to derive the session's absolute
/// expiry deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    /// Start of the slot (wall clock, no date).
    pub start: NaiveTime,
    /// End of the slot (wall clock, no date).
    pub end: NaiveTime,
}

impl TimeSlot {
    /// Resolves the slot's end into an absolute deadline relative to `now`.
    ///
    /// The slot carries no date, so the end is anchored to `now`'s date;
    /// if that instant has already passed (a teacher issuing right at the
    /// bell, or a slot that wraps midnight), it rolls over to tomorrow.
    pub fn expiry_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today_end = now
            .date_naive()
            .and_time(self.end)
            .and_utc();
        if today_end > now {
            today_end
        } else {
            today_end + Duration::days(1)
        }
    }
}

impl FromStr for TimeSlot {
    type Err = crate::ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed =
            || crate::ProtocolError::Malformed(format!("bad time slot {s:?}"));
        let (start, end) = s.trim().split_once('-').ok_or_else(malformed)?;
        let start = NaiveTime::parse_from_str(start.trim(), "%H:%M")
            .map_err(|_| malformed())?;
        let end = NaiveTime::parse_from_str(end.trim(), "%H:%M")
            .map_err(|_| malformed())?;
        Ok(Self { start, end })
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One teacher-issued attendance window for a class/subject/time-slot.
///
/// Immutable once created except for `is_active`: a session ends either
/// implicitly (the `expires_at` deadline passes) or explicitly (the
/// registry deactivates it when the teacher reissues). There is no way to
/// extend `expires_at` — a new window means a new session and a new token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session id.
    pub id: SessionId,
    /// Class section the window applies to (e.g. `"A5"`).
    pub class_section: String,
    /// Subject being taught (e.g. `"Mathematics"`).
    pub subject: String,
    /// Short class code from the timetable (e.g. `"MC"`).
    pub class_code: String,
    /// The timetable slot, as issued (e.g. `"09:30-10:30"`).
    pub time_slot: String,
    /// When the session was minted.
    pub issued_at: DateTime<Utc>,
    /// Absolute redemption deadline, fixed at issuance.
    pub expires_at: DateTime<Utc>,
    /// `false` once superseded by a reissue. Expiry is separate: it is
    /// computed against `expires_at` at check time, never stored.
    pub is_active: bool,
}

impl Session {
    /// `true` if a redemption at `now` would still be within the window.
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now <= self.expires_at
    }
}

// ---------------------------------------------------------------------------
// SessionRef — what the token carries
// ---------------------------------------------------------------------------

/// The decoded contents of a QR token.
///
/// Carries the session's identity *and* its expiry bound, so the
/// redemption engine can run its cheap local checks (expiry, section
/// membership) before touching the network. The token itself has no
/// single-use semantics — duplicate detection belongs to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRef {
    /// Which session this token redeems against.
    pub session_id: SessionId,
    /// Class section, echoed for local membership checks.
    pub class_section: String,
    /// Subject, echoed for display on the scan screen.
    pub subject: String,
    /// Class code, echoed for display.
    pub class_code: String,
    /// Timetable slot, echoed for display.
    pub time_slot: String,
    /// When the session was minted.
    pub issued_at: DateTime<Utc>,
    /// The session's absolute deadline.
    pub expires_at: DateTime<Utc>,
    /// Random 32-char hex nonce (128 bits) minted at issuance. Makes two
    /// tokens for otherwise identical sessions distinguishable.
    pub nonce: String,
}

impl SessionRef {
    /// Builds the token payload for a freshly issued session.
    pub fn for_session(session: &Session) -> Self {
        Self {
            session_id: session.id,
            class_section: session.class_section.clone(),
            subject: session.subject.clone(),
            class_code: session.class_code.clone(),
            time_slot: session.time_slot.clone(),
            issued_at: session.issued_at,
            expires_at: session.expires_at,
            nonce: generate_nonce(),
        }
    }

    /// `true` if the embedded deadline has passed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Generates a random 32-character hex string (128 bits of entropy).
///
/// 128 bits is enough that two independently minted tokens will never
/// collide in practice.
fn generate_nonce() -> String {
    use rand::Rng;
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// AttendanceRecord
// ---------------------------------------------------------------------------

/// One student's presence mark against one session.
///
/// Created exactly once per `(session_id, student_id)` pair — the registry
/// enforces that — and never updated or deleted afterwards. Class/subject
/// fields are denormalized from the session so reports don't need joins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Unique record id.
    pub id: AttendanceId,
    /// The session that was redeemed.
    pub session_id: SessionId,
    /// Who was present.
    pub student_id: StudentId,
    /// Display name at redemption time.
    pub student_name: String,
    /// Denormalized from the session.
    pub class_section: String,
    /// Denormalized from the session.
    pub subject: String,
    /// Denormalized from the session.
    pub class_code: String,
    /// Denormalized from the session.
    pub time_slot: String,
    /// When the redemption happened.
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Emergency alerts
// ---------------------------------------------------------------------------

/// The category of an emergency alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Fire emergency.
    Fire,
    /// Unauthorized person on premises.
    UnauthorizedAccess,
    /// Anything else — requires a free-text description.
    Other,
}

impl AlertType {
    /// `true` if creating an alert of this type requires a description.
    pub fn requires_description(self) -> bool {
        matches!(self, AlertType::Other)
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertType::Fire => write!(f, "fire"),
            AlertType::UnauthorizedAccess => write!(f, "unauthorized_access"),
            AlertType::Other => write!(f, "other"),
        }
    }
}

/// The lifecycle state of an emergency alert.
///
/// Status only moves forward, and `Resolved` is absorbing:
///
/// ```text
/// Pending ──→ Acknowledged ──→ Resolved
///    │                            ▲
///    └────────────────────────────┘
/// ```
///
/// A pending alert may be resolved directly (the responder dealt with it
/// without acknowledging first), but nothing ever leaves `Resolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Reported, nobody has responded yet.
    Pending,
    /// A responder has seen the alert and is acting on it.
    Acknowledged,
    /// Terminal: the situation is handled.
    Resolved,
}

impl AlertStatus {
    /// Returns `true` if moving from `self` to `target` is a legal
    /// forward transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (AlertStatus::Pending, AlertStatus::Acknowledged)
                | (AlertStatus::Pending, AlertStatus::Resolved)
                | (AlertStatus::Acknowledged, AlertStatus::Resolved)
        )
    }

    /// `true` for the absorbing terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, AlertStatus::Resolved)
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertStatus::Pending => write!(f, "pending"),
            AlertStatus::Acknowledged => write!(f, "acknowledged"),
            AlertStatus::Resolved => write!(f, "resolved"),
        }
    }
}

/// A student-reported emergency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyAlert {
    /// Unique alert id.
    pub id: AlertId,
    /// Who reported it.
    pub student_id: StudentId,
    /// Reporter's display name.
    pub student_name: String,
    /// Reporter's class section, for locating the emergency.
    pub class_section: String,
    /// What kind of emergency.
    pub alert_type: AlertType,
    /// Free-text detail. Required when `alert_type` is [`AlertType::Other`].
    pub description: Option<String>,
    /// Current lifecycle state.
    pub status: AlertStatus,
    /// When the alert was reported.
    pub created_at: DateTime<Utc>,
    /// Set when the alert reaches [`AlertStatus::Resolved`].
    pub resolved_at: Option<DateTime<Utc>>,
    /// Display name of whoever resolved it.
    pub resolver_name: Option<String>,
}

// =========================================================================
// Tests
// =========================================================================
