//! The alert workflow: report, triage, resolve.
//!
//! Status only moves forward:
//!
//! ```text
//! pending ──→ acknowledged ──→ resolved
//!    └────────────────────────────↗
//! ```
//!
//! Students report; only a principal moves an alert forward; teachers
//! and principals see the list. The registry enforces all of this too —
//! the local gates exist so a misbehaving UI gets an answer without a
//! round trip, not because the client is trusted.

use std::sync::Arc;

use rollcall_protocol::{AlertId, AlertStatus, AlertType, EmergencyAlert, Identity, Role};
use rollcall_registry::SessionRegistry;

use crate::AlertError;

/// Drives the emergency alert lifecycle against a registry.
pub struct AlertWorkflow<R> {
    registry: Arc<R>,
}

impl<R: SessionRegistry> AlertWorkflow<R> {
    /// Creates a workflow over the given registry.
    pub fn new(registry: Arc<R>) -> Self {
        Self { registry }
    }

    /// Reports a new emergency. Student-only.
    ///
    /// The description is trimmed; a blank description on an alert type
    /// that requires one is rejected here, before the registry is ever
    /// contacted.
    pub async fn report(
        &self,
        identity: &Identity,
        alert_type: AlertType,
        description: Option<String>,
    ) -> Result<EmergencyAlert, AlertError> {
        if identity.role != Role::Student {
            return Err(AlertError::Forbidden(
                "only students can report emergencies".into(),
            ));
        }

        let description = description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());
        if alert_type.requires_description() && description.is_none() {
            return Err(AlertError::MissingDescription);
        }

        let alert = self
            .registry
            .create_alert(identity, alert_type, description)
            .await?;
        tracing::warn!(
            alert_id = %alert.id,
            alert_type = ?alert.alert_type,
            class_section = %alert.class_section,
            "emergency alert reported"
        );
        Ok(alert)
    }

    /// Marks a pending alert as acknowledged. Principal-only.
    pub async fn acknowledge(
        &self,
        identity: &Identity,
        alert_id: AlertId,
    ) -> Result<EmergencyAlert, AlertError> {
        self.transition(identity, alert_id, AlertStatus::Acknowledged)
            .await
    }

    /// Marks an alert as resolved, from pending or acknowledged.
    /// Principal-only; resolved is terminal.
    pub async fn resolve(
        &self,
        identity: &Identity,
        alert_id: AlertId,
    ) -> Result<EmergencyAlert, AlertError> {
        self.transition(identity, alert_id, AlertStatus::Resolved).await
    }

    /// Lists alerts, most recent first. Teacher and principal only.
    pub async fn list(
        &self,
        identity: &Identity,
    ) -> Result<Vec<EmergencyAlert>, AlertError> {
        if !identity.role.can_view_alerts() {
            return Err(AlertError::Forbidden(
                "students cannot view the alert list".into(),
            ));
        }
        Ok(self.registry.alerts(identity).await?)
    }

    async fn transition(
        &self,
        identity: &Identity,
        alert_id: AlertId,
        target: AlertStatus,
    ) -> Result<EmergencyAlert, AlertError> {
        if !identity.role.can_transition_alerts() {
            return Err(AlertError::Forbidden(
                "only the principal can update alert status".into(),
            ));
        }
        let alert = self
            .registry
            .update_alert_status(identity, alert_id, target)
            .await?;
        tracing::info!(
            alert_id = %alert.id,
            status = %alert.status,
            "alert status updated"
        );
        Ok(alert)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rollcall_protocol::{
        AttendanceRecord, Session, SessionId, SessionRef,
    };
    use rollcall_registry::{
        IssueRequest, Issued, MemoryRegistry, RegistryError,
    };

    fn student() -> Identity {
        Identity::student("tok-student", "STU-1042", "J. Mwangi", "A5")
    }

    fn teacher() -> Identity {
        Identity::teacher("tok-teacher", "T-1", "R. Atkins")
    }

    fn principal() -> Identity {
        Identity::principal("tok-principal", "P-1", "M. Okafor")
    }

    fn workflow() -> AlertWorkflow<MemoryRegistry> {
        AlertWorkflow::new(Arc::new(MemoryRegistry::with_ttl(
            Duration::hours(1),
        )))
    }

    // =====================================================================
    // Reporting
    // =====================================================================

    #[tokio::test]
    async fn test_report_fire_needs_no_description() {
        let workflow = workflow();

        let alert = workflow
            .report(&student(), AlertType::Fire, None)
            .await
            .unwrap();

        assert_eq!(alert.status, AlertStatus::Pending);
        assert_eq!(alert.class_section, "A5");
        assert!(alert.description.is_none());
    }

    #[tokio::test]
    async fn test_report_other_requires_description() {
        let workflow = workflow();

        for description in [None, Some("".into()), Some("   ".into())] {
            let result = workflow
                .report(&student(), AlertType::Other, description)
                .await;
            assert!(matches!(result, Err(AlertError::MissingDescription)));
        }

        let alert = workflow
            .report(
                &student(),
                AlertType::Other,
                Some("gas smell in lab".into()),
            )
            .await
            .unwrap();
        assert_eq!(alert.description.as_deref(), Some("gas smell in lab"));
    }

    #[tokio::test]
    async fn test_report_by_teacher_is_forbidden() {
        let workflow = workflow();

        let result = workflow.report(&teacher(), AlertType::Fire, None).await;

        assert!(matches!(result, Err(AlertError::Forbidden(_))));
    }

    /// A registry that panics on any call — proves blank descriptions
    /// are rejected before the network.
    struct UnreachableRegistry;

    impl SessionRegistry for UnreachableRegistry {
        async fn issue_session(
            &self,
            _: &Identity,
            _: IssueRequest,
        ) -> Result<Issued, RegistryError> {
            unreachable!()
        }
        async fn session(
            &self,
            _: &Identity,
            _: SessionId,
        ) -> Result<Option<Session>, RegistryError> {
            unreachable!()
        }
        async fn sessions(
            &self,
            _: &Identity,
        ) -> Result<Vec<Session>, RegistryError> {
            unreachable!()
        }
        async fn redeem(
            &self,
            _: &Identity,
            _: &SessionRef,
        ) -> Result<AttendanceRecord, RegistryError> {
            unreachable!()
        }
        async fn attendance(
            &self,
            _: &Identity,
        ) -> Result<Vec<AttendanceRecord>, RegistryError> {
            unreachable!()
        }
        async fn create_alert(
            &self,
            _: &Identity,
            _: AlertType,
            _: Option<String>,
        ) -> Result<EmergencyAlert, RegistryError> {
            unreachable!("workflow must not call the registry")
        }
        async fn alerts(
            &self,
            _: &Identity,
        ) -> Result<Vec<EmergencyAlert>, RegistryError> {
            unreachable!()
        }
        async fn update_alert_status(
            &self,
            _: &Identity,
            _: AlertId,
            _: AlertStatus,
        ) -> Result<EmergencyAlert, RegistryError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_blank_description_never_reaches_registry() {
        let workflow = AlertWorkflow::new(Arc::new(UnreachableRegistry));

        let result = workflow
            .report(&student(), AlertType::Other, Some("  ".into()))
            .await;

        assert!(matches!(result, Err(AlertError::MissingDescription)));
    }

    // =====================================================================
    // Transitions
    // =====================================================================

    #[tokio::test]
    async fn test_principal_acknowledges_then_resolves() {
        let workflow = workflow();
        let alert = workflow
            .report(&student(), AlertType::UnauthorizedAccess, None)
            .await
            .unwrap();

        let acked =
            workflow.acknowledge(&principal(), alert.id).await.unwrap();
        assert_eq!(acked.status, AlertStatus::Acknowledged);

        let resolved = workflow.resolve(&principal(), alert.id).await.unwrap();
        assert_eq!(resolved.status, AlertStatus::Resolved);
        assert!(resolved.resolved_at.is_some());
        assert_eq!(resolved.resolver_name.as_deref(), Some("M. Okafor"));
    }

    #[tokio::test]
    async fn test_pending_resolves_directly() {
        let workflow = workflow();
        let alert = workflow
            .report(&student(), AlertType::Fire, None)
            .await
            .unwrap();

        let resolved = workflow.resolve(&principal(), alert.id).await.unwrap();

        assert_eq!(resolved.status, AlertStatus::Resolved);
    }

    #[tokio::test]
    async fn test_resolved_is_absorbing() {
        let workflow = workflow();
        let alert = workflow
            .report(&student(), AlertType::Fire, None)
            .await
            .unwrap();
        workflow.resolve(&principal(), alert.id).await.unwrap();

        let result = workflow.acknowledge(&principal(), alert.id).await;

        assert!(matches!(
            result,
            Err(AlertError::InvalidTransition {
                from: AlertStatus::Resolved,
                to: AlertStatus::Acknowledged,
            })
        ));
    }

    #[tokio::test]
    async fn test_only_principal_transitions() {
        let workflow = workflow();
        let alert = workflow
            .report(&student(), AlertType::Fire, None)
            .await
            .unwrap();

        // The reporting student has no transition rights either.
        for identity in [teacher(), student()] {
            let result = workflow.acknowledge(&identity, alert.id).await;
            assert!(matches!(result, Err(AlertError::Forbidden(_))));
        }
    }

    #[tokio::test]
    async fn test_transition_on_missing_alert_is_not_found() {
        let workflow = workflow();

        let result = workflow.acknowledge(&principal(), AlertId::new()).await;

        assert!(matches!(result, Err(AlertError::NotFound)));
    }

    // =====================================================================
    // Listing
    // =====================================================================

    #[tokio::test]
    async fn test_list_visible_to_teacher_and_principal_only() {
        let workflow = workflow();
        workflow
            .report(&student(), AlertType::Fire, None)
            .await
            .unwrap();

        assert_eq!(workflow.list(&teacher()).await.unwrap().len(), 1);
        assert_eq!(workflow.list(&principal()).await.unwrap().len(), 1);
        assert!(matches!(
            workflow.list(&student()).await,
            Err(AlertError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_list_orders_most_recent_first() {
        let workflow = workflow();
        workflow
            .report(&student(), AlertType::Fire, None)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newest = workflow
            .report(
                &student(),
                AlertType::Other,
                Some("stranger at the gate".into()),
            )
            .await
            .unwrap();

        let listed = workflow.list(&principal()).await.unwrap();

        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newest.id);
    }
}
