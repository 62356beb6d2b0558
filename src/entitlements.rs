//! Entitlement synchronizer.
//!
//! Makes a member's platform roles match the single role their record says
//! they should hold. Every role the catalog manages is removed first, then
//! the desired role (if any) is added.
//!
//! Individual role operations are best effort: a failure is logged and
//! recorded in the [`ReconcileReport`], and the remaining operations still
//! run. The next reconcile of the same member retries implicitly. Only fatal
//! errors (a revoked bot token) abort the pass.

use std::sync::Arc;

use crate::error::{Result, TollgateError};
use crate::plans::{PlanCatalog, RoleId};
use crate::platform::{Member, Platform};

/// Role operation that failed and was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleFailure {
    pub role_id: RoleId,
    pub operation: RoleOperation,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleOperation {
    Fetch,
    Remove,
    Add,
}

impl RoleOperation {
    fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch_member",
            Self::Remove => "remove_role",
            Self::Add => "add_role",
        }
    }
}

/// Outcome of one reconcile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// False when the user has left the guild (or could not be looked up).
    pub member_found: bool,
    pub removed: Vec<RoleId>,
    pub granted: Option<RoleId>,
    pub failed: Vec<RoleFailure>,
}

impl ReconcileReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Reconciles platform roles against the plan catalog's role universe.
#[derive(Clone)]
pub struct RoleSync {
    platform: Arc<dyn Platform>,
    universe: Vec<RoleId>,
}

impl RoleSync {
    pub fn new(platform: Arc<dyn Platform>, catalog: &PlanCatalog) -> Self {
        Self {
            platform,
            universe: catalog.role_universe(),
        }
    }

    #[must_use]
    pub fn universe(&self) -> &[RoleId] {
        &self.universe
    }

    /// Make `user_id` hold exactly `desired` out of the managed roles.
    ///
    /// Idempotent. An absent member is a successful no-op.
    pub async fn reconcile(&self, user_id: &str, desired: Option<&str>) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        let member = match self.platform.fetch_member(user_id).await {
            Ok(Some(member)) => member,
            Ok(None) => {
                tracing::debug!(user_id = %user_id, "Member not in guild, nothing to reconcile");
                return Ok(report);
            }
            Err(e) => {
                tolerate(&mut report, user_id, "", RoleOperation::Fetch, e)?;
                return Ok(report);
            }
        };
        report.member_found = true;

        for role_id in &self.universe {
            match self.platform.remove_role(&member, role_id).await {
                Ok(()) => report.removed.push(role_id.clone()),
                Err(e) => tolerate(&mut report, user_id, role_id, RoleOperation::Remove, e)?,
            }
        }

        if let Some(role_id) = desired {
            self.grant(&member, role_id, &mut report).await?;
        }

        tracing::info!(
            user_id = %user_id,
            desired = desired.unwrap_or("none"),
            failures = report.failed.len(),
            "Roles reconciled"
        );
        Ok(report)
    }

    async fn grant(&self, member: &Member, role_id: &str, report: &mut ReconcileReport) -> Result<()> {
        match self.platform.add_role(member, role_id).await {
            Ok(()) => {
                report.granted = Some(role_id.to_string());
                Ok(())
            }
            Err(e) => tolerate(report, &member.user_id, role_id, RoleOperation::Add, e),
        }
    }
}

/// Tolerate-and-continue: record a failed role operation and carry on.
///
/// Fatal errors are passed through so the caller can stop the process.
fn tolerate(
    report: &mut ReconcileReport,
    user_id: &str,
    role_id: &str,
    operation: RoleOperation,
    error: TollgateError,
) -> Result<()> {
    if error.is_fatal() {
        return Err(error);
    }

    tracing::warn!(
        user_id = %user_id,
        role_id = %role_id,
        operation = operation.as_str(),
        error = %error,
        "Role operation failed, continuing"
    );
    report.failed.push(RoleFailure {
        role_id: role_id.to_string(),
        operation,
        message: error.to_string(),
    });
    Ok(())
}
