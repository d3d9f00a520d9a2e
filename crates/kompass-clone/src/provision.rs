//! Organization creation and content-copy requests.
//!
//! Both schedule a clone run in the background and return without waiting
//! for it. A failed clone never undoes the organization.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use kompass_core::{CreateOrganizationRequest, Error, OrganizationRepository, Plan, Result};

use crate::orchestrator::{CloneOrchestrator, CloneReport};

/// Handle to a scheduled clone run.
pub type CloneHandle = JoinHandle<Result<CloneReport>>;

/// A freshly created organization and its pending clone run.
#[derive(Debug)]
pub struct ProvisionedOrganization {
    pub organization_id: i64,
    pub clone_task: CloneHandle,
}

/// Creates organizations and fills them with default content.
pub struct OrganizationProvisioner {
    organizations: Arc<dyn OrganizationRepository>,
    orchestrator: Arc<CloneOrchestrator>,
}

impl OrganizationProvisioner {
    pub fn new(
        organizations: Arc<dyn OrganizationRepository>,
        orchestrator: Arc<CloneOrchestrator>,
    ) -> Self {
        Self {
            organizations,
            orchestrator,
        }
    }

    /// Create an organization with its theme roots, then schedule the clone
    /// of its plan's default content.
    pub async fn create_organization(
        &self,
        req: CreateOrganizationRequest,
    ) -> Result<ProvisionedOrganization> {
        let plan = req.plan;
        let organization_id = self.organizations.create(req).await?;

        info!(
            subsystem = "clone",
            component = "provision",
            op = "create_organization",
            organization_id,
            plan = %plan,
            "Organization created, scheduling default content"
        );

        Ok(ProvisionedOrganization {
            organization_id,
            clone_task: self.schedule(organization_id, plan),
        })
    }

    /// Schedule a default-content copy for an existing organization using
    /// its current plan.
    pub async fn request_default_content(&self, organization_id: i64) -> Result<CloneHandle> {
        let organization = self
            .organizations
            .get(organization_id)
            .await?
            .ok_or(Error::OrganizationNotFound(organization_id))?;

        info!(
            subsystem = "clone",
            component = "provision",
            op = "request_default_content",
            organization_id,
            plan = %organization.plan,
            "Default content requested"
        );

        Ok(self.schedule(organization_id, organization.plan))
    }

    fn schedule(&self, organization_id: i64, plan: Plan) -> CloneHandle {
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move {
            let result = orchestrator
                .clone_default_content(organization_id, plan)
                .await;
            if let Err(e) = &result {
                error!(
                    subsystem = "clone",
                    component = "provision",
                    organization_id,
                    plan = %plan,
                    error = %e,
                    "Default content clone failed"
                );
            }
            result
        })
    }
}
