use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{info, instrument};

use fieldgate_domain::{
    ContainerSpec, CreateOutcome, CseAdminPort, DomainError, DomainResult, ProvisionPlan,
};

/// Reads and validates the YAML provisioning plan.
pub fn load_plan(path: &str) -> DomainResult<ProvisionPlan> {
    let raw = std::fs::read_to_string(path)
        .map_err(|_| DomainError::PlanNotFound(path.to_string()))?;
    ProvisionPlan::from_yaml_str(&raw)
}

/// Counts of resources touched by one provisioning run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionSummary {
    pub created: usize,
    pub existing: usize,
}

impl ProvisionSummary {
    fn record(&mut self, outcome: CreateOutcome) {
        match outcome {
            CreateOutcome::Created => self.created += 1,
            CreateOutcome::AlreadyExists => self.existing += 1,
        }
    }
}

/// Creates the AE/container/subscription tree described by a plan.
///
/// Runs once at startup. Creation is depth-first in plan order with
/// subscriptions created before descending into child containers.
/// Conflicts are absorbed, so re-running against an already-provisioned
/// tree succeeds without changing it.
pub struct Provisioner {
    admin: Arc<dyn CseAdminPort>,
}

impl Provisioner {
    pub fn new(admin: Arc<dyn CseAdminPort>) -> Self {
        Self { admin }
    }

    #[instrument(name = "provision", skip_all, fields(ae = %plan.ae.rn))]
    pub async fn provision(&self, plan: &ProvisionPlan) -> DomainResult<ProvisionSummary> {
        let mut summary = ProvisionSummary::default();

        summary.record(self.admin.create_ae(&plan.ae).await?);
        let ae_path = format!("/{}", plan.ae.rn);

        for root in &plan.tree {
            self.ensure_container(&ae_path, root, &mut summary).await?;
        }

        info!(
            created = summary.created,
            existing = summary.existing,
            "Provisioning complete"
        );
        Ok(summary)
    }

    fn ensure_container<'a>(
        &'a self,
        parent_path: &'a str,
        spec: &'a ContainerSpec,
        summary: &'a mut ProvisionSummary,
    ) -> Pin<Box<dyn Future<Output = DomainResult<()>> + Send + 'a>> {
        Box::pin(async move {
            summary.record(self.admin.create_container(parent_path, spec).await?);
            let path = format!("{}/{}", parent_path, spec.rn);

            for sub in &spec.subs {
                summary.record(self.admin.create_subscription(&path, sub).await?);
            }
            for child in &spec.cnt {
                self.ensure_container(&path, child, summary).await?;
            }
            Ok(())
        })
    }
}
