//! Provisioned instance fixture

use super::models::{Instance, InstanceCreate, InstanceStatus};
use super::poller::{InstancePoller, PollOutcome, StatusSource, WaitError};
use super::DbaasClient;
use crate::client::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("create instance '{name}' returned status {status}: {body}")]
    CreateRejected {
        name: String,
        status: u16,
        body: String,
    },

    #[error("delete instance {id} returned status {status}")]
    DeleteRejected { id: String, status: u16 },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Wait(#[from] WaitError),
}

/// An instance created for a test and polled to ACTIVE
#[derive(Debug, Clone)]
pub struct ProvisionedInstance {
    pub instance: Instance,
    /// How provisioning went
    pub provisioning: PollOutcome,
}

impl ProvisionedInstance {
    /// Create an instance and wait until it is ACTIVE
    #[tracing::instrument(skip_all, fields(name = %request.name))]
    pub async fn create<S: StatusSource>(
        client: &DbaasClient,
        poller: &InstancePoller<S>,
        request: &InstanceCreate,
    ) -> Result<Self, FixtureError> {
        let (response, created) = client.create_instance_typed(request).await?;
        let Some(instance) = created else {
            return Err(FixtureError::CreateRejected {
                name: request.name.clone(),
                status: response.status_code(),
                body: response.text(),
            });
        };

        tracing::info!(instance = %instance.id, status = %instance.status, "Instance created");
        let provisioning = poller
            .wait_for_status(&instance.id, &InstanceStatus::Active)
            .await?;

        Ok(Self {
            instance: Instance {
                status: InstanceStatus::Active,
                ..instance
            },
            provisioning,
        })
    }

    pub fn id(&self) -> &str {
        &self.instance.id
    }

    /// Delete the instance, optionally waiting until it is gone
    #[tracing::instrument(skip_all, fields(instance = %self.instance.id))]
    pub async fn destroy<S: StatusSource>(
        &self,
        client: &DbaasClient,
        poller: Option<&InstancePoller<S>>,
    ) -> Result<(), FixtureError> {
        let response = client.delete_instance(self.id()).await?;
        match response.status_code() {
            202 | 204 | 404 => {}
            status => {
                return Err(FixtureError::DeleteRejected {
                    id: self.id().to_string(),
                    status,
                })
            }
        }

        if let Some(poller) = poller {
            poller.wait_for_deletion(self.id()).await?;
        }
        Ok(())
    }
}
