//! Role-based access control fixture
//!
//! Three users (admin, creator, observer) each get their own authenticated
//! session. Every DBaaS operation is expected to succeed for the roles the
//! capability matrix grants it to, and to come back with the configured
//! "denied" status for everyone else.

use crate::auth::{AccessInfo, AuthError, Authenticator, Credentials};
use crate::config::{Config, DbaasConfig, RoleUserConfig};
use crate::dbaas::{
    DbaasClient, FixtureError, InstanceCreate, InstancePoller, ProvisionedInstance,
};
use std::fmt;
use thiserror::Error;

/// RBAC errors
#[derive(Debug, Error)]
pub enum RbacError {
    #[error("no user configured for role '{0}'")]
    MissingUser(Role),

    #[error("authentication failed for role '{role}': {source}")]
    Auth {
        role: Role,
        #[source]
        source: AuthError,
    },

    #[error("user '{username}' was expected to hold role '{expected}' but has {actual:?}")]
    RoleMismatch {
        username: String,
        expected: String,
        actual: Vec<String>,
    },

    #[error("provisioning for role '{role}' failed: {source}")]
    Provision {
        role: Role,
        #[source]
        source: FixtureError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Creator,
    Observer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Creator, Role::Observer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Creator => "creator",
            Role::Observer => "observer",
        }
    }

    /// Roles allowed to own instances
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin | Role::Creator)
    }

    fn user<'a>(&self, config: &'a Config) -> Option<&'a RoleUserConfig> {
        match self {
            Role::Admin => config.roles.admin.as_ref(),
            Role::Creator => config.roles.creator.as_ref(),
            Role::Observer => config.roles.observer.as_ref(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DBaaS operations covered by the capability matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbaasOperation {
    ListInstances,
    GetInstance,
    ListFlavors,
    CheckRoot,
    ListDatabases,
    ListUsers,
    CreateInstance,
    DeleteInstance,
    RestartInstance,
    CreateDatabase,
    DeleteDatabase,
    CreateUser,
    DeleteUser,
    EnableRoot,
    ResizeFlavor,
    ResizeVolume,
}

impl DbaasOperation {
    pub const ALL: [DbaasOperation; 16] = [
        DbaasOperation::ListInstances,
        DbaasOperation::GetInstance,
        DbaasOperation::ListFlavors,
        DbaasOperation::CheckRoot,
        DbaasOperation::ListDatabases,
        DbaasOperation::ListUsers,
        DbaasOperation::CreateInstance,
        DbaasOperation::DeleteInstance,
        DbaasOperation::RestartInstance,
        DbaasOperation::CreateDatabase,
        DbaasOperation::DeleteDatabase,
        DbaasOperation::CreateUser,
        DbaasOperation::DeleteUser,
        DbaasOperation::EnableRoot,
        DbaasOperation::ResizeFlavor,
        DbaasOperation::ResizeVolume,
    ];

    pub fn is_read(&self) -> bool {
        matches!(
            self,
            DbaasOperation::ListInstances
                | DbaasOperation::GetInstance
                | DbaasOperation::ListFlavors
                | DbaasOperation::CheckRoot
                | DbaasOperation::ListDatabases
                | DbaasOperation::ListUsers
        )
    }

    /// Status the service answers with when the operation is permitted
    pub fn success_status(&self) -> u16 {
        match self {
            DbaasOperation::ListInstances
            | DbaasOperation::GetInstance
            | DbaasOperation::ListFlavors
            | DbaasOperation::CheckRoot
            | DbaasOperation::ListDatabases
            | DbaasOperation::ListUsers
            | DbaasOperation::CreateInstance
            | DbaasOperation::EnableRoot => 200,
            DbaasOperation::DeleteInstance
            | DbaasOperation::RestartInstance
            | DbaasOperation::CreateDatabase
            | DbaasOperation::DeleteDatabase
            | DbaasOperation::CreateUser
            | DbaasOperation::DeleteUser
            | DbaasOperation::ResizeFlavor
            | DbaasOperation::ResizeVolume => 202,
        }
    }
}

/// Whether `role` may perform `op`
pub fn permits(role: Role, op: DbaasOperation) -> bool {
    if op.is_read() {
        return true;
    }
    match op {
        DbaasOperation::EnableRoot | DbaasOperation::ResizeFlavor | DbaasOperation::ResizeVolume => {
            role == Role::Admin
        }
        _ => role.is_elevated(),
    }
}

/// Status a test should expect when `role` attempts `op`
pub fn expected_status(role: Role, op: DbaasOperation, denied_status: u16) -> u16 {
    if permits(role, op) {
        op.success_status()
    } else {
        denied_status
    }
}

/// One authenticated role-scoped session
#[derive(Debug, Clone)]
pub struct RoleSession {
    pub role: Role,
    pub access: AccessInfo,
    pub client: DbaasClient,
}

/// Sessions for all three roles plus the instances they own
pub struct RoleSessions {
    admin: RoleSession,
    creator: RoleSession,
    observer: RoleSession,
    instances: Vec<(Role, ProvisionedInstance)>,
    dbaas: DbaasConfig,
}

impl RoleSessions {
    /// Authenticate every role user and check their role claims.
    ///
    /// Fails on the first missing user, authentication failure or role
    /// mismatch, before any test runs against a misconfigured tenant.
    #[tracing::instrument(skip_all)]
    pub async fn establish(
        config: &Config,
        authenticator: &dyn Authenticator,
    ) -> Result<Self, RbacError> {
        let mut sessions = Vec::with_capacity(Role::ALL.len());

        for role in Role::ALL {
            let user = role.user(config).ok_or(RbacError::MissingUser(role))?;
            let credentials = Credentials::from_parts(
                &user.username,
                user.password.as_deref(),
                user.api_key.as_deref(),
            )
            .map_err(|source| RbacError::Auth { role, source })?
            .tenant_name(user.tenant_name.clone().or(config.identity.tenant_name.clone()));

            let access = authenticator
                .authenticate(&credentials)
                .await
                .map_err(|source| RbacError::Auth { role, source })?;

            let expected = user
                .expected_role
                .clone()
                .unwrap_or_else(|| role.as_str().to_string());
            if !access.has_role(&expected) {
                return Err(RbacError::RoleMismatch {
                    username: user.username.clone(),
                    expected,
                    actual: access.roles.clone(),
                });
            }

            let client = DbaasClient::from_access(
                &access,
                &config.dbaas,
                config.identity.region.as_deref(),
            )
            .map_err(|source| RbacError::Auth { role, source })?;

            tracing::info!(role = %role, user = %user.username, "Session established");
            sessions.push(RoleSession {
                role,
                access,
                client,
            });
        }

        let mut sessions = sessions.into_iter();
        let (Some(admin), Some(creator), Some(observer)) =
            (sessions.next(), sessions.next(), sessions.next())
        else {
            return Err(RbacError::MissingUser(Role::Admin));
        };

        Ok(Self {
            admin,
            creator,
            observer,
            instances: Vec::new(),
            dbaas: config.dbaas.clone(),
        })
    }

    pub fn session(&self, role: Role) -> &RoleSession {
        match role {
            Role::Admin => &self.admin,
            Role::Creator => &self.creator,
            Role::Observer => &self.observer,
        }
    }

    pub fn client(&self, role: Role) -> &DbaasClient {
        &self.session(role).client
    }

    /// Create one ACTIVE instance owned by each elevated role
    pub async fn provision_instances(
        &mut self,
        name_prefix: &str,
    ) -> Result<(), RbacError> {
        for role in Role::ALL.into_iter().filter(Role::is_elevated) {
            let client = self.client(role).clone();
            let poller = InstancePoller::from_config(client.clone(), &self.dbaas.poll);
            let request = InstanceCreate::new(
                format!("{}{}_{}", name_prefix, role, uuid::Uuid::new_v4().simple()),
                self.dbaas.flavor_ref.clone(),
                self.dbaas.volume_size,
            );

            let instance = ProvisionedInstance::create(&client, &poller, &request)
                .await
                .map_err(|source| RbacError::Provision { role, source })?;
            self.instances.push((role, instance));
        }
        Ok(())
    }

    /// Instance owned by `role`, if provisioned
    pub fn instance(&self, role: Role) -> Option<&ProvisionedInstance> {
        self.instances
            .iter()
            .find(|(owner, _)| *owner == role)
            .map(|(_, instance)| instance)
    }

    /// Delete every provisioned instance with its owner's session.
    ///
    /// Keeps going after a failed delete and returns how many failed.
    pub async fn teardown(&mut self) -> usize {
        let mut failures = 0;
        for (role, instance) in std::mem::take(&mut self.instances) {
            let client = self.client(role).clone();
            if let Err(e) = instance.destroy::<DbaasClient>(&client, None).await {
                tracing::warn!(role = %role, instance = instance.id(), error = %e, "Teardown failed");
                failures += 1;
            }
        }
        failures
    }
}
