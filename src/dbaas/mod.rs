//! Database-as-a-service API client
//!
//! Every call returns the raw [`ApiResponse`] so tests can assert on the status
//! code, including the statuses a denied role gets back. The `*_typed`
//! helpers decode the body for the common happy paths.

use crate::auth::{AccessInfo, AuthError};
use crate::client::{encode_segment, ApiResponse, ClientError, RestClient};
use crate::config::DbaasConfig;
use reqwest::Method;
use serde::Serialize;
use serde_json::json;

pub mod fixture;
pub mod models;
pub mod poller;

pub use fixture::{FixtureError, ProvisionedInstance};
pub use models::*;
pub use poller::{InstancePoller, PollOutcome, StatusSource, WaitError};

/// Pagination parameters for database and user listings
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Page {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

impl Page {
    pub fn limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            marker: None,
        }
    }

    pub fn after(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }
}

/// Typed client for the DBaaS API
#[derive(Debug, Clone)]
pub struct DbaasClient {
    rest: RestClient,
}

impl DbaasClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    /// Client for an authenticated session; the configured endpoint wins over
    /// the service catalog.
    pub fn from_access(
        access: &AccessInfo,
        config: &DbaasConfig,
        region: Option<&str>,
    ) -> Result<Self, AuthError> {
        let endpoint = match &config.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => access.require_endpoint(&config.service_type, region)?,
        };
        let rest = RestClient::new("dbaas", endpoint, Some(access.token.clone()))
            .map_err(|e| AuthError::RequestError(e.to_string()))?;
        Ok(Self::new(rest))
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    async fn call(&self, method: Method, path: &str) -> Result<ApiResponse, ClientError> {
        let request = self
            .rest
            .request(method, path)
            .header("Accept", "application/json");
        self.rest.send(request).await
    }

    async fn call_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, ClientError> {
        let request = self
            .rest
            .request(method, path)
            .header("Accept", "application/json")
            .json(body);
        self.rest.send(request).await
    }

    async fn call_paged(&self, path: &str, page: &Page) -> Result<ApiResponse, ClientError> {
        let request = self
            .rest
            .request(Method::GET, path)
            .header("Accept", "application/json")
            .query(page);
        self.rest.send(request).await
    }

    fn instance_path(id: &str) -> String {
        format!("/instances/{}", encode_segment(id))
    }

    // ========================================================================
    // Instances
    // ========================================================================

    #[tracing::instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_instance(
        &self,
        request: &InstanceCreate,
    ) -> Result<ApiResponse, ClientError> {
        self.call_json(Method::POST, "/instances", &json!({ "instance": request }))
            .await
    }

    /// Create an instance and decode the created record
    pub async fn create_instance_typed(
        &self,
        request: &InstanceCreate,
    ) -> Result<(ApiResponse, Option<Instance>), ClientError> {
        let response = self.create_instance(request).await?;
        let instance = if response.is_success() {
            Some(response.json::<InstanceWrapper>()?.instance)
        } else {
            None
        };
        Ok((response, instance))
    }

    pub async fn list_instances(&self) -> Result<ApiResponse, ClientError> {
        self.call(Method::GET, "/instances").await
    }

    pub async fn list_instances_detail(&self) -> Result<ApiResponse, ClientError> {
        self.call(Method::GET, "/instances/detail").await
    }

    pub async fn get_instance(&self, id: &str) -> Result<ApiResponse, ClientError> {
        self.call(Method::GET, &Self::instance_path(id)).await
    }

    pub async fn get_instance_typed(&self, id: &str) -> Result<Instance, ClientError> {
        Ok(self.get_instance(id).await?.json::<InstanceWrapper>()?.instance)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_instance(&self, id: &str) -> Result<ApiResponse, ClientError> {
        self.call(Method::DELETE, &Self::instance_path(id)).await
    }

    async fn instance_action(
        &self,
        id: &str,
        body: serde_json::Value,
    ) -> Result<ApiResponse, ClientError> {
        let path = format!("{}/action", Self::instance_path(id));
        self.call_json(Method::POST, &path, &body).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn restart_instance(&self, id: &str) -> Result<ApiResponse, ClientError> {
        self.instance_action(id, json!({ "restart": {} })).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn resize_instance(
        &self,
        id: &str,
        flavor_ref: &str,
    ) -> Result<ApiResponse, ClientError> {
        self.instance_action(id, json!({ "resize": { "flavorRef": flavor_ref } }))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn resize_volume(&self, id: &str, size: u32) -> Result<ApiResponse, ClientError> {
        self.instance_action(id, json!({ "resize": { "volume": { "size": size } } }))
            .await
    }

    // ========================================================================
    // Root
    // ========================================================================

    pub async fn enable_root(&self, id: &str) -> Result<ApiResponse, ClientError> {
        let path = format!("{}/root", Self::instance_path(id));
        self.call(Method::POST, &path).await
    }

    pub async fn enable_root_typed(&self, id: &str) -> Result<RootUser, ClientError> {
        Ok(self.enable_root(id).await?.json::<RootUserWrapper>()?.user)
    }

    pub async fn is_root_enabled(&self, id: &str) -> Result<ApiResponse, ClientError> {
        let path = format!("{}/root", Self::instance_path(id));
        self.call(Method::GET, &path).await
    }

    pub async fn is_root_enabled_typed(&self, id: &str) -> Result<bool, ClientError> {
        Ok(self.is_root_enabled(id).await?.json::<RootEnabled>()?.root_enabled)
    }

    // ========================================================================
    // Databases
    // ========================================================================

    pub async fn create_databases(
        &self,
        id: &str,
        databases: &[Database],
    ) -> Result<ApiResponse, ClientError> {
        let path = format!("{}/databases", Self::instance_path(id));
        self.call_json(Method::POST, &path, &json!({ "databases": databases }))
            .await
    }

    pub async fn list_databases(&self, id: &str, page: &Page) -> Result<ApiResponse, ClientError> {
        let path = format!("{}/databases", Self::instance_path(id));
        self.call_paged(&path, page).await
    }

    pub async fn list_databases_typed(
        &self,
        id: &str,
        page: &Page,
    ) -> Result<DatabaseList, ClientError> {
        self.list_databases(id, page).await?.json()
    }

    pub async fn delete_database(&self, id: &str, name: &str) -> Result<ApiResponse, ClientError> {
        let path = format!(
            "{}/databases/{}",
            Self::instance_path(id),
            encode_segment(name)
        );
        self.call(Method::DELETE, &path).await
    }

    // ========================================================================
    // Users
    // ========================================================================

    fn user_path(id: &str, user: &str) -> String {
        format!("{}/users/{}", Self::instance_path(id), encode_segment(user))
    }

    pub async fn create_users(&self, id: &str, users: &[User]) -> Result<ApiResponse, ClientError> {
        let path = format!("{}/users", Self::instance_path(id));
        self.call_json(Method::POST, &path, &json!({ "users": users }))
            .await
    }

    pub async fn list_users(&self, id: &str, page: &Page) -> Result<ApiResponse, ClientError> {
        let path = format!("{}/users", Self::instance_path(id));
        self.call_paged(&path, page).await
    }

    pub async fn list_users_typed(&self, id: &str, page: &Page) -> Result<UserList, ClientError> {
        self.list_users(id, page).await?.json()
    }

    pub async fn get_user(&self, id: &str, user: &str) -> Result<ApiResponse, ClientError> {
        self.call(Method::GET, &Self::user_path(id, user)).await
    }

    pub async fn delete_user(&self, id: &str, user: &str) -> Result<ApiResponse, ClientError> {
        self.call(Method::DELETE, &Self::user_path(id, user)).await
    }

    pub async fn grant_user_access(
        &self,
        id: &str,
        user: &str,
        databases: &[&str],
    ) -> Result<ApiResponse, ClientError> {
        let path = format!("{}/databases", Self::user_path(id, user));
        let databases: Vec<DatabaseName> = databases
            .iter()
            .map(|name| DatabaseName {
                name: name.to_string(),
            })
            .collect();
        self.call_json(Method::PUT, &path, &json!({ "databases": databases }))
            .await
    }

    pub async fn list_user_access(&self, id: &str, user: &str) -> Result<ApiResponse, ClientError> {
        let path = format!("{}/databases", Self::user_path(id, user));
        self.call(Method::GET, &path).await
    }

    pub async fn revoke_user_access(
        &self,
        id: &str,
        user: &str,
        database: &str,
    ) -> Result<ApiResponse, ClientError> {
        let path = format!(
            "{}/databases/{}",
            Self::user_path(id, user),
            encode_segment(database)
        );
        self.call(Method::DELETE, &path).await
    }

    pub async fn change_user_password(
        &self,
        id: &str,
        user: &str,
        password: &str,
    ) -> Result<ApiResponse, ClientError> {
        let path = format!("{}/users", Self::instance_path(id));
        let body = json!({ "users": [{ "name": user, "password": password }] });
        self.call_json(Method::PUT, &path, &body).await
    }

    // ========================================================================
    // Flavors
    // ========================================================================

    pub async fn list_flavors(&self) -> Result<ApiResponse, ClientError> {
        self.call(Method::GET, "/flavors").await
    }

    pub async fn list_flavors_typed(&self) -> Result<Vec<Flavor>, ClientError> {
        Ok(self.list_flavors().await?.json::<FlavorList>()?.flavors)
    }

    pub async fn get_flavor(&self, flavor_id: &str) -> Result<ApiResponse, ClientError> {
        self.call(Method::GET, &format!("/flavors/{}", encode_segment(flavor_id)))
            .await
    }

    // ========================================================================
    // Management (admin only)
    // ========================================================================

    pub async fn list_hosts(&self) -> Result<ApiResponse, ClientError> {
        self.call(Method::GET, "/mgmt/hosts").await
    }

    pub async fn list_hosts_typed(&self) -> Result<Vec<HostSummary>, ClientError> {
        Ok(self.list_hosts().await?.json::<HostList>()?.hosts)
    }

    pub async fn get_host(&self, host: &str) -> Result<ApiResponse, ClientError> {
        self.call(Method::GET, &format!("/mgmt/hosts/{}", encode_segment(host)))
            .await
    }

    pub async fn get_host_typed(&self, host: &str) -> Result<Host, ClientError> {
        Ok(self.get_host(host).await?.json::<HostWrapper>()?.host)
    }

    pub async fn list_accounts(&self) -> Result<ApiResponse, ClientError> {
        self.call(Method::GET, "/mgmt/accounts").await
    }

    pub async fn get_account(&self, account_id: &str) -> Result<ApiResponse, ClientError> {
        self.call(
            Method::GET,
            &format!("/mgmt/accounts/{}", encode_segment(account_id)),
        )
        .await
    }

    pub async fn get_account_typed(&self, account_id: &str) -> Result<Account, ClientError> {
        Ok(self.get_account(account_id).await?.json::<AccountWrapper>()?.account)
    }

    pub async fn get_mgmt_instance(&self, id: &str) -> Result<ApiResponse, ClientError> {
        self.call(Method::GET, &format!("/mgmt/instances/{}", encode_segment(id)))
            .await
    }

    pub async fn get_mgmt_instance_typed(&self, id: &str) -> Result<MgmtInstance, ClientError> {
        Ok(self
            .get_mgmt_instance(id)
            .await?
            .json::<MgmtInstanceWrapper>()?
            .instance)
    }

    pub async fn root_history(&self, id: &str) -> Result<ApiResponse, ClientError> {
        self.call(
            Method::GET,
            &format!("/mgmt/instances/{}/root", encode_segment(id)),
        )
        .await
    }

    pub async fn list_storage(&self) -> Result<ApiResponse, ClientError> {
        self.call(Method::GET, "/mgmt/storage").await
    }

    pub async fn list_storage_typed(&self) -> Result<Vec<StorageDevice>, ClientError> {
        Ok(self.list_storage().await?.json::<StorageList>()?.devices)
    }

    #[tracing::instrument(skip(self))]
    pub async fn reboot_instance(&self, id: &str) -> Result<ApiResponse, ClientError> {
        let path = format!("/mgmt/instances/{}/action", encode_segment(id));
        self.call_json(Method::POST, &path, &json!({ "reboot": {} }))
            .await
    }
}
