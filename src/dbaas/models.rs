//! DBaaS API payloads

use serde::{Deserialize, Serialize};
use std::fmt;

/// Instance status as reported by the control plane
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstanceStatus {
    Build,
    Active,
    Resize,
    Reboot,
    Shutdown,
    Blocked,
    Backup,
    Failed,
    Error,
    Deleted,
    Other(String),
}

impl InstanceStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "BUILD" => Self::Build,
            "ACTIVE" => Self::Active,
            "RESIZE" => Self::Resize,
            "REBOOT" => Self::Reboot,
            "SHUTDOWN" => Self::Shutdown,
            "BLOCKED" => Self::Blocked,
            "BACKUP" => Self::Backup,
            "FAILED" => Self::Failed,
            "ERROR" => Self::Error,
            "DELETED" => Self::Deleted,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Build => "BUILD",
            Self::Active => "ACTIVE",
            Self::Resize => "RESIZE",
            Self::Reboot => "REBOOT",
            Self::Shutdown => "SHUTDOWN",
            Self::Blocked => "BLOCKED",
            Self::Backup => "BACKUP",
            Self::Failed => "FAILED",
            Self::Error => "ERROR",
            Self::Deleted => "DELETED",
            Self::Other(s) => s,
        }
    }

    /// Statuses from which an instance never recovers on its own
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Error)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for InstanceStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for InstanceStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub rel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlavorRef {
    pub id: String,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub size: u32,
    #[serde(default)]
    pub used: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub status: InstanceStatus,
    #[serde(default)]
    pub flavor: Option<FlavorRef>,
    #[serde(default)]
    pub volume: Option<Volume>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceWrapper {
    pub instance: Instance,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceList {
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub character_set: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub collate: Option<String>,
}

impl Database {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            character_set: None,
            collate: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseList {
    pub databases: Vec<Database>,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseName {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub host: Option<String>,
    #[serde(default)]
    pub databases: Vec<DatabaseName>,
}

impl User {
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: Some(password.into()),
            host: None,
            databases: Vec::new(),
        }
    }

    pub fn with_databases<I, S>(mut self, databases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.databases = databases
            .into_iter()
            .map(|name| DatabaseName { name: name.into() })
            .collect();
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserWrapper {
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserList {
    pub users: Vec<User>,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// Root credentials returned when root is enabled
#[derive(Debug, Clone, Deserialize)]
pub struct RootUser {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RootUserWrapper {
    pub user: RootUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RootEnabled {
    #[serde(rename = "rootEnabled")]
    pub root_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Flavor {
    pub id: serde_json::Value,
    pub name: String,
    pub ram: u64,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Flavor {
    /// Flavor id as a string; some deployments return integers
    pub fn id_string(&self) -> String {
        match &self.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlavorWrapper {
    pub flavor: Flavor,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlavorList {
    pub flavors: Vec<Flavor>,
}

/// Request body for instance creation
#[derive(Debug, Clone, Serialize)]
pub struct InstanceCreate {
    pub name: String,
    #[serde(rename = "flavorRef")]
    pub flavor_ref: String,
    pub volume: VolumeCreate,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub databases: Vec<Database>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VolumeCreate {
    pub size: u32,
}

impl InstanceCreate {
    pub fn new(name: impl Into<String>, flavor_ref: impl Into<String>, volume_size: u32) -> Self {
        Self {
            name: name.into(),
            flavor_ref: flavor_ref.into(),
            volume: VolumeCreate { size: volume_size },
            databases: Vec::new(),
            users: Vec::new(),
        }
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.databases.push(database);
        self
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.users.push(user);
        self
    }
}

// ============================================================================
// Management API
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct HostSummary {
    pub name: String,
    #[serde(rename = "instanceCount", default)]
    pub instance_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostList {
    pub hosts: Vec<HostSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostInstance {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<InstanceStatus>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Host {
    pub name: String,
    #[serde(rename = "percentUsed", default)]
    pub percent_used: f64,
    #[serde(rename = "totalRAM", default)]
    pub total_ram: u64,
    #[serde(rename = "usedRAM", default)]
    pub used_ram: u64,
    #[serde(default)]
    pub instances: Vec<HostInstance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostWrapper {
    pub host: Host,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountInstance {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<InstanceStatus>,
    #[serde(default)]
    pub host: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub instances: Vec<AccountInstance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountWrapper {
    pub account: Account,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountSummary {
    pub id: String,
    #[serde(default)]
    pub num_instances: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountList {
    pub accounts: Vec<AccountSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageCapacity {
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub available: f64,
}

/// One storage device and its usage
#[derive(Debug, Clone, Deserialize)]
pub struct StorageDevice {
    pub name: String,
    #[serde(rename = "type", default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub used: f64,
    #[serde(default)]
    pub capacity: Option<StorageCapacity>,
    #[serde(default)]
    pub provision: Option<StorageCapacity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageList {
    pub devices: Vec<StorageDevice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RootHistory {
    pub id: String,
    #[serde(default)]
    pub enabled: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RootHistoryWrapper {
    pub root_history: RootHistory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MgmtInstance {
    pub id: String,
    pub name: String,
    pub status: InstanceStatus,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub server_state_description: Option<String>,
    #[serde(default)]
    pub deleted: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MgmtInstanceWrapper {
    pub instance: MgmtInstance,
}
