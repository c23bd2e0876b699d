//! Cloudroast Library
//!
//! Functional regression harness for an OpenStack-style database-as-a-service
//! control plane and object store.
//!
//! # Features
//!
//! - **Typed clients**: DBaaS and object storage calls return the raw status
//!   for tests to assert on
//! - **Status polling**: fixed-interval waits with hard timeouts
//! - **Large objects**: segment planning, checksums and DLO/SLO manifests
//! - **RBAC**: admin/creator/observer sessions and the capability matrix
//! - **Listings**: computed expectations for marker/prefix/delimiter/path
//!
//! # Example
//!
//! ```no_run
//! use cloudroast::auth::keystone::{authenticator_for, credentials_for};
//! use cloudroast::config::Config;
//! use cloudroast::dbaas::{DbaasClient, InstancePoller, InstanceStatus};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("cloudroast.yaml")?;
//!     let authenticator = authenticator_for(&config.identity)?;
//!     let access = authenticator
//!         .authenticate(&credentials_for(&config.identity)?)
//!         .await?;
//!
//!     let client = DbaasClient::from_access(&access, &config.dbaas, None)?;
//!     let poller = InstancePoller::from_config(client, &config.dbaas.poll);
//!     poller.wait_for_status("instance-id", &InstanceStatus::Active).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod dbaas;
pub mod metrics;
pub mod poll;
pub mod rbac;
pub mod storage;
pub mod telemetry;

// Re-export commonly used types
pub use client::{ApiResponse, ClientError, RestClient};
pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
