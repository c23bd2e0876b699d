//! Live DBaaS Management Tests
//!
//! Management calls run under the admin role session.

use cloudroast::dbaas::{DbaasClient, InstanceStatus};
use cloudroast::rbac::{RbacError, Role, RoleSessions};

/// Admin client, or `None` when the admin user is not configured
async fn admin_client(env: &super::common::LiveEnv) -> Option<DbaasClient> {
    match RoleSessions::establish(&env.config, env.authenticator.as_ref()).await {
        Ok(sessions) => Some(sessions.client(Role::Admin).clone()),
        Err(RbacError::MissingUser(role)) => {
            eprintln!("Skipping test: no user configured for role {}", role);
            None
        }
        Err(e) => panic!("RBAC fixture failed: {}", e),
    }
}

/// Test: hosts are listed and each host reports its instances
#[tokio::test]
async fn test_hosts() {
    let env = live_env!();
    let Some(admin) = admin_client(&env).await else {
        return;
    };

    let hosts = admin.list_hosts_typed().await.unwrap();
    assert!(!hosts.is_empty());

    let summary = &hosts[0];
    let host = admin.get_host_typed(&summary.name).await.unwrap();
    assert_eq!(host.name, summary.name);
    assert_eq!(host.instances.len() as u32, summary.instance_count);
    assert!(host.used_ram <= host.total_ram);
}

/// Test: a missing host returns 404
#[tokio::test]
async fn test_missing_host() {
    let env = live_env!();
    let Some(admin) = admin_client(&env).await else {
        return;
    };

    let response = admin.get_host("qe-no-such-host").await.unwrap();
    assert_eq!(response.status_code(), 404);
}

/// Test: the account view lists the tenant's instances with their hosts
#[tokio::test]
async fn test_accounts() {
    let env = live_env!();
    let Some(admin) = admin_client(&env).await else {
        return;
    };
    let instance = env.provision("mgmt_account").await;
    let tenant = env.access.tenant_id.clone();

    let listed = admin.list_accounts().await;
    let account = match &tenant {
        Some(tenant) => Some(admin.get_account_typed(tenant).await),
        None => None,
    };

    env.destroy(&instance).await;

    assert_eq!(listed.unwrap().status_code(), 200);
    if let Some(account) = account {
        let account = account.unwrap();
        let entry = account
            .instances
            .iter()
            .find(|i| i.id == instance.id())
            .expect("instance missing from account view");
        assert!(entry.host.is_some());
    }
}

/// Test: storage devices report capacity
#[tokio::test]
async fn test_storage() {
    let env = live_env!();
    let Some(admin) = admin_client(&env).await else {
        return;
    };

    let devices = admin.list_storage_typed().await.unwrap();
    assert!(!devices.is_empty());
    for device in devices {
        if let Some(capacity) = device.capacity {
            assert!(capacity.available <= capacity.total, "{}", device.name);
        }
    }
}

/// Test: the management instance view and root history for a live instance
#[tokio::test]
async fn test_mgmt_instance_and_root_history() {
    let env = live_env!();
    let Some(admin) = admin_client(&env).await else {
        return;
    };
    let instance = env.provision("mgmt_instance").await;

    let before = admin.root_history(instance.id()).await;
    let mgmt = admin.get_mgmt_instance_typed(instance.id()).await;
    let enabled = env.dbaas().enable_root(instance.id()).await;
    let after = admin.root_history(instance.id()).await;

    env.destroy(&instance).await;

    let mgmt = mgmt.unwrap();
    assert_eq!(mgmt.id, instance.id());
    assert_eq!(mgmt.status, InstanceStatus::Active);
    assert!(mgmt.host.is_some());

    assert_eq!(before.unwrap().status_code(), 200);
    assert_eq!(enabled.unwrap().status_code(), 200);
    let after: serde_json::Value = after.unwrap().json().unwrap();
    assert_eq!(after["root_history"]["id"], instance.id());
    assert!(after["root_history"]["enabled"].is_string());
}

/// Test: management calls for a missing instance return 404
#[tokio::test]
async fn test_mgmt_missing_instance() {
    let env = live_env!();
    let Some(admin) = admin_client(&env).await else {
        return;
    };
    let missing = uuid::Uuid::new_v4().to_string();

    assert_eq!(admin.get_mgmt_instance(&missing).await.unwrap().status_code(), 404);
    assert_eq!(admin.root_history(&missing).await.unwrap().status_code(), 404);
}
