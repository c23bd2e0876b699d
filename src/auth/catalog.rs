//! Service catalog returned with a token

use serde::{Deserialize, Serialize};

/// One endpoint of a catalog entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogEndpoint {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(rename = "publicURL")]
    pub public_url: String,
    #[serde(rename = "internalURL", default)]
    pub internal_url: Option<String>,
    #[serde(rename = "tenantId", default)]
    pub tenant_id: Option<String>,
}

/// One service in the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogService {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

/// Services reachable with a token
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceCatalog {
    pub services: Vec<CatalogService>,
}

impl ServiceCatalog {
    /// Catalog with a single endpoint per service type, used with static tokens
    pub fn from_endpoints<'a>(endpoints: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        let services = endpoints
            .into_iter()
            .map(|(service_type, url)| CatalogService {
                service_type: service_type.clone(),
                name: service_type.clone(),
                endpoints: vec![CatalogEndpoint {
                    public_url: url.clone(),
                    ..Default::default()
                }],
            })
            .collect();
        Self { services }
    }

    /// Service types present in the catalog
    pub fn service_types(&self) -> Vec<&str> {
        self.services
            .iter()
            .map(|s| s.service_type.as_str())
            .collect()
    }

    /// Public URL for `service_type`
    ///
    /// Without a region the first endpoint wins. With a region, only an
    /// endpoint in that region (case-insensitive) matches.
    pub fn public_url(&self, service_type: &str, region: Option<&str>) -> Option<String> {
        let service = self
            .services
            .iter()
            .find(|s| s.service_type == service_type)?;

        let endpoint = match region {
            None => service.endpoints.first(),
            Some(region) => service.endpoints.iter().find(|e| {
                e.region
                    .as_deref()
                    .is_some_and(|r| r.eq_ignore_ascii_case(region))
            }),
        }?;

        Some(endpoint.public_url.clone())
    }
}
