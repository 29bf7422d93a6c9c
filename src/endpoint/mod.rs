//! Bucket endpoint resolution.
//!
//! A bucket is served from the regional host that matches its location
//! constraint (`us-smart`, `eu-de-standard`, `ams03-standard`, ...). The
//! mapping from constraint to host comes from the service's endpoint
//! topology, which is fetched once per [`TopologyCache`] and shared by every
//! client built on that cache. [`EndpointResolver`] adds a per-client cache
//! keyed by bucket name on top of it.
//!
//! Both caches are last-writer-wins: two concurrent first-time resolutions of
//! the same bucket may each list buckets, but they store the same value.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::http::{HttpClient, HttpRequest, Method};
use crate::types::BucketList;
use crate::types::error::CosError;

pub const PUBLIC_SCOPE: &str = "public";

/// `name -> host` within one visibility scope.
pub type EndpointNames = BTreeMap<String, String>;
/// `scope -> names` within one region.
pub type RegionScopes = BTreeMap<String, EndpointNames>;
/// `region -> scopes` within one deployment type.
pub type DeploymentRegions = BTreeMap<String, RegionScopes>;

/// Resiliency class of a bucket, as named by the topology document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeploymentType {
    CrossRegion,
    Regional,
    SingleSite,
}

impl DeploymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentType::CrossRegion => "cross-region",
            DeploymentType::Regional => "regional",
            DeploymentType::SingleSite => "single-site",
        }
    }
}

impl fmt::Display for DeploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a bucket lives, derived from its location constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketLocation {
    pub deployment_type: DeploymentType,
    pub region: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IdentityEndpoints {
    #[serde(rename = "iam-token", default)]
    pub iam_token: Option<String>,
    #[serde(rename = "iam-policy", default)]
    pub iam_policy: Option<String>,
}

/// The service's region/endpoint catalogue.
///
/// `service_endpoints[deployment_type][region][scope][name] = host`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EndpointTopology {
    #[serde(rename = "identity-endpoints", default)]
    pub identity_endpoints: IdentityEndpoints,
    #[serde(rename = "service-endpoints", default)]
    pub service_endpoints: BTreeMap<String, DeploymentRegions>,
}

impl EndpointTopology {
    pub fn from_json(body: &[u8]) -> Result<Self, CosError> {
        serde_json::from_slice(body)
            .map_err(|e| CosError::TopologyFetchFailed(format!("error parsing endpoints: {e}")))
    }

    pub fn is_single_site(&self, region: &str) -> bool {
        self.service_endpoints
            .get(DeploymentType::SingleSite.as_str())
            .is_some_and(|regions| regions.contains_key(region))
    }

    /// Classify a location constraint.
    ///
    /// Two dash-separated segments mean cross-region, unless the first
    /// segment is a known single-site location. Three segments mean regional,
    /// with the region formed from the first two. Anything else fails.
    pub fn parse_location_constraint(&self, constraint: &str) -> Result<BucketLocation, CosError> {
        let parts: Vec<&str> = constraint.split('-').collect();
        match parts.as_slice() {
            [region, _class] => {
                let deployment_type = if self.is_single_site(region) {
                    DeploymentType::SingleSite
                } else {
                    DeploymentType::CrossRegion
                };
                Ok(BucketLocation {
                    deployment_type,
                    region: region.to_string(),
                })
            }
            [area, zone, _class] => Ok(BucketLocation {
                deployment_type: DeploymentType::Regional,
                region: format!("{area}-{zone}"),
            }),
            _ => Err(CosError::LocationParseFailed(constraint.to_string())),
        }
    }

    /// The public host for a deployment type and region.
    ///
    /// When a region publishes several public names, the lexicographically
    /// smallest host wins so the choice never depends on map iteration order.
    pub fn public_host(&self, deployment_type: &str, region: &str) -> Option<&str> {
        self.service_endpoints
            .get(deployment_type)?
            .get(region)?
            .get(PUBLIC_SCOPE)?
            .values()
            .min()
            .map(String::as_str)
    }

    /// `https://<host>` for a parsed bucket location.
    pub fn endpoint_for(&self, location: &BucketLocation) -> Result<String, CosError> {
        self.public_host(location.deployment_type.as_str(), &location.region)
            .map(|host| format!("https://{host}"))
            .ok_or_else(|| CosError::EndpointNotFound {
                deployment_type: location.deployment_type.to_string(),
                region: location.region.clone(),
            })
    }

    /// `https://<host>` to create a bucket in, validating both names against
    /// the catalogue. Errors list the valid choices in sorted order.
    pub fn creation_endpoint(&self, deployment_type: &str, region: &str) -> Result<String, CosError> {
        let regions = self.service_endpoints.get(deployment_type).ok_or_else(|| {
            CosError::UnknownDeploymentType {
                requested: deployment_type.to_string(),
                valid: join_keys(&self.service_endpoints),
            }
        })?;
        if !regions.contains_key(region) {
            return Err(CosError::UnknownRegion {
                requested: region.to_string(),
                valid: join_keys(regions),
            });
        }
        self.public_host(deployment_type, region)
            .map(|host| format!("https://{host}"))
            .ok_or_else(|| CosError::EndpointNotFound {
                deployment_type: deployment_type.to_string(),
                region: region.to_string(),
            })
    }
}

fn join_keys<V>(map: &BTreeMap<String, V>) -> String {
    map.keys().map(String::as_str).collect::<Vec<_>>().join(",")
}

/// Shareable cache of the endpoint topology.
///
/// Fetched on first use and kept until [`invalidate`](Self::invalidate) is
/// called. Wrap it in an `Arc` and hand it to several clients to share one
/// discovery fetch between them.
#[derive(Debug)]
pub struct TopologyCache {
    discovery_url: String,
    topology: RwLock<Option<Arc<EndpointTopology>>>,
}

impl TopologyCache {
    pub fn new(discovery_url: &str) -> Self {
        Self {
            discovery_url: discovery_url.to_string(),
            topology: RwLock::new(None),
        }
    }

    pub fn discovery_url(&self) -> &str {
        &self.discovery_url
    }

    pub fn cached(&self) -> Option<Arc<EndpointTopology>> {
        self.topology
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Seed the cache with a topology obtained elsewhere.
    pub fn set(&self, topology: EndpointTopology) {
        *self.topology.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(topology));
    }

    pub fn invalidate(&self) {
        debug!(discovery_url = %self.discovery_url, "endpoint topology cache invalidated.");
        *self.topology.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// The cached topology, fetching it first if the cache is empty.
    ///
    /// The discovery call is unauthenticated.
    pub async fn get_or_fetch(&self, http: &dyn HttpClient) -> Result<Arc<EndpointTopology>> {
        if let Some(topology) = self.cached() {
            return Ok(topology);
        }

        info!(discovery_url = %self.discovery_url, "fetching COS endpoint topology.");

        let request =
            HttpRequest::new(Method::GET, &self.discovery_url).header("Accept", "application/json");
        let response = http
            .execute(request)
            .await
            .map_err(|e| CosError::TopologyFetchFailed(format!("{e:#}")))?;
        if !response.is_success() {
            return Err(CosError::TopologyFetchFailed(format!(
                "{} {}: {}",
                response.status,
                response.reason,
                response.body_text()
            ))
            .into());
        }

        let topology = Arc::new(EndpointTopology::from_json(&response.body)?);
        debug!(
            deployment_types = ?topology.service_endpoints.keys().collect::<Vec<_>>(),
            "endpoint topology fetched."
        );

        *self.topology.write().unwrap_or_else(|e| e.into_inner()) = Some(topology.clone());
        Ok(topology)
    }
}

/// Source of the account's bucket listing, consulted on a cache miss.
#[async_trait]
pub trait BucketLister: Send + Sync {
    async fn list_buckets(&self) -> Result<BucketList>;
}

/// Maps bucket names to their regional base URL.
pub struct EndpointResolver {
    topology: Arc<TopologyCache>,
    http: Arc<dyn HttpClient>,
    buckets: RwLock<HashMap<String, String>>,
}

impl EndpointResolver {
    pub fn new(topology: Arc<TopologyCache>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            topology,
            http,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    pub fn topology_cache(&self) -> &Arc<TopologyCache> {
        &self.topology
    }

    pub fn cached(&self, bucket: &str) -> Option<String> {
        self.buckets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(bucket)
            .cloned()
    }

    /// Base URL (`https://<host>`) serving `bucket`.
    ///
    /// A cache hit makes no network call. A miss fetches the topology if
    /// needed, lists the account's buckets through `lister`, and caches the
    /// result under the bucket name.
    pub async fn resolve(&self, bucket: &str, lister: &dyn BucketLister) -> Result<String> {
        if let Some(url) = self.cached(bucket) {
            debug!(bucket = bucket, url = %url, "bucket endpoint cache hit.");
            return Ok(url);
        }

        let topology = self.topology.get_or_fetch(self.http.as_ref()).await?;
        let listing = lister
            .list_buckets()
            .await
            .context("list_buckets() failed while resolving the bucket endpoint.")?;

        let entry = listing
            .find(bucket)
            .ok_or_else(|| CosError::BucketNotFound(bucket.to_string()))?;
        let location = topology.parse_location_constraint(&entry.location_constraint)?;
        let url = topology.endpoint_for(&location)?;

        debug!(
            bucket = bucket,
            location_constraint = %entry.location_constraint,
            deployment_type = %location.deployment_type,
            region = %location.region,
            url = %url,
            "bucket endpoint resolved."
        );

        self.buckets
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(bucket.to_string(), url.clone());
        Ok(url)
    }

    pub fn invalidate(&self, bucket: &str) {
        self.buckets
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(bucket);
    }

    pub fn clear(&self) {
        self.buckets
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl fmt::Debug for EndpointResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointResolver")
            .field("topology", &self.topology)
            .field(
                "buckets",
                &*self.buckets.read().unwrap_or_else(|e| e.into_inner()),
            )
            .finish()
    }
}

mod endpoint_properties;
