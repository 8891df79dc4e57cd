//! Kubernetes REST client for workflow-run resources.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use runsweep_core::WorkflowRun;

use crate::error::ClientError;
use crate::selector::LabelSelector;
use crate::store::RunStore;

/// Service account directory mounted into every pod.
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Page size for list requests.
const LIST_PAGE_LIMIT: u32 = 500;

/// API group, version and plural name of the managed resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePath {
    pub group: String,
    pub version: String,
    pub plural: String,
}

impl Default for ResourcePath {
    fn default() -> Self {
        Self {
            group: "tekton.dev".to_string(),
            version: "v1beta1".to_string(),
            plural: "pipelineruns".to_string(),
        }
    }
}

/// Connection settings for the API server.
#[derive(Debug, Clone, Default)]
pub struct KubeConfig {
    /// Base URL, e.g. `https://10.96.0.1:443`.
    pub server: String,

    /// Bearer token.
    pub token: Option<String>,

    /// PEM bundle trusted for the server certificate.
    pub ca_pem: Option<Vec<u8>>,

    /// Accept any server certificate.
    pub insecure_skip_tls_verify: bool,

    pub resource: ResourcePath,
}

impl KubeConfig {
    /// Build the configuration a pod gets from its service account.
    pub fn in_cluster() -> Result<Self, ClientError> {
        let host = env::var("KUBERNETES_SERVICE_HOST").map_err(|_| {
            ClientError::Config(
                "KUBERNETES_SERVICE_HOST is not set; not running in a cluster".to_string(),
            )
        })?;
        let port = env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());

        let dir = Path::new(SERVICE_ACCOUNT_DIR);
        Ok(Self {
            server: server_url(&host, &port),
            token: Some(read_token(&dir.join("token"))?),
            ca_pem: Some(read_file(&dir.join("ca.crt"))?),
            insecure_skip_tls_verify: false,
            resource: ResourcePath::default(),
        })
    }

    /// Builder method to set the API server URL.
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    /// Builder method to read the bearer token from a file.
    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Result<Self, ClientError> {
        self.token = Some(read_token(&path.into())?);
        Ok(self)
    }

    /// Builder method to read the trusted CA bundle from a file.
    pub fn with_ca_file(mut self, path: impl Into<PathBuf>) -> Result<Self, ClientError> {
        self.ca_pem = Some(read_file(&path.into())?);
        Ok(self)
    }

}

fn server_url(host: &str, port: &str) -> String {
    // IPv6 service hosts need brackets.
    if host.contains(':') {
        format!("https://[{host}]:{port}")
    } else {
        format!("https://{host}:{port}")
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, ClientError> {
    fs::read(path).map_err(|e| {
        ClientError::Config(format!("failed to read '{}': {}", path.display(), e))
    })
}

fn read_token(path: &Path) -> Result<String, ClientError> {
    let raw = read_file(path)?;
    let token = String::from_utf8(raw)
        .map_err(|_| ClientError::Config(format!("token in '{}' is not UTF-8", path.display())))?;
    Ok(token.trim().to_string())
}

#[derive(Debug, Deserialize)]
struct RunList {
    // Decoded one by one so a single malformed object cannot sink the page.
    #[serde(default)]
    items: Vec<Value>,

    #[serde(default)]
    metadata: ListMeta,
}

#[derive(Debug, Default, Deserialize)]
struct ListMeta {
    #[serde(rename = "continue", default)]
    continue_token: Option<String>,
}

/// Decode the items of a list page, skipping objects that do not fit the model.
fn decode_items(items: Vec<Value>) -> Vec<WorkflowRun> {
    items
        .into_iter()
        .filter_map(|item| {
            let namespace = item
                .pointer("/metadata/namespace")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let name = item
                .pointer("/metadata/name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            match serde_json::from_value::<WorkflowRun>(item) {
                Ok(run) => Some(run),
                Err(e) => {
                    warn!(
                        namespace = %namespace,
                        run = %name,
                        error = %e,
                        "Skipping undecodable run"
                    );
                    None
                }
            }
        })
        .collect()
}

/// Body of a non-success API response.
#[derive(Debug, Deserialize)]
struct ApiStatus {
    message: Option<String>,
}

/// Client for the API server's workflow-run endpoints.
pub struct KubeClient {
    inner: reqwest::Client,
    base_url: String,
    token: Option<String>,
    resource: ResourcePath,
}

impl KubeClient {
    /// Create a new client.
    pub fn new(config: KubeConfig) -> Result<Self, ClientError> {
        if config.server.is_empty() {
            return Err(ClientError::Config("API server URL is empty".to_string()));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(pem) = &config.ca_pem {
            let certs = reqwest::Certificate::from_pem_bundle(pem)
                .map_err(|e| ClientError::Config(format!("invalid CA bundle: {e}")))?;
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }
        if config.insecure_skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let inner = builder
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner,
            base_url: config.server.trim_end_matches('/').to_string(),
            token: config.token,
            resource: config.resource,
        })
    }

    /// URL of the resource collection, cluster-wide when `namespace` is empty.
    fn collection_url(&self, namespace: &str) -> String {
        let ResourcePath {
            group,
            version,
            plural,
        } = &self.resource;
        if namespace.is_empty() {
            format!("{}/apis/{group}/{version}/{plural}", self.base_url)
        } else {
            format!(
                "{}/apis/{group}/{version}/namespaces/{namespace}/{plural}",
                self.base_url
            )
        }
    }

    fn item_url(&self, namespace: &str, name: &str) -> String {
        format!("{}/{}", self.collection_url(namespace), name)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self.inner.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

/// Map a non-success response onto the error taxonomy.
async fn check(response: Response, resource: &str) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiStatus>(&body)
        .ok()
        .and_then(|s| s.message)
        .unwrap_or(body);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Auth(message),
        StatusCode::NOT_FOUND => ClientError::NotFound(resource.to_string()),
        _ => ClientError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

fn require_namespace(namespace: &str) -> Result<(), ClientError> {
    if namespace.is_empty() {
        return Err(ClientError::Config(
            "a namespace is required to address a single run".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl RunStore for KubeClient {
    async fn list(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<WorkflowRun>, ClientError> {
        let url = self.collection_url(namespace);
        let mut runs = Vec::new();
        let mut continue_token: Option<String> = None;

        loop {
            let mut query = vec![("limit", LIST_PAGE_LIMIT.to_string())];
            if !selector.is_empty() {
                query.push(("labelSelector", selector.to_string()));
            }
            if let Some(token) = &continue_token {
                query.push(("continue", token.clone()));
            }

            debug!(url = %url, selector = %selector, "LIST request");
            let response = self
                .request(reqwest::Method::GET, &url)
                .query(&query)
                .send()
                .await?;
            let page: RunList = check(response, &url).await?.json().await?;
            runs.extend(decode_items(page.items));

            match page.metadata.continue_token {
                Some(token) if !token.is_empty() => continue_token = Some(token),
                _ => break,
            }
        }

        Ok(runs)
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<WorkflowRun, ClientError> {
        require_namespace(namespace)?;
        let url = self.item_url(namespace, name);
        debug!(url = %url, "GET request");

        let response = self.request(reqwest::Method::GET, &url).send().await?;
        let run = check(response, &format!("{namespace}/{name}"))
            .await?
            .json()
            .await?;
        Ok(run)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        require_namespace(namespace)?;
        let url = self.item_url(namespace, name);
        debug!(url = %url, "DELETE request");

        let response = self
            .request(reqwest::Method::DELETE, &url)
            .json(&json!({ "propagationPolicy": "Background" }))
            .send()
            .await?;
        check(response, &format!("{namespace}/{name}")).await?;
        Ok(())
    }
}
