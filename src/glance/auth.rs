// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Context;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Search path for `clouds.yaml` after `OS_CLIENT_CONFIG_FILE`
const CLOUDS_FILE: &str = "clouds.yaml";
const USER_CLOUDS_DIR: &str = ".config/openstack";
const SYSTEM_CLOUDS_FILE: &str = "/etc/openstack/clouds.yaml";

/// How to reach and authenticate against the image service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Pre-issued token and explicit image endpoint (`OS_TOKEN` + `OS_IMAGE_URL`)
    Token { token: String, endpoint: String },

    /// Keystone v3 authentication, the image endpoint comes from the service catalog
    Keystone(KeystoneAuth),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeystoneAuth {
    pub auth_url: String,
    pub method: AuthMethod,
    pub region_name: Option<String>,
    pub interface: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// User password scoped to a project
    Password {
        username: String,
        password: String,
        project_name: String,
        user_domain_name: String,
        project_domain_name: String,
    },

    /// Application credential, already bound to its project
    ApplicationCredential { id: String, secret: String },
}

/// Authenticated token plus the image endpoint it is valid for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub endpoint: String,
}

#[derive(Debug, Default, Deserialize)]
struct CloudsFile {
    #[serde(default)]
    clouds: BTreeMap<String, CloudEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct CloudEntry {
    #[serde(default)]
    auth_type: Option<String>,
    #[serde(default)]
    auth: CloudAuth,
    #[serde(default)]
    region_name: Option<String>,
    #[serde(default)]
    interface: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CloudAuth {
    auth_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    project_name: Option<String>,
    user_domain_name: Option<String>,
    project_domain_name: Option<String>,
    domain_name: Option<String>,
    application_credential_id: Option<String>,
    application_credential_secret: Option<String>,
}

fn missing(key: &str) -> anyhow::Error {
    anyhow::anyhow!("Missing environment variable {}", key)
}

impl Credentials {
    /// Read `OS_*` variables from the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Resolve credentials in order: token, `OS_CLOUD` entry, `OS_*` variables
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let (Some(token), Some(endpoint)) = (lookup("OS_TOKEN"), lookup("OS_IMAGE_URL")) {
            return Ok(Credentials::Token { token, endpoint });
        }

        if let Some(cloud) = lookup("OS_CLOUD") {
            let path = clouds_file(&lookup)?;
            debug!(path = %path.display(), cloud = %cloud, "Reading cloud configuration");
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            return Self::from_clouds_yaml(&contents, &cloud, &lookup)
                .with_context(|| format!("Invalid cloud '{}' in {}", cloud, path.display()));
        }

        let require = |key: &str| lookup(key).ok_or_else(|| missing(key));

        let application_credential = lookup("OS_AUTH_TYPE").as_deref()
            == Some("v3applicationcredential")
            || lookup("OS_APPLICATION_CREDENTIAL_ID").is_some();

        let method = if application_credential {
            AuthMethod::ApplicationCredential {
                id: require("OS_APPLICATION_CREDENTIAL_ID")?,
                secret: require("OS_APPLICATION_CREDENTIAL_SECRET")?,
            }
        } else {
            AuthMethod::Password {
                username: require("OS_USERNAME")?,
                password: require("OS_PASSWORD")?,
                project_name: require("OS_PROJECT_NAME")?,
                user_domain_name: lookup("OS_USER_DOMAIN_NAME").unwrap_or_else(|| "Default".to_string()),
                project_domain_name: lookup("OS_PROJECT_DOMAIN_NAME").unwrap_or_else(|| "Default".to_string()),
            }
        };

        Ok(Credentials::Keystone(KeystoneAuth {
            auth_url: require("OS_AUTH_URL")?,
            method,
            region_name: lookup("OS_REGION_NAME"),
            interface: lookup("OS_INTERFACE").unwrap_or_else(|| "public".to_string()),
        }))
    }

    /// Credentials of `cloud` from a `clouds.yaml` document
    ///
    /// `OS_PASSWORD` fills in a password the file leaves out, and `OS_REGION_NAME`
    /// a missing region.
    fn from_clouds_yaml<F>(contents: &str, cloud: &str, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: CloudsFile = serde_yaml::from_str(contents)?;
        let entry = file
            .clouds
            .get(cloud)
            .ok_or_else(|| anyhow::anyhow!("Cloud '{}' not found", cloud))?;
        let auth = &entry.auth;

        let require = |value: &Option<String>, key: &str| {
            value
                .clone()
                .ok_or_else(|| anyhow::anyhow!("Missing auth.{}", key))
        };

        let application_credential = match entry.auth_type.as_deref() {
            Some("v3applicationcredential") => true,
            Some("password") | Some("v3password") => false,
            Some(other) => return Err(anyhow::anyhow!("Unsupported auth_type {}", other)),
            None => auth.application_credential_id.is_some(),
        };

        let method = if application_credential {
            AuthMethod::ApplicationCredential {
                id: require(&auth.application_credential_id, "application_credential_id")?,
                secret: require(&auth.application_credential_secret, "application_credential_secret")?,
            }
        } else {
            let domain = auth.domain_name.clone().unwrap_or_else(|| "Default".to_string());
            AuthMethod::Password {
                username: require(&auth.username, "username")?,
                password: auth
                    .password
                    .clone()
                    .or_else(|| lookup("OS_PASSWORD"))
                    .ok_or_else(|| anyhow::anyhow!("Missing auth.password"))?,
                project_name: require(&auth.project_name, "project_name")?,
                user_domain_name: auth.user_domain_name.clone().unwrap_or_else(|| domain.clone()),
                project_domain_name: auth.project_domain_name.clone().unwrap_or(domain),
            }
        };

        Ok(Credentials::Keystone(KeystoneAuth {
            auth_url: require(&auth.auth_url, "auth_url")?,
            method,
            region_name: entry.region_name.clone().or_else(|| lookup("OS_REGION_NAME")),
            interface: entry.interface.clone().unwrap_or_else(|| "public".to_string()),
        }))
    }

    /// Turn the credentials into a usable session
    pub async fn authenticate(&self, client: &Client) -> anyhow::Result<Session> {
        match self {
            Credentials::Token { token, endpoint } => Ok(Session {
                token: token.clone(),
                endpoint: endpoint.clone(),
            }),
            Credentials::Keystone(auth) => auth.authenticate(client).await,
        }
    }
}

/// First existing `clouds.yaml`: `OS_CLIENT_CONFIG_FILE`, working directory, user, system
fn clouds_file<F>(lookup: &F) -> anyhow::Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(explicit) = lookup("OS_CLIENT_CONFIG_FILE") {
        return Ok(PathBuf::from(explicit));
    }

    let mut candidates = vec![PathBuf::from(CLOUDS_FILE)];
    if let Some(home) = lookup("HOME") {
        candidates.push(Path::new(&home).join(USER_CLOUDS_DIR).join(CLOUDS_FILE));
    }
    candidates.push(PathBuf::from(SYSTEM_CLOUDS_FILE));

    candidates
        .into_iter()
        .find(|path| path.is_file())
        .ok_or_else(|| anyhow::anyhow!("OS_CLOUD is set but no clouds.yaml was found"))
}

#[derive(Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Deserialize)]
struct TokenBody {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Deserialize)]
struct CatalogEndpoint {
    interface: String,
    #[serde(default)]
    region_id: Option<String>,
    #[serde(default)]
    region: Option<String>,
    url: String,
}

impl AuthMethod {
    fn name(&self) -> &'static str {
        match self {
            AuthMethod::Password { .. } => "password",
            AuthMethod::ApplicationCredential { .. } => "application_credential",
        }
    }

    fn request_body(&self) -> serde_json::Value {
        match self {
            AuthMethod::Password {
                username,
                password,
                project_name,
                user_domain_name,
                project_domain_name,
            } => json!({
                "auth": {
                    "identity": {
                        "methods": ["password"],
                        "password": {
                            "user": {
                                "name": username,
                                "domain": { "name": user_domain_name },
                                "password": password,
                            }
                        }
                    },
                    "scope": {
                        "project": {
                            "name": project_name,
                            "domain": { "name": project_domain_name },
                        }
                    }
                }
            }),
            AuthMethod::ApplicationCredential { id, secret } => json!({
                "auth": {
                    "identity": {
                        "methods": ["application_credential"],
                        "application_credential": {
                            "id": id,
                            "secret": secret,
                        }
                    }
                }
            }),
        }
    }
}

impl KeystoneAuth {
    fn tokens_url(&self) -> String {
        let base = self.auth_url.trim_end_matches('/');
        if base.ends_with("/v3") {
            format!("{}/auth/tokens", base)
        } else {
            format!("{}/v3/auth/tokens", base)
        }
    }

    async fn authenticate(&self, client: &Client) -> anyhow::Result<Session> {
        let url = self.tokens_url();
        info!(url = %url, method = self.method.name(), "Authenticating with Keystone");

        let response = client
            .post(&url)
            .json(&self.method.request_body())
            .send()
            .await
            .with_context(|| format!("Failed to reach Keystone at {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Keystone authentication failed: {} - {}", status, text));
        }

        let token = response
            .headers()
            .get("X-Subject-Token")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Keystone response carries no X-Subject-Token header"))?;

        let body: TokenResponse = response.json().await.context("Invalid Keystone token response")?;
        let endpoint = self.image_endpoint(&body.token.catalog)?;

        debug!(endpoint = %endpoint, "Resolved image service endpoint");
        Ok(Session { token, endpoint })
    }

    fn image_endpoint(&self, catalog: &[CatalogEntry]) -> anyhow::Result<String> {
        catalog
            .iter()
            .filter(|entry| entry.service_type == "image")
            .flat_map(|entry| entry.endpoints.iter())
            .filter(|ep| ep.interface == self.interface)
            .find(|ep| match &self.region_name {
                Some(region) => {
                    ep.region_id.as_deref() == Some(region.as_str())
                        || ep.region.as_deref() == Some(region.as_str())
                }
                None => true,
            })
            .map(|ep| ep.url.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No {} image endpoint in service catalog{}",
                    self.interface,
                    self.region_name
                        .as_deref()
                        .map(|r| format!(" for region {}", r))
                        .unwrap_or_default()
                )
            })
    }
}
