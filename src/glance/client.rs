// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error};
use crate::glance::auth::Credentials;
use crate::glance::models::{NewImage, RemoteImage, Visibility};
use crate::glance::traits::ImageService;

const JSON_PATCH: &str = "application/openstack-images-v2.1-json-patch";

/// Glance v2 REST client
#[derive(Debug, Clone)]
pub struct GlanceClient {
    client: Client,
    endpoint: String,
    token: String,
}

#[derive(Deserialize)]
struct ImagesPage {
    images: Vec<RemoteImage>,
    #[serde(default)]
    next: Option<String>,
}

impl GlanceClient {
    /// Authenticate and build a client for the resolved image endpoint
    pub async fn connect(credentials: &Credentials) -> anyhow::Result<Self> {
        let client = Self::http_client()?;
        let session = credentials.authenticate(&client).await?;

        Ok(Self {
            client,
            endpoint: normalize_endpoint(&session.endpoint),
            token: session.token,
        })
    }

    fn http_client() -> anyhow::Result<Client> {
        Ok(Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("glance-image-sync/", env!("CARGO_PKG_VERSION")))
            .build()?)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.endpoint, path);
        self.client
            .request(method, &url)
            .header("X-Auth-Token", &self.token)
    }

    /// Turn non-success responses into errors carrying status and body
    async fn check(response: Response, action: &str) -> anyhow::Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        error!(status = %status, body = %text, action, "Image service request failed");
        Err(anyhow::anyhow!("Failed to {}: {} - {}", action, status, text))
    }
}

/// Strip trailing slashes and a version suffix so paths can be appended as `/v2/...`
fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim_end_matches('/');
    trimmed
        .strip_suffix("/v2")
        .unwrap_or(trimmed)
        .to_string()
}

#[async_trait]
impl ImageService for GlanceClient {
    async fn list_images(
        &self,
        name: &str,
        visibility: Option<Visibility>,
    ) -> anyhow::Result<Vec<RemoteImage>> {
        let mut query = vec![("name", name.to_string())];
        if let Some(visibility) = visibility {
            query.push(("visibility", visibility.to_string()));
        }

        let response = self
            .request(Method::GET, "/v2/images")
            .query(&query)
            .send()
            .await?;
        let mut page: ImagesPage = Self::check(response, "list images").await?.json().await?;
        let mut images = std::mem::take(&mut page.images);

        while let Some(next) = page.next.take() {
            debug!(next = %next, "Fetching next image page");
            let response = self.request(Method::GET, &next).send().await?;
            page = Self::check(response, "list images").await?.json().await?;
            images.append(&mut page.images);
        }

        Ok(images)
    }

    async fn get_image(&self, id: &str) -> anyhow::Result<RemoteImage> {
        let response = self
            .request(Method::GET, &format!("/v2/images/{}", id))
            .send()
            .await?;

        Ok(Self::check(response, "get image").await?.json().await?)
    }

    async fn create_image(&self, image: &NewImage) -> anyhow::Result<RemoteImage> {
        let response = self
            .request(Method::POST, "/v2/images")
            .json(image)
            .send()
            .await?;

        Ok(Self::check(response, "create image").await?.json().await?)
    }

    async fn import_from_url(&self, id: &str, url: &str) -> anyhow::Result<()> {
        let body = json!({
            "method": {
                "name": "web-download",
                "uri": url,
            }
        });

        let response = self
            .request(Method::POST, &format!("/v2/images/{}/import", id))
            .json(&body)
            .send()
            .await?;

        Self::check(response, "import image").await?;
        Ok(())
    }

    async fn set_visibility(&self, id: &str, visibility: Visibility) -> anyhow::Result<()> {
        let patch = json!([{
            "op": "replace",
            "path": "/visibility",
            "value": visibility,
        }]);

        let response = self
            .request(Method::PATCH, &format!("/v2/images/{}", id))
            .header(reqwest::header::CONTENT_TYPE, JSON_PATCH)
            .body(serde_json::to_vec(&patch)?)
            .send()
            .await?;

        Self::check(response, "update image visibility").await?;
        Ok(())
    }

    async fn delete_image(&self, id: &str) -> anyhow::Result<()> {
        let response = self
            .request(Method::DELETE, &format!("/v2/images/{}", id))
            .send()
            .await?;

        Self::check(response, "delete image").await?;
        Ok(())
    }
}
