// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Mutex;
use serde_json::json;

use crate::checksum::ManifestSource;
use crate::config::ImageSpec;
use crate::glance::{ImageService, ImageStatus, NewImage, RemoteImage, Visibility, PROVENANCE_CHECKSUM_KEY};
use crate::sync::CancelFlag;

/// A request received by [`MockImageService`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List { name: String, visibility: Option<Visibility> },
    Get(String),
    Create(NewImage),
    Import { id: String, url: String },
    SetVisibility { id: String, visibility: Visibility },
    Delete(String),
}

#[derive(Default)]
struct MockState {
    images: Vec<RemoteImage>,
    calls: Vec<Call>,
    created: usize,
    statuses: VecDeque<Result<ImageStatus, String>>,
    gets: usize,
    cancel_on_get: Option<(usize, CancelFlag)>,
    fail_list: bool,
    fail_create: bool,
    fail_import: bool,
    fail_update: HashSet<String>,
    fail_delete: HashSet<String>,
}

/// In-memory image service recording every call
///
/// Created images get IDs `img-1`, `img-2`, ... Status checks replay the
/// scripted statuses in order and then keep returning the last one; with no
/// script every image is immediately active.
#[derive(Default)]
pub struct MockImageService {
    state: Mutex<MockState>,
}

impl MockImageService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service whose listing returns `images`
    pub fn with_images(images: Vec<RemoteImage>) -> Self {
        let service = Self::new();
        service.state.lock().unwrap().images = images;
        service
    }

    pub fn script_statuses(&self, statuses: Vec<Result<ImageStatus, String>>) {
        self.state.lock().unwrap().statuses = statuses.into();
    }

    /// Trip `flag` while answering the `nth` status check
    pub fn cancel_on_get(&self, nth: usize, flag: CancelFlag) {
        self.state.lock().unwrap().cancel_on_get = Some((nth, flag));
    }

    pub fn fail_list(&self) {
        self.state.lock().unwrap().fail_list = true;
    }

    pub fn fail_create(&self) {
        self.state.lock().unwrap().fail_create = true;
    }

    pub fn fail_import(&self) {
        self.state.lock().unwrap().fail_import = true;
    }

    pub fn fail_update(&self, id: &str) {
        self.state.lock().unwrap().fail_update.insert(id.to_string());
    }

    pub fn fail_delete(&self, id: &str) {
        self.state.lock().unwrap().fail_delete.insert(id.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Create, import, update and delete calls, in order
    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, Call::List { .. } | Call::Get(_)))
            .collect()
    }

    pub fn created(&self) -> Vec<NewImage> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Create(image) => Some(image),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Delete(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn visibility_updates(&self) -> Vec<(String, Visibility)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::SetVisibility { id, visibility } => Some((id, visibility)),
                _ => None,
            })
            .collect()
    }

    pub fn get_count(&self) -> usize {
        self.state.lock().unwrap().gets
    }
}

#[async_trait]
impl ImageService for MockImageService {
    async fn list_images(
        &self,
        name: &str,
        visibility: Option<Visibility>,
    ) -> anyhow::Result<Vec<RemoteImage>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::List {
            name: name.to_string(),
            visibility,
        });
        if state.fail_list {
            return Err(anyhow::anyhow!("Failed to list images: 500 Internal Server Error"));
        }
        Ok(state.images.clone())
    }

    async fn get_image(&self, id: &str) -> anyhow::Result<RemoteImage> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Get(id.to_string()));
        state.gets += 1;

        if let Some((nth, flag)) = &state.cancel_on_get {
            if *nth == state.gets {
                flag.cancel();
            }
        }

        let status = if state.statuses.len() > 1 {
            state.statuses.pop_front()
        } else {
            state.statuses.front().cloned()
        };

        match status.unwrap_or(Ok(ImageStatus::Active)) {
            Ok(status) => Ok(RemoteImage {
                status,
                ..remote_image(id, None, None)
            }),
            Err(message) => Err(anyhow::anyhow!(message)),
        }
    }

    async fn create_image(&self, image: &NewImage) -> anyhow::Result<RemoteImage> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Create(image.clone()));
        if state.fail_create {
            return Err(anyhow::anyhow!("Failed to create image: 413 Request Entity Too Large"));
        }

        state.created += 1;
        Ok(RemoteImage {
            status: ImageStatus::Queued,
            visibility: image.visibility,
            ..remote_image(&format!("img-{}", state.created), None, None)
        })
    }

    async fn import_from_url(&self, id: &str, url: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Import {
            id: id.to_string(),
            url: url.to_string(),
        });
        if state.fail_import {
            return Err(anyhow::anyhow!("Failed to import image: 409 Conflict"));
        }
        Ok(())
    }

    async fn set_visibility(&self, id: &str, visibility: Visibility) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::SetVisibility {
            id: id.to_string(),
            visibility,
        });
        if state.fail_update.contains(id) {
            return Err(anyhow::anyhow!("Failed to update image visibility: 403 Forbidden"));
        }
        Ok(())
    }

    async fn delete_image(&self, id: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete(id.to_string()));
        if state.fail_delete.contains(id) {
            return Err(anyhow::anyhow!("Failed to delete image: 404 Not Found"));
        }
        Ok(())
    }
}

/// Manifest source serving a fixed body, or a fixed error
pub struct StaticManifest {
    body: Result<String, String>,
}

impl StaticManifest {
    pub fn new(body: &str) -> Self {
        Self { body: Ok(body.to_string()) }
    }

    pub fn failing(message: &str) -> Self {
        Self { body: Err(message.to_string()) }
    }
}

#[async_trait]
impl ManifestSource for StaticManifest {
    async fn fetch(&self, _url: &str) -> anyhow::Result<String> {
        self.body.clone().map_err(|message| anyhow::anyhow!(message))
    }
}

/// Public active catalog image with optional native and provenance checksums
pub fn remote_image(id: &str, native: Option<&str>, provenance: Option<&str>) -> RemoteImage {
    let mut properties = BTreeMap::new();
    if let Some(value) = provenance {
        properties.insert(PROVENANCE_CHECKSUM_KEY.to_string(), json!(value));
    }

    RemoteImage {
        id: id.to_string(),
        name: Some("Ubuntu".to_string()),
        status: ImageStatus::Active,
        visibility: Visibility::Public,
        checksum: native.map(str::to_string),
        properties,
    }
}

/// Ubuntu jammy image definition as it would come from the configuration file
pub fn image_spec() -> ImageSpec {
    let mut properties = BTreeMap::new();
    properties.insert("os_distro".to_string(), "ubuntu".to_string());

    ImageSpec {
        image_url: "https://cloud-images.ubuntu.com/jammy/current/jammy.img".to_string(),
        checksums_url: "https://cloud-images.ubuntu.com/jammy/current/SHA256SUMS".to_string(),
        checksum_algorithm: "sha256".to_string(),
        properties,
        disk_format: "qcow2".to_string(),
        container_format: "bare".to_string(),
        visibility: Visibility::Public,
        min_disk: 0,
        min_ram: 0,
    }
}
