// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use crate::glance::models::{NewImage, RemoteImage, Visibility};

#[async_trait]
pub trait ImageService: Send + Sync {
    /// List every image with the given name, optionally restricted to one visibility
    async fn list_images(
        &self,
        name: &str,
        visibility: Option<Visibility>,
    ) -> anyhow::Result<Vec<RemoteImage>>;
    
    /// Fetch a single image by ID
    async fn get_image(&self, id: &str) -> anyhow::Result<RemoteImage>;
    
    /// Create an image record without data
    async fn create_image(&self, image: &NewImage) -> anyhow::Result<RemoteImage>;
    
    /// Ask the service to download the image data from `url` in the background
    async fn import_from_url(&self, id: &str, url: &str) -> anyhow::Result<()>;
    
    /// Change the visibility of an image
    async fn set_visibility(&self, id: &str, visibility: Visibility) -> anyhow::Result<()>;
    
    /// Delete an image
    async fn delete_image(&self, id: &str) -> anyhow::Result<()>;
}
