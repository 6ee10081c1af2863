//! Remote extension store seam and its HTTP implementation.

use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::ExtensionName,
    protocol::{ExtensionItem, ExtensionListResponse, RawExtensionItem},
};
use tracing::{error, info};
use url::Url;

use crate::error::StoreError;

/// The three verbs the controller needs from the authoritative store.
#[async_trait]
pub trait ExtensionStore: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<RawExtensionItem>, StoreError>;
    async fn add(&self, item: &ExtensionItem) -> Result<(), StoreError>;
    /// Removes whichever entry carries `name`, regardless of its type.
    async fn remove(&self, name: &ExtensionName) -> Result<(), StoreError>;
}

pub struct HttpExtensionStore {
    http: Client,
    base_url: Url,
}

impl HttpExtensionStore {
    /// `base_url` is the full collection url, e.g.
    /// `http://localhost:8080/api/fix/extensions`.
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url).map_err(|err| StoreError::InvalidUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl {
                url: base_url.to_string(),
                reason: "url cannot carry path segments".to_string(),
            });
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn item_url(&self, name: &ExtensionName) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base urls are rejected in the constructor
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(name.as_str());
        }
        url
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(StoreError::Status { status })
    }
}

#[async_trait]
impl ExtensionStore for HttpExtensionStore {
    async fn fetch_all(&self) -> Result<Vec<RawExtensionItem>, StoreError> {
        let response = self.http.get(self.base_url.clone()).send().await?;
        let response = check_status(response)?;
        let bytes = response.bytes().await?;
        let body: ExtensionListResponse = serde_json::from_slice(&bytes)
            .map_err(|err| StoreError::Decode(err.to_string()))?;
        info!(items = body.items.len(), "extension store: snapshot fetched");
        Ok(body.items)
    }

    async fn add(&self, item: &ExtensionItem) -> Result<(), StoreError> {
        let response = self
            .http
            .post(self.base_url.clone())
            .json(item)
            .send()
            .await?;
        check_status(response).map_err(|err| {
            error!(extension = %item.ext_name, ext_type = %item.ext_type, %err, "extension store: add rejected");
            err
        })?;
        Ok(())
    }

    async fn remove(&self, name: &ExtensionName) -> Result<(), StoreError> {
        let response = self.http.delete(self.item_url(name)).send().await?;
        check_status(response).map_err(|err| {
            error!(extension = %name, %err, "extension store: delete rejected");
            err
        })?;
        Ok(())
    }
}
