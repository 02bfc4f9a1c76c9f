//! HTTP inventory backend.
//!
//! Talks to a block-storage inventory API over JSON/HTTP: paginated
//! volume and snapshot listings plus the two mutation calls the
//! reconciler needs. The bearer token is passed in by the caller and
//! is never logged.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use vsk_inventory::{InventoryClient, InventoryError};
use vsk_schemas::{map_volumes_by_id, Snapshot, SnapshotIndex, Volume, VolumeMap};

/// Description stamped on every snapshot this service creates, so
/// operators can tell managed snapshots from manual ones.
pub const SNAPSHOT_DESCRIPTION: &str = "Created by vsk";

/// Page size requested from the listing endpoints.
const PAGE_SIZE: u32 = 1000;

/// Per-request timeout; listing calls on large fleets stay well under this.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Inventory client backed by the HTTP API.
#[derive(Debug, Clone)]
pub struct HttpInventoryClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpInventoryClient {
    /// Build a client for the API at `base_url`. A trailing slash on the
    /// base URL is tolerated. `bearer_token` is attached to every request
    /// when present.
    pub fn new(
        base_url: impl Into<String>,
        bearer_token: Option<String>,
    ) -> Result<Self, InventoryError> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(InventoryError::Config(
                "inventory base url must not be empty".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| {
                InventoryError::Config(format!("failed to build http client: {err}"))
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        page_token: Option<&str>,
    ) -> Result<T, InventoryError> {
        let mut request = self
            .http
            .get(self.endpoint(path))
            .query(&[("max_results", PAGE_SIZE.to_string())]);
        if let Some(token) = page_token {
            request = request.query(&[("page_token", token)]);
        }
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|err| InventoryError::Transport(err.to_string()))?;
        decode_json(response).await
    }

    async fn send_mutation(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<(), InventoryError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|err| InventoryError::Transport(err.to_string()))?;
        expect_success(response).await
    }
}

#[async_trait]
impl InventoryClient for HttpInventoryClient {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn get_volumes(&self) -> Result<VolumeMap, InventoryError> {
        let mut volumes = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page: VolumesPage = self
                .get_page("/v1/volumes", page_token.as_deref())
                .await?;
            volumes.extend(page.volumes);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(map_volumes_by_id(volumes))
    }

    async fn get_snapshots(&self) -> Result<SnapshotIndex, InventoryError> {
        let mut snapshots = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page: SnapshotsPage = self
                .get_page("/v1/snapshots", page_token.as_deref())
                .await?;
            snapshots.extend(page.snapshots);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(SnapshotIndex::from_snapshots(snapshots))
    }

    async fn create_snapshot(&self, volume: &Volume) -> Result<(), InventoryError> {
        let url = self.endpoint(&format!("/v1/volumes/{}/snapshots", volume.id));
        let request = self.http.post(url).json(&CreateSnapshotRequest {
            description: SNAPSHOT_DESCRIPTION,
        });
        self.send_mutation(request).await
    }

    async fn remove_snapshot(&self, snapshot: &Snapshot) -> Result<(), InventoryError> {
        let url = self.endpoint(&format!("/v1/snapshots/{}", snapshot.id));
        self.send_mutation(self.http.delete(url)).await
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct VolumesPage {
    #[serde(default)]
    volumes: Vec<Volume>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SnapshotsPage {
    #[serde(default)]
    snapshots: Vec<Snapshot>,
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateSnapshotRequest<'a> {
    description: &'a str,
}

/// Error payload shape used by the API; both field names are seen in the
/// wild, so accept either.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

// ---------------------------------------------------------------------------
// Response handling
// ---------------------------------------------------------------------------

async fn decode_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, InventoryError> {
    let status = response.status();
    if !status.is_success() {
        return Err(api_error(status, response).await);
    }
    response
        .json::<T>()
        .await
        .map_err(|err| InventoryError::Decode(err.to_string()))
}

async fn expect_success(response: reqwest::Response) -> Result<(), InventoryError> {
    let status = response.status();
    if !status.is_success() {
        return Err(api_error(status, response).await);
    }
    Ok(())
}

async fn api_error(status: reqwest::StatusCode, response: reqwest::Response) -> InventoryError {
    let message = match response.text().await {
        Ok(body) => extract_error_message(&body),
        Err(_) => None,
    };
    InventoryError::Api {
        status: status.as_u16(),
        message: message.unwrap_or_else(|| {
            status.canonical_reason().unwrap_or("unknown error").to_string()
        }),
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed.error.or(parsed.message).filter(|msg| !msg.is_empty())
}
