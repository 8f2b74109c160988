//! HTTP client for the cloud document store.
//!
//! A device token is exchanged for a short-lived user token, which then
//! authorizes every tree call of the session.

use super::hash::HashProvider;
use super::index::{decode_index, encode_index};
use super::{RemoteConnector, RemoteError, RemoteTree};
use async_trait::async_trait;
use paperfeed_types::{ContentHash, Device, DocumentId, Entry, Generation, TreeState};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Header carrying the file name of an uploaded blob.
const FILENAME_HEADER: &str = "rm-filename";

/// File name of the root index.
const ROOT_INDEX_NAME: &str = "root.docSchema";

/// Endpoints and limits of the cloud store.
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// Base URL of the token service.
    pub auth_url: String,
    /// Base URL of the sync service.
    pub sync_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Opens [`CloudSession`]s.
#[derive(Debug, Clone)]
pub struct CloudConnector {
    client: reqwest::Client,
    config: CloudConfig,
    hasher: Arc<dyn HashProvider>,
}

impl CloudConnector {
    /// Create a connector that hashes content with `hasher`.
    pub fn new(config: CloudConfig, hasher: Arc<dyn HashProvider>) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RemoteError::Request(e.to_string()))?;
        Ok(Self {
            client,
            config,
            hasher,
        })
    }
}

#[async_trait]
impl RemoteConnector for CloudConnector {
    async fn connect(&self, device: &Device) -> Result<Arc<dyn RemoteTree>, RemoteError> {
        let url = format!(
            "{}/token/json/2/user/new",
            self.config.auth_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&device.token)
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RemoteError::Auth(format!("device token rejected ({status})")));
        }
        let user_token = check(response)
            .await?
            .text()
            .await
            .map_err(request_error)?;

        if user_token.trim().is_empty() {
            return Err(RemoteError::Auth("empty user token".to_string()));
        }

        Ok(Arc::new(CloudSession {
            client: self.client.clone(),
            sync_url: self.config.sync_url.trim_end_matches('/').to_string(),
            user_token: user_token.trim().to_string(),
            hasher: Arc::clone(&self.hasher),
        }))
    }
}

/// An authenticated session on one user's cloud tree.
pub struct CloudSession {
    client: reqwest::Client,
    sync_url: String,
    user_token: String,
    hasher: Arc<dyn HashProvider>,
}

impl std::fmt::Debug for CloudSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudSession")
            .field("sync_url", &self.sync_url)
            .field("user_token", &"[REDACTED]")
            .field("hasher", &self.hasher)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct RootResponse {
    hash: String,
    generation: u64,
}

#[derive(Debug, Serialize)]
struct PutRootRequest<'a> {
    hash: &'a str,
    generation: u64,
    broadcast: bool,
}

#[derive(Debug, Deserialize)]
struct PutRootResponse {
    generation: u64,
}

#[derive(Debug, Serialize)]
struct SyncCompleteRequest {
    generation: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentMetadata<'a> {
    visible_name: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    parent: &'static str,
    last_modified: String,
    last_opened: &'static str,
    version: u32,
    pinned: bool,
    synced: bool,
    modified: bool,
    deleted: bool,
    #[serde(rename = "metadatamodified")]
    metadata_modified: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentContent {
    file_type: &'static str,
    cover_page_number: i32,
}

impl CloudSession {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.sync_url, path)
    }

    /// Store one blob under its content hash.
    async fn put_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<Entry, RemoteError> {
        let hash = self.hasher.digest(&bytes);
        let size = bytes.len() as u64;

        let response = self
            .client
            .put(self.url(&format!("/sync/v3/files/{hash}")))
            .bearer_auth(&self.user_token)
            .header(FILENAME_HEADER, file_name)
            .body(bytes)
            .send()
            .await
            .map_err(request_error)?;
        check(response).await?;

        Ok(Entry::file(hash, file_name, size))
    }
}

#[async_trait]
impl RemoteTree for CloudSession {
    async fn put_document(&self, name: &str, pdf: &[u8]) -> Result<Entry, RemoteError> {
        let id = DocumentId::new();
        let now_millis = chrono::Utc::now().timestamp_millis();

        let metadata = serde_json::to_vec(&DocumentMetadata {
            visible_name: name,
            kind: "DocumentType",
            parent: "",
            last_modified: now_millis.to_string(),
            last_opened: "0",
            version: 0,
            pinned: false,
            synced: true,
            modified: false,
            deleted: false,
            metadata_modified: false,
        })
        .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;
        let content = serde_json::to_vec(&DocumentContent {
            file_type: "pdf",
            cover_page_number: 0,
        })
        .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;

        let files = vec![
            self.put_file(&id.file_name("metadata"), metadata).await?,
            self.put_file(&id.file_name("content"), content).await?,
            self.put_file(&id.file_name("pagedata"), Vec::new()).await?,
            self.put_file(&id.file_name("pdf"), pdf.to_vec()).await?,
        ];

        let doc_id = id.to_string();
        let index_hash = self.put_entries(&doc_id, &files).await?;
        let size = files.iter().map(|f| f.size).sum();

        tracing::debug!("Uploaded document {} ({} bytes) as {}", name, size, doc_id);
        Ok(Entry::index(index_hash, &doc_id, files.len() as u32, size))
    }

    async fn get_root_hash(&self) -> Result<TreeState, RemoteError> {
        let response = self
            .client
            .get(self.url("/sync/v3/root"))
            .bearer_auth(&self.user_token)
            .send()
            .await
            .map_err(request_error)?;

        let root: RootResponse = check(response)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;

        Ok(TreeState {
            root_hash: ContentHash::from_hex(&root.hash)
                .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?,
            generation: Generation::new(root.generation),
        })
    }

    async fn get_entries(&self, hash: &ContentHash) -> Result<Vec<Entry>, RemoteError> {
        let response = self
            .client
            .get(self.url(&format!("/sync/v3/files/{hash}")))
            .bearer_auth(&self.user_token)
            .send()
            .await
            .map_err(request_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(hash.to_hex()));
        }
        let text = check(response).await?.text().await.map_err(request_error)?;
        decode_index(&text)
    }

    async fn put_entries(&self, index_id: &str, entries: &[Entry]) -> Result<ContentHash, RemoteError> {
        let hash = self.hasher.index_hash(entries);
        let file_name = if index_id.is_empty() {
            ROOT_INDEX_NAME.to_string()
        } else {
            format!("{index_id}.docSchema")
        };

        let response = self
            .client
            .put(self.url(&format!("/sync/v3/files/{hash}")))
            .bearer_auth(&self.user_token)
            .header(FILENAME_HEADER, file_name)
            .body(encode_index(entries))
            .send()
            .await
            .map_err(request_error)?;
        check(response).await?;

        Ok(hash)
    }

    async fn put_root_hash(
        &self,
        hash: &ContentHash,
        generation: Generation,
    ) -> Result<Generation, RemoteError> {
        let hex = hash.to_hex();
        let response = self
            .client
            .put(self.url("/sync/v3/root"))
            .bearer_auth(&self.user_token)
            .json(&PutRootRequest {
                hash: &hex,
                generation: generation.value(),
                broadcast: true,
            })
            .send()
            .await
            .map_err(request_error)?;

        if response.status() == StatusCode::PRECONDITION_FAILED {
            return Err(RemoteError::Conflict {
                presented: generation,
            });
        }

        let committed: PutRootResponse = check(response)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;
        Ok(Generation::new(committed.generation))
    }

    async fn complete_sync(&self, generation: Generation) -> Result<(), RemoteError> {
        let response = self
            .client
            .post(self.url("/sync/v2/sync-complete"))
            .bearer_auth(&self.user_token)
            .json(&SyncCompleteRequest {
                generation: generation.value(),
            })
            .send()
            .await
            .map_err(request_error)?;
        check(response).await?;
        Ok(())
    }
}

fn request_error(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout(e.to_string())
    } else {
        RemoteError::Request(e.to_string())
    }
}

/// Pass successful responses through; turn the rest into [`RemoteError::Http`].
async fn check(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let reason = response.text().await.unwrap_or_default();
    Err(RemoteError::Http {
        status: status.as_u16(),
        reason: if reason.is_empty() {
            status.canonical_reason().unwrap_or("unknown").to_string()
        } else {
            reason
        },
    })
}
