use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

/// Body of the streaming chat request.
///
/// Optional fields are omitted from the serialized body entirely; the backend
/// treats a missing field and an explicit null differently in places, so we
/// never send nulls.
#[derive(Serialize, Clone, Debug)]
pub struct ChatStreamRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_gpt: Option<bool>,
}

impl ChatStreamRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            chat_id: None,
            collection_name: None,
            token: None,
            selected_model: None,
            with_gpt: None,
        }
    }
}

/// Payload of one framed stream event. A record may carry either field, both,
/// or neither; classification happens in the decoder.
#[derive(Deserialize, Debug)]
pub struct StreamEventPayload {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
}

/// Who wrote a history entry. The backend writes `model` but some deployments
/// echo `assistant` back when reading, so both parse to [`Author::Model`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    #[serde(alias = "assistant")]
    Model,
}

impl Author {
    pub fn as_str(self) -> &'static str {
        match self {
            Author::User => "user",
            Author::Model => "model",
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct Chat {
    pub id: i64,
    pub name: String,
    pub model_id: i64,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct ChatCreate {
    pub name: String,
    pub model_id: i64,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Service,
    Local,
}

impl ModelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Service => "service",
            ModelKind::Local => "local",
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct Model {
    pub id: i64,
    pub name: String,
    pub model_path: String,
    #[serde(rename = "type")]
    pub kind: ModelKind,
    pub context_window: u32,
    pub created_at: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct HistoryEntry {
    pub id: i64,
    pub chat_id: i64,
    pub text: String,
    pub author: Author,
    pub created_at: String,
}

#[derive(Serialize, Debug)]
pub struct HistoryCreate<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    pub author: Author,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Storage {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct StorageFile {
    pub id: i64,
    #[serde(default)]
    pub storage_id: Option<i64>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub url: Option<String>,
    pub created_at: String,
}

#[derive(Serialize, Debug)]
pub struct StorageCreate<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
}

/// The storage listing endpoint has been seen both wrapping its result in a
/// `data` envelope and returning the array bare. Accept either.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum StorageListResponse {
    Wrapped { data: Vec<Storage> },
    Bare(Vec<Storage>),
}

impl StorageListResponse {
    pub fn into_storages(self) -> Vec<Storage> {
        match self {
            StorageListResponse::Wrapped { data } => data,
            StorageListResponse::Bare(storages) => storages,
        }
    }
}

/// Fail with [`ApiError::Status`] unless the response is a success, keeping
/// any diagnostic body text.
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    Err(ApiError::Status { status, body })
}

pub mod chats;
pub mod history;
pub mod storage;
