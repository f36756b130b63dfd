//! Document storage and file ingestion endpoints.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Serialize;

use crate::api::{ensure_success, Storage, StorageCreate, StorageFile, StorageListResponse};
use crate::core::errors::ApiError;
use crate::utils::url::{endpoint_url, with_query};

#[derive(Serialize, Debug)]
struct UrlIngest<'a> {
    url: &'a str,
}

pub async fn list_storages(client: &Client, base_url: &str) -> Result<Vec<Storage>, ApiError> {
    let response = client
        .get(endpoint_url(base_url, "list_storages"))
        .send()
        .await?;
    let response = ensure_success(response).await?;
    let listing = response.json::<StorageListResponse>().await?;
    Ok(listing.into_storages())
}

pub async fn create_storage(
    client: &Client,
    base_url: &str,
    name: &str,
    description: Option<&str>,
) -> Result<Storage, ApiError> {
    let response = client
        .post(endpoint_url(base_url, "storages"))
        .json(&StorageCreate { name, description })
        .send()
        .await?;
    let response = ensure_success(response).await?;
    Ok(response.json::<Storage>().await?)
}

pub async fn list_files(
    client: &Client,
    base_url: &str,
    storage_id: i64,
) -> Result<Vec<StorageFile>, ApiError> {
    let response = client
        .get(endpoint_url(base_url, &format!("storages/{storage_id}/files")))
        .send()
        .await?;
    let response = ensure_success(response).await?;
    Ok(response.json::<Vec<StorageFile>>().await?)
}

/// Upload a local file into a storage. The backend takes the storage id as a
/// query parameter and the file plus a description as multipart fields.
pub async fn upload_file(
    client: &Client,
    base_url: &str,
    storage_id: i64,
    path: &Path,
) -> Result<(), ApiError> {
    let file_name = upload_file_name(path);
    let bytes = std::fs::read(path)?;
    let form = Form::new()
        .part("file", Part::bytes(bytes).file_name(file_name.clone()))
        .text("description", format!("Upload of {file_name}"));

    let url = with_query(
        &endpoint_url(base_url, "upload-pdf"),
        &[("storage_id", storage_id.to_string())],
    );
    let response = client.post(url).multipart(form).send().await?;
    ensure_success(response).await?;
    Ok(())
}

pub async fn add_url(
    client: &Client,
    base_url: &str,
    storage_id: i64,
    url: &str,
) -> Result<(), ApiError> {
    let response = client
        .post(endpoint_url(base_url, &format!("storages/{storage_id}/urls")))
        .json(&UrlIngest { url })
        .send()
        .await?;
    ensure_success(response).await?;
    Ok(())
}

pub async fn delete_file(
    client: &Client,
    base_url: &str,
    storage_id: i64,
    file_id: i64,
) -> Result<(), ApiError> {
    let response = client
        .delete(endpoint_url(
            base_url,
            &format!("storages/{storage_id}/files/{file_id}"),
        ))
        .send()
        .await?;
    ensure_success(response).await?;
    Ok(())
}

/// The multipart field must carry an explicit filename or the backend rejects
/// the part.
fn upload_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}
