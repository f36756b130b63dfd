//! Chat and model registry endpoints.

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use tracing::debug;

use crate::api::history::{fetch_history, HistoryOrder};
use crate::api::{ensure_success, Chat, ChatCreate, Model};
use crate::core::errors::ApiError;
use crate::utils::url::endpoint_url;

pub async fn list_chats(client: &Client, base_url: &str) -> Result<Vec<Chat>, ApiError> {
    let response = client.get(endpoint_url(base_url, "chats")).send().await?;
    let response = ensure_success(response).await?;
    Ok(response.json::<Vec<Chat>>().await?)
}

pub async fn create_chat(
    client: &Client,
    base_url: &str,
    name: &str,
    model_id: i64,
) -> Result<Chat, ApiError> {
    let response = client
        .post(endpoint_url(base_url, "chats"))
        .json(&ChatCreate {
            name: name.to_string(),
            model_id,
        })
        .send()
        .await?;
    let response = ensure_success(response).await?;
    Ok(response.json::<Chat>().await?)
}

pub async fn list_models(client: &Client, base_url: &str) -> Result<Vec<Model>, ApiError> {
    let response = client.get(endpoint_url(base_url, "models")).send().await?;
    let response = ensure_success(response).await?;
    Ok(response.json::<Vec<Model>>().await?)
}

/// List chats ordered by their most recent message, newest first.
///
/// The registry itself does not expose activity timestamps, so each chat's
/// newest history entry is peeked (`limit=1&order=desc`). A failed peek falls
/// back to the chat's creation time rather than failing the listing.
pub async fn list_chats_by_recency(
    client: &Client,
    base_url: &str,
) -> Result<Vec<Chat>, ApiError> {
    let chats = list_chats(client, base_url).await?;

    let mut keyed = Vec::with_capacity(chats.len());
    for chat in chats {
        let newest = match fetch_history(client, base_url, chat.id, Some(1), HistoryOrder::Desc)
            .await
        {
            Ok(history) => history.first().map(|entry| entry.created_at.clone()),
            Err(err) => {
                debug!("history peek failed for chat {}: {err}", chat.id);
                None
            }
        };
        let stamp = parse_timestamp(newest.as_deref().unwrap_or(chat.created_at.as_str()));
        keyed.push((stamp, chat));
    }

    sort_newest_first(&mut keyed);
    Ok(keyed.into_iter().map(|(_, chat)| chat).collect())
}

/// Backend timestamps have been seen both with and without an offset.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Unparseable timestamps sort to the end; ties keep their listing order.
fn sort_newest_first<T>(keyed: &mut [(Option<DateTime<Utc>>, T)]) {
    keyed.sort_by(|a, b| b.0.cmp(&a.0));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_offset_and_naive_timestamps() {
        assert!(parse_timestamp("2024-09-24T11:30:00Z").is_some());
        assert!(parse_timestamp("2024-09-24T11:30:00+03:00").is_some());
        assert!(parse_timestamp("2024-09-24T11:30:00.123456").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn newest_first_with_unparseable_last() {
        let mut keyed = vec![
            (parse_timestamp("2024-09-24T11:30:00Z"), "older"),
            (None, "unknown"),
            (parse_timestamp("2024-09-25T09:00:00Z"), "newer"),
        ];
        sort_newest_first(&mut keyed);
        let order: Vec<&str> = keyed.into_iter().map(|(_, name)| name).collect();
        assert_eq!(order, vec!["newer", "older", "unknown"]);
    }
}
