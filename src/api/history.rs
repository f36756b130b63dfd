//! Chat history store endpoints.

use reqwest::Client;

use crate::api::{ensure_success, Author, HistoryCreate, HistoryEntry};
use crate::core::errors::ApiError;
use crate::utils::url::{endpoint_url, with_query};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryOrder {
    #[default]
    Asc,
    Desc,
}

impl HistoryOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryOrder::Asc => "asc",
            HistoryOrder::Desc => "desc",
        }
    }
}

pub async fn fetch_history(
    client: &Client,
    base_url: &str,
    chat_id: i64,
    limit: Option<u32>,
    order: HistoryOrder,
) -> Result<Vec<HistoryEntry>, ApiError> {
    let mut pairs = Vec::new();
    if let Some(limit) = limit {
        pairs.push(("limit", limit.to_string()));
    }
    pairs.push(("order", order.as_str().to_string()));

    let url = with_query(
        &endpoint_url(base_url, &format!("chat_history/{chat_id}")),
        &pairs,
    );
    let response = client.get(url).send().await?;
    let response = ensure_success(response).await?;
    Ok(response.json::<Vec<HistoryEntry>>().await?)
}

pub async fn save_message(
    client: &Client,
    base_url: &str,
    chat_id: i64,
    text: &str,
    author: Author,
) -> Result<(), ApiError> {
    let response = client
        .post(endpoint_url(base_url, "chat_history"))
        .json(&HistoryCreate {
            chat_id,
            text,
            author,
        })
        .send()
        .await?;
    ensure_success(response).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_maps_to_wire_keywords() {
        assert_eq!(HistoryOrder::Asc.as_str(), "asc");
        assert_eq!(HistoryOrder::Desc.as_str(), "desc");
        assert_eq!(HistoryOrder::default(), HistoryOrder::Asc);
    }

    #[test]
    fn history_create_serializes_flat_body() {
        let body = HistoryCreate {
            chat_id: 3,
            text: "Скинь мне ссылку на документы",
            author: Author::User,
        };
        let value = serde_json::to_value(&body).expect("serialize history entry");
        assert_eq!(value["chat_id"], 3);
        assert_eq!(value["author"], "user");
        assert_eq!(value["text"], "Скинь мне ссылку на документы");
    }
}
