//! HTTP backend for the VocabSync key-value service.
//!
//! Routes (all scoped to one user):
//!
//! - `GET    /v1/users/{user}/items/{key}` -> `{"key", "value"}` or 404
//! - `PUT    /v1/users/{user}/items/{key}` with `{"value"}`
//! - `POST   /v1/users/{user}/batch/get` with `{"keys"}` -> `{"values"}`
//! - `POST   /v1/users/{user}/batch/remove` with `{"keys"}`

use super::RemoteBackend;
use crate::error::RemoteError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub struct HttpBackend {
    client: Client,
    base_url: Url,
    user_id: String,
    auth_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutItemRequest<'a> {
    value: &'a str,
}

#[derive(Debug, Deserialize)]
struct ItemResponse {
    value: String,
}

#[derive(Debug, Serialize)]
struct KeysRequest<'a> {
    keys: &'a [String],
}

#[derive(Debug, Deserialize)]
struct BatchGetResponse {
    values: HashMap<String, String>,
}

impl HttpBackend {
    pub fn new(
        base_url: &str,
        user_id: impl Into<String>,
        auth_token: Option<String>,
    ) -> Result<Self, RemoteError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RemoteError::Rejected(format!("invalid base URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::Rejected(format!(
                "invalid base URL: {}",
                base_url
            )));
        }

        let client = Client::builder().build()?;

        Ok(Self {
            client,
            base_url,
            user_id: user_id.into(),
            auth_token,
        })
    }

    fn url(&self, tail: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v1", "users", self.user_id.as_str()])
                .extend(tail);
        }
        url
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn check(status: StatusCode) -> Result<(), RemoteError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(RemoteError::Status(status.as_u16()))
    }
}

#[async_trait]
impl RemoteBackend for HttpBackend {
    async fn set_item(&self, key: &str, value: &str) -> Result<(), RemoteError> {
        let response = self
            .authorized(self.client.put(self.url(&["items", key])))
            .json(&PutItemRequest { value })
            .send()
            .await?;
        check(response.status())
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>, RemoteError> {
        let response = self
            .authorized(self.client.get(self.url(&["items", key])))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        check(response.status())?;
        let item: ItemResponse = response.json().await?;
        Ok(Some(item.value))
    }

    async fn get_items(&self, keys: &[String]) -> Result<HashMap<String, String>, RemoteError> {
        let response = self
            .authorized(self.client.post(self.url(&["batch", "get"])))
            .json(&KeysRequest { keys })
            .send()
            .await?;
        check(response.status())?;
        let batch: BatchGetResponse = response.json().await?;
        Ok(batch.values)
    }

    async fn remove_items(&self, keys: &[String]) -> Result<(), RemoteError> {
        let response = self
            .authorized(self.client.post(self.url(&["batch", "remove"])))
            .json(&KeysRequest { keys })
            .send()
            .await?;
        check(response.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_scoped_urls() {
        let backend = HttpBackend::new("http://localhost:3000/", "u 1", None).unwrap();
        assert_eq!(
            backend.url(&["items", "p_meta"]).as_str(),
            "http://localhost:3000/v1/users/u%201/items/p_meta"
        );

        let backend = HttpBackend::new("https://sync.example.com/api", "7", None).unwrap();
        assert_eq!(
            backend.url(&["batch", "get"]).as_str(),
            "https://sync.example.com/api/v1/users/7/batch/get"
        );
    }

    #[test]
    fn rejects_bad_base_url() {
        assert!(matches!(
            HttpBackend::new("not a url", "1", None),
            Err(RemoteError::Rejected(_))
        ));
        assert!(matches!(
            HttpBackend::new("mailto:someone@example.com", "1", None),
            Err(RemoteError::Rejected(_))
        ));
    }
}
