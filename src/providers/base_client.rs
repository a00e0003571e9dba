use crate::core::error::PluginError;
use reqwest::{Client, Response};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    endpoint: String,
    api_key: String,
    extra_headers: HashMap<String, String>,
}

impl HttpClient {
    pub fn new(
        endpoint: String,
        api_key: String,
        extra_headers: Option<HashMap<String, String>>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            extra_headers: extra_headers.unwrap_or_default(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    /// POST `payload` as JSON. Non-success statuses become [`PluginError::Http`].
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<Response, PluginError> {
        let url = self.url(path);

        let mut request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");

        for (key, value) in &self.extra_headers {
            request = request.header(key, value);
        }

        tracing::debug!(url = %url, "sending request");
        let response = request.json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "completion endpoint returned an error");
            return Err(PluginError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slashes() {
        let client = HttpClient::new("https://api.openai.com/v1/".to_string(), "k".to_string(), None);
        assert_eq!(
            client.url("/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }
}
