//! Suggestion endpoint client.

use crate::config::SuggestConfig;
use crate::error::Result;

use super::model::{RawSuggestion, SuggestResponse};

/// Fetches raw suggestions for a keyword
#[async_trait::async_trait]
pub trait SuggestClient: Send + Sync {
    /// `Ok(None)` when the response carries no list
    async fn fetch(&self, keyword: &str) -> Result<Option<Vec<RawSuggestion>>>;
}

/// [`SuggestClient`] over HTTP: `GET <endpoint>?keyword=<text>&highlight=1`
#[derive(Clone, Debug)]
pub struct HttpSuggestClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSuggestClient {
    /// Build a client with the configured timeout and User-Agent
    pub fn new(config: &SuggestConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait::async_trait]
impl SuggestClient for HttpSuggestClient {
    async fn fetch(&self, keyword: &str) -> Result<Option<Vec<RawSuggestion>>> {
        let response: SuggestResponse = self
            .client
            .get(&self.endpoint)
            .query(&[("keyword", keyword), ("highlight", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.data.and_then(|data| data.list))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> SuggestConfig {
        SuggestConfig {
            endpoint: format!("{}/x/v2/search/suggest3", server.uri()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn sends_keyword_and_highlight() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x/v2/search/suggest3"))
            .and(query_param("keyword", "海贼王"))
            .and(query_param("highlight", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "data": {"list": [
                    {"position": 1, "keyword": "海贼王", "term_type": 1},
                    {"position": 2, "keyword": "海贼王 剧场版", "term_type": 8}
                ]}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = HttpSuggestClient::new(&config(&mock_server)).unwrap();
        let list = client.fetch("海贼王").await.unwrap().unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list[1].term_type, Some(8));
    }

    #[tokio::test]
    async fn missing_list_is_none() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": {}})))
            .mount(&mock_server)
            .await;

        let client = HttpSuggestClient::new(&config(&mock_server)).unwrap();
        assert_eq!(client.fetch("x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn server_error_is_network_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&mock_server)
            .await;

        let client = HttpSuggestClient::new(&config(&mock_server)).unwrap();
        assert!(matches!(
            client.fetch("x").await.unwrap_err(),
            Error::Network(_)
        ));
    }
}
