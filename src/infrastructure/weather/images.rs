//! Background-image lookup client (Pexels-compatible search API)

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::domain::DomainError;
use crate::domain::weather::{BackgroundImage, ImageProvider};

const DEFAULT_SEARCH_URL: &str = "https://api.pexels.com/v1/search";

/// HTTP client for the dashboard's hero background images.
///
/// Without an API key the provider degrades to "no image" instead of
/// failing the route.
#[derive(Debug, Clone)]
pub struct PexelsImageClient {
    http: reqwest::Client,
    search_url: String,
    api_key: Option<String>,
}

impl PexelsImageClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            api_key,
        }
    }

    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    photos: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    photographer: Option<String>,
    src: PhotoSrc,
}

#[derive(Debug, Deserialize)]
struct PhotoSrc {
    landscape: String,
}

#[async_trait]
impl ImageProvider for PexelsImageClient {
    async fn search(&self, query: &str) -> Result<Option<BackgroundImage>, DomainError> {
        let Some(api_key) = &self.api_key else {
            debug!("No image API key configured; skipping background lookup");
            return Ok(None);
        };

        let response = self
            .http
            .get(&self.search_url)
            .header("Authorization", api_key)
            .query(&[("query", query), ("per_page", "1"), ("orientation", "landscape")])
            .send()
            .await
            .map_err(|e| DomainError::provider("pexels", e.to_string()))?
            .error_for_status()
            .map_err(|e| DomainError::provider("pexels", e.to_string()))?;

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| DomainError::provider("pexels", format!("bad payload: {}", e)))?;

        Ok(body.photos.into_iter().next().map(|photo| BackgroundImage {
            url: photo.src.landscape,
            photographer: photo.photographer,
            source: "pexels".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_missing_api_key_returns_none() {
        let client = PexelsImageClient::new(None);
        assert!(client.search("lisbon skyline").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_maps_first_photo() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(header("Authorization", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "photos": [{
                    "photographer": "Ana",
                    "src": { "landscape": "https://img.example/1.jpg" }
                }]
            })))
            .mount(&server)
            .await;

        let client = PexelsImageClient::new(Some("test-key".into()))
            .with_search_url(format!("{}/v1/search", server.uri()));

        let image = client.search("lisbon").await.unwrap().unwrap();
        assert_eq!(image.url, "https://img.example/1.jpg");
        assert_eq!(image.photographer.as_deref(), Some("Ana"));
        assert_eq!(image.source, "pexels");
    }

    #[tokio::test]
    async fn test_empty_results() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "photos": []
            })))
            .mount(&server)
            .await;

        let client = PexelsImageClient::new(Some("test-key".into()))
            .with_search_url(format!("{}/v1/search", server.uri()));

        assert!(client.search("void").await.unwrap().is_none());
    }
}
