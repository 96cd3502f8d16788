//! REST transport over reqwest
//!
//! One attempt per call: timeouts and connection failures are reported as
//! [`TransportError`] and the executor decides whether to try again. Non-2xx
//! responses are returned with their parsed bodies; classification happens
//! upstream.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use steward_core::api::{ApiRequest, ApiResponse, ApiTransport, HttpMethod, TransportError};
use steward_core::auth::Credential;
use steward_domain::{ApiConfig, Result, StewardError};
use tracing::debug;
use url::Url;

/// HTTP adapter for the call executor.
pub struct RestTransport {
    client: Client,
    base_url: Url,
}

impl RestTransport {
    /// Build a transport from the API section of the configuration.
    ///
    /// # Errors
    /// Returns `StewardError::Config` when the base URL is invalid or the
    /// HTTP client cannot be constructed.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| StewardError::Config(format!("invalid base URL: {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .no_proxy()
            .build()
            .map_err(|e| StewardError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    fn resolve(&self, path: &str) -> std::result::Result<Url, TransportError> {
        // Discovery documents hand back absolute URLs; everything else is
        // relative to the configured base.
        if path.starts_with("http://") || path.starts_with("https://") {
            Url::parse(path).map_err(|e| TransportError::Network(format!("invalid URL: {e}")))
        } else {
            self.base_url
                .join(path.trim_start_matches('/'))
                .map_err(|e| TransportError::Network(format!("invalid path {path:?}: {e}")))
        }
    }
}

#[async_trait]
impl ApiTransport for RestTransport {
    async fn execute(
        &self,
        credential: &Credential,
        request: &ApiRequest,
    ) -> std::result::Result<ApiResponse, TransportError> {
        let url = self.resolve(&request.path)?;
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        };

        debug!(method = request.method.as_str(), %url, "sending API request");

        let mut builder = self
            .client
            .request(method, url)
            .bearer_auth(credential.access_token())
            .query(&request.query);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(e.to_string())
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(format!("failed to read body: {e}")))?;

        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        debug!(status, "received API response");
        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{bearer_token, body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config(base_url: &str) -> ApiConfig {
        ApiConfig {
            base_url: base_url.to_string(),
            request_timeout_secs: 5,
            max_retries: 5,
            page_size: 500,
        }
    }

    fn credential() -> Credential {
        Credential::new("test-token".into(), 3600, ["scope.a"], None)
    }

    #[tokio::test]
    async fn sends_bearer_auth_and_query_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/directory/v1/users"))
            .and(bearer_token("test-token"))
            .and(query_param("domain", "example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"users": []})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = RestTransport::new(&config(&server.uri())).unwrap();
        let request =
            ApiRequest::get("admin/directory/v1/users").with_query("domain", "example.com");

        let response = transport.execute(&credential(), &request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body["users"], json!([]));
    }

    #[tokio::test]
    async fn posts_json_body() {
        let server = MockServer::start().await;
        let payload = json!({"primaryEmail": "new.user@example.com"});
        Mock::given(method("POST"))
            .and(path("/admin/directory/v1/users"))
            .and(body_json(&payload))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "123"})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = RestTransport::new(&config(&server.uri())).unwrap();
        let request = ApiRequest::post("admin/directory/v1/users", payload.clone());

        let response = transport.execute(&credential(), &request).await.unwrap();
        assert_eq!(response.body["id"], "123");
    }

    #[tokio::test]
    async fn non_2xx_is_returned_not_an_error() {
        let server = MockServer::start().await;
        let error_body = json!({
            "error": {"code": 404, "errors": [{"reason": "notFound"}], "message": "Not Found"}
        });
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(&error_body))
            .mount(&server)
            .await;

        let transport = RestTransport::new(&config(&server.uri())).unwrap();
        let response =
            transport.execute(&credential(), &ApiRequest::get("missing")).await.unwrap();

        assert_eq!(response.status, 404);
        assert!(!response.is_success());
        assert_eq!(response.body["error"]["errors"][0]["reason"], "notFound");
    }

    #[tokio::test]
    async fn empty_body_parses_as_null() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let transport = RestTransport::new(&config(&server.uri())).unwrap();
        let response = transport.execute(&credential(), &ApiRequest::get("x")).await.unwrap();

        assert_eq!(response.status, 204);
        assert_eq!(response.body, Value::Null);
    }

    #[tokio::test]
    async fn connection_refused_maps_to_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so requests fail with ECONNREFUSED

        let transport = RestTransport::new(&config(&format!("http://{addr}"))).unwrap();
        let err =
            transport.execute(&credential(), &ApiRequest::get("x")).await.unwrap_err();

        assert!(matches!(err, TransportError::Network(_)));
    }

    #[tokio::test]
    async fn absolute_path_bypasses_base_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/discovery/v1/apis/directory/v1/rest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "directory"})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = RestTransport::new(&config("http://unused.invalid/")).unwrap();
        let request =
            ApiRequest::get(format!("{}/discovery/v1/apis/directory/v1/rest", server.uri()));

        let response = transport.execute(&credential(), &request).await.unwrap();
        assert_eq!(response.body["name"], "directory");
    }

    #[test]
    fn rejects_invalid_base_url() {
        let result = RestTransport::new(&config("not a url"));
        assert!(matches!(result, Err(StewardError::Config(_))));
    }
}
