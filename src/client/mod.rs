/// Grafana Backend Clients
///
/// Thin HTTP clients for the Grafana API, datasource proxy, the Grafana
/// Incident plugin and Grafana OnCall. All clients built for one
/// `RequestContext` share a single pooled `reqwest::Client`.

pub mod grafana;
pub mod incident;
pub mod oncall;

pub use grafana::GrafanaClient;
pub use incident::IncidentClient;
pub use oncall::OnCallClient;

use reqwest::RequestBuilder;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

/// Backend request failed.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid request URL for {endpoint}: {reason}")]
    InvalidUrl { endpoint: String, reason: String },

    #[error("request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned status code {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("decoding response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{plugin} settings do not set {field}")]
    MissingSetting {
        plugin: &'static str,
        field: &'static str,
    },
}

/// Build the process-wide HTTP client.
pub fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("mcp-grafana/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// How the credential is presented to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AuthScheme {
    /// `Authorization: Bearer <key>`, used by Grafana itself.
    Bearer,
    /// `Authorization: <key>` plus `X-Grafana-URL`, used by the OnCall API.
    GrafanaToken,
}

/// Base URL plus credential, shared by every client flavour.
#[derive(Clone)]
pub(crate) struct Transport {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    scheme: AuthScheme,
    grafana_url: Option<String>,
}

impl Transport {
    pub(crate) fn new(http: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            http,
            base_url,
            api_key,
            scheme: AuthScheme::Bearer,
            grafana_url: None,
        }
    }

    /// Transport for a service that authenticates with a Grafana token on
    /// behalf of the Grafana instance at `grafana_url`.
    pub(crate) fn grafana_token(
        http: reqwest::Client,
        base_url: String,
        api_key: String,
        grafana_url: String,
    ) -> Self {
        Self {
            http,
            base_url,
            api_key,
            scheme: AuthScheme::GrafanaToken,
            grafana_url: Some(grafana_url),
        }
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Append percent-encoded path segments to the base URL.
    pub(crate) fn endpoint<S: AsRef<str>>(&self, segments: &[S]) -> Result<Url, ClientError> {
        let invalid = |reason: String| ClientError::InvalidUrl {
            endpoint: join(segments),
            reason,
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments.iter().map(AsRef::as_ref));
        Ok(url)
    }

    pub(crate) async fn get<T, S>(
        &self,
        segments: &[S],
        query: &[(&str, String)],
    ) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        S: AsRef<str>,
    {
        let url = self.endpoint(segments)?;
        let request = self.http.get(url.clone()).query(query);
        self.execute(request, &url).await
    }

    pub(crate) async fn post<T, S, B>(&self, segments: &[S], body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        S: AsRef<str>,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(segments)?;
        let request = self.http.post(url.clone()).json(body);
        self.execute(request, &url).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &Url,
    ) -> Result<T, ClientError> {
        let endpoint = url.path().to_string();
        let request = match self.scheme {
            _ if self.api_key.is_empty() => request,
            AuthScheme::Bearer => request.bearer_auth(&self.api_key),
            AuthScheme::GrafanaToken => request.header(AUTHORIZATION, &self.api_key),
        };
        let request = match &self.grafana_url {
            Some(grafana_url) => request.header("X-Grafana-URL", grafana_url),
            None => request,
        };

        tracing::debug!(endpoint = %endpoint, "sending backend request");
        let response = request.send().await.map_err(|source| ClientError::Request {
            endpoint: endpoint.clone(),
            source,
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|source| ClientError::Request {
            endpoint: endpoint.clone(),
            source,
        })?;

        if !status.is_success() {
            return Err(ClientError::Status {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(body.trim()).map_err(|source| ClientError::Decode { endpoint, source })
    }
}

fn join<S: AsRef<str>>(segments: &[S]) -> String {
    let mut path = String::new();
    for segment in segments {
        path.push('/');
        path.push_str(segment.as_ref());
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base_url: &str) -> Transport {
        Transport::new(reqwest::Client::new(), base_url.to_string(), String::new())
    }

    #[test]
    fn endpoint_appends_encoded_segments() {
        let url = transport("http://localhost:3000")
            .endpoint(&["api", "datasources", "name", "my source/1"])
            .expect("endpoint");
        assert_eq!(
            url.as_str(),
            "http://localhost:3000/api/datasources/name/my%20source%2F1"
        );
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let url = transport("https://example.com/grafana")
            .endpoint(&["api", "search"])
            .expect("endpoint");
        assert_eq!(url.as_str(), "https://example.com/grafana/api/search");
    }

    #[test]
    fn endpoint_rejects_unparsable_base() {
        let error = transport("::nope").endpoint(&["api"]).unwrap_err();
        assert!(matches!(error, ClientError::InvalidUrl { .. }));
    }
}
