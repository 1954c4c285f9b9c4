//! HTTP transport with timeouts and bounded retry.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use planaid_shared::{
    AcquisitionConfig, PlanAidError, ProgressPhase, ProgressSink, Result, percent_of,
};

/// User-Agent string for all requests.
const USER_AGENT: &str = concat!("PlanAid/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client plus the retry policy.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    request_timeout: Duration,
    download_timeout: Duration,
    retries: u32,
    backoff: Duration,
}

impl HttpTransport {
    pub fn new(config: &AcquisitionConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PlanAidError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            download_timeout: Duration::from_secs(config.download_timeout_secs),
            retries: config.retries,
            backoff: Duration::from_millis(config.backoff_ms),
        })
    }

    /// Send a request, retrying on 429/5xx and connection failures with
    /// exponential backoff. Other non-success statuses fail immediately.
    async fn send(&self, build: impl Fn(&Client) -> RequestBuilder, url: &str) -> Result<Response> {
        let mut attempt = 0u32;
        loop {
            let outcome = build(&self.client).send().await;
            let retryable = match &outcome {
                Ok(resp) => is_retryable(resp.status()),
                Err(e) => e.is_connect() || e.is_timeout(),
            };

            if !retryable || attempt >= self.retries {
                return match outcome {
                    Ok(resp) if resp.status().is_success() => Ok(resp),
                    Ok(resp) => Err(PlanAidError::Network(format!(
                        "GET {url}: HTTP {}",
                        resp.status()
                    ))),
                    Err(e) => Err(PlanAidError::Network(format!("GET {url}: {e}"))),
                };
            }

            let delay = self.backoff * 2u32.saturating_pow(attempt);
            warn!(url, attempt = attempt + 1, delay_ms = delay.as_millis() as u64, "retrying request");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// GET `url` with query parameters and decode a JSON body.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let resp = self
            .send(
                |c| {
                    c.get(url)
                        .query(query)
                        .header(reqwest::header::ACCEPT, "application/json")
                        .timeout(self.request_timeout)
                },
                url,
            )
            .await?;
        resp.json::<T>()
            .await
            .map_err(|e| PlanAidError::parse(format!("invalid JSON from {url}: {e}")))
    }

    /// GET `url` and return the body as text.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let resp = self
            .send(|c| c.get(url).timeout(self.request_timeout), url)
            .await?;
        resp.text()
            .await
            .map_err(|e| PlanAidError::Network(format!("GET {url}: {e}")))
    }

    /// GET `url` without caring about the status (session warm-up pages).
    pub async fn touch(&self, url: &str) -> Result<StatusCode> {
        let resp = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| PlanAidError::Network(format!("GET {url}: {e}")))?;
        debug!(url, status = %resp.status(), "touched");
        Ok(resp.status())
    }

    /// Stream `url` into `dest`, reporting byte progress under `label`.
    #[instrument(skip_all, fields(url = %url, dest = %dest.display()))]
    pub async fn download_to(
        &self,
        url: &str,
        dest: &Path,
        label: &str,
        progress: &dyn ProgressSink,
    ) -> Result<u64> {
        let resp = self
            .send(|c| c.get(url).timeout(self.download_timeout), url)
            .await?;
        let total = resp.content_length();

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| PlanAidError::io(dest, e))?;
        let mut stream = resp.bytes_stream();
        let mut written = 0u64;
        let mut last_percent = None;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| PlanAidError::Network(format!("GET {url}: {e}")))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| PlanAidError::io(dest, e))?;
            written += chunk.len() as u64;

            let percent = percent_of(written, total);
            if percent != last_percent {
                progress.emit(label, ProgressPhase::Downloading, percent);
                last_percent = percent;
            }
        }
        file.flush().await.map_err(|e| PlanAidError::io(dest, e))?;

        debug!(bytes = written, "download finished");
        Ok(written)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use planaid_shared::SilentProgress;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> HttpTransport {
        let config = AcquisitionConfig {
            retries: 2,
            backoff_ms: 1,
            ..AcquisitionConfig::default()
        };
        HttpTransport::new(&config).expect("transport")
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let body = transport()
            .get_text(&format!("{}/list", server.uri()))
            .await
            .expect("eventually ok");
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn gives_up_after_retry_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let err = transport()
            .get_text(&format!("{}/list", server.uri()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        assert!(
            transport()
                .get_text(&format!("{}/missing", server.uri()))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn json_request_sends_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chart"))
            .and(query_param("edition", "current"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let value: serde_json::Value = transport()
            .get_json(&format!("{}/chart", server.uri()), &[("edition", "current")])
            .await
            .expect("json");
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn download_streams_to_file() {
        let server = MockServer::start().await;
        let body = vec![7u8; 64 * 1024];
        Mock::given(method("GET"))
            .and(path("/archive.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("archive.zip");
        let written = transport()
            .download_to(
                &format!("{}/archive.zip", server.uri()),
                &dest,
                "nasr",
                &SilentProgress,
            )
            .await
            .expect("download");

        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(&dest).expect("read"), body);
    }
}
