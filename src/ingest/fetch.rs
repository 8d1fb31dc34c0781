/// Data fetcher: one blocking GET returning parsed JSON or a `FetchError`.
///
/// The pipeline depends only on the `DataFetcher` trait so tests can swap in
/// canned payloads. `HttpFetcher` is the production implementation on top of
/// `reqwest::blocking`; it never retries and never turns a transport error
/// into an empty success.

use crate::config::HttpSettings;
use crate::model::FetchError;
use serde_json::Value;

/// A GET request with optional query parameters and headers.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        FetchRequest {
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }
}

pub trait DataFetcher {
    fn fetch_json(&self, request: &FetchRequest) -> Result<Value, FetchError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(settings: &HttpSettings) -> Result<Self, FetchError> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(settings.accept_invalid_certs);
        if let Some(agent) = &settings.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        let client = builder.build().map_err(|e| FetchError::Request {
            url: String::new(),
            message: format!("cannot build HTTP client: {}", e),
        })?;
        Ok(HttpFetcher { client })
    }
}

impl DataFetcher for HttpFetcher {
    fn fetch_json(&self, request: &FetchRequest) -> Result<Value, FetchError> {
        let mut builder = self
            .client
            .get(&request.url)
            .header("Accept", "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().map_err(|e| classify_transport(&request.url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: request.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().map_err(|e| classify_transport(&request.url, e))?;
        parse_body(&request.url, &body)
    }
}

/// Maps a reqwest error onto `FetchError`.
///
/// reqwest prints the full request URL, query included, and signed requests
/// carry the API key there. Only the bare `url` is kept.
fn classify_transport(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout { url: url.to_string() }
    } else if err.is_connect() {
        FetchError::Connect {
            url: url.to_string(),
            message: err.without_url().to_string(),
        }
    } else {
        FetchError::Request {
            url: url.to_string(),
            message: err.without_url().to_string(),
        }
    }
}

/// Parses a response body, keeping a short excerpt of it in the error.
pub fn parse_body(url: &str, body: &str) -> Result<Value, FetchError> {
    serde_json::from_str(body).map_err(|e| {
        let excerpt: String = body.chars().take(200).collect();
        FetchError::InvalidJson {
            url: url.to_string(),
            message: format!("{} (body starts '{}')", e, excerpt),
        }
    })
}
