//! HTTP page query against a data service's search endpoint
//!
//! Each page is one `GET {base_url}/{collection}/_search` request. The query
//! travels as a JSON document in the `query` parameter, and the access token
//! travels as the `access_token` cookie. The response body is a
//! [`PageResult`]: `{"total": N, "documents": [...]}`.

use crate::config::ServiceConfig;
use crate::error::{Error, Result, TransportError};
use crate::query::PageQuery;
use crate::types::{PageDescriptor, PageResult};
use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use serde_json::json;
use url::Url;

/// Longest response body excerpt kept in a [`TransportError::Status`]
const MAX_ERROR_BODY: usize = 512;

/// [`PageQuery`] that pages through a collection over HTTP
#[derive(Clone, Debug)]
pub struct HttpPageQuery {
    client: reqwest::Client,
    search_url: Url,
    sort_field: String,
}

impl HttpPageQuery {
    /// Build a query for the collection described by `service`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL is invalid or the token cannot
    /// be sent as a header value, and a transport error if the HTTP client
    /// cannot be constructed.
    pub fn new(service: &ServiceConfig) -> Result<Self> {
        let search_url = service.search_url()?;

        let mut cookie = HeaderValue::from_str(&format!("access_token={}", service.token))
            .map_err(|e| {
                Error::config("service.token", format!("not a valid header value: {e}"))
            })?;
        cookie.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(service.request_timeout)
            .build()
            .map_err(|source| TransportError::Request { offset: 0, source })?;

        Ok(Self {
            client,
            search_url,
            sort_field: service.sort_field.clone(),
        })
    }

    /// Endpoint this query sends requests to
    pub fn search_url(&self) -> &Url {
        &self.search_url
    }

    /// JSON query document for one page
    fn query_document(&self, page: PageDescriptor) -> String {
        json!({
            "limit": page.limit,
            "offset": page.offset,
            "sort": [{ (self.sort_field.as_str()): "asc" }],
        })
        .to_string()
    }
}

#[async_trait]
impl PageQuery for HttpPageQuery {
    async fn query(&self, page: PageDescriptor) -> Result<PageResult> {
        let offset = page.offset;
        let started = std::time::Instant::now();

        let response = self
            .client
            .get(self.search_url.clone())
            .query(&[("query", self.query_document(page))])
            .send()
            .await
            .map_err(|source| TransportError::Request { offset, source })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate_on_char_boundary(&mut body, MAX_ERROR_BODY);
            tracing::warn!(offset, status = status.as_u16(), "page request rejected");
            return Err(TransportError::Status {
                offset,
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| TransportError::Request { offset, source })?;
        let result: PageResult =
            serde_json::from_slice(&bytes).map_err(|e| TransportError::MalformedPage {
                offset,
                reason: e.to_string(),
            })?;

        tracing::debug!(
            offset,
            limit = page.limit,
            documents = result.documents.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "page received"
        );

        Ok(result)
    }
}

fn truncate_on_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}
