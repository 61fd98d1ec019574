//! Collections and a mock search endpoint that pages through them

use collection_fetch::{PageDescriptor, PageResult, TransportError};
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use super::config::{TEST_COLLECTION, TEST_TOKEN};

/// A document as the data service returns it
pub fn movie(id: u64) -> Value {
    json!({
        "id": format!("movie-{id:05}"),
        "title": format!("Movie {id}"),
        "year": 1950 + id % 70,
    })
}

/// `count` documents in ascending id order
pub fn movies(count: u64) -> Vec<Value> {
    (0..count).map(movie).collect()
}

/// The page of `documents` described by `page`
pub fn slice_page(documents: &[Value], page: PageDescriptor) -> PageResult {
    let len = documents.len();
    let start = usize::try_from(page.offset).unwrap_or(len).min(len);
    let end = usize::try_from(page.end()).unwrap_or(len).min(len);
    PageResult {
        documents: documents[start..end].to_vec(),
        total: len as u64,
    }
}

/// In-process collection, shared by concurrent queries
pub fn collection_query(
    documents: Vec<Value>,
    fail_at: Option<u64>,
) -> impl collection_fetch::PageQuery {
    let documents = Arc::new(documents);
    collection_fetch::query_fn(move |page: PageDescriptor| {
        let documents = Arc::clone(&documents);
        async move {
            if fail_at == Some(page.offset) {
                return Err(TransportError::Query {
                    offset: page.offset,
                    message: "induced failure".into(),
                }
                .into());
            }
            Ok(slice_page(&documents, page))
        }
    })
}

/// Answers `_search` requests by decoding the `query` parameter and slicing the collection
pub struct PagingResponder {
    documents: Vec<Value>,
    fail_at: Option<u64>,
}

impl PagingResponder {
    /// Serve `documents`, failing with HTTP 500 for the page at `fail_at`
    pub fn new(documents: Vec<Value>, fail_at: Option<u64>) -> Self {
        Self { documents, fail_at }
    }
}

impl Respond for PagingResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Some(page) = page_of(request) else {
            return ResponseTemplate::new(400).set_body_string("missing query");
        };
        if self.fail_at == Some(page.offset) {
            return ResponseTemplate::new(500).set_body_string("internal error");
        }
        let result = slice_page(&self.documents, page);
        ResponseTemplate::new(200).set_body_json(json!({
            "total": result.total,
            "queryTime": 1,
            "documents": result.documents,
        }))
    }
}

/// Page requested by a recorded `_search` request
pub fn page_of(request: &Request) -> Option<PageDescriptor> {
    let (_, query) = request.url.query_pairs().find(|(key, _)| key == "query")?;
    let query: Value = serde_json::from_str(&query).ok()?;
    Some(PageDescriptor {
        limit: query["limit"].as_u64()?,
        offset: query["offset"].as_u64()?,
    })
}

/// Start a mock service paging through `documents`
pub async fn start_service(documents: Vec<Value>, fail_at: Option<u64>) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{TEST_COLLECTION}/_search")))
        .and(header("cookie", format!("access_token={TEST_TOKEN}").as_str()))
        .respond_with(PagingResponder::new(documents, fail_at))
        .mount(&server)
        .await;
    server
}

/// Offsets of every `_search` request the server received, sorted
pub async fn requested_offsets(server: &MockServer) -> Vec<u64> {
    let mut offsets: Vec<u64> = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(page_of)
        .map(|page| page.offset)
        .collect();
    offsets.sort_unstable();
    offsets
}
