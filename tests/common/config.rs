//! Configuration builders pointing at a mock data service

use collection_fetch::{Config, FetchConfig, FetchMode, OutputTarget, ServiceConfig};
use std::path::Path;
use wiremock::MockServer;

/// Token every mock service expects in the `access_token` cookie
pub const TEST_TOKEN: &str = "test-token";

/// Collection served by the mock service
pub const TEST_COLLECTION: &str = "movies";

/// Service settings for `server`
pub fn service_config(server: &MockServer) -> ServiceConfig {
    ServiceConfig {
        base_url: server.uri(),
        collection: TEST_COLLECTION.to_string(),
        token: TEST_TOKEN.to_string(),
        ..Default::default()
    }
}

/// Complete config writing the collection to `path`
pub fn file_config(server: &MockServer, path: &Path, page_size: u64, mode: FetchMode) -> Config {
    Config {
        service: service_config(server),
        fetch: FetchConfig {
            page_size,
            mode,
            max_concurrent_pages: None,
        },
        output: OutputTarget::File {
            path: path.to_path_buf(),
            atomic_write: false,
        },
    }
}
