//! Auxiliary type declarations for the editing surface.
//!
//! Fetched once when the host starts. A failed fetch only means the editor
//! has fewer hints, so failures are logged and skipped.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;

use playground_core::{DeclarationFetcher, DeclarationSource, FetchError, TypeDeclaration};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// [`DeclarationFetcher`] backed by an HTTP client.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing client, e.g. one with proxy settings.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeclarationFetcher for HttpFetcher {
    async fn fetch(&self, source: &DeclarationSource) -> Result<TypeDeclaration, FetchError> {
        let response = self
            .client
            .get(&source.url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: source.url.clone(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;
        Ok(TypeDeclaration {
            name: source.name.clone(),
            text,
        })
    }
}

/// Fetch every source concurrently, keeping the ones that succeed in
/// configuration order.
pub async fn fetch_declarations(
    fetcher: &dyn DeclarationFetcher,
    sources: &[DeclarationSource],
) -> Vec<TypeDeclaration> {
    let results = join_all(sources.iter().map(|source| fetcher.fetch(source))).await;
    results
        .into_iter()
        .zip(sources)
        .filter_map(|(result, source)| match result {
            Ok(declaration) => Some(declaration),
            Err(e) => {
                tracing::debug!(name = %source.name, "Skipping declaration file: {e}");
                None
            }
        })
        .collect()
}
