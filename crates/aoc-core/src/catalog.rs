//! Resolve a problem identity to its statement.

use std::sync::Arc;

use tracing::debug;

use crate::capability::StatementFetcher;
use crate::error::{CatalogError, FetchError};
use crate::markup;
use crate::model::{AoCProblem, ProblemIdentity, ProblemPart};

pub const DEFAULT_BASE_URL: &str = "https://adventofcode.com";

/// Problem catalog backed by a scraping collaborator.
///
/// Transport failures are propagated as-is; retrying is the fetcher's job.
pub struct ProblemCatalog {
    fetcher: Arc<dyn StatementFetcher>,
    base_url: String,
}

impl ProblemCatalog {
    pub fn new(fetcher: Arc<dyn StatementFetcher>) -> Self {
        Self::with_base_url(fetcher, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(fetcher: Arc<dyn StatementFetcher>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { fetcher, base_url }
    }

    /// Page URL for an identity. Both parts share one page.
    #[must_use]
    pub fn url_for(&self, identity: &ProblemIdentity) -> String {
        format!("{}/{}/day/{}", self.base_url, identity.year(), identity.day())
    }

    pub async fn fetch(&self, identity: ProblemIdentity) -> Result<AoCProblem, CatalogError> {
        let url = self.url_for(&identity);
        debug!(event = "catalog.fetch", identity = %identity, url = %url);

        let page = self
            .fetcher
            .fetch_statement(&url)
            .await
            .map_err(|e| match e {
                FetchError::NotFound { url } => CatalogError::NotFound {
                    identity,
                    reason: format!("no page at {url}"),
                },
                FetchError::Transport { reason, .. } => CatalogError::Transport(reason),
            })?;

        let articles = markup::articles(&page);
        let (statement, preamble) = match identity.part() {
            ProblemPart::One => (articles.first(), None),
            ProblemPart::Two => (articles.get(1), articles.first()),
        };

        let Some(statement) = statement else {
            return Err(CatalogError::NotFound {
                identity,
                reason: format!(
                    "page has {} part article(s); part {} is not available",
                    articles.len(),
                    identity.part().number()
                ),
            });
        };

        let title = markup::title(&page).unwrap_or_else(|| format!("Day {}", identity.day()));

        Ok(AoCProblem {
            identity,
            title,
            statement: statement.clone(),
            preamble: preamble.cloned().unwrap_or_default(),
            url,
        })
    }
}
