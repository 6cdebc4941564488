mod extract;
mod link;
mod probe;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn, Instrument, Span};
use url::Url;

pub(crate) use extract::{HeadingsCount, LinksCount};
pub(crate) use probe::{ProbeSettings, Prober};

use crate::tokenizer::{Html5Tokenizer, Tokenize, TokenizeError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalyseError {
    #[error("document could not be tokenized: {0}")]
    ParseFailure(#[from] TokenizeError),
}

/// Structural report of a single page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub html_version: String,
    pub page_title: String,
    #[serde(rename = "headings")]
    pub headings_by_level: HeadingsCount,
    pub links_by_type: LinksCount,
    pub inaccessible_links: usize,
    pub login_form: bool,
}

/// The parts of the report that only depend on the document text and its URL.
#[derive(Debug)]
struct Structure {
    html_version: String,
    page_title: String,
    headings_by_level: HeadingsCount,
    links_by_type: LinksCount,
    login_form: bool,
}

impl Structure {
    /// Run every extractor, each one on its own stream over `document`.
    fn extract<T: Tokenize>(tokenizer: &T, document: &str, url: &Url) -> Self {
        Self {
            html_version: extract::html_version(tokenizer.stream(document)),
            page_title: extract::page_title(tokenizer.stream(document)),
            headings_by_level: extract::headings_by_level(tokenizer.stream(document)),
            links_by_type: extract::links_by_type(tokenizer.stream(document), url),
            login_form: extract::has_login_form(tokenizer.stream(document)),
        }
    }
}

/// Analyses one HTML document fetched from `url`.
///
/// An analyser is built for a single document and consumed by [`Analyser::analyse`].
#[derive(Debug)]
pub(crate) struct Analyser<T = Html5Tokenizer> {
    document: Arc<str>,
    url: Url,
    tokenizer: Arc<T>,
    prober: Prober,
    span: Span,
}

impl Analyser<Html5Tokenizer> {
    pub(crate) fn new(document: impl Into<Arc<str>>, url: Url, prober: Prober) -> Self {
        Self::with_tokenizer(document, url, prober, Arc::new(Html5Tokenizer))
    }
}

impl<T> Analyser<T>
where
    T: Tokenize + Send + Sync + 'static,
{
    pub(crate) fn with_tokenizer(
        document: impl Into<Arc<str>>,
        url: Url,
        prober: Prober,
        tokenizer: Arc<T>,
    ) -> Self {
        let span = info_span!("analyse", url = %url);

        Self {
            document: document.into(),
            url,
            tokenizer,
            prober,
            span,
        }
    }

    /// Validate the document with a full pass, then run every analysis over it.
    /// Fails with [`AnalyseError::ParseFailure`] before any analysis runs if the document does
    /// not tokenize cleanly to the end.
    pub(crate) async fn analyse(self) -> Result<Report, AnalyseError> {
        let span = self.span.clone();
        self.run().instrument(span).await
    }

    async fn run(self) -> Result<Report, AnalyseError> {
        let hrefs = {
            let tokenizer = Arc::clone(&self.tokenizer);
            let document = Arc::clone(&self.document);
            let span = Span::current();

            tokio::task::spawn_blocking(move || {
                span.in_scope(|| {
                    info!("Running test pass on html document");
                    prepass(tokenizer.as_ref(), &document)?;
                    info!("Test pass on html document succeeded");

                    Ok::<Vec<String>, TokenizeError>(
                        link::hrefs(tokenizer.stream(&document)).collect(),
                    )
                })
            })
        };

        let hrefs = match join_blocking(hrefs).await {
            Ok(hrefs) => hrefs,
            Err(e) => {
                warn!("Test pass on html document failed: {}", e);
                return Err(e.into());
            }
        };

        let structure = {
            let tokenizer = Arc::clone(&self.tokenizer);
            let document = Arc::clone(&self.document);
            let url = self.url.clone();
            let span = Span::current();

            tokio::task::spawn_blocking(move || {
                span.in_scope(|| Structure::extract(tokenizer.as_ref(), &document, &url))
            })
        };

        let (structure, inaccessible_links) = tokio::join!(
            join_blocking(structure),
            self.prober.count_inaccessible(&self.url, hrefs)
        );

        info!(
            "Analysis done: {} headings, {} inaccessible links",
            structure.headings_by_level.total(),
            inaccessible_links
        );

        Ok(Report {
            html_version: structure.html_version,
            page_title: structure.page_title,
            headings_by_level: structure.headings_by_level,
            links_by_type: structure.links_by_type,
            inaccessible_links,
            login_form: structure.login_form,
        })
    }
}

/// Wait for a blocking scan, re-raising its panic if it had one.
async fn join_blocking<R>(handle: JoinHandle<R>) -> R {
    match handle.await {
        Ok(result) => result,
        Err(e) => std::panic::resume_unwind(e.into_panic()),
    }
}

/// Run a stream over `document` to the end, surfacing the terminal error if there is one.
fn prepass<T: Tokenize>(tokenizer: &T, document: &str) -> Result<(), TokenizeError> {
    tokenizer.stream(document).try_for_each(|token| token.map(drop))
}
