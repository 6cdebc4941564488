use std::time::Duration;

use reqwest::StatusCode;
use url::Url;

/// The internal HTTP client is already wrapper in `Arc`, so that means that the
/// downloader is cheap to clone.
#[derive(Debug, Clone)]
pub(crate) struct Downloader(reqwest::Client);

impl Downloader {
    /// Every request made through the downloader gives up after `timeout`.
    pub(crate) fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self(client))
    }

    /// Fetch the body of the page at `url`.
    pub(crate) async fn download(&self, url: &Url) -> anyhow::Result<String> {
        Ok(self.0.get(url.as_str()).send().await?.text().await?)
    }

    /// Issue a GET to `url` and report the final status, after redirects.
    pub(crate) async fn status(&self, url: &Url) -> anyhow::Result<StatusCode> {
        Ok(self.0.get(url.as_str()).send().await?.status())
    }
}
