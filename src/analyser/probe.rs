use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use tokio::sync::{mpsc, Semaphore};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn, Instrument, Span};
use url::Url;

use super::link;
use crate::downloader::Downloader;

/// Limits applied to reachability probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ProbeSettings {
    /// Maximum number of probes in flight at once.
    pub(crate) concurrency: usize,
    /// A probe that takes longer than this counts as inaccessible.
    pub(crate) timeout: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            concurrency: 16,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Checks whether the links found on a page can be reached.
///
/// A link is inaccessible when the request fails, times out or ends with a status outside 2xx.
/// Only `http` and `https` targets are probed.
#[derive(Debug, Clone)]
pub(crate) struct Prober {
    downloader: Downloader,
    settings: ProbeSettings,
}

impl Prober {
    pub(crate) fn new(downloader: Downloader, settings: ProbeSettings) -> Self {
        Self {
            downloader,
            settings,
        }
    }

    /// Probe every href found on the page at `base` and count the ones that cannot be reached.
    /// Hrefs that do not even parse as URLs count as inaccessible without a request.
    /// Hrefs with a scheme other than `http`/`https` get no request and are not counted.
    pub(crate) async fn count_inaccessible<I>(&self, base: &Url, hrefs: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut inaccessible = 0;
        let mut targets = Vec::new();

        for href in hrefs {
            if link::is_fragment(&href) {
                continue;
            }

            match link::resolve(base, &href) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => targets.push(url),
                Ok(url) => debug!("Not probing {}, unsupported scheme", url),
                Err(e) => {
                    warn!("Encountered unparseable URL in href {:?}: {}", href, e);
                    inaccessible += 1;
                }
            }
        }

        let issued = targets.len();
        info!("Probing {} links", issued);

        // Give each probe a `Sender`. Every probe reports exactly once, so the aggregation below
        // stops after `issued` messages.
        let (tx, rx) = mpsc::channel(issued.max(1));
        let limit = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));

        for url in targets {
            let tx = tx.clone();
            let limit = Arc::clone(&limit);
            let downloader = self.downloader.clone();
            let timeout = self.settings.timeout;

            tokio::spawn(
                async move {
                    let accessible = match limit.acquire_owned().await {
                        Ok(_permit) => probe(&downloader, &url, timeout).await,
                        Err(_) => false,
                    };

                    if tx.send(accessible).await.is_err() {
                        info!("Failed to send. Receiver has probably shut down");
                    }
                }
                .instrument(Span::current()),
            );
        }
        drop(tx);

        let (received, unreachable) = ReceiverStream::new(rx)
            .take(issued)
            .fold((0usize, 0usize), |(received, unreachable), accessible| async move {
                (received + 1, unreachable + usize::from(!accessible))
            })
            .await;

        // A probe that died before reporting is as good as unreachable.
        if received < issued {
            warn!("{} probes ended without a result", issued - received);
        }

        inaccessible + unreachable + (issued - received)
    }
}

/// Returns `true` when `url` answers with a 2xx status within `timeout`.
async fn probe(downloader: &Downloader, url: &Url, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, downloader.status(url)).await {
        Ok(Ok(status)) if status.is_success() => true,
        Ok(Ok(status)) => {
            info!("Link {} responded with {}", url, status);
            false
        }
        Ok(Err(e)) => {
            info!("GET request to {} failed: {}", url, e);
            false
        }
        Err(_) => {
            info!("GET request to {} timed out", url);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use mockito::mock;
    use url::Url;

    use super::{ProbeSettings, Prober};
    use crate::{downloader::Downloader, tests::silent_server};

    fn prober(settings: ProbeSettings) -> Prober {
        Prober::new(Downloader::new(Duration::from_secs(10)).unwrap(), settings)
    }

    fn hrefs(hrefs: &[&str]) -> Vec<String> {
        hrefs.iter().map(|href| href.to_string()).collect()
    }

    #[tokio::test]
    async fn test_count_inaccessible() {
        let _m = mock("GET", "/probe/ok")
            .with_status(200)
            .with_body("ok")
            .create();
        let _m = mock("GET", "/probe/created")
            .with_status(201)
            .create();
        let _m = mock("GET", "/probe/missing")
            .with_status(404)
            .create();
        let _m = mock("GET", "/probe/forbidden")
            .with_status(403)
            .create();
        let _m = mock("GET", "/probe/broken")
            .with_status(500)
            .create();

        let base = Url::parse(&mockito::server_url()).unwrap();
        let count = prober(ProbeSettings::default())
            .count_inaccessible(
                &base,
                hrefs(&[
                    "/probe/ok",
                    "probe/created",
                    "/probe/missing",
                    "/probe/forbidden",
                    &format!("{}/probe/broken", mockito::server_url()),
                    "http://127.0.0.1:1/refused",
                ]),
            )
            .await;

        assert_eq!(count, 4);
    }

    #[tokio::test]
    async fn test_skipped_and_unparseable_hrefs() {
        let base = Url::parse(&mockito::server_url()).unwrap();
        let count = prober(ProbeSettings::default())
            .count_inaccessible(
                &base,
                hrefs(&[
                    "#top",
                    "mailto:someone@example.com",
                    "javascript:void(0)",
                    "http://[::1",
                ]),
            )
            .await;

        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_unanswered_links_time_out() {
        let base = silent_server().await;
        let settings = ProbeSettings {
            concurrency: 2,
            timeout: Duration::from_millis(200),
        };

        let started = Instant::now();
        let count = prober(settings)
            .count_inaccessible(&base, hrefs(&["/a", "/b", "/c", "mailto:x@y.z"]))
            .await;

        assert_eq!(count, 3);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_no_links() {
        let base = Url::parse("https://example.com").unwrap();
        let count = prober(ProbeSettings::default())
            .count_inaccessible(&base, Vec::new())
            .await;

        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_many_links_with_small_pool() {
        let _m = mock("GET", "/probe/pooled")
            .with_status(200)
            .expect(25)
            .create();

        let base = Url::parse(&mockito::server_url()).unwrap();
        let settings = ProbeSettings {
            concurrency: 3,
            timeout: Duration::from_secs(10),
        };

        let links = vec!["/probe/pooled".to_string(); 25];
        let count = prober(settings).count_inaccessible(&base, links).await;

        assert_eq!(count, 0);
        _m.assert();
    }
}
