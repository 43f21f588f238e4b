//! HTTP input fetcher
//!
//! Builds one outbound request per configured URL, sends it, and hands the
//! parsed response to an [`Accumulator`]. The request body is owned by a
//! [`BodyGuard`] until it is attached to the request; every failure before
//! that point closes it here, every failure after it drops the request that
//! owns it. Either way the body is closed exactly once before the call returns.

use futures::future::join_all;
use reqwest::{Client, Method, Request, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    auth::{Augmenter, ConfigAugmenter},
    body::{default_body_factory, BodyFactory, BodyGuard},
    config::HttpInputConfig,
    error::FetchError,
    metric::Accumulator,
    parser::parse_metrics,
};

/// Polled HTTP metrics input
pub struct HttpInput {
    config: HttpInputConfig,
    client: Client,
    body_factory: BodyFactory,
    augmenter: Arc<dyn Augmenter>,
}

impl HttpInput {
    /// Create an input with the default body factory and the configured augmenter
    pub fn new(config: HttpInputConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(FetchError::ClientBuild)?;
        let augmenter = Arc::new(ConfigAugmenter::from_config(&config));

        Ok(Self {
            config,
            client,
            body_factory: default_body_factory(),
            augmenter,
        })
    }

    /// Replace the function that builds request bodies
    pub fn with_body_factory(mut self, body_factory: BodyFactory) -> Self {
        self.body_factory = body_factory;
        self
    }

    /// Replace the pre-send augmentation step
    pub fn with_augmenter(mut self, augmenter: Arc<dyn Augmenter>) -> Self {
        self.augmenter = augmenter;
        self
    }

    /// Fetch every configured URL concurrently
    ///
    /// Failures are reported to the accumulator and do not stop other URLs.
    /// Returns the number of URLs that failed.
    pub async fn gather(&self, acc: &dyn Accumulator) -> usize {
        let fetches = self.config.urls.iter().map(|url| async move {
            let result = self.gather_url(acc, url).await;
            (url, result)
        });

        let mut failures = 0;
        for (url, result) in join_all(fetches).await {
            if let Err(e) = result {
                warn!(url = %url, stage = e.stage(), error = %e, "Failed to gather URL");
                acc.add_error(url, &e);
                failures += 1;
            }
        }
        failures
    }

    /// Fetch a single URL and push its metrics into `acc`
    pub async fn gather_url(&self, acc: &dyn Accumulator, url: &str) -> Result<(), FetchError> {
        let mut body = (self.body_factory)(self.config.content_encoding, &self.config.body)
            .map(BodyGuard::new);

        let mut request = match build_request(&self.config.method, url) {
            Ok(request) => request,
            Err(e) => {
                if let Some(guard) = body.as_mut() {
                    release(guard);
                }
                return Err(e);
            }
        };

        // Ownership of the body moves into the request here
        if let Some(guard) = body.take() {
            *request.body_mut() = Some(guard.into_body());
        }

        if let Err(e) = self.augmenter.augment(&mut request).await {
            // Never sent, so nothing downstream will release the body
            drop(request.body_mut().take());
            return Err(e);
        }

        debug!(url = %url, method = %request.method(), "Sending request");
        let response = self
            .client
            .execute(request)
            .await
            .map_err(FetchError::Transport)?;

        let status = response.status().as_u16();
        if !self.config.success_status_codes.contains(&status) {
            return Err(FetchError::UnexpectedStatus {
                status,
                expected: self.config.success_status_codes.clone(),
            });
        }

        let text = response.text().await.map_err(FetchError::ReadBody)?;
        let metrics = parse_metrics(&text).map_err(FetchError::Parse)?;
        debug!(url = %url, count = metrics.len(), "Parsed metrics");

        for mut metric in metrics {
            if !metric.has_tag("url") {
                metric.add_tag("url", url);
            }
            acc.add_metric(metric);
        }

        Ok(())
    }
}

/// Build the request envelope; an empty method means GET
fn build_request(method: &str, url: &str) -> Result<Request, FetchError> {
    let method = if method.is_empty() {
        Method::GET
    } else {
        Method::from_bytes(method.as_bytes()).map_err(|_| FetchError::InvalidMethod {
            method: method.to_string(),
        })?
    };

    let url = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;

    Ok(Request::new(method, url))
}

fn release(guard: &mut BodyGuard) {
    if let Err(e) = guard.close() {
        debug!(error = %e, "Closing unsent request body failed");
    }
}
