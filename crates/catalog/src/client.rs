//! HTTP client for the commerce platform's product API.

use std::time::Duration;

use {
    async_trait::async_trait,
    reqwest::{Client, StatusCode, header::RETRY_AFTER},
    secrecy::{ExposeSecret, Secret},
    shelfsync_config::CatalogConfig,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use shelfsync_metrics::{counter, sync as sync_metrics};

use crate::{
    Error, Result,
    source::CatalogSource,
    types::{ProductPage, RemoteProduct},
};

/// Fields requested for every listing; everything else is ignored.
const PRODUCT_FIELDS: &str =
    "id,title,body_html,vendor,product_type,tags,variants,images,created_at,updated_at";

/// Sleep used when a 429 arrives without a usable `Retry-After`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(2);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Catalog backed by `GET {base_url}/products.json`.
pub struct HttpCatalog {
    client: Client,
    base_url: String,
    store_name: String,
    access_token: Option<Secret<String>>,
    page_size: u32,
    max_retries: u32,
}

impl HttpCatalog {
    /// Build a client from config. Missing credentials are not an error here;
    /// they fail the first page request so the run that needed them records why.
    pub fn from_config(config: &CatalogConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(concat!("shelfsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| Error::transport("failed to build HTTP client", source))?;

        Ok(Self {
            client,
            base_url: config.resolved_base_url(),
            store_name: config.store_name.clone(),
            access_token: config.access_token.clone(),
            page_size: config.page_size,
            max_retries: config.max_retries,
        })
    }

    fn token(&self) -> Result<&str> {
        let token = self
            .access_token
            .as_ref()
            .map(|t| t.expose_secret().as_str())
            .filter(|t| !t.trim().is_empty());
        match token {
            Some(t) if !self.store_name.trim().is_empty() => Ok(t),
            _ => Err(Error::MissingCredentials),
        }
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    fn page_size(&self) -> u32 {
        self.page_size
    }

    async fn fetch_page(&self, page_size: u32, page: u32) -> Result<Vec<RemoteProduct>> {
        let token = self.token()?;
        let url = format!("{}/products.json", self.base_url);
        let mut attempt = 0;

        loop {
            debug!(page, page_size, attempt, "requesting catalog page");
            #[cfg(feature = "metrics")]
            counter!(sync_metrics::CATALOG_PAGES_TOTAL).increment(1);

            let resp = self
                .client
                .get(&url)
                .header("X-Shopify-Access-Token", token)
                .header("Accept", "application/json")
                .query(&[
                    ("limit", page_size.to_string()),
                    ("page", page.to_string()),
                    ("fields", PRODUCT_FIELDS.to_string()),
                ])
                .send()
                .await
                .map_err(|source| {
                    Error::transport(format!("failed to fetch catalog page {page}"), source)
                })?;

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS && attempt < self.max_retries {
                let wait = retry_after(resp.headers());
                warn!(
                    page,
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    "catalog rate limited, backing off"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
                continue;
            }

            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(Error::Rejected {
                    status: status.as_u16(),
                    body,
                });
            }

            let body = resp.text().await.map_err(|source| {
                Error::transport(format!("failed to read catalog page {page}"), source)
            })?;
            let parsed: ProductPage =
                serde_json::from_str(&body).map_err(|source| Error::Decode { page, source })?;
            return Ok(parsed.products);
        }
    }
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map_or(DEFAULT_RETRY_AFTER, Duration::from_secs_f64)
        .min(MAX_RETRY_AFTER)
}
