//! Simulator client: the snapshot source plus fire-and-forget commands.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::types::{AddProcessRequest, AggregateSnapshot};

/// Everything the monitor needs from upstream. Commands only matter through
/// the next snapshot they cause.
#[async_trait]
pub trait Simulator: Send + Sync + 'static {
    async fn fetch(&self) -> Result<AggregateSnapshot>;
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    async fn add_process(&self, req: &AddProcessRequest) -> Result<()>;
}

/// JSON-over-HTTP simulator at `{base}/metrics`, `{base}/start`, ...
#[derive(Debug, Clone)]
pub struct HttpSimulator {
    client: reqwest::Client,
    base: Url,
}

impl HttpSimulator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = parse_base(base_url)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("schedwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base.join(path).map_err(|source| Error::InvalidUrl {
            url: format!("{}{path}", self.base),
            source,
        })
    }

    async fn post(&self, endpoint: &'static str, body: Option<&AddProcessRequest>) -> Result<()> {
        let mut req = self.client.post(self.endpoint(endpoint)?);
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status {
                endpoint,
                status: status.as_u16(),
            });
        }
        debug!(endpoint, status = status.as_u16(), "command accepted");
        Ok(())
    }
}

// Trailing slash matters: without it Url::join replaces the last segment.
fn parse_base(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash).map_err(|source| Error::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::InvalidRequest(format!(
            "unsupported scheme '{other}' (expected http or https)"
        ))),
    }
}

#[async_trait]
impl Simulator for HttpSimulator {
    async fn fetch(&self) -> Result<AggregateSnapshot> {
        let resp = self.client.get(self.endpoint("metrics")?).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status {
                endpoint: "metrics",
                status: status.as_u16(),
            });
        }
        Ok(resp.json::<AggregateSnapshot>().await?)
    }

    async fn start(&self) -> Result<()> {
        self.post("start", None).await
    }

    async fn stop(&self) -> Result<()> {
        self.post("stop", None).await
    }

    async fn add_process(&self, req: &AddProcessRequest) -> Result<()> {
        self.post("add_process", Some(req)).await
    }
}
