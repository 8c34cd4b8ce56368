//! ==============================================================================
//! firebase.rs - realtime database history store
//! ==============================================================================
//!
//! purpose:
//!     implements HistoryStore over the firebase realtime database REST api.
//!     the log lives under one node; each snapshot is a child under a push id.
//!
//! wire mapping:
//!
//! ```text
//! append  POST   {url}/{node}.json                 -> {"name": "<push id>"}
//! keys    GET    {url}/{node}.json?shallow=true    -> {"<id>": true, ...} | null
//! remove  DELETE {url}/{node}/{id}.json
//! ```
//!
//! push ids are generated server-side and sort lexically in creation
//! order, so sorting the keys gives insertion order.
//!
//! relationships:
//!     - implements: history.rs (HistoryStore)
//!     - configured by: config.rs (FirebaseConfig)
//!
//! ==============================================================================

use crate::config::FirebaseConfig;
use crate::domain::SensorReading;
use crate::history::{HistoryStore, Result, StoreError};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FirebaseHistory {
    client: Client,
    base: Url,
    node: String,
    auth_token: String,
}

#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

impl FirebaseHistory {
    pub fn new(config: &FirebaseConfig) -> anyhow::Result<Self> {
        let mut base = Url::parse(&config.database_url)?;
        // Url::join drops the last segment unless the base ends with '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base,
            node: config.node.trim_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn url(&self, child: Option<&str>) -> Result<Url> {
        let path = match child {
            Some(key) => format!("{}/{}.json", self.node, key),
            None => format!("{}.json", self.node),
        };
        let mut url = self
            .base
            .join(&path)
            .map_err(|e| StoreError::Decode(format!("bad store path '{path}': {e}")))?;
        if !self.auth_token.is_empty() {
            url.query_pairs_mut().append_pair("auth", &self.auth_token);
        }
        Ok(url)
    }

    async fn get_node(&self, query: &[(&str, &str)]) -> Result<Value> {
        let mut url = self.url(None)?;
        url.query_pairs_mut().extend_pairs(query);
        let response = check(self.client.get(url).send().await?).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

/// turn a non-2xx answer into StoreError::Rejected
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Rejected {
        status: status.as_u16(),
        body,
    })
}

/// keys of a shallow node listing, in insertion order
fn sorted_keys(value: Value) -> Result<Vec<String>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => {
            let mut keys: Vec<String> = map.into_iter().map(|(k, _)| k).collect();
            keys.sort();
            Ok(keys)
        }
        other => Err(StoreError::Decode(format!(
            "expected an object of children, got {other}"
        ))),
    }
}

#[async_trait]
impl HistoryStore for FirebaseHistory {
    async fn append(&self, reading: &SensorReading) -> Result<String> {
        let url = self.url(None)?;
        let response = check(self.client.post(url).json(reading).send().await?).await?;
        let pushed: PushResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(pushed.name)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        sorted_keys(self.get_node(&[("shallow", "true")]).await?)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let url = self.url(Some(key))?;
        check(self.client.delete(url).send().await?).await?;
        Ok(())
    }
}
