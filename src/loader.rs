//! Vendor script loading
//!
//! Ensures each external script URL is fetched and executed at most once per
//! process. Concurrent loads of the same URL collapse onto one in-flight
//! delivery; a failed load is evicted so the next call retries the fetch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, warn};

#[derive(Debug, Clone, Error)]
pub enum ScriptLoadError {
    #[error("Failed to load script: {url} ({message})")]
    Failed { url: String, message: String },

    #[error("Script request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("HTTP status {status} while fetching script")]
    Http { status: u16 },

    #[error("Script load interrupted before completion")]
    Interrupted,
}

impl From<reqwest::Error> for ScriptLoadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ScriptLoadError::Timeout { seconds: 0 }
        } else if let Some(status) = err.status() {
            ScriptLoadError::Http {
                status: status.as_u16(),
            }
        } else {
            ScriptLoadError::Failed {
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
                message: err.to_string(),
            }
        }
    }
}

/// Host-side script delivery: fetch the script at `url` and execute it in
/// the embedding runtime. Implemented by the embedding application or by
/// [`HttpDelivery`].
#[async_trait]
pub trait ScriptDelivery: Send + Sync {
    async fn deliver(&self, url: &str) -> Result<(), ScriptLoadError>;
}

type LoadResult = Result<(), ScriptLoadError>;

enum LoadState {
    Loaded,
    InFlight(watch::Receiver<Option<LoadResult>>),
}

enum Role {
    Driver(watch::Sender<Option<LoadResult>>),
    Waiter(watch::Receiver<Option<LoadResult>>),
}

/// Process-wide, URL-keyed memoization over a [`ScriptDelivery`].
pub struct ScriptLoader {
    delivery: Arc<dyn ScriptDelivery>,
    scripts: Mutex<HashMap<String, LoadState>>,
}

impl ScriptLoader {
    pub fn new(delivery: Arc<dyn ScriptDelivery>) -> Self {
        Self {
            delivery,
            scripts: Mutex::new(HashMap::new()),
        }
    }

    /// True once `url` has been delivered successfully.
    pub fn is_loaded(&self, url: &str) -> bool {
        matches!(
            self.scripts.lock().unwrap().get(url),
            Some(LoadState::Loaded)
        )
    }

    /// Load `url` at most once. The first caller drives the delivery;
    /// concurrent callers await the same result. A rejected load evicts the
    /// entry so a later call re-attempts the fetch.
    pub async fn ensure_loaded(&self, url: &str) -> LoadResult {
        let role = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get(url) {
                Some(LoadState::Loaded) => return Ok(()),
                Some(LoadState::InFlight(rx)) => Role::Waiter(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    scripts.insert(url.to_string(), LoadState::InFlight(rx));
                    Role::Driver(tx)
                }
            }
        };

        match role {
            Role::Driver(tx) => {
                debug!(url = url, "Loading provider script");
                let result = self.delivery.deliver(url).await;
                {
                    let mut scripts = self.scripts.lock().unwrap();
                    match &result {
                        Ok(()) => {
                            scripts.insert(url.to_string(), LoadState::Loaded);
                        }
                        Err(_) => {
                            scripts.remove(url);
                        }
                    }
                }
                if let Err(err) = &result {
                    warn!(url = url, error = %err, "Provider script load failed");
                }
                let _ = tx.send(Some(result.clone()));
                result
            }
            Role::Waiter(mut rx) => loop {
                if let Some(result) = rx.borrow_and_update().clone() {
                    return result;
                }
                if rx.changed().await.is_err() {
                    // driver dropped mid-flight; evict the stale entry so a
                    // later call can start over
                    let mut scripts = self.scripts.lock().unwrap();
                    if let Some(LoadState::InFlight(_)) = scripts.get(url) {
                        scripts.remove(url);
                    }
                    return Err(ScriptLoadError::Interrupted);
                }
            },
        }
    }
}

/// Closure the fetched script source is handed to for evaluation, keyed by
/// its URL.
pub type ScriptSink = Box<dyn Fn(&str, &str) + Send + Sync>;

/// reqwest-backed [`ScriptDelivery`]: fetches the vendor bundle over HTTPS
/// within a timeout and hands the source to the host's evaluator sink.
pub struct HttpDelivery {
    client: reqwest::Client,
    request_timeout: Duration,
    sink: ScriptSink,
}

impl HttpDelivery {
    pub fn new(sink: ScriptSink) -> Result<Self, ScriptLoadError> {
        Self::with_timeout(sink, Duration::from_secs(30))
    }

    pub fn with_timeout(sink: ScriptSink, request_timeout: Duration) -> Result<Self, ScriptLoadError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent("africapay/0.1")
            .build()
            .map_err(|e| ScriptLoadError::Failed {
                url: String::new(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            request_timeout,
            sink,
        })
    }
}

#[async_trait]
impl ScriptDelivery for HttpDelivery {
    async fn deliver(&self, url: &str) -> Result<(), ScriptLoadError> {
        let response = timeout(self.request_timeout, self.client.get(url).send())
            .await
            .map_err(|_| ScriptLoadError::Timeout {
                seconds: self.request_timeout.as_secs(),
            })?;

        let response = response?.error_for_status()?;
        let source = response.text().await?;

        debug!(url = url, bytes = source.len(), "Fetched provider script");
        (self.sink)(url, &source);
        Ok(())
    }
}
