/*!
 * Chromium Engine
 * Headless Chromium driven over the DevTools protocol
 */

use super::cdp::CdpConnection;
use super::driver::{EngineDriver, RenderEngine};
use super::types::{EngineError, EngineResult, LaunchConfig, PdfOptions};
use crate::core::limits::{ENGINE_CLOSE_TIMEOUT, ENGINE_HANDSHAKE_TIMEOUT, PAGE_LOAD_TIMEOUT};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use log::{debug, info, warn};
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, Mutex};
use tokio::time::timeout;

/// Launches headless Chromium engines
pub struct ChromiumDriver {
    config: LaunchConfig,
}

impl ChromiumDriver {
    pub fn new(config: LaunchConfig) -> Self {
        Self { config }
    }
}

impl Default for ChromiumDriver {
    fn default() -> Self {
        Self::new(LaunchConfig::resolve())
    }
}

#[async_trait]
impl EngineDriver for ChromiumDriver {
    async fn launch(&self) -> EngineResult<Arc<dyn RenderEngine>> {
        let engine = ChromiumEngine::launch(&self.config).await?;
        Ok(Arc::new(engine))
    }
}

/// One long-lived headless Chromium process plus its DevTools connection
pub struct ChromiumEngine {
    child: Mutex<Child>,
    conn: CdpConnection,
    open_pages: AtomicUsize,
    /// Profile directory; removed from disk when the engine is dropped
    _profile_dir: TempDir,
}

impl ChromiumEngine {
    async fn launch(config: &LaunchConfig) -> EngineResult<Self> {
        let profile_dir = TempDir::new()?;

        let mut cmd = Command::new(&config.binary);
        cmd.arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--hide-scrollbars")
            .arg("--mute-audio")
            .arg("--no-first-run")
            .arg("--remote-debugging-port=0")
            .arg(format!("--user-data-dir={}", profile_dir.path().display()));
        if !config.sandbox {
            cmd.arg("--no-sandbox").arg("--disable-dev-shm-usage");
        }
        cmd.args(&config.extra_args);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            EngineError::LaunchFailed(format!("{}: {}", config.binary.display(), e))
        })?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::LaunchFailed("stderr not captured".to_string()))?;

        let ws_url = timeout(
            ENGINE_HANDSHAKE_TIMEOUT,
            read_devtools_banner(BufReader::new(stderr)),
        )
        .await
        .map_err(|_| EngineError::HandshakeTimeout)??;

        debug!("DevTools endpoint ready at {}", ws_url);
        let conn = CdpConnection::connect(&ws_url).await?;

        info!("Launched rendering engine (OS PID {:?})", child.id());

        Ok(Self {
            child: Mutex::new(child),
            conn,
            open_pages: AtomicUsize::new(0),
            _profile_dir: profile_dir,
        })
    }

    async fn print_target(
        &self,
        target_id: &str,
        html: &str,
        options: &PdfOptions,
    ) -> EngineResult<Bytes> {
        let attached = self
            .conn
            .call(
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
                None,
            )
            .await?;
        let session_id = require_str(&attached, "sessionId")?.to_string();
        let session = Some(session_id.as_str());

        self.conn.call("Page.enable", json!({}), session).await?;

        // Subscribe before navigating so the load event cannot slip past
        let events = self.conn.subscribe();
        let data_url = format!("data:text/html;base64,{}", BASE64.encode(html));
        self.conn
            .call("Page.navigate", json!({ "url": data_url }), session)
            .await?;

        timeout(PAGE_LOAD_TIMEOUT, wait_for_load(events, &session_id))
            .await
            .map_err(|_| EngineError::PageLoadTimeout(PAGE_LOAD_TIMEOUT))??;

        let printed = self
            .conn
            .call("Page.printToPDF", serde_json::to_value(options)?, session)
            .await?;
        let encoded = require_str(&printed, "data")?;
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| EngineError::InvalidPayload(e.to_string()))?;
        Ok(Bytes::from(bytes))
    }
}

#[async_trait]
impl RenderEngine for ChromiumEngine {
    async fn render_pdf(&self, html: &str, options: &PdfOptions) -> EngineResult<Bytes> {
        let created = self
            .conn
            .call("Target.createTarget", json!({ "url": "about:blank" }), None)
            .await?;
        let target_id = require_str(&created, "targetId")?.to_string();
        self.open_pages.fetch_add(1, Ordering::SeqCst);

        let result = self.print_target(&target_id, html, options).await;

        // Best-effort page close; a failure here leaves the page open until
        // the pool's health check recycles the whole engine
        match self
            .conn
            .call("Target.closeTarget", json!({ "targetId": target_id }), None)
            .await
        {
            Ok(_) => {
                self.open_pages.fetch_sub(1, Ordering::SeqCst);
            }
            Err(e) => warn!("Failed to close page target {}: {}", target_id, e),
        }

        result
    }

    fn open_pages(&self) -> usize {
        self.open_pages.load(Ordering::SeqCst)
    }

    async fn close(&self) -> EngineResult<()> {
        if let Err(e) = self.conn.call("Browser.close", json!({}), None).await {
            debug!("Browser.close failed, falling back to kill: {}", e);
        }
        let mut child = self.child.lock().await;
        match timeout(ENGINE_CLOSE_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Engine exited with {}", status);
                Ok(())
            }
            Ok(Err(e)) => Err(EngineError::CloseFailed(e.to_string())),
            Err(_) => {
                warn!("Engine did not exit within {:?}, killing", ENGINE_CLOSE_TIMEOUT);
                child
                    .kill()
                    .await
                    .map_err(|e| EngineError::CloseFailed(e.to_string()))?;
                Ok(())
            }
        }
    }
}

/// Scan engine stderr for the `DevTools listening on ws://…` banner
async fn read_devtools_banner<R: AsyncBufRead + Unpin>(reader: R) -> EngineResult<String> {
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(rest) = line.strip_prefix("DevTools listening on ") {
            return Ok(rest.trim().to_string());
        }
    }
    Err(EngineError::LaunchFailed(
        "engine exited before the DevTools endpoint appeared".to_string(),
    ))
}

async fn wait_for_load(
    mut events: broadcast::Receiver<super::cdp::CdpEvent>,
    session_id: &str,
) -> EngineResult<()> {
    loop {
        match events.recv().await {
            Ok(event)
                if event.method == "Page.loadEventFired"
                    && event.session_id.as_deref() == Some(session_id) =>
            {
                return Ok(());
            }
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => {
                return Err(EngineError::Connection(
                    "DevTools stream closed while loading".to_string(),
                ));
            }
        }
    }
}

fn require_str<'a>(value: &'a Value, field: &str) -> EngineResult<&'a str> {
    value
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::InvalidPayload(format!("missing {} field", field)))
}
