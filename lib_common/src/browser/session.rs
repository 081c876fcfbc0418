//! # Browser Session Manager
//!
//! Owns every headless Chrome process the pipeline starts. Two modes exist:
//!
//! - **`PerCall`** (default): each acquisition launches a fresh browser that is
//!   torn down together with its page. Slower, but nothing leaks between
//!   adapters and concurrent jobs never share a process.
//! - **`Shared`**: one lazily launched browser per manager, reused across
//!   calls. Launch and page creation are serialised behind an async mutex.
//!
//! Chrome is started with the sandbox disabled so it can run inside
//! restricted containers. A launch failure is surfaced as
//! `BrowserError::LaunchFailed` and is never retried here. A shared browser
//! whose DevTools connection has ended, or that failed to open a page, is
//! dropped and relaunched by the next acquisition.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::{FutureExt, StreamExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use super::{BrowserError, PageRenderer, RenderRequest};

const MARKER_POLL_INTERVAL: Duration = Duration::from_millis(250);
const EXIT_GRACE: Duration = Duration::from_secs(10);

/// Browser lifecycle policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowserMode {
    /// A fresh browser per acquisition, closed with the page.
    #[default]
    PerCall,
    /// One long-lived browser shared by every acquisition.
    Shared,
}

/// Launch settings for Chrome.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub mode: BrowserMode,
    /// Explicit Chrome/Chromium binary; auto-detected when `None`.
    pub chrome_path: Option<PathBuf>,
    /// Bound for a single DevTools request.
    pub request_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            mode: BrowserMode::PerCall,
            chrome_path: None,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// A running browser process and the task pumping its DevTools events.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    async fn launch(options: &BrowserOptions) -> Result<Self, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .request_timeout(options.request_timeout);
        if let Some(path) = &options.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(BrowserError::LaunchFailed)?;

        let started = Instant::now();
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event error");
                }
            }
        });

        info!(elapsed_ms = started.elapsed().as_millis() as u64, "headless browser launched");
        Ok(Self { browser, handler })
    }

    async fn new_page(&self) -> Result<Page, BrowserError> {
        self.browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Page {
                url: "about:blank".to_string(),
                detail: e.to_string(),
            })
    }

    /// The handler task ends once the DevTools connection is gone.
    fn is_alive(&self) -> bool {
        !self.handler.is_finished()
    }

    async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "browser close command failed");
        }
        match timeout(EXIT_GRACE, self.browser.wait()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(error = %e, "waiting for browser exit failed"),
            Err(_) => {
                warn!(grace_secs = EXIT_GRACE.as_secs(), "browser did not exit, killing it");
                self.kill().await;
            }
        }
        self.handler.abort();
        debug!("headless browser shut down");
    }

    /// Tears down a session that can no longer be talked to.
    async fn discard(mut self) {
        self.kill().await;
        self.handler.abort();
        debug!("unresponsive browser discarded");
    }

    async fn kill(&mut self) {
        if let Some(Err(e)) = self.browser.kill().await {
            warn!(error = %e, "killing browser process failed");
        }
    }
}

/// A borrowed page. Hand it back through `BrowserManager::release_page`.
pub struct PageLease {
    page: Page,
    /// Set in `PerCall` mode: the browser dies with the lease.
    owned_session: Option<BrowserSession>,
}

impl PageLease {
    pub fn page(&self) -> &Page {
        &self.page
    }
}

/// Owner of the browser process(es) for one orchestrator instance.
pub struct BrowserManager {
    options: BrowserOptions,
    shared: Mutex<Option<BrowserSession>>,
    open_pages: AtomicUsize,
}

impl BrowserManager {
    pub fn new(options: BrowserOptions) -> Self {
        Self {
            options,
            shared: Mutex::new(None),
            open_pages: AtomicUsize::new(0),
        }
    }

    pub fn mode(&self) -> BrowserMode {
        self.options.mode
    }

    /// Pages currently handed out and not yet released.
    pub fn open_pages(&self) -> usize {
        self.open_pages.load(Ordering::SeqCst)
    }

    /// Whether the shared browser process is up. Always `false` in `PerCall` mode.
    pub async fn is_running(&self) -> bool {
        self.shared.lock().await.as_ref().is_some_and(BrowserSession::is_alive)
    }

    /// Opens a blank page, launching a browser first when needed.
    ///
    /// The caller owns the returned lease and must pass it to
    /// [`release_page`](Self::release_page); prefer [`with_page`](Self::with_page).
    pub async fn acquire_page(&self) -> Result<PageLease, BrowserError> {
        let lease = match self.options.mode {
            BrowserMode::PerCall => {
                let session = BrowserSession::launch(&self.options).await?;
                match session.new_page().await {
                    Ok(page) => PageLease {
                        page,
                        owned_session: Some(session),
                    },
                    Err(e) => {
                        session.shutdown().await;
                        return Err(e);
                    }
                }
            }
            BrowserMode::Shared => {
                let mut guard = self.shared.lock().await;
                if let Some(stale) = take_stale(&mut *guard, BrowserSession::is_alive) {
                    warn!("shared browser connection is gone, relaunching");
                    stale.discard().await;
                }
                if guard.is_none() {
                    *guard = Some(BrowserSession::launch(&self.options).await?);
                }
                let page = match guard.as_ref() {
                    Some(session) => session.new_page().await,
                    None => Err(BrowserError::LaunchFailed("shared session vanished".to_string())),
                };
                match page {
                    Ok(page) => PageLease {
                        page,
                        owned_session: None,
                    },
                    Err(e) => {
                        if let Some(session) = guard.take() {
                            session.discard().await;
                        }
                        return Err(e);
                    }
                }
            }
        };

        self.note_acquired();
        Ok(lease)
    }

    fn note_acquired(&self) {
        let open = self.open_pages.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(open_pages = open, "page acquired");
    }

    fn note_released(&self) {
        let open = self.open_pages.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        debug!(open_pages = open, "page released");
    }

    /// Closes the page and, for a per-call lease, its browser.
    pub async fn release_page(&self, lease: PageLease) {
        let PageLease { page, owned_session } = lease;
        if let Err(e) = page.close().await {
            warn!(error = %e, "closing page failed");
        }
        self.note_released();

        if let Some(session) = owned_session {
            session.shutdown().await;
        }
    }

    /// Runs `work` with a fresh page and releases it afterwards, whether
    /// `work` succeeded, failed or panicked.
    pub async fn with_page<T, E, F, Fut>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(Page) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<BrowserError>,
    {
        let lease = self.acquire_page().await?;
        let page = lease.page.clone();
        scoped(lease, page, work, |lease| self.release_page(lease)).await
    }

    /// Shuts the shared browser down. Safe to call repeatedly or when
    /// nothing was ever launched.
    pub async fn close(&self) {
        let session = self.shared.lock().await.take();
        if let Some(session) = session {
            session.shutdown().await;
            info!("shared browser closed");
        }
    }
}

#[async_trait]
impl PageRenderer for BrowserManager {
    async fn render(&self, request: &RenderRequest) -> Result<String, BrowserError> {
        self.with_page(|page| async move {
            let page_error = |detail: String| BrowserError::Page {
                url: request.url.clone(),
                detail,
            };

            match timeout(request.navigation_timeout, page.goto(request.url.as_str())).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(page_error(e.to_string())),
                Err(_) => {
                    return Err(BrowserError::NavigationTimeout {
                        url: request.url.clone(),
                        timeout_secs: request.navigation_timeout.as_secs(),
                    })
                }
            }

            wait_for_marker(&page, request).await?;
            page.content().await.map_err(|e| page_error(e.to_string()))
        })
        .await
    }
}

/// Empties `slot` when its session is no longer alive.
fn take_stale<S>(slot: &mut Option<S>, is_alive: impl Fn(&S) -> bool) -> Option<S> {
    if slot.as_ref().is_some_and(|s| !is_alive(s)) {
        slot.take()
    } else {
        None
    }
}

/// Runs `work`, then `release(lease)` on every exit path, re-raising a panic
/// only after the release.
async fn scoped<L, H, T, E, W, Fut, R, RFut>(lease: L, handle: H, work: W, release: R) -> Result<T, E>
where
    W: FnOnce(H) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: FnOnce(L) -> RFut,
    RFut: Future<Output = ()>,
{
    let outcome = AssertUnwindSafe(work(handle)).catch_unwind().await;
    release(lease).await;

    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Polls for the marker selector until it matches or the bound elapses.
async fn wait_for_marker(page: &Page, request: &RenderRequest) -> Result<(), BrowserError> {
    let deadline = Instant::now() + request.marker_timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(BrowserError::MarkerTimeout {
                url: request.url.clone(),
                selector: request.marker.clone(),
                timeout_secs: request.marker_timeout.as_secs(),
            });
        }
        if let Ok(Ok(_)) = timeout(remaining, page.find_element(request.marker.as_str())).await {
            return Ok(());
        }
        sleep(MARKER_POLL_INTERVAL.min(remaining)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn close_is_idempotent_without_a_session() {
        let manager = BrowserManager::new(BrowserOptions::default());
        manager.close().await;
        manager.close().await;
        assert!(!manager.is_running().await);
        assert_eq!(manager.open_pages(), 0);
    }

    #[test]
    fn per_call_is_the_default_mode() {
        let manager = BrowserManager::new(BrowserOptions::default());
        assert_eq!(manager.mode(), BrowserMode::PerCall);
    }

    #[tokio::test]
    async fn launch_failure_is_reported_and_leaves_nothing_open() {
        let options = BrowserOptions {
            mode: BrowserMode::Shared,
            chrome_path: Some(PathBuf::from("/nonexistent/chrome-binary")),
            request_timeout: Duration::from_secs(5),
        };
        let manager = BrowserManager::new(options);

        let result = manager.acquire_page().await;
        assert!(matches!(result, Err(BrowserError::LaunchFailed(_))));
        assert_eq!(manager.open_pages(), 0);
        assert!(!manager.is_running().await);
    }

    #[tokio::test]
    async fn finished_handler_marks_the_session_stale() {
        let ended = tokio::spawn(async {});
        while !ended.is_finished() {
            tokio::task::yield_now().await;
        }
        let mut slot = Some(ended);
        assert!(take_stale(&mut slot, |h: &JoinHandle<()>| !h.is_finished()).is_some());
        assert!(slot.is_none());

        let mut running = Some(tokio::spawn(std::future::pending::<()>()));
        assert!(take_stale(&mut running, |h: &JoinHandle<()>| !h.is_finished()).is_none());
        assert!(running.is_some());
        if let Some(handle) = running {
            handle.abort();
        }
    }

    #[tokio::test]
    async fn lease_is_released_when_work_fails() {
        let manager = BrowserManager::new(BrowserOptions::default());
        manager.note_acquired();
        assert_eq!(manager.open_pages(), 1);

        let work = |()| async { Err(BrowserError::LaunchFailed("boom".to_string())) };
        let result: Result<(), BrowserError> = scoped((), (), work, |()| async { manager.note_released() }).await;

        assert!(result.is_err());
        assert_eq!(manager.open_pages(), 0);
    }

    #[tokio::test]
    async fn lease_is_released_when_work_panics() {
        let manager = BrowserManager::new(BrowserOptions::default());
        manager.note_acquired();

        let work = |()| async {
            if manager.open_pages() > 0 {
                panic!("extraction blew up");
            }
            Ok::<(), BrowserError>(())
        };
        let run = scoped((), (), work, |()| async { manager.note_released() });
        let caught = AssertUnwindSafe(run).catch_unwind().await;

        assert!(caught.is_err());
        assert_eq!(manager.open_pages(), 0);
    }
}
