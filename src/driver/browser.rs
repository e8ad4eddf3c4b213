//! Chromium page driver over the DevTools protocol.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, SetUserAgentOverrideParams};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::scripts::{self, VariationArgs, DUMP_LOCAL_STORAGE, STEALTH_SCRIPTS};
use super::{
    BrowserCookie, BrowserEngineConfig, DriverFactory, Locator, PageDriver, SelectorSet, Session,
};
use crate::config::SiteProfile;
use crate::crawl::links;
use crate::error::FetchError;
use crate::extract::{GroupKind, VariationGroup};
use crate::site::CompiledSite;

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/google/chrome/google-chrome",
];

fn driver_err(e: impl std::fmt::Display) -> FetchError {
    FetchError::Driver(e.to_string())
}

/// One browser process (or remote connection) with a single tab.
pub struct BrowserDriver {
    config: BrowserEngineConfig,
    profile: Arc<SiteProfile>,
    page_load: Duration,
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl BrowserDriver {
    /// Launch (or connect to) a browser and open a blank tab.
    pub async fn launch(
        config: BrowserEngineConfig,
        profile: Arc<SiteProfile>,
        page_load: Duration,
    ) -> Result<Self, FetchError> {
        let (browser, mut handler) = match config.remote_url.clone() {
            Some(url) => connect_remote(&url).await?,
            None => launch_local(&config).await?,
        };

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(driver_err)?;

        let mut ua = SetUserAgentOverrideParams::new(profile.user_agent.clone());
        ua.accept_language = Some(profile.accept_language.clone());
        page.execute(ua).await.map_err(driver_err)?;

        Ok(Self {
            config,
            profile,
            page_load,
            browser,
            page,
            handler,
        })
    }

    async fn evaluate(&self, script: String) -> Result<serde_json::Value, FetchError> {
        let result = self.page.evaluate(script).await.map_err(driver_err)?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn evaluate_bool(&self, script: String) -> Result<bool, FetchError> {
        Ok(self.evaluate(script).await?.as_bool().unwrap_or(false))
    }

    async fn apply_stealth(&self) {
        for script in STEALTH_SCRIPTS {
            if let Err(e) = self.page.evaluate(script.to_string()).await {
                debug!("Stealth script injection skipped: {}", e);
            }
        }
    }
}

fn find_chrome(config: &BrowserEngineConfig) -> Result<PathBuf, FetchError> {
    if let Some(path) = &config.chrome_path {
        return Ok(path.clone());
    }
    for path in CHROME_PATHS {
        let p = std::path::Path::new(path);
        if p.exists() {
            debug!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }
    for cmd in &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ] {
        if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    debug!("Found Chrome in PATH: {}", path);
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }
    Err(FetchError::Driver(
        "Chrome/Chromium not found; install it or set browser.chrome_path".to_string(),
    ))
}

async fn launch_local(
    config: &BrowserEngineConfig,
) -> Result<(Browser, chromiumoxide::Handler), FetchError> {
    info!("Launching browser (headless={})", config.headless);

    let mut builder = BrowserConfig::builder().chrome_executable(find_chrome(config)?);
    if !config.headless {
        builder = builder.with_head();
    }
    if let Some(ref proxy) = config.proxy {
        builder = builder.arg(format!("--proxy-server={}", proxy));
    }
    builder = builder
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--disable-dev-shm-usage")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-notifications")
        .arg("--no-sandbox")
        .arg("--disable-gpu");
    for arg in &config.chrome_args {
        builder = builder.arg(arg);
    }

    let browser_config = builder
        .build()
        .map_err(|e| FetchError::Driver(format!("Failed to build browser config: {}", e)))?;

    Browser::launch(browser_config).await.map_err(driver_err)
}

async fn connect_remote(url: &str) -> Result<(Browser, chromiumoxide::Handler), FetchError> {
    info!("Connecting to remote browser at {}", url);

    // Get WebSocket URL from the /json/version endpoint
    let http_url = url
        .replace("ws://", "http://")
        .replace("wss://", "https://");
    let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

    let resp: serde_json::Value = reqwest::Client::new()
        .get(&version_url)
        .send()
        .await
        .map_err(driver_err)?
        .json()
        .await
        .map_err(driver_err)?;

    let ws_url = resp
        .get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .ok_or_else(|| FetchError::Driver("No webSocketDebuggerUrl in response".to_string()))?;

    Browser::connect(ws_url).await.map_err(driver_err)
}

#[async_trait]
impl PageDriver for BrowserDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError> {
        debug!("Navigating to {}", url);
        match tokio::time::timeout(self.page_load, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(driver_err(e)),
            Err(_) => {
                return Err(FetchError::NavigationTimeout {
                    url: url.to_string(),
                })
            }
        }
        if self.config.stealth {
            self.apply_stealth().await;
        }
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, FetchError> {
        Ok(self
            .page
            .url()
            .await
            .map_err(driver_err)?
            .unwrap_or_default())
    }

    async fn current_html(&mut self) -> Result<String, FetchError> {
        self.page.content().await.map_err(driver_err)
    }

    async fn run_script(&mut self, script: &str) -> Result<serde_json::Value, FetchError> {
        self.evaluate(script.to_string()).await
    }

    async fn find_and_click(&mut self, set: &SelectorSet) -> Result<bool, FetchError> {
        let clicked = self.evaluate_bool(scripts::click(&set.locators)).await?;
        debug!(purpose = ?set.purpose, clicked, "click");
        Ok(clicked)
    }

    async fn select_variation(
        &mut self,
        group: &VariationGroup,
        value: &str,
    ) -> Result<bool, FetchError> {
        let args = VariationArgs {
            group_selector: &self.profile.variation_group_selector,
            chip_selector: &self.profile.variation_chip_selector,
            index: group.index,
            chips: group.kind == GroupKind::Chips,
            value,
            collapse: group.collapses_numerals(),
        };
        let script = scripts::select_variation(&args);
        self.evaluate_bool(script).await
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> Result<bool, FetchError> {
        self.evaluate_bool(scripts::fill(locator, value)).await
    }

    async fn signature(&mut self, site: &CompiledSite) -> Result<String, FetchError> {
        let url = self.current_url().await?;
        let hrefs: Vec<String> = serde_json::from_value(
            self.evaluate(scripts::product_hrefs(&self.profile.product_link_selector))
                .await?,
        )
        .unwrap_or_default();
        Ok(links::signature_from_hrefs(site, &url, &hrefs))
    }

    async fn capture_session(&mut self) -> Result<Session, FetchError> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(driver_err)?
            .into_iter()
            .map(|c| BrowserCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                secure: c.secure,
                http_only: c.http_only,
            })
            .collect();

        let local_storage = match self.evaluate(DUMP_LOCAL_STORAGE.to_string()).await {
            Ok(value) => serde_json::from_value(value).unwrap_or_default(),
            Err(e) => {
                warn!("Could not read localStorage: {}", e);
                Default::default()
            }
        };

        Ok(Session {
            cookies,
            local_storage,
        })
    }

    async fn prime_session(
        &mut self,
        root_url: &str,
        session: &Session,
    ) -> Result<(), FetchError> {
        self.navigate(root_url).await?;

        for cookie in &session.cookies {
            let param = CookieParam::builder()
                .name(cookie.name.clone())
                .value(cookie.value.clone())
                .domain(cookie.domain.clone())
                .path(cookie.path.clone())
                .secure(cookie.secure)
                .http_only(cookie.http_only)
                .build();
            match param {
                Ok(param) => {
                    if let Err(e) = self.page.set_cookie(param).await {
                        warn!("Failed to set cookie {}: {}", cookie.name, e);
                    }
                }
                Err(e) => warn!("Failed to build cookie {}: {}", cookie.name, e),
            }
        }

        self.page.reload().await.map_err(driver_err)?;

        if !session.local_storage.is_empty() {
            let script = scripts::restore_local_storage(&session.local_storage);
            if let Err(e) = self.evaluate(script).await {
                warn!("Failed to restore localStorage: {}", e);
            }
        }
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.browser.close().await {
            debug!("Browser close: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }
}

/// Launches one [`BrowserDriver`] per request.
#[derive(Clone)]
pub struct BrowserDriverFactory {
    config: BrowserEngineConfig,
    profile: Arc<SiteProfile>,
    page_load: Duration,
}

impl BrowserDriverFactory {
    pub fn new(config: BrowserEngineConfig, profile: Arc<SiteProfile>, page_load: Duration) -> Self {
        Self {
            config,
            profile,
            page_load,
        }
    }
}

#[async_trait]
impl DriverFactory for BrowserDriverFactory {
    type Driver = BrowserDriver;

    async fn create(&self) -> Result<BrowserDriver, FetchError> {
        BrowserDriver::launch(self.config.clone(), self.profile.clone(), self.page_load).await
    }
}
