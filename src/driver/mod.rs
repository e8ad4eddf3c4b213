//! Page automation boundary.
//!
//! Crawl logic only talks to a [`PageDriver`]; the Chromium implementation
//! lives in [`browser`] and tests use the scripted fake in `testing`.

#[cfg(feature = "browser")]
mod browser;
mod config;
mod scripts;
#[cfg(test)]
pub(crate) mod testing;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use config::BrowserEngineConfig;

#[cfg(feature = "browser")]
pub use browser::{BrowserDriver, BrowserDriverFactory};

use crate::config::SiteProfile;
use crate::crawl::links;
use crate::error::FetchError;
use crate::extract::VariationGroup;
use crate::site::CompiledSite;

/// How to find an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Locator {
    Css(String),
    XPath(String),
}

/// What a click is meant to achieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPurpose {
    PageNumber(u32),
    Next,
    LoadMore,
    CookieConsent,
    Submit,
}

/// Alternative locators for one control, tried in order.
#[derive(Debug, Clone)]
pub struct SelectorSet {
    pub purpose: ControlPurpose,
    pub locators: Vec<Locator>,
}

impl SelectorSet {
    fn xpaths(purpose: ControlPurpose, xpaths: &[String]) -> Self {
        Self {
            purpose,
            locators: xpaths.iter().cloned().map(Locator::XPath).collect(),
        }
    }

    pub fn page_number(profile: &SiteProfile, page: u32) -> Self {
        let n = page.to_string();
        Self {
            purpose: ControlPurpose::PageNumber(page),
            locators: profile
                .page_number_xpaths
                .iter()
                .map(|t| Locator::XPath(t.replace("{n}", &n)))
                .collect(),
        }
    }

    pub fn next(profile: &SiteProfile) -> Self {
        Self::xpaths(ControlPurpose::Next, &profile.next_xpaths)
    }

    pub fn load_more(profile: &SiteProfile) -> Self {
        Self::xpaths(ControlPurpose::LoadMore, &profile.load_more_xpaths)
    }

    pub fn cookie_consent(profile: &SiteProfile) -> Self {
        Self::xpaths(ControlPurpose::CookieConsent, &profile.login.consent_xpaths)
    }

    pub fn login_submit(profile: &SiteProfile) -> Self {
        Self::xpaths(ControlPurpose::Submit, &profile.login.submit_xpaths)
    }
}

/// Cookie captured from a browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
}

/// Authenticated state replayed into every driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub cookies: Vec<BrowserCookie>,
    pub local_storage: BTreeMap<String, String>,
}

/// A single browser tab under automation.
///
/// Every method is a suspension point; none of them retries on its own.
#[async_trait]
pub trait PageDriver: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError>;

    async fn current_url(&mut self) -> Result<String, FetchError>;

    /// Serialized live DOM.
    async fn current_html(&mut self) -> Result<String, FetchError>;

    async fn run_script(&mut self, script: &str) -> Result<serde_json::Value, FetchError>;

    /// Click the first visible, enabled element matched by any locator.
    async fn find_and_click(&mut self, set: &SelectorSet) -> Result<bool, FetchError>;

    /// Pick `value` in a variation group (chip click or select option).
    async fn select_variation(
        &mut self,
        group: &VariationGroup,
        value: &str,
    ) -> Result<bool, FetchError>;

    /// Type into an input, firing the usual input events.
    async fn fill(&mut self, locator: &Locator, value: &str) -> Result<bool, FetchError>;

    async fn scroll_to_bottom(&mut self) -> Result<(), FetchError> {
        self.run_script(scripts::SCROLL_TO_BOTTOM).await.map(|_| ())
    }

    /// Fingerprint of the product grid currently shown.
    async fn signature(&mut self, site: &CompiledSite) -> Result<String, FetchError> {
        let url = self.current_url().await?;
        let html = self.current_html().await?;
        Ok(links::page_signature(site, &url, &html))
    }

    async fn capture_session(&mut self) -> Result<Session, FetchError>;

    /// Load the site root, install cookies and local storage, then reload.
    async fn prime_session(&mut self, root_url: &str, session: &Session)
        -> Result<(), FetchError>;

    async fn close(&mut self);
}

/// Creates independent drivers, one per worker.
#[async_trait]
pub trait DriverFactory: Send + Sync + 'static {
    type Driver: PageDriver + 'static;

    async fn create(&self) -> Result<Self::Driver, FetchError>;
}

pub(crate) use scripts::{PAGINATOR_INTO_VIEW, SCROLL_JIGGLE};

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub enum BrowserDriver {}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl PageDriver for BrowserDriver {
    async fn navigate(&mut self, _url: &str) -> Result<(), FetchError> {
        match *self {}
    }
    async fn current_url(&mut self) -> Result<String, FetchError> {
        match *self {}
    }
    async fn current_html(&mut self) -> Result<String, FetchError> {
        match *self {}
    }
    async fn run_script(&mut self, _script: &str) -> Result<serde_json::Value, FetchError> {
        match *self {}
    }
    async fn find_and_click(&mut self, _set: &SelectorSet) -> Result<bool, FetchError> {
        match *self {}
    }
    async fn select_variation(
        &mut self,
        _group: &VariationGroup,
        _value: &str,
    ) -> Result<bool, FetchError> {
        match *self {}
    }
    async fn fill(&mut self, _locator: &Locator, _value: &str) -> Result<bool, FetchError> {
        match *self {}
    }
    async fn capture_session(&mut self) -> Result<Session, FetchError> {
        match *self {}
    }
    async fn prime_session(
        &mut self,
        _root_url: &str,
        _session: &Session,
    ) -> Result<(), FetchError> {
        match *self {}
    }
    async fn close(&mut self) {
        match *self {}
    }
}

#[cfg(not(feature = "browser"))]
#[derive(Clone)]
pub struct BrowserDriverFactory;

#[cfg(not(feature = "browser"))]
impl BrowserDriverFactory {
    pub fn new(
        _config: BrowserEngineConfig,
        _profile: std::sync::Arc<SiteProfile>,
        _page_load: std::time::Duration,
    ) -> Self {
        Self
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl DriverFactory for BrowserDriverFactory {
    type Driver = BrowserDriver;

    async fn create(&self) -> Result<BrowserDriver, FetchError> {
        Err(FetchError::Driver(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
                .to_string(),
        ))
    }
}
