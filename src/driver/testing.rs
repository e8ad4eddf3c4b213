//! Scripted in-memory storefront for exercising crawl logic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{
    BrowserCookie, ControlPurpose, DriverFactory, Locator, PageDriver, SelectorSet, Session,
};
use crate::config::SiteProfile;
use crate::error::FetchError;
use crate::extract::VariationGroup;

pub(crate) const BASE: &str = "https://shop.example";

/// How a listing advances between result pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FakePager {
    /// Numbered pager advertising this many pages.
    Numbered(u32),
    NextOnly,
    LoadMore,
    Scroll,
    Single,
}

#[derive(Debug, Clone)]
pub(crate) struct FakeListing {
    pub pager: FakePager,
    /// Product paths rendered on each page.
    pub pages: Vec<Vec<String>>,
    pub subcategories: Vec<String>,
    pub script_links: Vec<String>,
}

impl FakeListing {
    pub fn new(pager: FakePager, pages: Vec<Vec<String>>) -> Self {
        Self {
            pager,
            pages,
            subcategories: Vec::new(),
            script_links: Vec::new(),
        }
    }

    /// `pages` pages of `per_page` products numbered from `first`.
    pub fn numbered_products(pager: FakePager, first: u32, pages: u32, per_page: u32) -> Self {
        let pages = (0..pages)
            .map(|p| {
                (0..per_page)
                    .map(|i| format!("/produto/{}/item", first + p * per_page + i))
                    .collect()
            })
            .collect();
        Self::new(pager, pages)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FakeProduct {
    pub title: String,
    pub description: String,
    pub groups: Vec<(String, Vec<String>)>,
    pub sku_prefix: Option<String>,
    pub stock: u32,
    /// Visits that render an empty document before the page works.
    pub blank_visits: u32,
    /// The SKU line never renders once a variation is chosen.
    pub sku_never_renders: bool,
    /// Visits whose navigation fails with a driver error.
    pub failed_navigations: u32,
}

impl FakeProduct {
    pub fn new(title: &str, sku_prefix: &str, stock: u32) -> Self {
        Self {
            title: title.to_string(),
            description: format!("{} em Prata 925", title),
            groups: Vec::new(),
            sku_prefix: Some(sku_prefix.to_string()),
            stock,
            blank_visits: 0,
            sku_never_renders: false,
            failed_navigations: 0,
        }
    }

    pub fn group(mut self, label: &str, options: &[&str]) -> Self {
        self.groups.push((
            label.to_string(),
            options.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    pub fn always_blank(mut self) -> Self {
        self.blank_visits = u32::MAX;
        self
    }
}

#[derive(Default)]
struct Log {
    visits: HashMap<String, u32>,
    clicks: Vec<(String, ControlPurpose)>,
}

/// Shared storefront model; every fake driver renders from it.
pub(crate) struct FakeSite {
    listings: HashMap<String, FakeListing>,
    products: HashMap<String, FakeProduct>,
    credentials: (String, String),
    log: Mutex<Log>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self {
            listings: HashMap::new(),
            products: HashMap::new(),
            credentials: ("buyer@example.com".to_string(), "secret".to_string()),
            log: Mutex::new(Log::default()),
        }
    }

    pub fn listing(mut self, path: &str, listing: FakeListing) -> Self {
        self.listings.insert(abs(path), listing);
        self
    }

    pub fn product(mut self, path: &str, product: FakeProduct) -> Self {
        self.products.insert(abs(path), product);
        self
    }

    pub fn credentials(&self) -> (String, String) {
        self.credentials.clone()
    }

    pub fn visits(&self, path: &str) -> u32 {
        self.log
            .lock()
            .unwrap()
            .visits
            .get(&abs(path))
            .copied()
            .unwrap_or(0)
    }

    pub fn clicks_on(&self, path: &str) -> Vec<ControlPurpose> {
        let url = abs(path);
        self.log
            .lock()
            .unwrap()
            .clicks
            .iter()
            .filter(|(u, _)| *u == url)
            .map(|(_, p)| *p)
            .collect()
    }

    fn record_visit(&self, url: &str) -> u32 {
        let mut log = self.log.lock().unwrap();
        let n = log.visits.entry(url.to_string()).or_insert(0);
        *n += 1;
        *n
    }

    fn record_click(&self, url: &str, purpose: ControlPurpose) {
        self.log
            .lock()
            .unwrap()
            .clicks
            .push((url.to_string(), purpose));
    }
}

pub(crate) fn abs(path: &str) -> String {
    if path.starts_with("http") {
        path.to_string()
    } else {
        format!("{}{}", BASE, path)
    }
}

/// Profile pointing at the fake storefront.
pub(crate) fn fake_profile() -> SiteProfile {
    SiteProfile {
        base_url: BASE.to_string(),
        categories: Vec::new(),
        ..Default::default()
    }
}

pub(crate) struct FakeDriver {
    site: Arc<FakeSite>,
    url: String,
    page_index: usize,
    blank: bool,
    selection: HashMap<usize, String>,
    filled: HashMap<String, String>,
    logged_in: bool,
}

impl FakeDriver {
    pub fn new(site: Arc<FakeSite>) -> Self {
        Self {
            site,
            url: "about:blank".to_string(),
            page_index: 0,
            blank: false,
            selection: HashMap::new(),
            filled: HashMap::new(),
            logged_in: false,
        }
    }

    fn listing(&self) -> Option<&FakeListing> {
        self.site.listings.get(&self.url)
    }

    fn product(&self) -> Option<&FakeProduct> {
        self.site.products.get(&self.url)
    }

    fn advance(&mut self) -> bool {
        let Some(listing) = self.listing() else {
            return false;
        };
        if self.page_index + 1 < listing.pages.len() {
            self.page_index += 1;
            true
        } else {
            false
        }
    }

    fn account_marker(&self) -> &'static str {
        if self.logged_in {
            r#"<a href="/minha-conta">Meus pedidos</a>"#
        } else {
            r#"<a href="/login">Entrar</a>"#
        }
    }

    fn render_listing(&self, listing: &FakeListing) -> String {
        let visible: Vec<&String> = match listing.pager {
            FakePager::LoadMore | FakePager::Scroll => listing
                .pages
                .iter()
                .take(self.page_index + 1)
                .flatten()
                .collect(),
            _ => listing
                .pages
                .get(self.page_index)
                .map(|p| p.iter().collect())
                .unwrap_or_default(),
        };

        let mut html = String::from("<html><body>");
        html.push_str(self.account_marker());
        html.push_str(r#"<div class="grid">"#);
        for path in visible {
            html.push_str(&format!(r#"<a href="{}">produto</a>"#, path));
        }
        html.push_str("</div>");
        for sub in &listing.subcategories {
            html.push_str(&format!(r#"<a href="{}">sub</a>"#, sub));
        }
        if let FakePager::Numbered(advertised) = listing.pager {
            html.push_str(r#"<div class="paginacao-lista"><div class="paginas">"#);
            for n in 1..=advertised {
                html.push_str(&format!("<a>{}</a>", n));
            }
            html.push_str("</div></div>");
        }
        if !listing.script_links.is_empty() {
            let payload: Vec<String> = listing
                .script_links
                .iter()
                .map(|p| format!(r#"{{"href":"{}"}}"#, p))
                .collect();
            html.push_str(&format!("<script>var grid=[{}];</script>", payload.join(",")));
        }
        html.push_str("</body></html>");
        html
    }

    fn current_sku(&self, product: &FakeProduct) -> Option<String> {
        let prefix = product.sku_prefix.clone()?;
        if product.groups.is_empty() {
            return Some(prefix);
        }
        if product.sku_never_renders {
            return None;
        }
        let mut parts = vec![prefix];
        for i in 0..product.groups.len() {
            parts.push(self.selection.get(&i)?.clone());
        }
        Some(parts.join("-"))
    }

    fn render_product(&self, product: &FakeProduct) -> String {
        let mut html = String::from("<html><body>");
        html.push_str(self.account_marker());
        html.push_str(r#"<div class="componente-produto-detalhes">"#);
        html.push_str(r#"<div class="componente-imagens-grid"><img src="/img/main.jpg"></div>"#);
        html.push_str(r#"<div class="componente-detalhes-infos">"#);
        html.push_str(&format!(r#"<div class="descricao-curta">{}</div>"#, product.title));
        if let Some(sku) = self.current_sku(product) {
            html.push_str(&format!(
                r#"<div class="componente-referencia"><span class="referencia">Ref: {}</span></div>"#,
                sku
            ));
        }
        html.push_str(&format!(
            r#"<div class="componente-estoque"><span class="estoque">{} un.</span></div>"#,
            product.stock
        ));
        html.push_str("</div>");
        html.push_str(&format!(
            r#"<div class="descricao-produto">{}<ul><li>Prata 925</li></ul></div>"#,
            product.description
        ));
        html.push_str(r#"<div class="componente-detalhes-variacoes">"#);
        for (label, options) in &product.groups {
            html.push_str(&format!(
                r#"<div class="variacao-tipo"><span class="tipo">{}</span><div class="variacoes">"#,
                label
            ));
            for option in options {
                html.push_str(&format!(r#"<a class="variacao">{}</a>"#, option));
            }
            html.push_str("</div></div>");
        }
        html.push_str("</div></div></body></html>");
        html
    }

    fn render_login(&self) -> String {
        format!(
            r#"<html><body>{}<form><input name="email"><input name="senha" type="password">
            <button id="btn_enviar_cadastro" type="submit">Entrar</button></form></body></html>"#,
            self.account_marker()
        )
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError> {
        self.url = url.to_string();
        self.page_index = 0;
        self.selection.clear();
        let visit = self.site.record_visit(url);
        self.blank = self
            .product()
            .is_some_and(|p| visit <= p.blank_visits);
        if self.product().is_some_and(|p| visit <= p.failed_navigations) {
            return Err(FetchError::Driver("connection reset".to_string()));
        }
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, FetchError> {
        Ok(self.url.clone())
    }

    async fn current_html(&mut self) -> Result<String, FetchError> {
        if self.blank {
            return Ok(String::new());
        }
        if let Some(listing) = self.listing() {
            return Ok(self.render_listing(listing));
        }
        if let Some(product) = self.product() {
            return Ok(self.render_product(product));
        }
        if self.url == format!("{}/login", BASE) {
            return Ok(self.render_login());
        }
        Ok(format!(
            "<html><body>{}<p>home</p></body></html>",
            self.account_marker()
        ))
    }

    async fn run_script(&mut self, _script: &str) -> Result<serde_json::Value, FetchError> {
        Ok(serde_json::Value::Null)
    }

    async fn find_and_click(&mut self, set: &SelectorSet) -> Result<bool, FetchError> {
        self.site.record_click(&self.url, set.purpose);
        let pager = self.listing().map(|l| l.pager);
        let clicked = match (set.purpose, pager) {
            (ControlPurpose::PageNumber(n), Some(FakePager::Numbered(advertised))) => {
                if n >= 1 && n <= advertised {
                    let last = self.listing().map_or(0, |l| l.pages.len().saturating_sub(1));
                    self.page_index = (n as usize - 1).min(last);
                    true
                } else {
                    false
                }
            }
            (ControlPurpose::Next, Some(FakePager::Numbered(_) | FakePager::NextOnly)) => {
                self.advance()
            }
            (ControlPurpose::LoadMore, Some(FakePager::LoadMore)) => self.advance(),
            (ControlPurpose::CookieConsent, _) => true,
            (ControlPurpose::Submit, _) => {
                let (user, pass) = self.site.credentials();
                let profile = SiteProfile::default();
                let ok = self.filled.get(&profile.login.email_selector) == Some(&user)
                    && self.filled.get(&profile.login.password_selector) == Some(&pass);
                if ok {
                    self.logged_in = true;
                }
                true
            }
            _ => false,
        };
        Ok(clicked)
    }

    async fn select_variation(
        &mut self,
        group: &VariationGroup,
        value: &str,
    ) -> Result<bool, FetchError> {
        let offered = self
            .product()
            .and_then(|p| p.groups.get(group.index))
            .is_some_and(|(_, options)| options.iter().any(|o| o == value));
        if offered {
            self.selection.insert(group.index, value.to_string());
        }
        Ok(offered)
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> Result<bool, FetchError> {
        let key = match locator {
            Locator::Css(s) | Locator::XPath(s) => s.clone(),
        };
        self.filled.insert(key, value.to_string());
        Ok(true)
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), FetchError> {
        if self.listing().is_some_and(|l| l.pager == FakePager::Scroll) {
            self.advance();
        }
        Ok(())
    }

    async fn capture_session(&mut self) -> Result<Session, FetchError> {
        if !self.logged_in {
            return Ok(Session::default());
        }
        let mut session = Session::default();
        session.cookies.push(BrowserCookie {
            name: "sid".to_string(),
            value: "abc123".to_string(),
            domain: "shop.example".to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: true,
        });
        session
            .local_storage
            .insert("cart".to_string(), "[]".to_string());
        Ok(session)
    }

    async fn prime_session(
        &mut self,
        root_url: &str,
        session: &Session,
    ) -> Result<(), FetchError> {
        self.navigate(root_url).await?;
        self.logged_in = session.cookies.iter().any(|c| c.name == "sid");
        Ok(())
    }

    async fn close(&mut self) {}
}

/// Hands out fake drivers over one shared storefront.
#[derive(Clone)]
pub(crate) struct FakeFactory {
    pub site: Arc<FakeSite>,
}

impl FakeFactory {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site: Arc::new(site),
        }
    }
}

#[async_trait]
impl DriverFactory for FakeFactory {
    type Driver = FakeDriver;

    async fn create(&self) -> Result<FakeDriver, FetchError> {
        Ok(FakeDriver::new(self.site.clone()))
    }
}
