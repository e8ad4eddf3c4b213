//! Configuration management for vitrine using the prefer crate.
//!
//! Everything the crawler needs to know about the target storefront lives
//! in [`SiteProfile`]; pacing and retry policy in [`CrawlSettings`]. Both
//! are threaded explicitly into the components that use them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::driver::BrowserEngineConfig;
use crate::error::ConfigError;

/// Default output file name.
pub const DEFAULT_OUTPUT: &str = "produtos_scrape.json";

/// A category entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub label: String,
    pub url: String,
}

impl Category {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// Selectors and patterns describing the target storefront.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    pub base_url: String,
    pub login_path: String,
    pub categories: Vec<Category>,

    /// Anchors that may point at product pages.
    pub product_link_selector: String,
    /// Path pattern a product link must match to be kept.
    pub product_path_pattern: String,
    /// Product paths embedded in inline script payloads.
    pub script_link_pattern: String,
    /// Path segment naming a category; its subcategories share it as a prefix.
    pub category_segment_pattern: String,

    pub pager_number_selector: String,
    /// XPath templates for a page-number control; `{n}` is the page number.
    pub page_number_xpaths: Vec<String>,
    pub next_xpaths: Vec<String>,
    pub load_more_xpaths: Vec<String>,

    pub detail_selector: String,
    pub title_selectors: Vec<String>,
    pub description_selector: String,
    pub image_selector: String,
    pub background_image_selector: String,
    /// Image URLs containing any of these are placeholders.
    pub excluded_image_hosts: Vec<String>,
    pub material_item_selector: String,
    pub material_pattern: String,
    pub max_materials: usize,
    pub user_agent: String,
    pub accept_language: String,

    pub variation_group_selector: String,
    pub variation_label_selector: String,
    pub variation_chip_selector: String,
    pub sku_selector: String,
    pub stock_selector: String,

    pub login: LoginProfile,
}

impl Default for SiteProfile {
    fn default() -> Self {
        let base = "https://zarpellonjoias.com.br";
        let categories = [
            ("Anéis", "/categorias-aneis"),
            ("Berloques", "/categorias-berloques"),
            ("Brincos", "/categorias-brincos"),
            ("Colares", "/categorias-colares"),
            ("Conjuntos", "/categorias-conjuntos"),
            ("Pingentes", "/categorias-pingentes"),
            ("Pulseiras", "/categorias-pulseiras"),
        ]
        .into_iter()
        .map(|(label, path)| Category::new(label, format!("{}{}", base, path)))
        .collect();

        Self {
            base_url: base.to_string(),
            login_path: "/login".to_string(),
            categories,
            product_link_selector: "a[href*='/produto/'], a[href^='/p/'], a[href^='/produto/']"
                .to_string(),
            product_path_pattern: r"/produtos?/|/p/".to_string(),
            script_link_pattern: r#""href":"(/produto/[^"\\]+)""#.to_string(),
            category_segment_pattern: r"(categorias-[a-z0-9-]+)".to_string(),
            pager_number_selector: ".paginacao-lista .paginas *".to_string(),
            page_number_xpaths: vec![
                "//div[contains(@class,'paginacao-lista')]//*[normalize-space(text())='{n}']"
                    .to_string(),
                "//*[contains(@class,'paginacao')]//*[self::a or self::button or self::span][normalize-space(text())='{n}']"
                    .to_string(),
            ],
            next_xpaths: vec![
                "//a[contains(@class,'proximo') or contains(@class,'next')]".to_string(),
                "//button[contains(@class,'proximo') or contains(@class,'next')]".to_string(),
                "//a[contains(.,'Próximo') or contains(.,'›') or contains(.,'>')]".to_string(),
                "//button[contains(.,'Próximo') or contains(.,'›') or contains(.,'>')]"
                    .to_string(),
            ],
            load_more_xpaths: vec![
                "//button[contains(translate(.,'CARREGAR','carregar'),'carregar')]".to_string(),
                "//button[contains(translate(.,'MOSTRAR MAIS','mostrar mais'),'mostrar mais')]"
                    .to_string(),
                "//a[contains(translate(.,'CARREGAR','carregar'),'carregar')]".to_string(),
                "//a[contains(.,'Ver mais')]".to_string(),
                "//button[contains(.,'Ver mais')]".to_string(),
                "//a[contains(@class,'carregar') or contains(@class,'mais')]".to_string(),
            ],
            detail_selector: ".componente-produto-detalhes".to_string(),
            title_selectors: vec![
                ".componente-detalhes-infos .descricao-curta".to_string(),
                "h1".to_string(),
            ],
            description_selector: ".descricao-produto".to_string(),
            image_selector: ".componente-imagens-grid img[src]".to_string(),
            background_image_selector: ".componente-imagens-grid figure[style]".to_string(),
            excluded_image_hosts: vec!["web.solvis.net.br/smileys".to_string()],
            material_item_selector: ".descricao-produto li".to_string(),
            material_pattern: r"(?i)\b(Aço|Prata|Ródio|Rhodium|Ouro|Folheado|Banho)\b"
                .to_string(),
            max_materials: 10,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36".to_string(),
            accept_language: "pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
            variation_group_selector: ".componente-detalhes-variacoes .variacao-tipo"
                .to_string(),
            variation_label_selector: ".tipo".to_string(),
            variation_chip_selector: ".variacoes .variacao".to_string(),
            sku_selector:
                ".componente-detalhes-infos .componente-referencia .referencia, .desc-curta-e-ref"
                    .to_string(),
            stock_selector: ".componente-detalhes-infos .componente-estoque .estoque".to_string(),
            login: LoginProfile::default(),
        }
    }
}

impl SiteProfile {
    /// Site root with a trailing slash.
    pub fn root_url(&self) -> String {
        format!("{}/", self.base_url.trim_end_matches('/'))
    }

    pub fn login_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.login_path)
    }

    pub fn category(&self, label: &str) -> Option<&Category> {
        self.categories
            .iter()
            .find(|c| c.label.eq_ignore_ascii_case(label))
    }
}

/// Login form description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginProfile {
    pub consent_xpaths: Vec<String>,
    pub email_selector: String,
    pub password_selector: String,
    pub submit_xpaths: Vec<String>,
    /// Lowercase page text that only appears when logged in.
    pub logged_in_markers: Vec<String>,
}

impl Default for LoginProfile {
    fn default() -> Self {
        Self {
            consent_xpaths: vec![
                "//button[contains(translate(.,'ACEITAR','aceitar'),'aceitar')]".to_string(),
                "//button[contains(translate(.,'OK, ENTENDI','ok, entendi'),'ok, entendi')]"
                    .to_string(),
            ],
            email_selector: "input[name='email']".to_string(),
            password_selector: "input[name='senha']".to_string(),
            submit_xpaths: vec![
                "//*[@id='btn_enviar_cadastro']".to_string(),
                "//button[@type='submit']".to_string(),
            ],
            logged_in_markers: vec![
                "meus pedidos".to_string(),
                "sair".to_string(),
                "meus dados".to_string(),
            ],
        }
    }
}

/// Waits and pauses, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlTimings {
    pub page_load_ms: u64,
    pub after_nav_ms: u64,
    pub product_ready_ms: u64,
    pub between_pages_ms: u64,
    pub grid_ready_ms: u64,
    pub signature_change_ms: u64,
    pub poll_ms: u64,
    pub queue_wait_ms: u64,
    pub sku_wait_ms: u64,
    pub login_timeout_ms: u64,
    /// Upper bound of the random jitter added to backoff and pacing.
    pub jitter_ms: u64,
    /// Pause after the root hop that precedes a retried attempt.
    pub retry_hop_ms: u64,
    pub retry_hop_jitter_ms: u64,
    pub slow_hop_ms: u64,
    pub slow_hop_jitter_ms: u64,
    pub slow_nav_ms: u64,
    pub slow_nav_jitter_ms: u64,
    pub slow_ready_ms: u64,
    pub slow_post_ms: u64,
    pub slow_post_jitter_ms: u64,
}

impl Default for CrawlTimings {
    fn default() -> Self {
        Self {
            page_load_ms: 15_000,
            after_nav_ms: 250,
            product_ready_ms: 1_500,
            between_pages_ms: 200,
            grid_ready_ms: 4_000,
            signature_change_ms: 6_000,
            poll_ms: 200,
            queue_wait_ms: 5_000,
            sku_wait_ms: 8_000,
            login_timeout_ms: 40_000,
            jitter_ms: 450,
            retry_hop_ms: 250,
            retry_hop_jitter_ms: 350,
            slow_hop_ms: 550,
            slow_hop_jitter_ms: 450,
            slow_nav_ms: 750,
            slow_nav_jitter_ms: 450,
            slow_ready_ms: 2_000,
            slow_post_ms: 450,
            slow_post_jitter_ms: 350,
        }
    }
}

impl CrawlTimings {
    /// Every wait collapsed to a single check.
    pub fn immediate() -> Self {
        Self {
            page_load_ms: 1_000,
            after_nav_ms: 0,
            product_ready_ms: 0,
            between_pages_ms: 0,
            grid_ready_ms: 0,
            signature_change_ms: 0,
            poll_ms: 0,
            queue_wait_ms: 50,
            sku_wait_ms: 0,
            login_timeout_ms: 0,
            jitter_ms: 0,
            retry_hop_ms: 0,
            retry_hop_jitter_ms: 0,
            slow_hop_ms: 0,
            slow_hop_jitter_ms: 0,
            slow_nav_ms: 0,
            slow_nav_jitter_ms: 0,
            slow_ready_ms: 0,
            slow_post_ms: 0,
            slow_post_jitter_ms: 0,
        }
    }

    pub fn page_load(&self) -> Duration {
        Duration::from_millis(self.page_load_ms)
    }
    pub fn after_nav(&self) -> Duration {
        Duration::from_millis(self.after_nav_ms)
    }
    pub fn product_ready(&self) -> Duration {
        Duration::from_millis(self.product_ready_ms)
    }
    pub fn between_pages(&self) -> Duration {
        Duration::from_millis(self.between_pages_ms)
    }
    pub fn grid_ready(&self) -> Duration {
        Duration::from_millis(self.grid_ready_ms)
    }
    pub fn signature_change(&self) -> Duration {
        Duration::from_millis(self.signature_change_ms)
    }
    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
    pub fn queue_wait(&self) -> Duration {
        Duration::from_millis(self.queue_wait_ms)
    }
    pub fn sku_wait(&self) -> Duration {
        Duration::from_millis(self.sku_wait_ms)
    }
    pub fn login_timeout(&self) -> Duration {
        Duration::from_millis(self.login_timeout_ms)
    }
    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }
    pub fn retry_hop(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.retry_hop_ms),
            Duration::from_millis(self.retry_hop_jitter_ms),
        )
    }
    pub fn slow_hop(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.slow_hop_ms),
            Duration::from_millis(self.slow_hop_jitter_ms),
        )
    }
    pub fn slow_nav(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.slow_nav_ms),
            Duration::from_millis(self.slow_nav_jitter_ms),
        )
    }
    pub fn slow_ready(&self) -> Duration {
        Duration::from_millis(self.slow_ready_ms)
    }
    pub fn slow_post(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.slow_post_ms),
            Duration::from_millis(self.slow_post_jitter_ms),
        )
    }
}

/// Concurrency, retry and discovery limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    pub workers: usize,
    pub max_pages_per_category: u32,
    pub load_more_rounds: u32,
    /// Below this many links a category page gets a script-payload scan.
    pub category_confidence_threshold: usize,
    pub subcategory_confidence_threshold: usize,
    pub retry_max_tries: u32,
    pub retry_backoff_base_ms: u64,
    pub enable_slow_retry: bool,
    pub referer_hop_on_retry: bool,
    pub progress_every: usize,
    pub timings: CrawlTimings,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            max_pages_per_category: 2000,
            load_more_rounds: 12,
            category_confidence_threshold: 80,
            subcategory_confidence_threshold: 60,
            retry_max_tries: 6,
            retry_backoff_base_ms: 1_500,
            enable_slow_retry: true,
            referer_hop_on_retry: true,
            progress_every: 50,
            timings: CrawlTimings::default(),
        }
    }
}

impl CrawlSettings {
    pub fn retry_backoff_base(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_base_ms)
    }
}

/// Names of the environment variables holding the account credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub user_env: String,
    pub password_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            user_env: "VITRINE_USER".to_string(),
            password_env: "VITRINE_PASS".to_string(),
        }
    }
}

/// Account used to log in.
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl CredentialsConfig {
    /// Read credentials from the environment; `None` when either is unset or blank.
    pub fn resolve(&self) -> Option<Credentials> {
        let user = std::env::var(&self.user_env).ok()?;
        let password = std::env::var(&self.password_env).ok()?;
        if user.trim().is_empty() || password.is_empty() {
            return None;
        }
        Some(Credentials {
            user: user.trim().to_string(),
            password,
        })
    }
}

/// Top-level configuration file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteProfile,
    pub crawl: CrawlSettings,
    pub browser: BrowserEngineConfig,
    pub credentials: CredentialsConfig,
    /// Output file; relative paths resolve against the config file's directory.
    pub output: Option<String>,
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration, preferring an explicit path over discovery.
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load_from_path(path).await;
        }

        // Use prefer for file discovery, then parse with serde
        match prefer::load("vitrine").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_from_path(path).await,
                None => Ok(Self::default_with_env()),
            },
            Err(e) => {
                debug!("No config file discovered: {}", e);
                Ok(Self::default_with_env())
            }
        }
    }

    /// Defaults with environment overrides applied.
    pub fn default_with_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        config.apply_env_overrides();
        Ok(config)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parsed = match ext {
            "toml" => toml::from_str(contents).map_err(|e| e.to_string()),
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| e.to_string()),
            _ => serde_json::from_str(contents).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("BROWSER_URL") {
            if !url.is_empty() {
                self.browser.remote_url = Some(url);
            }
        }
        if let Ok(value) = std::env::var("BROWSER_HEADLESS") {
            match value.to_lowercase().as_str() {
                "0" | "false" | "no" => self.browser.headless = false,
                "1" | "true" | "yes" => self.browser.headless = true,
                other => warn!("Ignoring BROWSER_HEADLESS={}", other),
            }
        }
    }

    /// Directory relative paths are resolved from.
    pub fn base_dir(&self) -> PathBuf {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolve a path that may be relative to the config file.
    pub fn resolve_path(&self, path_str: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }

    /// Where the consolidated catalog is written.
    pub fn output_path(&self) -> PathBuf {
        self.resolve_path(self.output.as_deref().unwrap_or(DEFAULT_OUTPUT))
    }
}
