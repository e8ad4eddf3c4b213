//! One full crawl cycle: login, discovery, pool, slow pass, consolidation, output.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::authenticate;
use crate::config::{Category, Config, Credentials};
use crate::consolidate::consolidate;
use crate::crawl::{slow_retry_pass, PaginationDiscoverer, WorkerPool};
use crate::driver::{DriverFactory, PageDriver, Session};
use crate::error::CrawlError;
use crate::models::Job;
use crate::persist::write_json_atomic;
use crate::site::CompiledSite;

/// Summary of a finished cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub categories: usize,
    pub jobs: usize,
    pub fetched: usize,
    pub retried: usize,
    pub recovered: usize,
    pub products: usize,
    pub output: PathBuf,
}

impl CycleReport {
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

fn credentials(config: &Config) -> Result<Credentials, CrawlError> {
    config.credentials.resolve().ok_or_else(|| {
        CrawlError::Authentication(format!(
            "credentials missing: set {} and {}",
            config.credentials.user_env, config.credentials.password_env
        ))
    })
}

/// Open a driver and log in; the driver is closed on failure.
async fn login<F: DriverFactory>(
    config: &Config,
    factory: &F,
    site: &CompiledSite,
) -> Result<(F::Driver, Session), CrawlError> {
    let creds = credentials(config)?;
    let mut driver = factory.create().await?;
    match authenticate(&mut driver, site, &creds, &config.crawl.timings).await {
        Ok(session) => Ok((driver, session)),
        Err(e) => {
            driver.close().await;
            Err(e)
        }
    }
}

/// Crawl every configured category and write the consolidated catalog.
pub async fn run_cycle<F: DriverFactory>(
    config: &Config,
    factory: Arc<F>,
) -> Result<CycleReport, CrawlError> {
    let started_at = Utc::now();
    let site = Arc::new(CompiledSite::compile(&config.site)?);
    let settings = Arc::new(config.crawl.clone());

    let (mut driver, session) = login(config, factory.as_ref(), &site).await?;

    let discoverer = PaginationDiscoverer::new(site.clone(), config.crawl.clone());
    let mut jobs = Vec::new();
    for Category { label, url } in &config.site.categories {
        let links = discoverer.discover(&mut driver, url).await;
        info!("{}: {} products", label, links.len());
        jobs.extend(links.into_iter().map(|link| Job::new(link, label.clone())));
    }
    driver.close().await;
    let job_count = jobs.len();

    let session = Arc::new(session);
    let pool = WorkerPool::new(factory.clone(), site.clone(), settings.clone(), session.clone());
    let outcome = pool.run(jobs, settings.workers).await;
    let fetched = outcome.results.len();
    let retried = outcome.retry.len();

    let recovered = if settings.enable_slow_retry && !outcome.retry.is_empty() {
        slow_retry_pass(factory.as_ref(), &site, &settings, &session, outcome.retry).await
    } else {
        if retried > 0 {
            warn!("Dropping {} jobs without a slow retry", retried);
        }
        Vec::new()
    };
    let recovered_count = recovered.len();

    let products = consolidate(outcome.results.into_iter().chain(recovered));
    let output = config.output_path();
    write_json_atomic(&output, &products)?;
    info!("Wrote {} products to {}", products.len(), output.display());

    Ok(CycleReport {
        started_at,
        finished_at: Utc::now(),
        categories: config.site.categories.len(),
        jobs: job_count,
        fetched,
        retried,
        recovered: recovered_count,
        products: products.len(),
        output,
    })
}

/// Log in and list the product URLs of one configured category.
pub async fn discover_category<F: DriverFactory>(
    config: &Config,
    factory: &F,
    label: &str,
) -> Result<Vec<String>, CrawlError> {
    let category = config
        .site
        .category(label)
        .ok_or_else(|| CrawlError::UnknownCategory(label.to_string()))?;
    let site = Arc::new(CompiledSite::compile(&config.site)?);

    let (mut driver, _session) = login(config, factory, &site).await?;
    let discoverer = PaginationDiscoverer::new(site, config.crawl.clone());
    let links = discoverer.discover(&mut driver, &category.url).await;
    driver.close().await;
    Ok(links.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CrawlSettings, CrawlTimings, CredentialsConfig};
    use crate::driver::testing::{
        abs, fake_profile, FakeFactory, FakeListing, FakePager, FakeProduct, FakeSite,
    };
    use crate::persist::read_records;

    fn listing(paths: &[&str]) -> FakeListing {
        FakeListing::new(
            FakePager::Single,
            vec![paths.iter().map(|p| p.to_string()).collect()],
        )
    }

    fn config(output: PathBuf, user_env: &str, password_env: &str) -> Config {
        let mut site = fake_profile();
        site.categories = vec![
            Category::new("Anéis", abs("/categorias-aneis")),
            Category::new("Pulseiras", abs("/categorias-pulseiras")),
        ];
        Config {
            site,
            crawl: CrawlSettings {
                workers: 1,
                retry_max_tries: 2,
                retry_backoff_base_ms: 0,
                timings: CrawlTimings::immediate(),
                ..Default::default()
            },
            credentials: CredentialsConfig {
                user_env: user_env.to_string(),
                password_env: password_env.to_string(),
            },
            output: Some(output.to_string_lossy().into_owned()),
            ..Default::default()
        }
    }

    fn storefront() -> FakeSite {
        FakeSite::new()
            .listing(
                "/categorias-aneis",
                listing(&["/produto/100/anel-prata", "/produto/200/anel-ouro"]),
            )
            .listing(
                "/categorias-pulseiras",
                listing(&["/produto/100:2/anel-prata", "/produto/300/quebrado"]),
            )
            .product("/produto/100/anel-prata", FakeProduct::new("Anel Prata", "AN100", 5))
            .product("/produto/100:2/anel-prata", FakeProduct::new("", "AN100", 3))
            .product(
                "/produto/200/anel-ouro",
                FakeProduct::new("Anel Ouro", "AN200", 1).group("Tamanho", &["12", "14"]),
            )
            .product("/produto/300/quebrado", FakeProduct::new("Q", "Q", 1).always_blank())
    }

    #[tokio::test]
    async fn test_cycle_merges_across_categories() {
        std::env::set_var("VITRINE_CYCLE_TEST_USER", "buyer@example.com");
        std::env::set_var("VITRINE_CYCLE_TEST_PASS", "secret");
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("produtos.json");
        let config = config(out.clone(), "VITRINE_CYCLE_TEST_USER", "VITRINE_CYCLE_TEST_PASS");
        let factory = Arc::new(FakeFactory::new(storefront()));

        let report = run_cycle(&config, factory.clone()).await.unwrap();
        assert_eq!(report.categories, 2);
        assert_eq!(report.jobs, 4);
        assert_eq!(report.fetched, 3);
        assert_eq!(report.retried, 1);
        assert_eq!(report.recovered, 0);
        assert_eq!(report.products, 2);
        // Two pool attempts plus one slow attempt.
        assert_eq!(factory.site.visits("/produto/300/quebrado"), 3);

        let records = read_records(&out).unwrap();
        let ring = records
            .iter()
            .find(|r| r.canonical_id() == "100")
            .unwrap();
        assert_eq!(ring.title.as_deref(), Some("Anel Prata"));
        assert_eq!(ring.categories, vec!["Anéis", "Pulseiras"]);
        assert_eq!(ring.children.len(), 1);
        assert_eq!(ring.children[0].stock, Some(5));
        assert_eq!(ring.sku_base.as_deref(), Some("AN100"));

        let gold = records
            .iter()
            .find(|r| r.canonical_id() == "200")
            .unwrap();
        assert_eq!(gold.children.len(), 2);
        assert_eq!(gold.variations[0].attribute, "Size");
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(
            dir.path().join("out.json"),
            "VITRINE_CYCLE_TEST_UNSET_USER",
            "VITRINE_CYCLE_TEST_UNSET_PASS",
        );
        let factory = Arc::new(FakeFactory::new(storefront()));

        let err = run_cycle(&config, factory.clone()).await.unwrap_err();
        assert!(matches!(err, CrawlError::Authentication(_)));
        assert_eq!(factory.site.visits("/categorias-aneis"), 0);
        assert!(!dir.path().join("out.json").exists());
    }

    #[tokio::test]
    async fn test_discover_unknown_category() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path().join("out.json"), "X_UNUSED", "Y_UNUSED");
        let factory = FakeFactory::new(storefront());
        let err = discover_category(&config, &factory, "Relógios")
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::UnknownCategory(_)));
    }

    #[tokio::test]
    async fn test_discover_single_category() {
        std::env::set_var("VITRINE_DISCOVER_TEST_USER", "buyer@example.com");
        std::env::set_var("VITRINE_DISCOVER_TEST_PASS", "secret");
        let dir = tempfile::tempdir().unwrap();
        let config = config(
            dir.path().join("out.json"),
            "VITRINE_DISCOVER_TEST_USER",
            "VITRINE_DISCOVER_TEST_PASS",
        );
        let factory = FakeFactory::new(storefront());
        let links = discover_category(&config, &factory, "pulseiras").await.unwrap();
        assert_eq!(
            links,
            vec![abs("/produto/100:2/anel-prata"), abs("/produto/300/quebrado")]
        );
    }
}
