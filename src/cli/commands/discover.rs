use console::style;

use crate::config::Config;
use crate::cycle::discover_category;
use crate::driver::BrowserDriverFactory;

pub async fn cmd_discover(config: &Config, category: &str) -> anyhow::Result<()> {
    let factory = BrowserDriverFactory::new(
        config.browser.clone(),
        std::sync::Arc::new(config.site.clone()),
        config.crawl.timings.page_load(),
    );

    let links = match discover_category(config, &factory, category).await {
        Ok(links) => links,
        Err(crate::error::CrawlError::UnknownCategory(label)) => {
            println!("{} Unknown category: {}", style("✗").red(), label);
            println!(
                "Available categories: {}",
                config
                    .site
                    .categories
                    .iter()
                    .map(|c| c.label.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    for link in &links {
        println!("{}", link);
    }
    println!(
        "{} {} product URLs in {}",
        style("✓").green(),
        links.len(),
        category
    );
    Ok(())
}
