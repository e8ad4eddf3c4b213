//! Crawl cycle command, once or on an interval.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use console::style;
use tokio::sync::watch;

use crate::config::Config;
use crate::cycle::{run_cycle, CycleReport};
use crate::driver::BrowserDriverFactory;
use crate::error::CrawlError;

fn print_report(report: &CycleReport) {
    println!(
        "{} {} products from {} jobs ({} fetched, {} retried, {} recovered) in {}s",
        style("✓").green(),
        report.products,
        report.jobs,
        report.fetched,
        report.retried,
        report.recovered,
        report.elapsed().num_seconds()
    );
    println!("  {} {}", style("→").dim(), report.output.display());
}

/// Listen for Ctrl+C for the rest of the program and flag it on the channel.
fn spawn_interrupt_listener() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n{} Interrupted, stopping", style("!").yellow());
            let _ = tx.send(true);
        }
    });
    rx
}

/// Resolves once the interrupt flag is raised; never if the listener is gone.
async fn interrupted(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Run one crawl cycle, or keep running them every `interval` minutes.
pub async fn cmd_run(config: Config, looping: bool, interval: u64) -> anyhow::Result<()> {
    let factory = Arc::new(BrowserDriverFactory::new(
        config.browser.clone(),
        Arc::new(config.site.clone()),
        config.crawl.timings.page_load(),
    ));

    if looping {
        println!(
            "{} Running in loop mode (interval: {} min, Ctrl+C to stop)",
            style("→").cyan(),
            interval
        );
    }

    let shutdown = spawn_interrupt_listener();
    let config = &config;
    let factory = &factory;
    run_cycles(
        move || {
            println!(
                "{} Crawling {} categories with {} workers...",
                style("→").cyan(),
                config.site.categories.len(),
                config.crawl.workers.max(1)
            );
            run_cycle(config, factory.clone())
        },
        looping,
        Duration::from_secs(interval * 60),
        shutdown,
    )
    .await
}

/// Drive cycles until done, racing each cycle and each sleep against the interrupt flag.
async fn run_cycles<C, Fut>(
    mut cycle: C,
    looping: bool,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()>
where
    C: FnMut() -> Fut,
    Fut: Future<Output = Result<CycleReport, CrawlError>>,
{
    loop {
        let outcome = tokio::select! {
            outcome = cycle() => outcome,
            _ = interrupted(&mut shutdown) => {
                tracing::info!("Cycle interrupted");
                return Ok(());
            }
        };

        match outcome {
            Ok(report) => print_report(&report),
            Err(e) if looping => {
                tracing::error!("Cycle failed: {}", e);
                println!("{} Cycle failed: {}", style("✗").red(), e);
            }
            Err(e) => return Err(e.into()),
        }

        if !looping {
            return Ok(());
        }

        println!(
            "{} Sleeping for {} min before next cycle...",
            style("→").dim(),
            interval.as_secs() / 60
        );
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = interrupted(&mut shutdown) => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    fn report() -> CycleReport {
        let now = Utc::now();
        CycleReport {
            started_at: now,
            finished_at: now,
            categories: 1,
            jobs: 0,
            fetched: 0,
            retried: 0,
            recovered: 0,
            products: 0,
            output: PathBuf::from("produtos_scrape.json"),
        }
    }

    #[tokio::test]
    async fn test_interrupt_during_cycle_stops_loop() {
        let (tx, rx) = watch::channel(false);
        let tx = Arc::new(tx);
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let cycle = move || {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let tx = tx.clone();
            async move {
                match call {
                    1 => Err(CrawlError::Authentication("login rejected".to_string())),
                    2 => {
                        let _ = tx.send(true);
                        std::future::pending().await
                    }
                    _ => Ok(report()),
                }
            }
        };

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            run_cycles(cycle, true, Duration::ZERO, rx),
        )
        .await
        .expect("loop should stop on interrupt");
        assert!(result.is_ok());
        // The failed first cycle did not end the loop.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_interrupt_during_sleep_stops_loop() {
        let (tx, rx) = watch::channel(false);
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let cycle = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(report()) }
        };
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = tx.send(true);
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            run_cycles(cycle, true, Duration::from_secs(3600), rx),
        )
        .await
        .expect("loop should stop on interrupt");
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_run_returns_cycle_error() {
        let (_tx, rx) = watch::channel(false);
        let cycle = || async { Err(CrawlError::UnknownCategory("Relógios".to_string())) };

        let result = run_cycles(cycle, false, Duration::ZERO, rx).await;
        assert!(result.is_err());
    }
}
