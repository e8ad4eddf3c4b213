//! Interactive login and session capture.

use tracing::{debug, info};

use crate::config::{CrawlTimings, Credentials, LoginProfile};
use crate::crawl::wait::{pause, wait_for_html};
use crate::driver::{Locator, PageDriver, SelectorSet, Session};
use crate::error::CrawlError;
use crate::site::CompiledSite;

/// Whether the page shows any of the logged-in markers (case-insensitive).
pub fn looks_logged_in(html: &str, markers: &[String]) -> bool {
    let lower = html.to_lowercase();
    markers
        .iter()
        .any(|m| !m.is_empty() && lower.contains(&m.to_lowercase()))
}

/// Log in once and capture the resulting cookies and local storage.
pub async fn authenticate<D: PageDriver + ?Sized>(
    driver: &mut D,
    site: &CompiledSite,
    credentials: &Credentials,
    timings: &CrawlTimings,
) -> Result<Session, CrawlError> {
    let profile = &site.profile;
    let login: &LoginProfile = &profile.login;
    let url = profile.login_url();
    info!("Logging in as {}", credentials.user);

    driver
        .navigate(&url)
        .await
        .map_err(|e| CrawlError::Authentication(format!("could not open {}: {}", url, e)))?;
    pause(timings.after_nav()).await;

    match driver.find_and_click(&SelectorSet::cookie_consent(profile)).await {
        Ok(true) => debug!("cookie banner accepted"),
        Ok(false) => {}
        Err(e) => debug!("cookie banner: {}", e),
    }

    let email = Locator::Css(login.email_selector.clone());
    let password = Locator::Css(login.password_selector.clone());
    let filled = fill(driver, &email, &credentials.user).await?
        && fill(driver, &password, &credentials.password).await?;
    if !filled {
        return Err(CrawlError::Authentication(
            "login form fields not found".to_string(),
        ));
    }

    let submitted = driver
        .find_and_click(&SelectorSet::login_submit(profile))
        .await
        .map_err(|e| CrawlError::Authentication(e.to_string()))?;
    if !submitted {
        return Err(CrawlError::Authentication(
            "login submit control not found".to_string(),
        ));
    }

    let markers = &login.logged_in_markers;
    let confirmed = wait_for_html(driver, timings.login_timeout(), timings.poll(), |html| {
        looks_logged_in(html, markers)
    })
    .await;
    if !confirmed {
        return Err(CrawlError::Authentication(
            "no logged-in marker after submitting credentials".to_string(),
        ));
    }

    let session = driver
        .capture_session()
        .await
        .map_err(|e| CrawlError::Authentication(format!("could not capture session: {}", e)))?;
    info!(
        "Logged in ({} cookies, {} storage keys)",
        session.cookies.len(),
        session.local_storage.len()
    );
    Ok(session)
}

async fn fill<D: PageDriver + ?Sized>(
    driver: &mut D,
    locator: &Locator,
    value: &str,
) -> Result<bool, CrawlError> {
    driver
        .fill(locator, value)
        .await
        .map_err(|e| CrawlError::Authentication(e.to_string()))
}
