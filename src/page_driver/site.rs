//! Target-site layout and the login / location-filter flows
//!
//! Selector strings for the web app are collected in `SiteLayout`. When the
//! site's markup changes, this file and `TableLayout` are the only places
//! that need to follow.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::{DriverError, DriverResult, PageDriver};
use crate::config::ScraperConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteLayout {
    /// Path of the login form under the application root.
    pub login_path: String,
    /// Path of the lead list search surface.
    pub search_path: String,
    pub email_input: String,
    pub password_input: String,
    pub submit_button: String,
    /// Present only once the logged-in app shell has rendered.
    pub app_ready: String,
    pub location_input: String,
    pub rows_per_page_select: String,
    pub next_page_link: String,
}

impl Default for SiteLayout {
    fn default() -> Self {
        Self {
            login_path: "login".to_string(),
            search_path: "app/mylist-new".to_string(),
            email_input: r#"input[formcontrolname="email"]"#.to_string(),
            password_input: r#"input[formcontrolname="password"]"#.to_string(),
            submit_button: r#"button[type="submit"]"#.to_string(),
            app_ready: "app-root app-sidebar, app-root nav".to_string(),
            location_input: r#"input[id="placeInput"]"#.to_string(),
            rows_per_page_select: "select".to_string(),
            next_page_link: r#"a[aria-label="Next"]"#.to_string(),
        }
    }
}

/// Log in with the configured credentials.
///
/// Succeeds once the app shell renders, or once the browser has left the
/// login page. Staying on the login page is an `Authentication` error.
pub async fn authenticate(driver: &mut dyn PageDriver, config: &ScraperConfig) -> DriverResult<()> {
    let site = config.site();
    let credentials = config.credentials();

    driver.navigate(&config.app_url(&site.login_path)).await?;
    driver
        .wait_for(&site.email_input, config.element_timeout())
        .await?;
    driver.fill(&site.email_input, &credentials.email).await?;
    driver.fill(&site.password_input, &credentials.password).await?;

    if let Err(e) = driver.click(&site.submit_button).await {
        debug!("Submit button unavailable ({e}), submitting the form directly");
        driver.submit().await?;
    }

    match driver.wait_for(&site.app_ready, config.login_timeout()).await {
        Ok(()) => {
            info!("Logged in as {}", credentials.email);
            Ok(())
        }
        Err(wait_err) => match driver.current_url().await {
            Ok(Some(url)) if !url.contains(&site.login_path) => {
                info!("Logged in as {} (landed on {url})", credentials.email);
                Ok(())
            }
            _ => Err(DriverError::Authentication(format!(
                "still on the login page after submitting credentials ({wait_err})"
            ))),
        },
    }
}

/// Open the search surface and scope it to `location`.
///
/// Best-effort: a missing control is logged and reported as `false`, and
/// paging proceeds on whatever the page shows.
pub async fn apply_location_filter(
    driver: &mut dyn PageDriver,
    config: &ScraperConfig,
    location: &str,
) -> bool {
    let site = config.site();

    if let Err(e) = driver.navigate(&config.app_url(&site.search_path)).await {
        warn!("Could not open the search page: {e}");
        return false;
    }

    let filtered = match fill_location(driver, config, location).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Location filter not applied for '{location}': {e}");
            false
        }
    };

    if let Some(rows) = config.rows_per_page() {
        match driver.select_option(&site.rows_per_page_select, rows).await {
            Ok(true) => debug!("Showing {rows} rows per page"),
            Ok(false) => debug!("Rows-per-page control not found"),
            Err(e) => warn!("Could not change rows per page: {e}"),
        }
    }

    filtered
}

async fn fill_location(
    driver: &mut dyn PageDriver,
    config: &ScraperConfig,
    location: &str,
) -> DriverResult<()> {
    let site = config.site();
    driver
        .wait_for(&site.location_input, config.element_timeout())
        .await?;
    driver.fill(&site.location_input, location).await?;
    driver.submit().await
}
