//! Headless Chrome rasterizer.
//!
//! Launches one browser lazily and reuses it for every export; each export gets
//! its own tab. The print shell is written to a temporary `.html` file and
//! printed with the CSS page size, backgrounds on and zero margins.

use std::ffi::OsStr;
use std::io::Write;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use tracing::{debug, info, warn};

use crate::export::rasterizer::Rasterizer;
use crate::export::ExportError;
use crate::layout::PageGeometry;

pub struct ChromeRasterizer {
    chrome_path: Option<PathBuf>,
    timeout: Duration,
    browser: Arc<Mutex<Option<Browser>>>,
}

impl ChromeRasterizer {
    pub fn new(chrome_path: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            chrome_path,
            timeout,
            browser: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl Rasterizer for ChromeRasterizer {
    fn name(&self) -> &'static str {
        "headless-chrome"
    }

    async fn rasterize(&self, html: &str, geometry: &PageGeometry) -> Result<Bytes, ExportError> {
        let html = html.to_string();
        let geometry = *geometry;
        let chrome_path = self.chrome_path.clone();
        let timeout = self.timeout;
        let browser = Arc::clone(&self.browser);

        tokio::task::spawn_blocking(move || {
            print_document(&browser, chrome_path, timeout, &html, &geometry)
        })
        .await
        .map_err(|e| ExportError::Task(e.to_string()))?
    }
}

fn print_document(
    cache: &Mutex<Option<Browser>>,
    chrome_path: Option<PathBuf>,
    timeout: Duration,
    html: &str,
    geometry: &PageGeometry,
) -> Result<Bytes, ExportError> {
    let browser = browser(cache, chrome_path, timeout)?;

    let tab = match browser.new_tab() {
        Ok(tab) => TabGuard(tab),
        Err(e) => {
            // The browser process may have died; relaunch on the next export.
            cache
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take();
            return Err(ExportError::Rasterization(format!("Failed to open tab: {e:#}")));
        }
    };
    tab.set_default_timeout(timeout);

    let mut file = tempfile::Builder::new()
        .prefix("resume-export-")
        .suffix(".html")
        .tempfile()
        .map_err(|e| ExportError::Rasterization(format!("Failed to stage document: {e}")))?;
    file.write_all(html.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| ExportError::Rasterization(format!("Failed to stage document: {e}")))?;
    let url = format!("file://{}", file.path().display());
    debug!(%url, "Printing staged document");

    let options = PrintToPdfOptions {
        landscape: Some(false),
        display_header_footer: Some(false),
        print_background: Some(true),
        paper_width: Some(geometry.width_in()),
        paper_height: Some(geometry.height_in()),
        margin_top: Some(0.0),
        margin_bottom: Some(0.0),
        margin_left: Some(0.0),
        margin_right: Some(0.0),
        prefer_css_page_size: Some(true),
        ..Default::default()
    };

    let pdf = tab
        .navigate_to(&url)
        .and_then(|tab| tab.wait_until_navigated())
        .and_then(|tab| tab.print_to_pdf(Some(options)))
        .map_err(|e| ExportError::Rasterization(format!("{e:#}")))?;

    Ok(Bytes::from(pdf))
}

trait ExportTab {
    fn close_tab(&self) -> Result<(), String>;
}

impl ExportTab for Tab {
    fn close_tab(&self) -> Result<(), String> {
        self.close(true).map(|_| ()).map_err(|e| format!("{e:#}"))
    }
}

/// Closes the export tab when dropped, so a failed or abandoned print never
/// leaves it open in the cached browser.
struct TabGuard<T: ExportTab>(Arc<T>);

impl<T: ExportTab> Deref for TabGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ExportTab> Drop for TabGuard<T> {
    fn drop(&mut self) {
        match self.0.close_tab() {
            Ok(()) => debug!("Export tab closed"),
            Err(e) => warn!("Failed to close export tab: {e}"),
        }
    }
}

fn browser(
    cache: &Mutex<Option<Browser>>,
    chrome_path: Option<PathBuf>,
    timeout: Duration,
) -> Result<Browser, ExportError> {
    let mut cached = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(browser) = cached.as_ref() {
        return Ok(browser.clone());
    }

    let options = LaunchOptionsBuilder::default()
        .headless(true)
        .sandbox(false)
        .path(chrome_path)
        .idle_browser_timeout(timeout.max(Duration::from_secs(300)))
        .args(vec![
            OsStr::new("--allow-file-access-from-files"),
            OsStr::new("--disable-gpu"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-extensions"),
            OsStr::new("--disable-sync"),
            OsStr::new("--hide-scrollbars"),
        ])
        .build()
        .map_err(|e| ExportError::Unavailable(format!("Invalid Chrome launch options: {e}")))?;

    let browser = Browser::new(options)
        .map_err(|e| ExportError::Unavailable(format!("Failed to launch Chrome: {e:#}")))?;
    info!("Headless Chrome launched");

    *cached = Some(browser.clone());
    Ok(browser)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTab {
        closed: AtomicUsize,
    }

    impl ExportTab for CountingTab {
        fn close_tab(&self) -> Result<(), String> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn failing_print(tab: &TabGuard<CountingTab>) -> Result<Bytes, ExportError> {
        assert_eq!(tab.closed.load(Ordering::SeqCst), 0);
        Err(ExportError::Rasterization("navigation failed".to_string()))
    }

    #[test]
    fn test_tab_is_closed_when_print_fails() {
        let tab = Arc::new(CountingTab::default());
        let result = (|| {
            let guard = TabGuard(Arc::clone(&tab));
            let pdf = failing_print(&guard)?;
            Ok::<_, ExportError>(pdf)
        })();

        assert!(result.is_err());
        assert_eq!(tab.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tab_is_closed_once_on_success() {
        let tab = Arc::new(CountingTab::default());
        {
            let guard = TabGuard(Arc::clone(&tab));
            assert_eq!(guard.closed.load(Ordering::SeqCst), 0);
        }
        assert_eq!(tab.closed.load(Ordering::SeqCst), 1);
    }
}
