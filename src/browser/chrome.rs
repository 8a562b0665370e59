use crate::core::{EngineConfig, SnapshotFetcher};
use crate::dom::processor::{
    EXTRACT_ELEMENTS_SCRIPT, EXTRACT_FORMS_SCRIPT, EXTRACT_IMAGES_SCRIPT,
};
use crate::dom::{SnapshotProcessor, SnapshotResult};
use crate::errors::{Leg, Result, TextViewError};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Snapshot source driving a headless Chrome instance.
///
/// Every fetch launches its own browser so no state carries over between
/// pages. The CDP client is blocking and runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct ChromeSnapshotFetcher {
    headless: bool,
    user_agent: Option<String>,
    window_size: (u32, u32),
}

impl Default for ChromeSnapshotFetcher {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl ChromeSnapshotFetcher {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            headless: config.headless,
            user_agent: config.user_agent.clone(),
            window_size: (1280, 800),
        }
    }

    fn launch(&self, timeout: Duration) -> Result<Browser> {
        let window_size_arg = format!("--window-size={},{}", self.window_size.0, self.window_size.1);
        let user_agent_arg = self
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));

        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&window_size_arg),
        ];
        if let Some(ref ua_arg) = user_agent_arg {
            args.push(OsStr::new(ua_arg));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(self.headless)
            .args(args)
            .idle_browser_timeout(timeout)
            .build()
            .map_err(|e| TextViewError::unavailable(Leg::Snapshot, e))?;

        Browser::new(launch_options).map_err(|e| TextViewError::unavailable(Leg::Snapshot, e))
    }

    fn snapshot_blocking(&self, url: &str, timeout: Duration) -> Result<SnapshotResult> {
        let browser = self.launch(timeout)?;
        let tab = browser
            .new_tab()
            .map_err(|e| TextViewError::unavailable(Leg::Snapshot, e))?;
        tab.set_default_timeout(timeout);

        tab.navigate_to(url)
            .map_err(|e| TextViewError::protocol(Leg::Snapshot, e))?;
        tab.wait_until_navigated()
            .map_err(|e| TextViewError::protocol(Leg::Snapshot, e))?;

        let raw_markup = tab
            .get_content()
            .map_err(|e| TextViewError::protocol(Leg::Snapshot, e))?;

        let elements = match evaluate_json(&tab, EXTRACT_ELEMENTS_SCRIPT)
            .and_then(|json| SnapshotProcessor::parse_elements(&json))
        {
            Ok(elements) => elements,
            Err(e) => {
                warn!(url, error = %e, "element script failed, extracting from markup");
                SnapshotProcessor::extract_from_markup(&raw_markup)
            }
        };

        // images and forms are informational; a failure only loses them
        let images = evaluate_json(&tab, EXTRACT_IMAGES_SCRIPT)
            .and_then(|json| SnapshotProcessor::parse_images(&json))
            .unwrap_or_else(|e| {
                debug!(error = %e, "image extraction failed");
                Vec::new()
            });
        let forms = evaluate_json(&tab, EXTRACT_FORMS_SCRIPT)
            .and_then(|json| SnapshotProcessor::parse_forms(&json))
            .unwrap_or_else(|e| {
                debug!(error = %e, "form extraction failed");
                Vec::new()
            });

        debug!(
            url,
            elements = elements.len(),
            images = images.len(),
            forms = forms.len(),
            "chrome snapshot complete"
        );

        Ok(SnapshotResult::new(elements, raw_markup)
            .with_images(images)
            .with_forms(forms))
    }
}

/// Runs a script that returns a `JSON.stringify`-ed string.
fn evaluate_json(tab: &Tab, script: &str) -> Result<String> {
    let result = tab
        .evaluate(script, false)
        .map_err(|e| TextViewError::protocol(Leg::Snapshot, e))?;

    result
        .value
        .as_ref()
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| TextViewError::protocol(Leg::Snapshot, "script did not return a string"))
}

#[async_trait]
impl SnapshotFetcher for ChromeSnapshotFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> SnapshotResult {
        let fetcher = self.clone();
        let url = url.to_string();

        let work = tokio::task::spawn_blocking(move || fetcher.snapshot_blocking(&url, timeout));

        match tokio::time::timeout(timeout, work).await {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(e))) => SnapshotResult::failure(e),
            Ok(Err(join_err)) => SnapshotResult::failure(TextViewError::unavailable(Leg::Snapshot, join_err)),
            Err(_) => SnapshotResult::failure(TextViewError::FetchTimeout {
                leg: Leg::Snapshot,
                timeout,
            }),
        }
    }
}
