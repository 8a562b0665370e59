use crate::core::TextFetcher;
use crate::errors::{Leg, TextViewError};
use crate::types::TextResult;
use async_trait::async_trait;
use regex::Regex;
use std::io;
use std::process::Output;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Text source backed by the `lynx` text browser.
///
/// Runs lynx twice per page: once for the wrapped text (with inline `[N]`
/// link markers) and once for the numbered reference list.
pub struct LynxTextFetcher {
    lynx_path: String,
}

impl Default for LynxTextFetcher {
    fn default() -> Self {
        Self::new("lynx")
    }
}

impl LynxTextFetcher {
    pub fn new(lynx_path: impl Into<String>) -> Self {
        Self {
            lynx_path: lynx_path.into(),
        }
    }

    pub fn text_args(url: &str, width: usize) -> Vec<String> {
        vec![
            "-dump".to_string(),
            "-nolist".to_string(),
            format!("-width={}", width),
            "-assume_charset=utf-8".to_string(),
            "-display_charset=utf-8".to_string(),
            url.to_string(),
        ]
    }

    /// Keeps lynx's numbering: the list is parsed for `N. url` lines.
    pub fn link_args(url: &str) -> Vec<String> {
        vec!["-dump".to_string(), "-listonly".to_string(), url.to_string()]
    }

    async fn run(&self, args: &[String]) -> io::Result<Output> {
        Command::new(&self.lynx_path)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
    }

    fn spawn_error(&self, err: io::Error) -> TextViewError {
        if err.kind() == io::ErrorKind::NotFound {
            TextViewError::unavailable(
                Leg::Text,
                format!("{} not found (install with: apt install lynx)", self.lynx_path),
            )
        } else {
            TextViewError::unavailable(Leg::Text, err)
        }
    }

    async fn fetch_inner(&self, url: &str, width: usize) -> TextResult {
        let output = match self.run(&Self::text_args(url, width)).await {
            Ok(output) => output,
            Err(e) => return TextResult::failure(self.spawn_error(e)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return TextResult::failure(TextViewError::protocol(
                Leg::Text,
                format!("lynx exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        let text = String::from_utf8_lossy(&output.stdout).into_owned();

        let links = match self.run(&Self::link_args(url)).await {
            Ok(output) => {
                if !output.status.success() {
                    warn!(url, status = %output.status, "lynx link list exited unsuccessfully");
                }
                parse_link_list(&String::from_utf8_lossy(&output.stdout))
            }
            Err(e) => {
                warn!(url, error = %e, "lynx link list failed, continuing without links");
                Vec::new()
            }
        };

        debug!(url, chars = text.len(), links = links.len(), "lynx fetch complete");
        TextResult::new(text, links)
    }
}

#[async_trait]
impl TextFetcher for LynxTextFetcher {
    async fn fetch(&self, url: &str, width: usize, timeout: Duration) -> TextResult {
        match tokio::time::timeout(timeout, self.fetch_inner(url, width)).await {
            Ok(result) => result,
            Err(_) => TextResult::failure(TextViewError::FetchTimeout {
                leg: Leg::Text,
                timeout,
            }),
        }
    }
}

const LINK_LINE_PATTERN: &str = r"^\s*(\d+)\.\s+(.+)$";

fn link_line_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(LINK_LINE_PATTERN).ok()).as_ref()
}

/// Parses lynx's `-listonly` output:
///
/// ```text
/// References
///
///    1. https://example.com/page1
///    2. https://example.com/page2
/// ```
///
/// Lynx numbers from 1, so a `0.` line is not a reference.
pub fn parse_link_list(output: &str) -> Vec<(u32, String)> {
    let Some(re) = link_line_re() else {
        return Vec::new();
    };

    output
        .lines()
        .filter_map(|line| {
            let caps = re.captures(line)?;
            let number = caps[1].parse::<u32>().ok().filter(|n| *n > 0)?;
            let target = caps[2].trim();
            (!target.is_empty()).then(|| (number, target.to_string()))
        })
        .collect()
}
