//! Browser engine configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// Explicit Chrome/Chromium executable; searched for when unset.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Inject stealth evasion scripts after each navigation.
    #[serde(default = "default_stealth")]
    pub stealth: bool,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,
}

pub fn default_headless() -> bool {
    true
}

pub fn default_stealth() -> bool {
    true
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            proxy: None,
            chrome_path: None,
            stealth: default_stealth(),
            chrome_args: Vec::new(),
            remote_url: None,
        }
    }
}
