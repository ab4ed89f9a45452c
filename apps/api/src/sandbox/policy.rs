//! Privilege policy for render surfaces.
//!
//! A surface may run inline script and load the configured runtime assets, and
//! nothing else: no same-origin access, no network calls, no navigation of the
//! host, no form submission.

use anyhow::{anyhow, Result};
use reqwest::Url;
use serde::Serialize;

use crate::layout::PageGeometry;

/// Tokens for the embedding frame's `sandbox` attribute. Without `allow-same-origin`
/// the surface gets an opaque origin.
pub const FRAME_SANDBOX: &str = "allow-scripts";

#[derive(Debug, Clone, Default)]
pub struct SandboxPolicy {
    runtime_scripts: Vec<Url>,
    asset_origins: Vec<String>,
}

/// What the host page needs to embed a surface.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FrameDescriptor {
    pub title: &'static str,
    pub sandbox: &'static str,
    pub referrerpolicy: &'static str,
    pub width: String,
    pub min_height: String,
}

impl SandboxPolicy {
    /// Builds a policy from runtime script URLs and extra asset origins
    /// (fonts, stylesheets). Only `http`/`https` URLs are accepted.
    pub fn new(runtime_scripts: &[String], extra_origins: &[String]) -> Result<Self> {
        let mut scripts = Vec::with_capacity(runtime_scripts.len());
        let mut origins: Vec<String> = Vec::new();

        for raw in runtime_scripts {
            let url = parse_remote(raw)?;
            push_unique(&mut origins, url.origin().ascii_serialization());
            scripts.push(url);
        }
        for raw in extra_origins {
            let url = parse_remote(raw)?;
            push_unique(&mut origins, url.origin().ascii_serialization());
        }

        Ok(Self {
            runtime_scripts: scripts,
            asset_origins: origins,
        })
    }

    pub fn runtime_scripts(&self) -> &[Url] {
        &self.runtime_scripts
    }

    pub fn asset_origins(&self) -> &[String] {
        &self.asset_origins
    }

    /// Policy embedded as a `<meta http-equiv>` in the document itself.
    pub fn content_security_policy(&self) -> String {
        let origins = self.asset_origins.join(" ");
        let with_origins = |base: &str| {
            if origins.is_empty() {
                base.to_string()
            } else {
                format!("{base} {origins}")
            }
        };

        [
            "default-src 'none'".to_string(),
            with_origins("script-src 'unsafe-inline'"),
            with_origins("style-src 'unsafe-inline'"),
            with_origins("font-src data:"),
            "img-src data: https:".to_string(),
            "connect-src 'none'".to_string(),
            "form-action 'none'".to_string(),
            "base-uri 'none'".to_string(),
        ]
        .join("; ")
    }

    /// Policy sent as a response header when a surface document is served
    /// directly. Adds the `sandbox` directive, which a meta tag cannot carry.
    pub fn header_value(&self) -> String {
        format!(
            "sandbox {FRAME_SANDBOX}; {}; frame-ancestors 'self'",
            self.content_security_policy()
        )
    }

    pub fn frame(&self, geometry: &PageGeometry) -> FrameDescriptor {
        FrameDescriptor {
            title: "Live Preview",
            sandbox: FRAME_SANDBOX,
            referrerpolicy: "no-referrer",
            width: geometry.css_width(),
            min_height: geometry.css_height(),
        }
    }
}

fn parse_remote(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| anyhow!("Invalid runtime URL '{raw}': {e}"))?;
    match url.scheme() {
        "https" | "http" => Ok(url),
        other => Err(anyhow!("Runtime URL '{raw}' must be http(s), got '{other}'")),
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}
