use anyhow::Context;
use chrono::{DateTime, Utc};
use harbor_services::{ServeKind, ServedFile, ServingTarget};
use serde::Serialize;

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

/// Printable summary of a serving resolution.
#[derive(Debug, Serialize, PartialEq)]
pub struct ServedReport {
    pub served: String,
    pub degraded: bool,
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
}

impl ServedReport {
    pub fn new(served: ServeKind, degraded: bool, target: &ServingTarget) -> Self {
        let mut report = Self {
            served: served.to_string(),
            degraded,
            mode: "redirect",
            url: None,
            expires_at: None,
            content_type: None,
            content_length: None,
        };
        match target {
            ServingTarget::Redirect { url, expires_at } => {
                report.url = Some(url.clone());
                report.expires_at = Some(*expires_at);
            }
            ServingTarget::Stream {
                content_type,
                content_length,
                ..
            } => {
                report.mode = "stream";
                report.content_type = Some(content_type.clone());
                report.content_length = Some(*content_length);
            }
        }
        report
    }
}

impl From<&ServedFile> for ServedReport {
    fn from(file: &ServedFile) -> Self {
        Self::new(file.served, file.degraded, &file.target)
    }
}
