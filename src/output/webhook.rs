// Tue Jan 13 2026 - Alex

use crate::config::WebhookConfig;
use crate::output::report::Report;
use crate::output::OutputError;
use crate::registry::ModuleId;
use crate::utils::string::{to_code_block, truncate};
use hmac::{Hmac, Mac};
use log::info;
use serde::Serialize;
use sha2::Sha256;

pub const SIGNATURE_HEADER: &str = "X-Signature-256";

const FAILURE_COLOR: u32 = 0xff0000;
const SUCCESS_COLOR: u32 = 0x00ff00;
const EMBED_DESCRIPTION_LIMIT: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookPayload {
    pub username: String,
    pub description: String,
    pub embeds: Vec<Embed>,
}

fn embed(title: &str, items: Vec<String>) -> Embed {
    let (description, color) = if items.is_empty() {
        ("None".to_string(), SUCCESS_COLOR)
    } else {
        (items.join("\n"), FAILURE_COLOR)
    };
    Embed {
        title: title.to_string(),
        description: truncate(&description, EMBED_DESCRIPTION_LIMIT),
        color,
    }
}

pub fn build_payload(report: &Report, username: &str, title: &str) -> WebhookPayload {
    let description = match &report.fatal {
        Some(reason) => format!("Here's the latest {}! Verification aborted: {}", title, reason),
        None => format!("Here's the latest {}!", title),
    };

    let patches = report
        .bad_patches
        .iter()
        .map(|p| {
            format!(
                "**{}** ({})\nID: `{}`\nMatch: {}",
                p.owner,
                p.kind,
                p.module.as_ref().map_or("-", ModuleId::as_str),
                to_code_block(&p.pattern, 0)
            )
        })
        .collect();
    let finds = report.bad_finds.iter().map(|f| to_code_block(f, 0)).collect();
    let starts = report
        .bad_starts
        .iter()
        .map(|s| format!("**{}**\n{}", s.plugin, to_code_block(&s.error, 0)))
        .collect();
    let errors = report.other_errors.iter().map(|e| to_code_block(e, 0)).collect();

    WebhookPayload {
        username: username.to_string(),
        description,
        embeds: vec![
            embed("Bad Patches", patches),
            embed("Bad Webpack Finds", finds),
            embed("Bad Starts", starts),
            embed("Host Errors", errors),
        ],
    }
}

/// `sha256=<hex HMAC-SHA256 of body>`.
pub fn sign(body: &[u8], secret: &str) -> Result<String, OutputError> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|e| OutputError::Signing(e.to_string()))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

pub fn deliver(config: &WebhookConfig, report: &Report, title: &str) -> Result<(), OutputError> {
    let payload = build_payload(report, &config.username, title);
    let body = serde_json::to_vec(&payload)?;

    let mut request = ureq::post(config.url.as_str()).header("Content-Type", "application/json");
    if let Some(secret) = &config.secret {
        request = request.header(SIGNATURE_HEADER, &sign(&body, secret)?);
    }
    request
        .send(&body[..])
        .map_err(|e| OutputError::Delivery(format!("POST {}: {}", config.url, e)))?;

    info!(target: "reporter", "Report delivered to webhook");
    Ok(())
}
