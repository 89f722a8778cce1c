// src/infrastructure/email/mod.rs
// Resend email delivery

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DeliveryError, DeliveryResult, HttpError};
use crate::domain::models::{DeliveryReceipt, Report};
use crate::domain::repository::Notifier;
use crate::infrastructure::http::HttpClient;

pub const RESEND_BASE_URL: &str = "https://api.resend.com";

#[derive(Debug, Serialize)]
struct EmailPayload<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<Attachment<'a>>,
}

#[derive(Debug, Serialize)]
struct Attachment<'a> {
    filename: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

pub struct ResendNotifier {
    http: HttpClient,
    api_key: String,
    from: String,
    to: Vec<String>,
    base_url: String,
}

impl ResendNotifier {
    pub fn new(http: HttpClient, api_key: &str, from: &str, to: Vec<String>) -> Self {
        Self::with_base_url(http, api_key, from, to, RESEND_BASE_URL)
    }

    pub fn with_base_url(
        http: HttpClient,
        api_key: &str,
        from: &str,
        to: Vec<String>,
        base_url: &str,
    ) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            from: from.to_string(),
            to,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

fn map_http_error(err: HttpError) -> DeliveryError {
    match err {
        HttpError::Status { status: 401, body } => DeliveryError::Rejected {
            status: 401,
            body: format!("{} (check RESEND_API_KEY)", body),
        },
        HttpError::Status { status, body } => DeliveryError::Rejected { status, body },
        HttpError::Json(e) => DeliveryError::InvalidResponse(e.to_string()),
        HttpError::Request(e) => DeliveryError::Request(e),
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn send(&self, report: &Report) -> DeliveryResult<DeliveryReceipt> {
        let mut attachments = Vec::new();
        if !report.csv_attachment.is_empty() {
            attachments.push(Attachment {
                filename: &report.attachment_name,
                content: STANDARD.encode(report.csv_attachment.as_bytes()),
            });
        }

        let payload = EmailPayload {
            from: &self.from,
            to: &self.to,
            subject: &report.subject,
            html: &report.html_body,
            attachments,
        };

        log::info!(
            "Sending \"{}\" to {} recipient(s): {}",
            report.subject,
            self.to.len(),
            self.to.join(", ")
        );

        let response: SendResponse = self
            .http
            .post_json(&format!("{}/emails", self.base_url), &self.api_key, &payload)
            .await
            .map_err(map_http_error)?;

        log::info!("Email accepted by Resend, id {}", response.id);
        Ok(DeliveryReceipt { id: response.id })
    }
}
