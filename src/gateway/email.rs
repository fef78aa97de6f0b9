//! SendGrid v3 mail-send client.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use preorder_kernel::settings::{EmailSettings, GatewaySettings};
use serde_json::{json, Value};

use super::{error_body, http_client, EmailMessage, GatewayError, ReportMailer};

const SERVICE: &str = "email";

pub struct SendGridMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    sender: String,
    recipients: Vec<String>,
    subject_prefix: String,
    timeout: Duration,
}

impl SendGridMailer {
    pub fn new(email: &EmailSettings, gateway: &GatewaySettings) -> Result<Self, GatewayError> {
        let (Some(api_key), Some(sender)) = (&email.api_key, &email.sender) else {
            return Err(GatewayError::NotConfigured {
                service: SERVICE,
                missing: "email.api_key and email.sender",
            });
        };
        if email.recipients.is_empty() {
            return Err(GatewayError::NotConfigured {
                service: SERVICE,
                missing: "email.recipients",
            });
        }

        Ok(Self {
            client: http_client(SERVICE, gateway.timeout())?,
            endpoint: email.endpoint.clone(),
            api_key: api_key.clone(),
            sender: sender.clone(),
            recipients: email.recipients.clone(),
            subject_prefix: email.subject_prefix.clone(),
            timeout: gateway.timeout(),
        })
    }

    fn payload(&self, message: &EmailMessage) -> Value {
        let subject = if self.subject_prefix.is_empty() {
            message.subject.clone()
        } else {
            format!("{} {}", self.subject_prefix, message.subject)
        };
        let to: Vec<Value> = self
            .recipients
            .iter()
            .map(|address| json!({ "email": address }))
            .collect();

        let mut payload = json!({
            "personalizations": [{ "to": to }],
            "from": { "email": self.sender },
            "subject": subject,
            "content": [{ "type": "text/plain", "value": message.body }],
        });

        if !message.attachments.is_empty() {
            payload["attachments"] = message
                .attachments
                .iter()
                .map(|attachment| {
                    json!({
                        "content": STANDARD.encode(&attachment.content),
                        "filename": attachment.filename,
                        "type": attachment.content_type,
                        "disposition": "attachment",
                    })
                })
                .collect();
        }
        payload
    }
}

#[async_trait]
impl ReportMailer for SendGridMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.payload(message))
            .send()
            .await
            .map_err(|err| GatewayError::from_reqwest(SERVICE, self.timeout, err))?;

        if !response.status().is_success() {
            return Err(GatewayError::Rejected {
                service: SERVICE,
                status: response.status().as_u16(),
                body: error_body(response).await,
            });
        }

        tracing::info!(
            recipients = self.recipients.len(),
            subject = %message.subject,
            attachments = message.attachments.len(),
            "report email sent"
        );
        Ok(())
    }
}
