use anyhow::Context;
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};

use crate::config::NotificationConfig;
use crate::models::CostEvent;

/// Plain-text spike alerts over SMTP. Disabled unless the notification block
/// is configured; a disabled sender silently drops sends so worker runs need
/// no special casing.
pub struct EmailSender {
    config: NotificationConfig,
}

impl EmailSender {
    pub fn new(config: NotificationConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
            && !self.config.smtp_host.trim().is_empty()
            && !self.config.from_address.trim().is_empty()
    }

    pub async fn send(&self, to_email: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        if !self.is_enabled() {
            tracing::warn!("Email not configured, skipping notification to {to_email}");
            return Ok(());
        }

        let from: Mailbox = self
            .config
            .from_address
            .parse()
            .context("Invalid from address")?;
        let to: Mailbox = to_email.parse().context("Invalid recipient address")?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .body(body.to_string())
            .context("Failed to build email")?;

        let mut transport =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
                .context("Failed to create SMTP transport")?
                .port(self.config.smtp_port);
        if !self.config.smtp_user.trim().is_empty() {
            transport = transport.credentials(Credentials::new(
                self.config.smtp_user.clone(),
                self.config.smtp_password.clone(),
            ));
        }

        transport.build().send(email).await.context("SMTP send failed")?;
        Ok(())
    }
}

/// Subject and body for one user's spike alert.
pub fn spike_email(event: &CostEvent) -> (String, String) {
    let subject = format!("Azure Cost Spike Detected ({})", event.date);

    let top_resource = event
        .top_resource_name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or("Unknown resource");
    let top_type = event
        .top_resource_type
        .as_deref()
        .filter(|ty| !ty.trim().is_empty())
        .unwrap_or("unknown type");
    let increase = event
        .top_increase_amount
        .map(|amount| format!("{:.2} USD", amount))
        .unwrap_or_else(|| "n/a".to_string());

    let body = [
        format!("A cost spike was detected for {}.", event.date),
        format!("Previous day: {:.2} USD", event.total_yesterday),
        format!("Latest day: {:.2} USD", event.total_today),
        format!("Difference: {:.2} USD", event.difference),
        format!("Top cause: {top_resource} ({top_type}), increase {increase}"),
        String::new(),
        "Azure Cost Spike Explainer".to_string(),
    ]
    .join("\n");

    (subject, body)
}
