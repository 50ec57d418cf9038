use anyhow::{Context, Result};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport};
use log::info;
use serde::{Deserialize, Serialize};

/// Outbound email delivery for alert notifications.
///
/// Sending is strictly best-effort: a failure here must never roll back
/// or fail the alert record that triggered it.
pub trait EmailSender: Send + Sync {
    fn send_alert(&self, subject: &str, body: &str) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub to_emails: Vec<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_server: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            username: String::new(),
            password: String::new(),
            from_email: String::new(),
            to_emails: Vec::new(),
        }
    }
}

/// SMTP-backed sender for deployments with email configured
pub struct SmtpEmailSender {
    config: EmailConfig,
    transport: SmtpTransport,
}

impl SmtpEmailSender {
    pub fn new(config: EmailConfig) -> Result<Self> {
        info!(
            "Initializing SMTP sender for {}:{}",
            config.smtp_server, config.smtp_port
        );

        let tls_params = TlsParameters::new(config.smtp_server.clone())
            .context("Failed to create TLS parameters")?;

        let transport = SmtpTransport::relay(&config.smtp_server)
            .context("Failed to create SMTP relay")?
            .port(config.smtp_port)
            .tls(Tls::Required(tls_params))
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { config, transport })
    }
}

impl EmailSender for SmtpEmailSender {
    fn send_alert(&self, subject: &str, body: &str) -> Result<()> {
        if self.config.to_emails.is_empty() {
            info!("No email recipients configured, skipping alert email");
            return Ok(());
        }

        let mut builder = Message::builder().from(
            self.config
                .from_email
                .parse::<Mailbox>()
                .context("Failed to parse from email")?,
        );

        for email in &self.config.to_emails {
            builder = builder.bcc(email.parse::<Mailbox>().context("Failed to parse BCC email")?);
        }

        let email = builder
            .subject(subject)
            .body(body.to_string())
            .context("Failed to build email")?;

        self.transport.send(&email).context("Failed to send email")?;
        info!(
            "Alert email sent to {} recipients",
            self.config.to_emails.len()
        );
        Ok(())
    }
}
