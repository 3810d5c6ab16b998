/// Concrete email and SMS transports behind [`NotificationSender`]
use crate::config::{EmailSettings, SmsSettings};
use crate::error::DeliveryError;
use crate::services::delivery::NotificationSender;
use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use reqwest::Client as HttpClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Twilio rejects bodies over 1600 characters
pub const SMS_MAX_CHARS: usize = 1590;

pub fn truncate_sms(text: &str) -> String {
    text.chars().take(SMS_MAX_CHARS).collect()
}

/// SMTP email transport
#[derive(Clone)]
pub struct SmtpEmailSender {
    transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl SmtpEmailSender {
    /// `None` when no SMTP host is configured
    pub fn from_settings(config: &EmailSettings) -> Result<Option<Self>, DeliveryError> {
        if config.smtp_host.trim().is_empty() {
            warn!("SMTP host not configured; email will be logged instead of sent");
            return Ok(None);
        }

        let from = config
            .smtp_from
            .parse::<Mailbox>()
            .map_err(|e| {
                DeliveryError::InvalidAddress(format!("SMTP_FROM {}: {}", config.smtp_from, e))
            })?;

        let builder = if config.use_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        }
        .map_err(|e| DeliveryError::Email(format!("Failed to configure SMTP transport: {}", e)))?
        .port(config.smtp_port);

        let builder = if let (Some(username), Some(password)) =
            (&config.smtp_username, &config.smtp_password)
        {
            builder.credentials(Credentials::new(username.to_string(), password.to_string()))
        } else {
            builder
        };

        Ok(Some(Self {
            transport: Arc::new(builder.build()),
            from,
        }))
    }

    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        text: &str,
    ) -> Result<(), DeliveryError> {
        let to = to
            .parse::<Mailbox>()
            .map_err(|e| DeliveryError::InvalidAddress(format!("{}: {}", to, e)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(text.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(html.to_string()),
                    ),
            )
            .map_err(|e| DeliveryError::Email(format!("Failed to build email message: {}", e)))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| DeliveryError::Email(e.to_string()))?;
        Ok(())
    }
}

/// Twilio Programmable Messaging over its REST API
#[derive(Clone)]
pub struct TwilioSmsSender {
    client: HttpClient,
    account_sid: String,
    auth_token: String,
    from_number: String,
    api_base: String,
}

impl TwilioSmsSender {
    /// `None` unless account SID, auth token and sender number are all set
    pub fn from_settings(config: &SmsSettings) -> Result<Option<Self>, DeliveryError> {
        let (Some(account_sid), Some(auth_token), Some(from_number)) =
            (&config.account_sid, &config.auth_token, &config.from_number)
        else {
            warn!("Twilio not configured; SMS will be logged instead of sent");
            return Ok(None);
        };

        let client = HttpClient::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DeliveryError::Sms(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Some(Self {
            client,
            account_sid: account_sid.clone(),
            auth_token: auth_token.clone(),
            from_number: from_number.clone(),
            api_base: "https://api.twilio.com".to_string(),
        }))
    }

    pub async fn send(&self, to: &str, text: &str) -> Result<(), DeliveryError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        );
        let body = truncate_sms(text);
        let form = [("To", to), ("From", self.from_number.as_str()), ("Body", body.as_str())];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| DeliveryError::Sms(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Sms(format!("Twilio returned {}: {}", status, error_text)));
        }
        Ok(())
    }
}

/// Routes each channel to its transport, or to the log when unconfigured
#[derive(Clone, Default)]
pub struct ChannelSender {
    email: Option<SmtpEmailSender>,
    sms: Option<TwilioSmsSender>,
}

impl ChannelSender {
    pub fn new(email: Option<SmtpEmailSender>, sms: Option<TwilioSmsSender>) -> Self {
        Self { email, sms }
    }

    pub fn from_settings(email: &EmailSettings, sms: &SmsSettings) -> Result<Self, DeliveryError> {
        Ok(Self::new(
            SmtpEmailSender::from_settings(email)?,
            TwilioSmsSender::from_settings(sms)?,
        ))
    }

    pub fn is_email_enabled(&self) -> bool {
        self.email.is_some()
    }

    pub fn is_sms_enabled(&self) -> bool {
        self.sms.is_some()
    }
}

#[async_trait]
impl NotificationSender for ChannelSender {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        text: &str,
    ) -> Result<(), DeliveryError> {
        match &self.email {
            Some(smtp) => {
                smtp.send(to, subject, html, text).await?;
                info!(subject, "Email sent");
            }
            None => {
                info!(subject, recipient = to, "Email in log-only mode; skipping actual send");
            }
        }
        Ok(())
    }

    async fn send_sms(&self, to: &str, text: &str) -> Result<(), DeliveryError> {
        match &self.sms {
            Some(twilio) => {
                twilio.send(to, text).await?;
                info!(chars = text.chars().count().min(SMS_MAX_CHARS), "SMS sent");
            }
            None => {
                info!(recipient = to, "SMS in log-only mode; skipping actual send");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email_settings(host: &str) -> EmailSettings {
        EmailSettings {
            smtp_host: host.to_string(),
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_from: "alerts@example.com".to_string(),
            use_starttls: true,
        }
    }

    #[test]
    fn test_truncate_sms_counts_chars_not_bytes() {
        let long = "é".repeat(2000);
        let truncated = truncate_sms(&long);
        assert_eq!(truncated.chars().count(), SMS_MAX_CHARS);
        assert_eq!(truncate_sms("short"), "short");
    }

    #[test]
    fn test_unconfigured_channels_are_log_only() {
        let sms = SmsSettings {
            account_sid: Some("AC123".into()),
            auth_token: None,
            from_number: Some("+15550000000".into()),
        };
        let sender = ChannelSender::from_settings(&email_settings("  "), &sms).unwrap();
        assert!(!sender.is_email_enabled());
        assert!(!sender.is_sms_enabled());
    }

    #[test]
    fn test_invalid_from_address_is_rejected() {
        let mut settings = email_settings("smtp.example.com");
        settings.smtp_from = "not an address".into();
        assert!(matches!(
            SmtpEmailSender::from_settings(&settings),
            Err(DeliveryError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_log_only_sends_succeed() {
        let sender = ChannelSender::default();
        assert!(sender.send_email("a@example.com", "s", "<p>h</p>", "t").await.is_ok());
        assert!(sender.send_sms("+15550001111", "t").await.is_ok());
    }
}
