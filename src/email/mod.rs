pub mod templates;

use chrono::{DateTime, Utc};
use lettre::address::AddressError;
use lettre::message::{header::ContentType, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::{error, info};
use uuid::Uuid;

use crate::config::EmailConfig;
use crate::shared::models::EmailOutcome;

#[derive(Debug, Clone)]
pub struct EmailError(pub String);

impl std::fmt::Display for EmailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for EmailError {}

impl From<AddressError> for EmailError {
    fn from(err: AddressError) -> Self {
        EmailError(format!("Invalid email address: {err}"))
    }
}

/// Everything the invitation template needs about one meeting.
#[derive(Debug, Clone)]
pub struct MeetingInvite {
    pub title: String,
    pub host_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub description: String,
    pub meeting_link: String,
}

/// SMTP dispatch facade.
///
/// The transport is synchronous, so every send runs on the blocking
/// pool. Invitation batches go out strictly sequentially; one bounced
/// recipient never aborts the rest of the batch.
pub struct EmailService {
    mailer: SmtpTransport,
    from: Mailbox,
    configured: bool,
}

impl EmailService {
    pub fn new(config: &EmailConfig) -> Result<Self, EmailError> {
        let mailer = if config.is_configured() {
            SmtpTransport::starttls_relay(&config.host)
                .map_err(|e| EmailError(format!("SMTP relay error: {e}")))?
                .port(config.port)
                .credentials(Credentials::new(
                    config.username.clone(),
                    config.password.clone(),
                ))
                .build()
        } else {
            // Local dev relay without credentials or TLS.
            SmtpTransport::builder_dangerous(&config.host)
                .port(config.port)
                .build()
        };

        // An unconfigured service still has to construct; sends will
        // fail at the relay, not here.
        let address = if config.from_address.is_empty() {
            "no-reply@localhost".parse()?
        } else {
            config.from_address.parse()?
        };
        let from = Mailbox::new(Some(config.sender_name.clone()), address);

        Ok(Self {
            mailer,
            from,
            configured: config.is_configured(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Pre-flight check of the transport credentials.
    pub async fn verify(&self) -> Result<(), EmailError> {
        let mailer = self.mailer.clone();
        let ok = tokio::task::spawn_blocking(move || mailer.test_connection())
            .await
            .map_err(|e| EmailError(format!("Verification task failed: {e}")))?
            .map_err(|e| EmailError(e.to_string()))?;
        if ok {
            info!("Email configuration verified");
            Ok(())
        } else {
            Err(EmailError("SMTP connection test failed".to_string()))
        }
    }

    /// Sends one invitation. Failures are folded into the outcome
    /// record instead of propagating.
    pub async fn send_invitation(&self, invite: &MeetingInvite, guest_email: &str) -> EmailOutcome {
        match self.dispatch_invitation(invite, guest_email).await {
            Ok(message_id) => {
                info!("Invitation sent to {guest_email}");
                EmailOutcome::sent(guest_email, message_id)
            }
            Err(e) => {
                error!("Failed to send invitation to {guest_email}: {e}");
                EmailOutcome::failed(guest_email, e.to_string())
            }
        }
    }

    /// Sends a batch of invitations one after another, collecting one
    /// outcome per recipient.
    pub async fn send_invitations(
        &self,
        invite: &MeetingInvite,
        guest_emails: &[String],
    ) -> Vec<EmailOutcome> {
        let mut outcomes = Vec::with_capacity(guest_emails.len());
        for guest_email in guest_emails {
            outcomes.push(self.send_invitation(invite, guest_email).await);
        }
        outcomes
    }

    /// Sends one HTML email to a recipient list. Returns the message id.
    pub async fn send_summary(
        &self,
        recipients: &[String],
        subject: &str,
        html: &str,
    ) -> Result<String, EmailError> {
        if recipients.is_empty() {
            return Err(EmailError("No recipients given".to_string()));
        }

        let message_id = new_message_id();
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(subject)
            .message_id(Some(message_id.clone()));
        for recipient in recipients {
            builder = builder.to(recipient.parse()?);
        }
        let email = builder
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .map_err(|e| EmailError(format!("Failed to build email: {e}")))?;

        self.transmit(email).await?;
        Ok(message_id)
    }

    async fn dispatch_invitation(
        &self,
        invite: &MeetingInvite,
        guest_email: &str,
    ) -> Result<String, EmailError> {
        let message_id = new_message_id();
        let email = Message::builder()
            .from(self.from.clone())
            .to(guest_email.parse()?)
            .subject(templates::invitation_subject(&invite.title))
            .message_id(Some(message_id.clone()))
            .multipart(MultiPart::alternative_plain_html(
                templates::invitation_text(invite),
                templates::invitation_html(invite),
            ))
            .map_err(|e| EmailError(format!("Failed to build email: {e}")))?;

        self.transmit(email).await?;
        Ok(message_id)
    }

    async fn transmit(&self, email: Message) -> Result<(), EmailError> {
        let mailer = self.mailer.clone();
        tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| EmailError(format!("Send task failed: {e}")))?
            .map_err(|e| EmailError(e.to_string()))?;
        Ok(())
    }
}

fn new_message_id() -> String {
    format!("<{}@wismeet>", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> EmailConfig {
        EmailConfig {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            username: "robot@example.com".to_string(),
            password: "app-password".to_string(),
            from_address: "robot@example.com".to_string(),
            sender_name: "WISMeet".to_string(),
        }
    }

    #[test]
    fn test_service_builds_from_config() {
        let service = EmailService::new(&sample_config()).unwrap();
        assert!(service.is_configured());
        let from = service.from.to_string();
        assert!(from.starts_with("WISMeet"));
        assert!(from.ends_with("<robot@example.com>"));
    }

    #[test]
    fn test_service_without_credentials_is_unconfigured() {
        let mut config = sample_config();
        config.username.clear();
        config.password.clear();

        let service = EmailService::new(&config).unwrap();
        assert!(!service.is_configured());
    }

    #[test]
    fn test_rejects_malformed_from_address() {
        let mut config = sample_config();
        config.from_address = "not an address".to_string();
        assert!(EmailService::new(&config).is_err());
    }

    #[test]
    fn test_empty_from_address_gets_placeholder() {
        let mut config = sample_config();
        config.username.clear();
        config.password.clear();
        config.from_address.clear();

        let service = EmailService::new(&config).unwrap();
        assert!(service.from.to_string().contains("no-reply@localhost"));
    }

    #[test]
    fn test_message_id_shape() {
        let id = new_message_id();
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@wismeet>"));
    }
}
