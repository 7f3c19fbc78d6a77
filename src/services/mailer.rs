use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::{MailTransport, SmtpConfig};
use crate::models::OtpPurpose;
use crate::utils::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError>;

    fn name(&self) -> &str;
}

pub fn build_mailer(
    transport: &MailTransport,
    from: &str,
) -> Result<Arc<dyn Mailer>, AppError> {
    match transport {
        MailTransport::Log => Ok(Arc::new(LogMailer)),
        MailTransport::Smtp(smtp) => Ok(Arc::new(SmtpMailer::new(smtp, from)?)),
    }
}

pub fn otp_mail(to: &str, code: &str, purpose: OtpPurpose, valid_minutes: i64) -> OutgoingMail {
    let action = match purpose {
        OtpPurpose::Login => "sign in",
        OtpPurpose::Register => "finish creating your account",
    };
    OutgoingMail {
        to: to.to_string(),
        subject: format!("Your verification code: {}", code),
        body: format!(
            "Use the code {} to {}.\n\nThe code expires in {} minutes. If you did not ask for it, ignore this email.",
            code, action, valid_minutes
        ),
    }
}

/// Development transport: the message lands in the log.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError> {
        info!(to = %mail.to, subject = %mail.subject, body = %mail.body, "Mail (log transport)");
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, from: &str) -> Result<Self, AppError> {
        let from = from
            .parse::<Mailbox>()
            .map_err(|e| AppError::InternalServerError(format!("Invalid MAIL_FROM: {}", e)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| AppError::ExternalServiceError(format!("SMTP setup failed: {}", e)))?
            .port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError> {
        let to = mail
            .to
            .parse::<Mailbox>()
            .map_err(|e| AppError::ValidationError(format!("Invalid recipient: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body)
            .map_err(|e| AppError::InternalServerError(format!("Mail build failed: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("Email send failed: {}", e)))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}
