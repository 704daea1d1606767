//! Outbound email transports.

use async_trait::async_trait;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use lettre::message::{header, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::info;

use crate::error::{NewsletterError, NewsletterResult};
use crate::render::RenderedDigest;

/// Something that can deliver a rendered digest.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        sender: &str,
        destination: &str,
        digest: &RenderedDigest,
    ) -> NewsletterResult<()>;
}

/// Amazon SES v2 transport. Requires the sender identity to be verified
/// in the account's SES configuration.
pub struct SesMailer {
    client: aws_sdk_sesv2::Client,
}

impl SesMailer {
    pub fn new(client: aws_sdk_sesv2::Client) -> Self {
        Self { client }
    }

    pub async fn from_env() -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(aws_sdk_sesv2::Client::new(&config))
    }
}

fn utf8_content(data: &str) -> NewsletterResult<Content> {
    Content::builder()
        .data(data)
        .charset("UTF-8")
        .build()
        .map_err(|e| NewsletterError::send_failed(format!("invalid email content: {e}")))
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send(
        &self,
        sender: &str,
        destination: &str,
        digest: &RenderedDigest,
    ) -> NewsletterResult<()> {
        let message = Message::builder()
            .subject(utf8_content(&digest.subject)?)
            .body(
                Body::builder()
                    .html(utf8_content(&digest.html)?)
                    .text(utf8_content(&digest.text)?)
                    .build(),
            )
            .build();

        let output = self
            .client
            .send_email()
            .from_email_address(sender)
            .destination(
                Destination::builder()
                    .to_addresses(destination)
                    .build(),
            )
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| {
                NewsletterError::send_failed(format!(
                    "ses send failed: {}",
                    e.into_service_error()
                ))
            })?;

        info!(
            message_id = output.message_id().unwrap_or("unknown"),
            "digest sent via ses"
        );
        Ok(())
    }
}

/// Gmail SMTP transport authenticated with an app password.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn gmail(username: &str, app_password: &str) -> NewsletterResult<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay("smtp.gmail.com")
            .map_err(|e| NewsletterError::send_failed(format!("smtp relay setup: {e}")))?
            .credentials(Credentials::new(
                username.to_string(),
                app_password.to_string(),
            ))
            .build();
        Ok(Self { transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        sender: &str,
        destination: &str,
        digest: &RenderedDigest,
    ) -> NewsletterResult<()> {
        let from: Mailbox = sender
            .parse()
            .map_err(|e| NewsletterError::send_failed(format!("bad sender address: {e}")))?;
        let to: Mailbox = destination
            .parse()
            .map_err(|e| NewsletterError::send_failed(format!("bad destination address: {e}")))?;

        let email = lettre::Message::builder()
            .from(from)
            .to(to)
            .subject(&digest.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(digest.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(digest.html.clone()),
                    ),
            )
            .map_err(|e| NewsletterError::send_failed(format!("build message: {e}")))?;

        let response = self
            .transport
            .send(email)
            .await
            .map_err(|e| NewsletterError::send_failed(format!("smtp send failed: {e}")))?;

        info!(code = %response.code(), "digest sent via smtp");
        Ok(())
    }
}
