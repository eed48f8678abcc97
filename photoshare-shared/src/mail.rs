/// Outgoing email
///
/// The only message the service sends is the email-confirmation link. SMTP
/// is optional: without a configured host the [`Mailer`] logs what it would
/// have sent and returns `Ok(())`, which keeps local development and tests
/// free of a mail server.
use lettre::{
    message::{header::ContentType, Mailbox, Message},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use tera::{Context, Tera};

const FROM_NAME: &str = "PhotoShare App";

/// SMTP settings
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    /// Implicit TLS port. Default: 465
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("SMTP setup failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build email: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("Failed to render email: {0}")]
    Template(#[from] tera::Error),
}

#[derive(Clone)]
pub struct Mailer {
    from: Option<Mailbox>,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl Mailer {
    pub fn new(config: Option<EmailConfig>) -> Result<Self, MailError> {
        let Some(config) = config else {
            return Ok(Self::disabled());
        };

        let from = Mailbox::new(Some(FROM_NAME.to_string()), config.from_address.parse()?);

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(Credentials::new(config.username, config.password))
            .build();

        tracing::info!(host = %config.smtp_host, port = config.smtp_port, "SMTP mailer configured");

        Ok(Self {
            from: Some(from),
            transport: Some(transport),
        })
    }

    /// Mailer that only logs
    pub fn disabled() -> Self {
        Self {
            from: None,
            transport: None,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    /// Sends the "confirm your email" message
    pub async fn send_confirmation_email(
        &self,
        to: &str,
        username: &str,
        confirm_url: &str,
    ) -> Result<(), MailError> {
        let html = confirmation_body(username, confirm_url)?;
        self.send_html(to, "Confirm your email", html).await
    }

    async fn send_html(&self, to: &str, subject: &str, html: String) -> Result<(), MailError> {
        let (Some(transport), Some(from)) = (&self.transport, &self.from) else {
            tracing::warn!(to, subject, "Email not configured, skipping message");
            return Ok(());
        };

        let email = Message::builder()
            .from(from.clone())
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)?;

        transport.send(email).await?;

        tracing::info!(to, subject, "Email sent");
        Ok(())
    }
}

const CONFIRMATION_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
  <body>
    <p>Hi {{ username }},</p>
    <p>Thanks for signing up for PhotoShare. Please confirm your email address:</p>
    <p><a href="{{ url }}">Confirm email</a></p>
    <p>If the link does not work, paste this address into your browser:<br>{{ url }}</p>
  </body>
</html>
"#;

/// Renders the confirmation email. Both values are HTML-escaped.
fn confirmation_body(username: &str, confirm_url: &str) -> Result<String, tera::Error> {
    let mut context = Context::new();
    context.insert("username", username);
    context.insert("url", confirm_url);
    Tera::one_off(CONFIRMATION_TEMPLATE, &context, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_body_contains_link() {
        let body =
            confirmation_body("alice1", "http://localhost:8000/api/auth/confirmed_email/abc.def")
                .unwrap();
        assert!(body.contains("Hi alice1,"));
        // Slashes come out as entities, which browsers decode inside href
        assert!(body.contains("localhost:8000&#x2F;api&#x2F;auth&#x2F;confirmed_email&#x2F;abc.def"));
    }

    #[test]
    fn test_confirmation_body_escapes_markup() {
        let body = confirmation_body(
            r#"<a href=//evil.test>"#,
            r#"http://x/confirm" onclick="steal()"#,
        )
        .unwrap();

        assert!(!body.contains("<a href=//evil.test>"));
        assert!(body.contains("&lt;a href=&#x2F;&#x2F;evil.test&gt;"));
        assert!(!body.contains(r#"" onclick=""#));
        assert!(body.contains("&quot; onclick=&quot;steal()"));
    }

    #[tokio::test]
    async fn test_disabled_mailer_skips() {
        let mailer = Mailer::disabled();
        assert!(!mailer.is_configured());

        mailer
            .send_confirmation_email("alice@example.com", "alice1", "http://x/confirm")
            .await
            .unwrap();
    }

    #[test]
    fn test_invalid_from_address() {
        let result = Mailer::new(Some(EmailConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 465,
            username: "user".to_string(),
            password: "pass".to_string(),
            from_address: "not-an-address".to_string(),
        }));

        assert!(matches!(result, Err(MailError::Address(_))));
    }
}
