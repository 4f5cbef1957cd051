use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("failed to build email: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("{0}")]
    Transport(String),
}

/// Sends mail through a lettre transport. Generic over the transport so
/// tests can substitute the stub transport for the SMTP relay.
pub struct Mailer<T> {
    transport: T,
    from_address: Address,
    from_name: String,
}

/// Production transport: STARTTLS to the configured relay with password
/// authentication.
pub fn smtp_transport(
    config: &Config,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, lettre::transport::smtp::Error> {
    let creds = Credentials::new(config.smtp_user.clone(), config.smtp_password.clone());

    Ok(
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(creds)
            .build(),
    )
}

impl<T> Mailer<T>
where
    T: AsyncTransport + Send + Sync,
    T::Error: std::fmt::Display,
{
    pub fn new(transport: T, from_address: Address, from_name: String) -> Self {
        Mailer {
            transport,
            from_address,
            from_name,
        }
    }

    /// Build and submit one message. No retries; a failed send goes back
    /// to the caller as-is.
    pub async fn send(
        &self,
        to: Mailbox,
        subject: &str,
        body: &str,
        from_name: Option<&str>,
    ) -> Result<(), MailError> {
        let display = from_name.unwrap_or(&self.from_name);
        let from = Mailbox::new(Some(display.to_string()), self.from_address.clone());

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(render_html(body)),
                    ),
            )?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        Ok(())
    }
}

// HTML alternative is the plain body wrapped in <pre>.
fn render_html(body: &str) -> String {
    format!(
        "<html><body><pre>{}</pre></body></html>",
        body.replace('\n', "<br>")
    )
}
