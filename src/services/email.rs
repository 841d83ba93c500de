use anyhow::Context;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use uuid::Uuid;

use crate::config::Config;

pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailService {
    /// Returns None if SMTP is not fully configured.
    pub fn new(config: &Config) -> Option<Self> {
        let host = config.smtp_host.as_deref()?;
        let username = config.smtp_username.clone()?;
        let password = config.smtp_password.clone()?;
        let from_addr = config.smtp_from.as_deref()?;

        let port = config.smtp_port.unwrap_or(587);
        let creds = Credentials::new(username, password);

        let transport = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .ok()?
                .credentials(creds)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .ok()?
                .port(port)
                .credentials(creds)
                .build()
        };

        let from: Mailbox = from_addr.parse().ok()?;

        Some(Self { transport, from })
    }

    fn new_message_id(&self) -> String {
        format!("<{}@{}>", Uuid::new_v4(), self.from.email.domain())
    }

    async fn send_email(&self, to: Mailbox, subject: &str, text: &str, html: &str) -> anyhow::Result<()> {
        let email = Message::builder()
            .message_id(Some(self.new_message_id()))
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html.to_string()),
                    ),
            )
            .context("Failed to build email message")?;

        self.transport
            .send(email)
            .await
            .context("Failed to send email")?;

        Ok(())
    }

    /// Plain credential mail for a newly created staff or CQC account.
    pub async fn send_credentials(
        &self,
        to_email: &str,
        to_name: &str,
        username: &str,
        temp_password: &str,
        login_url: &str,
    ) -> anyhow::Result<()> {
        let to: Mailbox = match format!("{to_name} <{to_email}>").parse() {
            Ok(mailbox) => mailbox,
            Err(_) => to_email.parse().context("Invalid recipient address")?,
        };

        let subject = "Your care home system account";
        let text = credentials_text(to_name, username, temp_password, login_url);
        let html = format!(
            "<p>Hello {to_name},</p>\
             <p>An account has been created for you.</p>\
             <p>Username: <strong>{username}</strong><br>\
             Temporary password: <strong>{temp_password}</strong></p>\
             <p>Sign in at <a href=\"{login_url}\">{login_url}</a> and change your password straight away.</p>"
        );

        self.send_email(to, subject, &text, &html).await
    }
}

fn credentials_text(to_name: &str, username: &str, temp_password: &str, login_url: &str) -> String {
    format!(
        "Hello {to_name},\n\n\
         An account has been created for you.\n\n\
         Username: {username}\n\
         Temporary password: {temp_password}\n\n\
         Sign in at {login_url} and change your password straight away.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_text_contains_login_details() {
        let text = credentials_text("Sam Carer", "st123456", "Tmp12345abcd", "https://care.example.org/login");
        assert!(text.contains("Username: st123456"));
        assert!(text.contains("Temporary password: Tmp12345abcd"));
        assert!(text.contains("https://care.example.org/login"));
    }
}
