//! Email service
//!
//! Sends transactional mail (welcome, donation receipts, refund notices,
//! conference confirmations). In `gmail` mode messages go through Gmail SMTP
//! authenticated with XOAUTH2, using an access token minted from the
//! configured refresh token. In `mock` mode messages are logged and kept in
//! an in-process outbox.

use anyhow::{anyhow, Context, Result};
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::{Credentials, Mechanism},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::{EmailConfig, EmailMode};

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// A rendered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Refresh this long before Google's stated expiry
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Access token plus the SMTP transport authenticated with it
struct GmailSession {
    expires_at: Instant,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl GmailSession {
    fn is_valid_at(&self, now: Instant) -> bool {
        now + TOKEN_EXPIRY_MARGIN < self.expires_at
    }
}

fn token_expiry(issued_at: Instant, expires_in: Option<u64>) -> Instant {
    issued_at + Duration::from_secs(expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS))
}

pub struct EmailService {
    config: EmailConfig,
    http: reqwest::Client,
    session: Mutex<Option<GmailSession>>,
    outbox: Mutex<Vec<OutgoingEmail>>,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            session: Mutex::new(None),
            outbox: Mutex::new(Vec::new()),
        }
    }

    /// Mock-mode service, used by tests and local runs
    pub fn mock() -> Self {
        Self::new(EmailConfig::default())
    }

    pub fn mode(&self) -> EmailMode {
        self.config.mode
    }

    /// Messages recorded in mock mode
    pub async fn outbox(&self) -> Vec<OutgoingEmail> {
        self.outbox.lock().await.clone()
    }

    pub async fn send(&self, email: OutgoingEmail) -> Result<()> {
        match self.config.mode {
            EmailMode::Mock => {
                tracing::info!(to = %email.to, subject = %email.subject, "Mock email recorded");
                self.outbox.lock().await.push(email);
                Ok(())
            }
            EmailMode::Gmail => self.send_gmail(email).await,
        }
    }

    /// Send and log failures instead of returning them. Mail is never allowed
    /// to fail the operation that triggered it.
    pub async fn send_logged(&self, email: OutgoingEmail) {
        let to = email.to.clone();
        if let Err(e) = self.send(email).await {
            tracing::warn!(to = %to, error = %e, "Failed to send email");
        }
    }

    async fn send_gmail(&self, email: OutgoingEmail) -> Result<()> {
        let from = format!("{} <{}>", self.config.from_name, self.config.user);
        let message = Message::builder()
            .from(from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(email.to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        let mailer = self.mailer().await?;
        if let Err(e) = mailer.send(message).await {
            // Force a new token and connection on the next send
            self.session.lock().await.take();
            return Err(anyhow!("Failed to send email: {}", e));
        }
        Ok(())
    }

    /// The cached transport, rebuilt once its access token is about to expire
    async fn mailer(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let mut session = self.session.lock().await;
        if let Some(current) = session.as_ref().filter(|s| s.is_valid_at(Instant::now())) {
            return Ok(current.mailer.clone());
        }

        let issued_at = Instant::now();
        let token = self.fetch_access_token().await?;
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .credentials(Credentials::new(self.config.user.clone(), token.access_token))
            .authentication(vec![Mechanism::Xoauth2])
            .build();
        tracing::debug!(expires_in = ?token.expires_in, "Gmail access token refreshed");

        *session = Some(GmailSession {
            expires_at: token_expiry(issued_at, token.expires_in),
            mailer: mailer.clone(),
        });
        Ok(mailer)
    }

    /// Exchange the refresh token for a short-lived access token
    async fn fetch_access_token(&self) -> Result<TokenResponse> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", self.config.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        self.http
            .post(GOOGLE_TOKEN_URL)
            .form(&params)
            .send()
            .await
            .context("OAuth2 token request failed")?
            .error_for_status()
            .context("OAuth2 token request rejected")?
            .json()
            .await
            .context("Invalid OAuth2 token response")
    }

    pub async fn send_welcome(&self, name: &str, email: &str) {
        self.send_logged(OutgoingEmail {
            to: email.to_string(),
            subject: format!("Welcome to {}", self.config.from_name),
            body: format!(
                "Hello {},\n\nThank you for joining {}. You can now support campaigns, \
                 join initiatives and share your stories with the community.\n\n{}",
                name, self.config.from_name, self.config.from_name
            ),
        })
        .await;
    }

    pub async fn send_donation_receipt(
        &self,
        name: &str,
        email: &str,
        amount: i64,
        currency: &str,
        campaign_title: Option<&str>,
    ) {
        let target = campaign_title
            .map(|t| format!(" to \"{}\"", t))
            .unwrap_or_default();
        self.send_logged(OutgoingEmail {
            to: email.to_string(),
            subject: "Thank you for your donation".to_string(),
            body: format!(
                "Dear {},\n\nWe received your donation of {}{}.\nThank you for your generosity.\n\n{}",
                name,
                format_amount(amount, currency),
                target,
                self.config.from_name
            ),
        })
        .await;
    }

    pub async fn send_purchase_receipt(&self, name: &str, email: &str, item: &str, quantity: i64, amount: i64, currency: &str) {
        self.send_logged(OutgoingEmail {
            to: email.to_string(),
            subject: "Your order".to_string(),
            body: format!(
                "Dear {},\n\nThank you for your purchase of {} x {} ({}).\n\n{}",
                name,
                quantity,
                item,
                format_amount(amount, currency),
                self.config.from_name
            ),
        })
        .await;
    }

    pub async fn send_refund_notice(&self, name: &str, email: &str, refunded: i64, currency: &str) {
        self.send_logged(OutgoingEmail {
            to: email.to_string(),
            subject: "Your refund".to_string(),
            body: format!(
                "Dear {},\n\nA refund of {} has been issued to your original payment method.\n\n{}",
                name,
                format_amount(refunded, currency),
                self.config.from_name
            ),
        })
        .await;
    }

    pub async fn send_conference_confirmation(&self, name: &str, email: &str, title: &str, location: &str, starts: &str) {
        self.send_logged(OutgoingEmail {
            to: email.to_string(),
            subject: format!("Registration confirmed: {}", title),
            body: format!(
                "Hello {},\n\nYou are registered for \"{}\" at {} on {}.\n\n{}",
                name, title, location, starts, self.config.from_name
            ),
        })
        .await;
    }
}

/// Render minor units as a decimal amount with currency code
pub fn format_amount(minor: i64, currency: &str) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{}{}.{:02} {}", sign, abs / 100, abs % 100, currency.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1250, "usd"), "12.50 USD");
        assert_eq!(format_amount(5, "eur"), "0.05 EUR");
        assert_eq!(format_amount(-300, "usd"), "-3.00 USD");
    }

    fn gmail_session(expires_at: Instant) -> GmailSession {
        GmailSession {
            expires_at,
            mailer: AsyncSmtpTransport::<Tokio1Executor>::relay("smtp.gmail.com")
                .unwrap()
                .build(),
        }
    }

    #[tokio::test]
    async fn test_token_expiry_margin() {
        let now = Instant::now();
        let session = gmail_session(token_expiry(now, Some(120)));
        assert!(session.is_valid_at(now));
        assert!(session.is_valid_at(now + Duration::from_secs(59)));
        assert!(!session.is_valid_at(now + Duration::from_secs(61)));

        let default = gmail_session(token_expiry(now, None));
        assert!(default.is_valid_at(now + Duration::from_secs(3000)));
    }

    #[tokio::test]
    async fn test_gmail_transport_is_reused_while_token_is_valid() {
        let email = EmailService::new(EmailConfig {
            mode: EmailMode::Gmail,
            ..EmailConfig::default()
        });
        *email.session.lock().await = Some(gmail_session(Instant::now() + Duration::from_secs(600)));

        // A cached session never reaches the token endpoint
        assert!(email.mailer().await.is_ok());
        assert!(email.session.lock().await.is_some());
    }

    #[tokio::test]
    async fn test_mock_mode_records_outbox() {
        let email = EmailService::mock();
        assert_eq!(email.mode(), EmailMode::Mock);

        email
            .send_donation_receipt("Ada", "ada@example.org", 2500, "usd", Some("Wells"))
            .await;

        let outbox = email.outbox().await;
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].to, "ada@example.org");
        assert!(outbox[0].body.contains("25.00 USD"));
        assert!(outbox[0].body.contains("\"Wells\""));
    }
}
