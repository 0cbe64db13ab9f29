/// Transactional email over SMTP
///
/// [`Mailer`] is the seam handlers depend on; [`SmtpMailer`] is the lettre
/// implementation used in production.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Invalid mail configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,

    /// Sender address
    pub from_email: String,
}

impl SmtpConfig {
    /// Reads `SMTP_HOST`, `SMTP_PORT` (default 587), `SMTP_USER`,
    /// `SMTP_PASSWORD` and `SMTP_MAIL`
    pub fn from_env() -> Result<Self, MailError> {
        let required = |key: &str| {
            env::var(key).map_err(|_| MailError::InvalidConfiguration(format!("{} is not set", key)))
        };

        Ok(Self {
            host: required("SMTP_HOST")?,
            port: env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(587),
            username: required("SMTP_USER")?,
            password: required("SMTP_PASSWORD")?,
            from_email: required("SMTP_MAIL")?,
        })
    }
}

/// The emails the platform sends
#[derive(Debug, Clone, PartialEq)]
pub enum MailTemplate {
    /// Registration code, valid for five minutes
    Activation { name: String, activation_code: String },

    /// Someone answered the recipient's question
    QuestionReply {
        name: String,
        lesson_title: String,
        question: String,
    },

    OrderConfirmation {
        order_id: String,
        course_name: String,
        user_name: String,
        price: String,
        date: String,
    },
}

impl MailTemplate {
    pub fn subject(&self) -> &'static str {
        match self {
            MailTemplate::Activation { .. } => "Activate your account",
            MailTemplate::QuestionReply { .. } => "Question Reply",
            MailTemplate::OrderConfirmation { .. } => "Order Confirmation",
        }
    }

    pub fn render_html(&self) -> String {
        let body = match self {
            MailTemplate::Activation {
                name,
                activation_code,
            } => format!(
                "<p>Hello {},</p>\
                 <p>Thank you for registering with ByWay. Use the code below to activate your account.</p>\
                 <h2>{}</h2>\
                 <p>The code expires in 5 minutes.</p>",
                escape_html(name),
                escape_html(activation_code)
            ),
            MailTemplate::QuestionReply {
                name,
                lesson_title,
                question,
            } => format!(
                "<p>Hello {},</p>\
                 <p>A new reply has been added to your question in <strong>{}</strong>:</p>\
                 <blockquote>{}</blockquote>\
                 <p>Log in to your account to read it.</p>",
                escape_html(name),
                escape_html(lesson_title),
                escape_html(question)
            ),
            MailTemplate::OrderConfirmation {
                order_id,
                course_name,
                user_name,
                price,
                date,
            } => format!(
                "<p>Hello {},</p>\
                 <p>Thank you for your purchase.</p>\
                 <table>\
                 <tr><td>Order</td><td>#{}</td></tr>\
                 <tr><td>Course</td><td>{}</td></tr>\
                 <tr><td>Price</td><td>{}</td></tr>\
                 <tr><td>Date</td><td>{}</td></tr>\
                 </table>",
                escape_html(user_name),
                escape_html(order_id),
                escape_html(course_name),
                escape_html(price),
                escape_html(date)
            ),
        };

        format!(
            "<!DOCTYPE html><html><body style=\"font-family: sans-serif\">{}\
             <p>The ByWay team</p></body></html>",
            body
        )
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, template: MailTemplate) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &SmtpConfig) -> Result<Self, MailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailError::InvalidConfiguration(e.to_string()))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        let from = format!("ByWay <{}>", config.from_email)
            .parse()
            .map_err(|e| MailError::InvalidConfiguration(format!("Invalid from address: {}", e)))?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, template: MailTemplate) -> Result<(), MailError> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| MailError::InvalidAddress(format!("{}: {}", to, e)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(template.subject())
            .header(ContentType::TEXT_HTML)
            .body(template.render_html())
            .map_err(|e| MailError::SendFailed(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| MailError::SendFailed(e.to_string()))?;

        tracing::debug!(subject = template.subject(), "Email sent");
        Ok(())
    }
}
