//! Fire-and-forget email dispatch.
//!
//! Handlers enqueue a job and return immediately; a spawned worker drains
//! the queue and talks SMTP off the request path. Delivery failures are
//! logged and swallowed, never surfaced to the requester.

use anyhow::{Context, Result};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tokio::sync::mpsc;

use crate::config::SmtpConfig;

#[derive(Debug, Clone)]
pub struct EmailJob {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl EmailJob {
    pub fn verification(recipient: &str, username: &str, link: &str) -> Self {
        Self {
            recipient: recipient.to_string(),
            subject: "Verify your email".to_string(),
            body: format!(
                "hi {},\n\nuse the link below to verify your email:\n{}\n",
                username, link
            ),
        }
    }

    pub fn password_reset(recipient: &str, username: &str, link: &str) -> Self {
        Self {
            recipient: recipient.to_string(),
            subject: "Reset your password".to_string(),
            body: format!(
                "hello {},\n\nuse the link below to reset your password:\n{}\n",
                username, link
            ),
        }
    }
}

/// Sending half of the email queue, cheap to clone into handlers.
#[derive(Clone)]
pub struct Mailer {
    tx: mpsc::UnboundedSender<EmailJob>,
}

impl Mailer {
    pub fn enqueue(&self, job: EmailJob) {
        if self.tx.send(job).is_err() {
            log::warn!("email worker is gone, dropping email job");
        }
    }
}

/// Creates a mailer with its receiving end unattached. The caller either
/// hands the receiver to [`spawn_worker`]'s loop or, in tests, inspects
/// enqueued jobs directly.
pub fn channel() -> (Mailer, mpsc::UnboundedReceiver<EmailJob>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Mailer { tx }, rx)
}

/// Spawns the consuming worker and returns the sending half.
pub fn spawn_worker(smtp: Option<SmtpConfig>) -> Mailer {
    let (mailer, mut rx) = channel();
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            let recipient = job.recipient.clone();
            match &smtp {
                Some(cfg) => {
                    let cfg = cfg.clone();
                    match tokio::task::spawn_blocking(move || send_smtp(&cfg, &job)).await {
                        Ok(Ok(())) => log::info!("sent email to {}", recipient),
                        Ok(Err(e)) => {
                            log::error!("failed to send email to {}: {:#}", recipient, e)
                        }
                        Err(e) => log::error!("email send task panicked: {}", e),
                    }
                }
                None => log::info!(
                    "smtp not configured, dropping email to {} ({})",
                    recipient,
                    job.subject
                ),
            }
        }
    });
    mailer
}

fn send_smtp(cfg: &SmtpConfig, job: &EmailJob) -> Result<()> {
    let email = Message::builder()
        .from(cfg.from_address.parse().context("invalid from address")?)
        .to(job.recipient.parse().context("invalid recipient address")?)
        .subject(job.subject.clone())
        .header(lettre::message::header::ContentType::TEXT_PLAIN)
        .body(job.body.clone())
        .context("failed to build email")?;

    let transport = SmtpTransport::relay(&cfg.host)
        .context("failed to create SMTP transport")?
        .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
        .port(cfg.port)
        .build();

    transport.send(&email).context("SMTP send failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_delivers_to_receiver() {
        let (mailer, mut rx) = channel();
        mailer.enqueue(EmailJob::verification("a@x.com", "a", "http://link"));
        let job = rx.try_recv().unwrap();
        assert_eq!(job.recipient, "a@x.com");
        assert!(job.body.contains("http://link"));
    }

    #[test]
    fn enqueue_without_receiver_does_not_panic() {
        let (mailer, rx) = channel();
        drop(rx);
        mailer.enqueue(EmailJob::password_reset("a@x.com", "a", "http://link"));
    }
}
