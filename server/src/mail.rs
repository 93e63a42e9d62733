//! OTP email dispatch through an SMTP relay.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    transport::smtp::authentication::Credentials,
};
use tracing::info;

use crate::{config::Config, error::AppError};

pub type Mailer = AsyncSmtpTransport<Tokio1Executor>;

/// Builds the relay transport from the configured sender credentials.
/// Returns `None` when mail is unconfigured; only the OTP feature degrades.
pub fn init_mailer(config: &Config) -> Option<Mailer> {
    let (user, pass) = match (&config.email_user, &config.email_pass) {
        (Some(user), Some(pass)) => (user.clone(), pass.clone()),
        _ => return None,
    };

    let mailer = Mailer::relay(&config.smtp_relay)
        .unwrap()
        .credentials(Credentials::new(user, pass))
        .build();

    info!("Mail relay configured: {}", config.smtp_relay);
    Some(mailer)
}

/// Sends exactly one OTP email per call.
pub async fn send_otp(
    mailer: &Mailer,
    sender: &str,
    recipient: &str,
    code: &str,
) -> Result<(), AppError> {
    let email = Message::builder()
        .from(sender.parse()?)
        .to(recipient.parse()?)
        .subject("Your OTP Code")
        .body(format!(
            "Your OTP code is {code}. It is valid for 5 minutes."
        ))?;

    mailer.send(email).await?;

    Ok(())
}
