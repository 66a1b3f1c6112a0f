use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, thiserror::Error)]
#[error("email delivery failed: {0}")]
pub struct MailError(pub String);

/// Collaborateur d'envoi d'emails (le transport SMTP est hors de cette application)
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification_email(
        &self,
        to_email: &str,
        first_name: &str,
        last_name: &str,
        display_id: &str,
        link: &str,
    ) -> Result<(), MailError>;

    async fn send_welcome_email(
        &self,
        to_email: &str,
        first_name: &str,
        display_id: &str,
    ) -> Result<(), MailError>;
}

pub type SharedMailer = Arc<dyn Mailer>;

/// Implémentation par défaut : écrit le message dans les logs
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification_email(
        &self,
        to_email: &str,
        first_name: &str,
        last_name: &str,
        display_id: &str,
        link: &str,
    ) -> Result<(), MailError> {
        info!(
            to = %to_email,
            user_id = %display_id,
            "📧 Verification email for {} {}: {}",
            first_name, last_name, link
        );
        Ok(())
    }

    async fn send_welcome_email(
        &self,
        to_email: &str,
        first_name: &str,
        display_id: &str,
    ) -> Result<(), MailError> {
        info!(to = %to_email, user_id = %display_id, "📧 Welcome email for {}", first_name);
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Mailer de test : garde les messages en mémoire, peut simuler une panne
    #[derive(Default)]
    pub struct RecordingMailer {
        pub verifications: Mutex<Vec<(String, String)>>,
        pub welcomes: Mutex<Vec<String>>,
        pub fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_verification_email(
            &self,
            to_email: &str,
            _first_name: &str,
            _last_name: &str,
            _display_id: &str,
            link: &str,
        ) -> Result<(), MailError> {
            if self.fail {
                return Err(MailError("smtp unavailable".to_string()));
            }
            self.verifications
                .lock()
                .unwrap()
                .push((to_email.to_string(), link.to_string()));
            Ok(())
        }

        async fn send_welcome_email(
            &self,
            to_email: &str,
            _first_name: &str,
            _display_id: &str,
        ) -> Result<(), MailError> {
            if self.fail {
                return Err(MailError("smtp unavailable".to_string()));
            }
            self.welcomes.lock().unwrap().push(to_email.to_string());
            Ok(())
        }
    }
}
