use super::Authenticator;
use crate::KeyVaultError;
use async_trait::async_trait;

/// Pre-acquired bearer token, e.g. from `az account get-access-token`.
pub struct StaticTokenAuthenticator {
    token: String,
}

impl StaticTokenAuthenticator {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn check_usability(&self) -> Result<(), KeyVaultError> {
        if self.token.is_empty() {
            return Err(KeyVaultError::Configuration(
                "Static token is empty.".to_string(),
            ));
        }
        Ok(())
    }

    async fn get_authentication_token(&self) -> Result<String, KeyVaultError> {
        self.check_usability().await?;
        Ok(self.token.clone())
    }

    fn name(&self) -> &'static str {
        "StaticTokenAuthenticator"
    }
}
