use super::{
    Authenticator, ClientCredentialsEnvironmentAuthenticator, FederatedTokenAuthenticator,
    ManagedCredentialsAuthenticator,
};
use crate::config::EnvConfig;
use crate::http::HttpClientFactory;
use crate::KeyVaultError;
use std::sync::Arc;

/// Builds an authenticator bound to a resource.
pub type AuthenticatorConstructor = Arc<
    dyn Fn(&HttpClientFactory, &EnvConfig, &str) -> Result<Box<dyn Authenticator>, KeyVaultError>
        + Send
        + Sync,
>;

/// Picks the first usable authenticator from an ordered list of candidates.
///
/// When no candidate passes its usability check the fallback is returned,
/// unprobed unless [`verify_fallback`](Self::verify_fallback) is enabled.
#[derive(Clone)]
pub struct AuthenticatorFactory {
    candidates: Vec<AuthenticatorConstructor>,
    fallback: AuthenticatorConstructor,
    verify_fallback: bool,
}

impl Default for AuthenticatorFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthenticatorFactory {
    /// Client secret from the environment, then managed identity.
    pub fn new() -> Self {
        Self {
            candidates: vec![boxed(ClientCredentialsEnvironmentAuthenticator::new)],
            fallback: boxed(ManagedCredentialsAuthenticator::new),
            verify_fallback: false,
        }
    }

    /// Client secret, then workload identity federation, then managed identity.
    pub fn workload_identity() -> Self {
        Self::new().with_candidate(FederatedTokenAuthenticator::new)
    }

    /// Appends a candidate tried after the existing ones.
    pub fn with_candidate<F, A>(mut self, constructor: F) -> Self
    where
        F: Fn(&HttpClientFactory, &EnvConfig, &str) -> Result<A, KeyVaultError>
            + Send
            + Sync
            + 'static,
        A: Authenticator + 'static,
    {
        self.candidates.push(boxed(constructor));
        self
    }

    pub fn with_fallback<F, A>(mut self, constructor: F) -> Self
    where
        F: Fn(&HttpClientFactory, &EnvConfig, &str) -> Result<A, KeyVaultError>
            + Send
            + Sync
            + 'static,
        A: Authenticator + 'static,
    {
        self.fallback = boxed(constructor);
        self
    }

    /// Probe the fallback too and fail if it is not usable.
    pub fn verify_fallback(mut self, verify: bool) -> Self {
        self.verify_fallback = verify;
        self
    }

    pub async fn get_authenticator(
        &self,
        http: &HttpClientFactory,
        config: &EnvConfig,
        resource: &str,
    ) -> Result<Box<dyn Authenticator>, KeyVaultError> {
        for constructor in &self.candidates {
            let authenticator = constructor(http, config, resource)?;
            match authenticator.check_usability().await {
                Ok(()) => {
                    tracing::debug!("Using {}", authenticator.name());
                    return Ok(authenticator);
                }
                Err(e) => tracing::debug!("{} is not usable: {}", authenticator.name(), e),
            }
        }

        let fallback = (self.fallback)(http, config, resource)?;
        if self.verify_fallback {
            fallback.check_usability().await?;
        }
        tracing::debug!("Falling back to {}", fallback.name());
        Ok(fallback)
    }
}

fn boxed<F, A>(constructor: F) -> AuthenticatorConstructor
where
    F: Fn(&HttpClientFactory, &EnvConfig, &str) -> Result<A, KeyVaultError> + Send + Sync + 'static,
    A: Authenticator + 'static,
{
    Arc::new(
        move |http: &HttpClientFactory, config: &EnvConfig, resource: &str| {
            constructor(http, config, resource)
                .map(|authenticator| Box::new(authenticator) as Box<dyn Authenticator>)
        },
    )
}
