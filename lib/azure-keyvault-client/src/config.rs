use std::collections::HashMap;

pub const ENV_AZURE_TENANT_ID: &str = "AZURE_TENANT_ID";
pub const ENV_AZURE_CLIENT_ID: &str = "AZURE_CLIENT_ID";
pub const ENV_AZURE_CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";
pub const ENV_AZURE_AD_RESOURCE: &str = "AZURE_AD_RESOURCE";
pub const ENV_AZURE_ENVIRONMENT: &str = "AZURE_ENVIRONMENT";
pub const ENV_AZURE_FEDERATED_TOKEN_FILE: &str = "AZURE_FEDERATED_TOKEN_FILE";
pub const ENV_AZURE_AUTHORITY_HOST: &str = "AZURE_AUTHORITY_HOST";

/// Authentication settings captured from the process environment.
///
/// Empty values are treated as unset. Defaults are applied by the
/// authenticators themselves so they can report the fallback.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub ad_resource: Option<String>,
    pub environment: Option<String>,
    pub federated_token_file: Option<String>,
    pub authority_host: Option<String>,
    /// Instance metadata service base URL; not read from the environment.
    pub imds_endpoint: Option<String>,
}

impl EnvConfig {
    /// Snapshot of the actual OS environment
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Create from an explicit set of variables (for testing)
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut environ: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.is_empty())
            .collect();

        Self {
            tenant_id: environ.remove(ENV_AZURE_TENANT_ID),
            client_id: environ.remove(ENV_AZURE_CLIENT_ID),
            client_secret: environ.remove(ENV_AZURE_CLIENT_SECRET),
            ad_resource: environ.remove(ENV_AZURE_AD_RESOURCE),
            environment: environ.remove(ENV_AZURE_ENVIRONMENT),
            federated_token_file: environ.remove(ENV_AZURE_FEDERATED_TOKEN_FILE),
            authority_host: environ.remove(ENV_AZURE_AUTHORITY_HOST),
            imds_endpoint: None,
        }
    }

    pub fn with_imds_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.imds_endpoint = Some(endpoint.into());
        self
    }

    /// Value of a recognised variable, if set.
    pub fn var(&self, name: &str) -> Option<&str> {
        let value = match name {
            ENV_AZURE_TENANT_ID => &self.tenant_id,
            ENV_AZURE_CLIENT_ID => &self.client_id,
            ENV_AZURE_CLIENT_SECRET => &self.client_secret,
            ENV_AZURE_AD_RESOURCE => &self.ad_resource,
            ENV_AZURE_ENVIRONMENT => &self.environment,
            ENV_AZURE_FEDERATED_TOKEN_FILE => &self.federated_token_file,
            ENV_AZURE_AUTHORITY_HOST => &self.authority_host,
            _ => return None,
        };
        value.as_deref()
    }
}
