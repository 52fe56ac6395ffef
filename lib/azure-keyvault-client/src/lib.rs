//! azure-keyvault-client - Rust client for Azure Key Vault
//!
//! Picks an authentication method from the environment:
//! 1. AZURE_TENANT_ID + AZURE_CLIENT_ID + AZURE_CLIENT_SECRET → client credentials
//! 2. AZURE_FEDERATED_TOKEN_FILE → workload identity (opt-in preset)
//! 3. Otherwise → managed identity through the instance metadata service

pub mod auth;
pub mod base64url;
mod client;
pub mod config;
mod error;
pub mod http;
pub mod models;

pub use auth::{
    Authenticator, AuthenticatorFactory, ClientCredentialsEnvironmentAuthenticator,
    FederatedTokenAuthenticator, ManagedCredentialsAuthenticator, StaticTokenAuthenticator,
};
pub use client::{KeyVaultClient, KeyVaultClientBuilder, DEFAULT_PAGE_SIZE};
pub use config::EnvConfig;
pub use error::KeyVaultError;
pub use http::{HttpClientFactory, HttpClientOptions, HttpError};
