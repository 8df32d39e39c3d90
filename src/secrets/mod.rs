//! CI secrets fetched from Vault
//!
//! Every `[[secrets.values]]` entry maps one field of a Vault secret to an
//! environment variable that later stages receive (`GH_TOKEN`,
//! `SNAPCRAFT_STORE_CREDENTIALS`, an SSH key for the package repository).
//! Values never reach logs or `Debug` output.

pub mod vault;

pub use vault::VaultClient;

use crate::core::config::SecretsConfig;
use crate::core::error::{ReleaseError, ReleaseResult};
use std::fmt;

/// A secret value that is redacted when formatted
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
  pub fn new(value: impl Into<String>) -> Self {
    Self(value.into())
  }

  pub fn expose(&self) -> &str {
    &self.0
  }
}

impl fmt::Debug for Secret {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Secret(***)")
  }
}

/// Environment variables resolved from Vault
#[derive(Debug, Clone, Default)]
pub struct SecretSet {
  values: Vec<(String, Secret)>,
}

impl SecretSet {
  pub fn empty() -> Self {
    Self::default()
  }

  /// Log in and resolve every configured secret
  pub fn fetch(config: &SecretsConfig) -> ReleaseResult<Self> {
    Self::fetch_with_env(config, |key| std::env::var(key).ok().filter(|v| !v.is_empty()))
  }

  pub fn fetch_with_env<F>(config: &SecretsConfig, env: F) -> ReleaseResult<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let jwt = resolve_jwt(config, &env)?;
    let mut client = VaultClient::new(&config.address);
    client.login(&config.auth_mount, &config.role, &jwt)?;

    let mut set = Self::empty();
    for entry in &config.values {
      let value = client.read(&entry.path, &entry.key)?;
      tracing::info!(env = %entry.env, path = %entry.path, "secret resolved");
      set.insert(&entry.env, Secret::new(value));
    }
    println!("🔐 Loaded {} secret(s) from Vault", set.len());
    Ok(set)
  }

  pub fn insert(&mut self, env: &str, value: Secret) {
    self.values.retain(|(name, _)| name != env);
    self.values.push((env.to_string(), value));
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  /// Names of the exported variables
  pub fn names(&self) -> Vec<&str> {
    self.values.iter().map(|(name, _)| name.as_str()).collect()
  }

  /// Variables to hand to external commands
  pub fn env_vars(&self) -> Vec<(String, String)> {
    self
      .values
      .iter()
      .map(|(name, value)| (name.clone(), value.expose().to_string()))
      .collect()
  }
}

/// JWT from `jwt_env`, or a freshly minted GitHub Actions OIDC token
fn resolve_jwt<F>(config: &SecretsConfig, env: &F) -> ReleaseResult<String>
where
  F: Fn(&str) -> Option<String>,
{
  if let Some(jwt) = env(&config.jwt_env) {
    return Ok(jwt);
  }

  match (env("ACTIONS_ID_TOKEN_REQUEST_URL"), env("ACTIONS_ID_TOKEN_REQUEST_TOKEN")) {
    (Some(url), Some(token)) => vault::github_oidc_token(&url, &token, config.audience.as_deref()),
    _ => Err(ReleaseError::with_help(
      format!("No JWT available for Vault role '{}'", config.role),
      format!(
        "Export {} or grant the workflow `id-token: write` so an OIDC token can be requested",
        config.jwt_env
      ),
    )),
  }
}
