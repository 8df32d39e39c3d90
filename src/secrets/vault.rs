//! Minimal Vault HTTP client: JWT role login and KV reads

use crate::core::error::{ReleaseError, ReleaseResult, ResultExt};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Serialize)]
struct LoginRequest<'a> {
  role: &'a str,
  jwt: &'a str,
}

/// Authenticated Vault client
pub struct VaultClient {
  agent: ureq::Agent,
  address: String,
  token: Option<String>,
}

impl fmt::Debug for VaultClient {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("VaultClient")
      .field("address", &self.address)
      .field("authenticated", &self.token.is_some())
      .finish()
  }
}

impl VaultClient {
  pub fn new(address: &str) -> Self {
    Self {
      agent: ureq::Agent::new_with_defaults(),
      address: address.trim_end_matches('/').to_string(),
      token: None,
    }
  }

  /// Log in with a JWT against `auth/<mount>/login` and keep the client token
  pub fn login(&mut self, mount: &str, role: &str, jwt: &str) -> ReleaseResult<()> {
    let url = format!("{}/v1/auth/{}/login", self.address, mount.trim_matches('/'));
    tracing::debug!(%url, role, "vault login");

    let mut response = self
      .agent
      .post(&url)
      .send_json(&LoginRequest { role, jwt })
      .with_context(|| format!("Vault login as role '{}' failed", role))?;
    let body: Value = response.body_mut().read_json()?;

    self.token = Some(client_token(&body)?);
    Ok(())
  }

  /// Read `key` of the secret at `path` (KV v2 or v1)
  pub fn read(&self, path: &str, key: &str) -> ReleaseResult<String> {
    let token = self
      .token
      .as_deref()
      .ok_or_else(|| ReleaseError::message("Vault client is not logged in"))?;
    let url = format!("{}/v1/{}", self.address, path.trim_start_matches('/'));
    tracing::debug!(%url, key, "vault read");

    let mut response = self
      .agent
      .get(&url)
      .header("X-Vault-Token", token)
      .call()
      .with_context(|| format!("Failed to read Vault secret '{}'", path))?;
    let body: Value = response.body_mut().read_json()?;

    secret_field(&body, key).ok_or_else(|| {
      ReleaseError::with_help(
        format!("Vault secret '{}' has no field '{}'", path, key),
        "KV v2 paths include `data/`, e.g. `kv/data/ci/github`",
      )
    })
  }
}

/// `auth.client_token` of a login response
fn client_token(body: &Value) -> ReleaseResult<String> {
  body
    .pointer("/auth/client_token")
    .and_then(Value::as_str)
    .map(String::from)
    .ok_or_else(|| ReleaseError::message("Vault login response has no client token"))
}

/// `data.data.<key>` (KV v2) or `data.<key>` (KV v1)
fn secret_field(body: &Value, key: &str) -> Option<String> {
  let data = body.get("data")?;
  let value = data
    .get("data")
    .filter(|inner| inner.is_object())
    .and_then(|inner| inner.get(key))
    .or_else(|| data.get(key))?;

  match value {
    Value::String(s) => Some(s.clone()),
    Value::Null => None,
    other => Some(other.to_string()),
  }
}

/// Mint a GitHub Actions OIDC token for `audience`
pub fn github_oidc_token(request_url: &str, request_token: &str, audience: Option<&str>) -> ReleaseResult<String> {
  let url = match audience {
    Some(aud) => format!("{}&audience={}", request_url, aud),
    None => request_url.to_string(),
  };

  let mut response = ureq::get(&url)
    .header("Authorization", format!("bearer {}", request_token))
    .call()
    .context("Failed to request a GitHub Actions OIDC token")?;
  let body: Value = response.body_mut().read_json()?;

  body
    .get("value")
    .and_then(Value::as_str)
    .map(String::from)
    .ok_or_else(|| ReleaseError::message("OIDC token response has no value"))
}
