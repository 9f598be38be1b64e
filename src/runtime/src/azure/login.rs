//! Parsing of `az acr login --expose-token` output.

use secrecy::SecretString;
use serde::Deserialize;

use azpush_core::error::{AzError, Result};

/// Payload printed by `az acr login --expose-token`.
///
/// Only the token is kept; `loginServer` and other fields are ignored.
#[derive(Deserialize)]
struct LoginResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
}

/// Extract the access token from login output.
///
/// Invalid JSON, a missing field and an empty token are all parse errors;
/// error messages never include the output itself.
pub fn parse_access_token(output: &str) -> Result<SecretString> {
    let response: LoginResponse = serde_json::from_str(output.trim()).map_err(|e| {
        AzError::ParseError(format!(
            "Unexpected `az acr login --expose-token` output: {}",
            describe(&e)
        ))
    })?;

    if response.access_token.trim().is_empty() {
        return Err(AzError::ParseError(
            "`az acr login --expose-token` returned an empty accessToken".to_string(),
        ));
    }

    Ok(SecretString::from(response.access_token))
}

/// Describe a serde error without echoing input fragments.
fn describe(err: &serde_json::Error) -> String {
    use serde_json::error::Category;

    match err.classify() {
        Category::Data => "missing or invalid `accessToken` field".to_string(),
        Category::Syntax => format!("invalid JSON at line {} column {}", err.line(), err.column()),
        Category::Eof => "truncated JSON".to_string(),
        Category::Io => "I/O failure while reading JSON".to_string(),
    }
}
