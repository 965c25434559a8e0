use std::path::Path;

use jwt_simple::algorithms::RS256KeyPair;
use jwt_simple::prelude::*;
use pkcs8::der::pem::LineEnding;
use pkcs8::der::Document;
use pkcs8::EncryptedPrivateKeyInfo;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use crate::errors::{SnowflakeError, SnowflakeResult};

const ENCRYPTED_LABEL: &str = "ENCRYPTED PRIVATE KEY";
const PKCS8_LABEL: &str = "PRIVATE KEY";

fn key_error(err: impl std::fmt::Display) -> SnowflakeError {
    SnowflakeError::KeyLoad(err.to_string())
}

/// Read a PEM private key from disk, decrypting it if it is an encrypted PKCS#8 key
pub fn load_private_key(path: &Path, passphrase: Option<&str>) -> SnowflakeResult<RS256KeyPair> {
    let pem = std::fs::read_to_string(path)
        .map_err(|e| SnowflakeError::KeyLoad(format!("{}: {}", path.display(), e)))?;
    parse_private_key(&pem, passphrase)
}

/// Parse a PEM private key, decrypting it if needed
///
/// A passphrase for an unencrypted key is an error, as is a missing one for an encrypted key.
pub fn parse_private_key(pem: &str, passphrase: Option<&str>) -> SnowflakeResult<RS256KeyPair> {
    let (label, document) = Document::from_pem(pem).map_err(key_error)?;
    match (label, passphrase) {
        (ENCRYPTED_LABEL, Some(passphrase)) => {
            let info = EncryptedPrivateKeyInfo::try_from(document.as_bytes()).map_err(key_error)?;
            let decrypted = info.decrypt(passphrase).map_err(|_| {
                SnowflakeError::KeyLoad("incorrect passphrase or unsupported key encryption".into())
            })?;
            let pem = decrypted
                .to_pem(PKCS8_LABEL, LineEnding::LF)
                .map_err(key_error)?;
            RS256KeyPair::from_pem(&pem).map_err(key_error)
        }
        (ENCRYPTED_LABEL, None) => Err(SnowflakeError::KeyLoad(
            "private key is encrypted but no passphrase was given".into(),
        )),
        (_, Some(_)) => Err(SnowflakeError::KeyLoad(
            "a passphrase was given but the private key is not encrypted".into(),
        )),
        (_, None) => RS256KeyPair::from_pem(pem).map_err(key_error),
    }
}

/// Sign a key-pair JWT for the SQL API
pub fn create_token(
    key_pair: &RS256KeyPair,
    mut account_identifier: &str,
    user: &str,
) -> SnowflakeResult<String> {
    // Snowflake wants the standard base64 alphabet with padding
    let mut public_key_fingerprint = key_pair
        .public_key()
        .sha256_thumbprint()
        .replace('-', "+")
        .replace('_', "/");
    while public_key_fingerprint.len() % 4 != 0 {
        public_key_fingerprint.push('=');
    }
    log::debug!("Public key fingerprint: {}", public_key_fingerprint);
    // AAA00000.us-east-1 should become AAA00000
    if let Some(dot) = account_identifier.find('.') {
        account_identifier = &account_identifier[..dot];
    }
    let qualified_username = format!(
        "{}.{}",
        account_identifier.to_ascii_uppercase(),
        user.to_ascii_uppercase()
    );
    let issuer = format!("{qualified_username}.SHA256:{public_key_fingerprint}");
    let claims = Claims::create(Duration::from_mins(59))
        .with_issuer(issuer)
        .with_subject(qualified_username);
    log::debug!("Claims: {:?}", claims);
    Ok(key_pair.sign(claims)?)
}

/// Bearer credentials understood by the SQL API
#[derive(Clone)]
pub(crate) enum BearerAuth {
    KeyPair {
        key_pair: RS256KeyPair,
        account: String,
        user: String,
    },
    ProgrammaticAccessToken(String),
}

impl BearerAuth {
    fn token_type(&self) -> &'static str {
        match self {
            BearerAuth::KeyPair { .. } => "KEYPAIR_JWT",
            BearerAuth::ProgrammaticAccessToken(_) => "PROGRAMMATIC_ACCESS_TOKEN",
        }
    }

    /// Authorization headers for one request
    ///
    /// Key-pair JWTs are signed fresh every time, so they never expire mid-session.
    pub(crate) fn headers(&self) -> SnowflakeResult<HeaderMap> {
        let token = match self {
            BearerAuth::KeyPair {
                key_pair,
                account,
                user,
            } => create_token(key_pair, account, user)?,
            BearerAuth::ProgrammaticAccessToken(token) => token.clone(),
        };
        let mut authorization: HeaderValue = format!("Bearer {}", token).parse()?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::with_capacity(2);
        headers.append(AUTHORIZATION, authorization);
        headers.append(
            "X-Snowflake-Authorization-Token-Type",
            self.token_type().parse()?,
        );
        Ok(headers)
    }
}

impl std::fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BearerAuth").field(&self.token_type()).finish()
    }
}
