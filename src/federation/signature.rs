//! HTTP Signatures for ActivityPub
//!
//! Outbound requests are signed per:
//! https://docs.joinmastodon.org/spec/security/
//!
//! Only the `(request-target) host date` header set is used: the gateway
//! issues bodiless GETs, so there is no digest to sign.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use rsa::pkcs1v15::{Signature as Pkcs1v15Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::error::AppError;
use crate::identity::Identity;

/// Pseudo-headers covered by every signature, in signing order
pub const SIGNED_HEADERS: &str = "(request-target) host date";

/// Maximum accepted clock skew when verifying a signed request
const MAX_DATE_SKEW_SECONDS: i64 = 300;

/// Signs outbound requests with the local identity's private key
///
/// Cheap to share behind an `Arc`; signing only reads the key.
pub struct HttpSigner {
    signing_key: SigningKey<Sha256>,
    public_key_pem: String,
    key_id: String,
}

impl HttpSigner {
    /// Create a signer for `identity`
    ///
    /// # Arguments
    /// * `identity` - Local account and key pair
    /// * `public_base_url` - Public base URL of the actor responder
    ///
    /// # Errors
    /// Returns `AppError::Signature` if the public key cannot be exported or
    /// a test signature does not verify against it. Callers treat this as
    /// fatal at startup.
    pub fn new(identity: &Identity, public_base_url: &str) -> Result<Self, AppError> {
        let private_key: RsaPrivateKey = identity.private_key().clone();
        let public_key = RsaPublicKey::from(&private_key);
        let public_key_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AppError::Signature(format!("Failed to export public key: {}", e)))?;

        let signer = Self {
            signing_key: SigningKey::<Sha256>::new(private_key),
            public_key_pem,
            key_id: format!(
                "{}/{}",
                public_base_url.trim_end_matches('/'),
                identity.username()
            ),
        };
        signer.self_check()?;

        Ok(signer)
    }

    /// Key identifier advertised in the `keyId` signature parameter
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// RSA-SHA256 (PKCS#1 v1.5) signature over `message`
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let mut rng = rand::thread_rng();
        self.signing_key
            .sign_with_rng(&mut rng, message)
            .to_bytes()
            .into_vec()
    }

    /// `sign` over the UTF-8 bytes of `message`, base64-encoded
    pub fn base64_sign(&self, message: &str) -> String {
        BASE64.encode(self.sign(message.as_bytes()))
    }

    /// Public key in SPKI PEM form, as published in the actor document
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    /// Build the signed header set for a request to `url`
    ///
    /// # Arguments
    /// * `method` - HTTP method (e.g., "GET")
    /// * `url` - Full URL being requested
    ///
    /// # Returns
    /// Values for the `host`, `date` and `signature` headers
    ///
    /// # Example
    /// ```ignore
    /// let headers = signer.sign_request("GET", "https://mastodon.social/users/BoD")?;
    /// ```
    pub fn sign_request(&self, method: &str, url: &str) -> Result<SignatureHeaders, AppError> {
        self.sign_request_at(method, url, Utc::now())
    }

    fn sign_request_at(
        &self,
        method: &str,
        url: &str,
        now: DateTime<Utc>,
    ) -> Result<SignatureHeaders, AppError> {
        let (host, path_and_query) = split_target(url)?;
        let date = http_date(now);
        let request_target = format!("{} {}", method.to_lowercase(), path_and_query);
        let signing_string = signing_string(&request_target, &host, &date);

        let signature = format!(
            "keyId=\"{}\",headers=\"{}\",signature=\"{}\"",
            self.key_id,
            SIGNED_HEADERS,
            self.base64_sign(&signing_string)
        );

        Ok(SignatureHeaders {
            host,
            date,
            signature,
        })
    }

    fn self_check(&self) -> Result<(), AppError> {
        let sample = format!("date: {}", http_date(Utc::now()));
        let signature = self.sign(sample.as_bytes());
        verify_bytes(sample.as_bytes(), &signature, &self.public_key_pem)
            .map_err(|e| AppError::Signature(format!("Key pair self-check failed: {}", e)))
    }
}

/// Headers to add for a signed request
#[derive(Debug, Clone)]
pub struct SignatureHeaders {
    /// `host` header value (URL authority)
    pub host: String,
    /// `date` header value, identical to the signed one
    pub date: String,
    /// `signature` header value
    pub signature: String,
}

/// Format a timestamp as an HTTP date: `Wed, 01 Jan 2025 09:05:03 GMT`
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Canonical string covered by the signature
pub fn signing_string(request_target: &str, host: &str, date: &str) -> String {
    format!(
        "(request-target): {}\nhost: {}\ndate: {}",
        request_target, host, date
    )
}

/// Split a URL into its authority (`host[:port]`) and path-and-query
fn split_target(url: &str) -> Result<(String, String), AppError> {
    let parsed =
        url::Url::parse(url).map_err(|e| AppError::Validation(format!("Invalid URL: {}", e)))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| AppError::Validation("Missing host in URL".to_string()))?;
    let authority = match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    let path_and_query = match parsed.query() {
        Some(query) => format!("{}?{}", parsed.path(), query),
        None => parsed.path().to_string(),
    };

    Ok((authority, path_and_query))
}

fn verify_bytes(message: &[u8], signature: &[u8], public_key_pem: &str) -> Result<(), AppError> {
    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|e| AppError::Validation(format!("Invalid public key: {}", e)))?;
    let verifier = VerifyingKey::<Sha256>::new(public_key);

    let signature = Pkcs1v15Signature::try_from(signature)
        .map_err(|e| AppError::Validation(format!("Invalid signature format: {}", e)))?;

    verifier
        .verify(message, &signature)
        .map_err(|_| AppError::Validation("Signature verification failed".to_string()))
}

/// Verify a signed GET request
///
/// This is the check a remote server performs against our actor's
/// `publicKeyPem`.
///
/// # Arguments
/// * `method` - HTTP method
/// * `path` - Request path and query
/// * `headers` - All request headers
/// * `public_key_pem` - RSA public key in PEM format
///
/// # Errors
/// `AppError::Validation` describing the first check that failed
pub fn verify_signature(
    method: &str,
    path: &str,
    headers: &http::HeaderMap,
    public_key_pem: &str,
) -> Result<(), AppError> {
    // 1. Parse Signature header
    let parsed = parse_signature_header(header_str(headers, "signature")?)?;

    if parsed.algorithm != "rsa-sha256" && parsed.algorithm != "hs2019" {
        return Err(AppError::Validation(format!(
            "Unsupported signature algorithm: {}",
            parsed.algorithm
        )));
    }

    for required in ["(request-target)", "host", "date"] {
        if !parsed.headers.iter().any(|h| h == required) {
            return Err(AppError::Validation(format!(
                "Signed headers must include: {}",
                required
            )));
        }
    }

    // 2. Verify Date is recent
    let date = DateTime::parse_from_rfc2822(header_str(headers, "date")?)
        .map_err(|_| AppError::Validation("Invalid Date format".to_string()))?;
    if (Utc::now().timestamp() - date.timestamp()).abs() > MAX_DATE_SKEW_SECONDS {
        return Err(AppError::Validation(
            "Date header too old or in future".to_string(),
        ));
    }

    // 3. Reconstruct signing string in the order the signer listed
    let mut signing_parts = Vec::with_capacity(parsed.headers.len());
    for header_name in &parsed.headers {
        let value = match header_name.as_str() {
            "(request-target)" => format!("{} {}", method.to_lowercase(), path),
            "host" | "date" => header_str(headers, header_name)?.to_string(),
            _ => {
                return Err(AppError::Validation(format!(
                    "Unsupported header in signature: {}",
                    header_name
                )));
            }
        };
        signing_parts.push(format!("{}: {}", header_name, value));
    }
    let signing_string = signing_parts.join("\n");

    // 4. Verify RSA signature
    let signature_bytes = BASE64
        .decode(&parsed.signature)
        .map_err(|_| AppError::Validation("Invalid signature encoding".to_string()))?;

    verify_bytes(signing_string.as_bytes(), &signature_bytes, public_key_pem)
}

fn header_str<'a>(headers: &'a http::HeaderMap, name: &str) -> Result<&'a str, AppError> {
    headers
        .get(name)
        .ok_or_else(|| AppError::Validation(format!("Missing {} header", name)))?
        .to_str()
        .map_err(|_| AppError::Validation(format!("Invalid {} header", name)))
}

/// Parsed Signature header
#[derive(Debug, Clone)]
pub struct ParsedSignature {
    /// Key ID (URL of the actor holding the public key)
    pub key_id: String,
    /// Algorithm; `rsa-sha256` when the parameter is omitted
    pub algorithm: String,
    /// Signed header names
    pub headers: Vec<String>,
    /// Base64-encoded signature
    pub signature: String,
}

/// Parse Signature header value
///
/// # Format
/// ```text
/// keyId="...",headers="...",signature="..."
/// ```
pub fn parse_signature_header(header: &str) -> Result<ParsedSignature, AppError> {
    let mut key_id = None;
    let mut algorithm = None;
    let mut headers = None;
    let mut signature = None;

    for part in header.split(',') {
        if let Some((key, value)) = part.trim().split_once('=') {
            let value = value.trim().trim_matches('"');

            match key.trim() {
                "keyId" => key_id = Some(value.to_string()),
                "algorithm" => algorithm = Some(value.to_string()),
                "headers" => {
                    headers = Some(
                        value
                            .split_whitespace()
                            .map(|s| s.to_ascii_lowercase())
                            .collect(),
                    )
                }
                "signature" => signature = Some(value.to_string()),
                _ => {}
            }
        }
    }

    Ok(ParsedSignature {
        key_id: key_id.ok_or_else(|| AppError::Validation("Missing keyId".to_string()))?,
        algorithm: algorithm.unwrap_or_else(|| "rsa-sha256".to_string()),
        headers: headers.ok_or_else(|| AppError::Validation("Missing headers".to_string()))?,
        signature: signature
            .ok_or_else(|| AppError::Validation("Missing signature".to_string()))?,
    })
}
