//! Local identity: account name and RSA key pair
//!
//! Every signed outbound request uses the same key pair, loaded once at
//! startup from `identity.data_dir`. Missing files are generated on first
//! run; unreadable or corrupt ones abort startup.

use std::fs;
use std::io::Write;
use std::path::Path;

use rsa::RsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};

use crate::config::IdentityConfig;
use crate::error::AppError;

const PRIVATE_KEY_FILE: &str = "private_key.pem";
const USERNAME_FILE: &str = "username";

/// The gateway's own account
#[derive(Clone)]
pub struct Identity {
    username: String,
    private_key: RsaPrivateKey,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Identity {
    /// Build an identity from an existing key
    pub fn new(username: impl Into<String>, private_key: RsaPrivateKey) -> Result<Self, AppError> {
        let username = username.into();
        validate_username(&username)?;
        Ok(Self {
            username,
            private_key,
        })
    }

    /// Get or create the identity stored under `config.data_dir`
    ///
    /// # Steps
    /// 1. Create the data directory if needed
    /// 2. Resolve the account name (configured, persisted, or generated)
    /// 3. Load the PKCS#8 private key, generating it when absent
    ///
    /// # Errors
    /// Returns `AppError::Identity` if files cannot be read, written or parsed
    pub fn load_or_create(config: &IdentityConfig) -> Result<Self, AppError> {
        let data_dir = config.data_dir.as_path();
        fs::create_dir_all(data_dir).map_err(|e| {
            AppError::Identity(format!("Failed to create {}: {}", data_dir.display(), e))
        })?;

        let username = match &config.username {
            Some(username) => username.trim().to_string(),
            None => load_or_create_username(data_dir)?,
        };

        let private_key = load_or_create_private_key(data_dir, config.key_bits)?;

        Self::new(username, private_key)
    }

    /// Stable local account name
    pub fn username(&self) -> &str {
        &self.username
    }

    /// RSA private key used for HTTP signatures
    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }
}

fn load_or_create_username(data_dir: &Path) -> Result<String, AppError> {
    let path = data_dir.join(USERNAME_FILE);

    if path.exists() {
        let username = fs::read_to_string(&path)
            .map_err(|e| AppError::Identity(format!("Failed to read {}: {}", path.display(), e)))?;
        return Ok(username.trim().to_string());
    }

    let username = ulid::Ulid::new().to_string().to_lowercase();
    fs::write(&path, &username)
        .map_err(|e| AppError::Identity(format!("Failed to write {}: {}", path.display(), e)))?;

    tracing::info!(username = %username, "Generated local account name");
    Ok(username)
}

fn load_or_create_private_key(data_dir: &Path, bits: usize) -> Result<RsaPrivateKey, AppError> {
    let path = data_dir.join(PRIVATE_KEY_FILE);

    if path.exists() {
        let pem = fs::read_to_string(&path)
            .map_err(|e| AppError::Identity(format!("Failed to read {}: {}", path.display(), e)))?;
        return RsaPrivateKey::from_pkcs8_pem(&pem).map_err(|e| {
            AppError::Identity(format!("Invalid private key in {}: {}", path.display(), e))
        });
    }

    tracing::info!(bits, "Generating RSA key pair...");
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, bits)
        .map_err(|e| AppError::Identity(format!("Failed to generate key pair: {}", e)))?;

    let pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| AppError::Identity(format!("Failed to encode private key: {}", e)))?;
    write_private(&path, pem.as_bytes())
        .map_err(|e| AppError::Identity(format!("Failed to write {}: {}", path.display(), e)))?;

    tracing::info!(path = %path.display(), "RSA key pair created");
    Ok(private_key)
}

/// Create `path` readable by the owner only; the mode is set at creation.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)?.write_all(contents)
}

/// Account names end up in URL paths, so keep them to a safe alphabet.
fn validate_username(username: &str) -> Result<(), AppError> {
    let valid = !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(AppError::Identity(format!(
            "Invalid account name {:?}: use letters, digits, '_', '-' or '.'",
            username
        )))
    }
}
