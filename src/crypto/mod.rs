//! Field confidentiality for persisted detections.
//!
//! Two pieces: `KeyProvider`, an init-once capability around a local key
//! file (created on first use, reused on every later run), and `FieldCodec`,
//! the reversible per-field encoding applied to each CSV cell. The sealed
//! codec wraps ChaCha20-Poly1305 with a fresh nonce per field and hex armor,
//! so ciphertext survives the textual table format.

use anyhow::{anyhow, Result};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use zeroize::Zeroize;

const SEED_PREFIX: &str = "fieldkey:";
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Reversible map over one field's textual representation.
///
/// `decode(encode(s)) == s` must hold for every field text the tracker
/// produces; anything else corrupts the persisted log.
pub trait FieldCodec {
    fn encode(&self, field: &str) -> Result<String>;
    fn decode(&self, stored: &str) -> Result<String>;
}

/// Identity codec for plaintext stores.
pub struct PlainCodec;

impl FieldCodec for PlainCodec {
    fn encode(&self, field: &str) -> Result<String> {
        Ok(field.to_string())
    }

    fn decode(&self, stored: &str) -> Result<String> {
        Ok(stored.to_string())
    }
}

/// ChaCha20-Poly1305 per-field codec. Each encode draws a fresh random nonce;
/// the stored form is `hex(nonce || ciphertext || tag)`.
pub struct SealedFieldCodec {
    cipher: ChaCha20Poly1305,
}

impl SealedFieldCodec {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(&key)),
        }
    }
}

impl FieldCodec for SealedFieldCodec {
    fn encode(&self, field: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(nonce, field.as_bytes())
            .map_err(|_| anyhow!("field encryption failed"))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(hex::encode(out))
    }

    fn decode(&self, stored: &str) -> Result<String> {
        let raw =
            hex::decode(stored.trim()).map_err(|_| anyhow!("stored field is not valid hex"))?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(anyhow!("stored field too short to hold nonce and tag"));
        }
        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let clear = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| anyhow!("field authentication failed"))?;
        String::from_utf8(clear).map_err(|_| anyhow!("decrypted field is not valid UTF-8"))
    }
}

/// Init-once provider for the field-encryption key.
///
/// The first `field_key` call loads the seed file, creating it with a fresh
/// random seed if absent; the derived key is cached for the life of the
/// provider. The seed file is written with mode 0600 and reused across
/// restarts.
pub struct KeyProvider {
    path: PathBuf,
    key: OnceLock<[u8; 32]>,
}

impl KeyProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            key: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The 32-byte field key, loading or creating the seed file on first use.
    pub fn field_key(&self) -> Result<[u8; 32]> {
        if let Some(key) = self.key.get() {
            return Ok(*key);
        }
        let mut seed = load_or_create_seed(&self.path)?;
        let key = derive_field_key(&seed)?;
        seed.zeroize();
        Ok(*self.key.get_or_init(|| key))
    }

    /// Sealed codec bound to this provider's key.
    pub fn codec(&self) -> Result<SealedFieldCodec> {
        Ok(SealedFieldCodec::new(self.field_key()?))
    }
}

/// Derive the cipher key from the seed string.
pub fn derive_field_key(seed: &str) -> Result<[u8; 32]> {
    let trimmed = seed.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("field key seed is empty"));
    }
    let mut hasher = Sha256::new();
    hasher.update(trimmed.as_bytes());
    Ok(hasher.finalize().into())
}

/// Load the seed from disk or create one.
///
/// Creation is race-tolerant: if another process wins the `create_new` race,
/// the seed it wrote is read back instead.
fn load_or_create_seed(path: &Path) -> Result<String> {
    if let Some(seed) = read_seed_file(path)? {
        return Ok(seed);
    }

    let mut seed_bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut seed_bytes);
    let seed = format!("{}{}", SEED_PREFIX, hex::encode(seed_bytes));
    seed_bytes.zeroize();

    if write_seed_file(path, &seed)? {
        return Ok(seed);
    }
    read_seed_file(path)?.ok_or_else(|| {
        anyhow!(
            "field key seed {} vanished after creation race",
            path.display()
        )
    })
}

fn read_seed_file(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read field key seed {}: {}", path.display(), e))?;
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("field key seed file {} is empty", path.display()));
    }
    Ok(Some(trimmed.to_string()))
}

/// Returns false when the file already exists (lost the creation race).
fn write_seed_file(path: &Path, seed: &str) -> Result<bool> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                anyhow!(
                    "failed to create field key directory {}: {}",
                    parent.display(),
                    e
                )
            })?;
        }
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = match options.open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(err) => {
            return Err(anyhow!(
                "failed to create field key seed {}: {}",
                path.display(),
                err
            ))
        }
    };

    file.write_all(seed.as_bytes())
        .and_then(|_| file.write_all(b"\n"))
        .and_then(|_| file.sync_all())
        .map_err(|e| anyhow!("failed to write field key seed {}: {}", path.display(), e))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_codec_is_identity() {
        let codec = PlainCodec;
        assert_eq!(codec.encode("42").unwrap(), "42");
        assert_eq!(codec.decode("Space Debris").unwrap(), "Space Debris");
    }

    #[test]
    fn sealed_codec_round_trips_fields() {
        let codec = SealedFieldCodec::new([7u8; 32]);
        for field in ["17", "Space Debris", "2024-03-01 12:00:00", ""] {
            let stored = codec.encode(field).unwrap();
            assert_ne!(stored, field);
            assert_eq!(codec.decode(&stored).unwrap(), field);
        }
    }

    #[test]
    fn sealed_codec_rejects_tampering() {
        let codec = SealedFieldCodec::new([7u8; 32]);
        let mut stored = codec.encode("120").unwrap();
        let flipped = if stored.ends_with('0') { '1' } else { '0' };
        stored.pop();
        stored.push(flipped);
        assert!(codec.decode(&stored).is_err());
    }

    #[test]
    fn sealed_codec_rejects_wrong_key() {
        let stored = SealedFieldCodec::new([7u8; 32]).encode("120").unwrap();
        assert!(SealedFieldCodec::new([8u8; 32]).decode(&stored).is_err());
    }

    #[test]
    fn key_provider_creates_file_once_and_reuses_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.key");

        let first = KeyProvider::new(&path);
        let key_a = first.field_key().unwrap();
        assert!(path.exists());
        let seed_on_disk = fs::read_to_string(&path).unwrap();
        assert!(seed_on_disk.trim().starts_with(SEED_PREFIX));

        // Cached within the provider and stable across providers.
        assert_eq!(first.field_key().unwrap(), key_a);
        let second = KeyProvider::new(&path);
        assert_eq!(second.field_key().unwrap(), key_a);
    }

    #[test]
    fn derive_rejects_empty_seed() {
        assert!(derive_field_key("  ").is_err());
        assert!(derive_field_key("fieldkey:ab").is_ok());
    }
}
