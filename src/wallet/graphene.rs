//! Graphene Key Codec
//!
//! Key formats shared by Graphene-derived chains (Peerplays, BitShares, EOSIO):
//! - private keys: WIF, `base58(0x80 ‖ key ‖ sha256d[..4])`
//! - public keys: `PREFIX ‖ base58(compressed ‖ ripemd160(compressed)[..4])`
//! - signatures: 65-byte compact recoverable secp256k1, hex encoded

use k256::ecdsa::hazmat::SignPrimitive;
use k256::ecdsa::{SigningKey, VerifyingKey};
use k256::{FieldBytes, Scalar};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use super::WalletError;

/// Public key prefix used when none is given
pub const DEFAULT_PREFIX: &str = "PPY";

const WIF_VERSION: u8 = 0x80;
const CHECKSUM_LEN: usize = 4;
const COMPRESSED_LEN: usize = 33;
const MAX_SIGNING_ATTEMPTS: u32 = 256;

fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

fn ripemd_checksum(data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let hash = Ripemd160::digest(data);
    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(&hash[..CHECKSUM_LEN]);
    checksum
}

/// Graphene nodes only accept compact signatures whose `r` and `s` both have
/// the top bit clear and no redundant leading zero byte.
pub fn is_canonical(rs: &[u8]) -> bool {
    rs.len() == 64
        && rs[0] & 0x80 == 0
        && !(rs[0] == 0 && rs[1] & 0x80 == 0)
        && rs[32] & 0x80 == 0
        && !(rs[32] == 0 && rs[33] & 0x80 == 0)
}

/// secp256k1 private key
pub struct PrivateKey {
    signing_key: SigningKey,
}

impl PrivateKey {
    /// Create a key from raw 32 bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        if bytes.len() != 32 {
            return Err(WalletError::InvalidPrivateKey(format!(
                "Expected 32 bytes, got {}",
                bytes.len()
            )));
        }

        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|e| WalletError::InvalidPrivateKey(format!("{}", e)))?;

        Ok(Self { signing_key })
    }

    /// Create a key from a WIF string
    pub fn from_wif(wif: &str) -> Result<Self, WalletError> {
        let decoded = bs58::decode(wif)
            .into_vec()
            .map_err(|e| WalletError::InvalidPrivateKey(format!("Invalid base58: {}", e)))?;

        if decoded.len() != 1 + 32 + CHECKSUM_LEN {
            return Err(WalletError::InvalidPrivateKey(format!(
                "Unexpected WIF length {}",
                decoded.len()
            )));
        }

        let (body, checksum) = decoded.split_at(decoded.len() - CHECKSUM_LEN);
        if body[0] != WIF_VERSION {
            return Err(WalletError::InvalidPrivateKey(format!(
                "Unexpected version byte 0x{:02x}",
                body[0]
            )));
        }
        if sha256d(body)[..CHECKSUM_LEN] != *checksum {
            return Err(WalletError::InvalidPrivateKey("Checksum mismatch".to_string()));
        }

        Self::from_bytes(&body[1..])
    }

    pub fn to_wif(&self) -> String {
        let mut body = Vec::with_capacity(1 + 32 + CHECKSUM_LEN);
        body.push(WIF_VERSION);
        body.extend_from_slice(&self.to_bytes());
        let checksum = sha256d(&body);
        body.extend_from_slice(&checksum[..CHECKSUM_LEN]);
        bs58::encode(body).into_string()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.signing_key.to_bytes().to_vec()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_verifying_key(self.signing_key.verifying_key())
    }

    /// Sign a message (SHA-256 of `message` is what gets signed)
    pub fn sign(&self, message: &[u8]) -> Result<String, WalletError> {
        let digest = Sha256::digest(message);
        self.sign_hash(&digest)
    }

    /// Sign a pre-computed 32-byte digest
    pub fn sign_hash(&self, hash: &[u8]) -> Result<String, WalletError> {
        if hash.len() != 32 {
            return Err(WalletError::SigningFailed(format!(
                "Digest must be 32 bytes, got {}",
                hash.len()
            )));
        }

        let scalar: &Scalar = self.signing_key.as_nonzero_scalar();
        let digest = FieldBytes::clone_from_slice(hash);

        // RFC6979 nonces are deterministic, so a counter is mixed in as extra
        // data until the signature comes out canonical
        for attempt in 0..MAX_SIGNING_ATTEMPTS {
            let extra = if attempt == 0 {
                Vec::new()
            } else {
                attempt.to_be_bytes().to_vec()
            };

            let (signature, recovery_id) = scalar
                .try_sign_prehashed_rfc6979::<Sha256>(&digest, &extra)
                .map_err(|e| WalletError::SigningFailed(format!("{}", e)))?;
            let recovery_id = recovery_id
                .ok_or_else(|| WalletError::SigningFailed("Missing recovery id".to_string()))?;

            let rs = signature.to_bytes();
            if !is_canonical(&rs) {
                continue;
            }

            // Graphene compact form: header byte (27 + 4 for compressed + recid) then r ‖ s
            let mut compact = Vec::with_capacity(65);
            compact.push(27 + 4 + recovery_id.to_byte());
            compact.extend_from_slice(&rs);
            return Ok(hex::encode(compact));
        }

        Err(WalletError::SigningFailed(format!(
            "No canonical signature after {} attempts",
            MAX_SIGNING_ATTEMPTS
        )))
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("key", &"[REDACTED]")
            .field("public_key", &self.public_key().to_string_with_prefix(DEFAULT_PREFIX))
            .finish()
    }
}

/// Compressed secp256k1 public key
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    compressed: [u8; COMPRESSED_LEN],
}

impl PublicKey {
    fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(true);
        let mut compressed = [0u8; COMPRESSED_LEN];
        compressed.copy_from_slice(point.as_bytes());
        Self { compressed }
    }

    /// Parse `PREFIX...` (prefix defaults to [`DEFAULT_PREFIX`])
    pub fn from_string(key: &str, prefix: Option<&str>) -> Result<Self, WalletError> {
        let prefix = prefix.unwrap_or(DEFAULT_PREFIX);
        let encoded = key.strip_prefix(prefix).ok_or_else(|| {
            WalletError::InvalidPublicKey(format!("Expected prefix {}", prefix))
        })?;

        let decoded = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| WalletError::InvalidPublicKey(format!("Invalid base58: {}", e)))?;

        if decoded.len() != COMPRESSED_LEN + CHECKSUM_LEN {
            return Err(WalletError::InvalidPublicKey(format!(
                "Unexpected length {}",
                decoded.len()
            )));
        }

        let (body, checksum) = decoded.split_at(COMPRESSED_LEN);
        if ripemd_checksum(body) != *checksum {
            return Err(WalletError::InvalidPublicKey("Checksum mismatch".to_string()));
        }

        let verifying_key = VerifyingKey::from_sec1_bytes(body)
            .map_err(|e| WalletError::InvalidPublicKey(format!("{}", e)))?;

        Ok(Self::from_verifying_key(&verifying_key))
    }

    pub fn to_string_with_prefix(&self, prefix: &str) -> String {
        let mut body = self.compressed.to_vec();
        body.extend_from_slice(&ripemd_checksum(&self.compressed));
        format!("{}{}", prefix, bs58::encode(body).into_string())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.compressed
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self.to_string_with_prefix(DEFAULT_PREFIX))
    }
}
