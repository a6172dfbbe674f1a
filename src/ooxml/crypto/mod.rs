//! OOXML package encryption (ECMA-376 / MS-OFFCRYPTO).
//!
//! A password-protected .docx is an OLE compound file holding an
//! `EncryptionInfo` stream that describes the key derivation and an
//! `EncryptedPackage` stream with the ciphertext of the ZIP package.
//! [`unlock`] detects the scheme from the `EncryptionInfo` version:
//!
//! | Version     | Scheme        |
//! |-------------|---------------|
//! | 4.4         | Agile         |
//! | 2.2/3.2/4.2 | Standard 2007 |
//!
//! The ciphers are compiled only with the `encryption` feature; without it
//! every operation that needs a password fails with
//! [`PasswordIssue::Unsupported`].
use crate::error::{CompareError, PasswordIssue, Result};
use serde::{Deserialize, Serialize};

#[cfg(feature = "encryption")]
pub mod agile;
#[cfg(feature = "encryption")]
mod ole_encrypted_package;
#[cfg(feature = "encryption")]
pub mod standard2007;

#[cfg(feature = "encryption")]
pub use agile::{decrypt_ooxml_package_agile, encrypt_ooxml_package_agile};
#[cfg(feature = "encryption")]
pub use standard2007::{decrypt_ooxml_package_standard_2007, encrypt_ooxml_package_standard_2007};

/// Scheme used when writing an encrypted package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionScheme {
    /// Agile encryption (SHA-512, AES-256-CBC)
    #[default]
    Agile,
    /// Standard 2007 encryption (SHA-1, AES-128-ECB)
    Standard,
}

/// Encrypt a plain OPC package into an OLE compound file.
#[cfg(feature = "encryption")]
pub fn lock(package: &[u8], password: &str, scheme: EncryptionScheme) -> Result<Vec<u8>> {
    match scheme {
        EncryptionScheme::Agile => encrypt_ooxml_package_agile(package, password),
        EncryptionScheme::Standard => encrypt_ooxml_package_standard_2007(package, password),
    }
}

/// Encrypt a plain OPC package into an OLE compound file.
#[cfg(not(feature = "encryption"))]
pub fn lock(_package: &[u8], _password: &str, _scheme: EncryptionScheme) -> Result<Vec<u8>> {
    Err(CompareError::password(
        PasswordIssue::Unsupported,
        "built without the `encryption` feature",
    ))
}

/// Decrypt an encrypted OLE container back into the plain OPC package.
#[cfg(feature = "encryption")]
pub fn unlock(container: &[u8], password: &str) -> Result<Vec<u8>> {
    let (info, package) = ole_encrypted_package::read_ole_encrypted_package(container)?;
    if info.len() < 8 {
        return Err(CompareError::Format(
            "EncryptionInfo stream too short".to_string(),
        ));
    }

    let major = u16::from_le_bytes([info[0], info[1]]);
    let minor = u16::from_le_bytes([info[2], info[3]]);
    tracing::debug!(major, minor, "decrypting OOXML package");

    match (major, minor) {
        (4, 4) => decrypt_ooxml_package_agile(&info, &package, password),
        (2..=4, 2) => decrypt_ooxml_package_standard_2007(&info, &package, password),
        _ => Err(CompareError::password(
            PasswordIssue::Unsupported,
            format!("unsupported EncryptionInfo version {major}.{minor}"),
        )),
    }
}

/// Decrypt an encrypted OLE container back into the plain OPC package.
#[cfg(not(feature = "encryption"))]
pub fn unlock(_container: &[u8], _password: &str) -> Result<Vec<u8>> {
    Err(CompareError::password(
        PasswordIssue::Unsupported,
        "built without the `encryption` feature",
    ))
}

#[cfg(feature = "encryption")]
fn password_to_utf16le(password: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(password.len() * 2);
    for ch in password.encode_utf16() {
        buf.extend_from_slice(&ch.to_le_bytes());
    }
    buf
}

#[cfg(feature = "encryption")]
fn random_bytes(buf: &mut [u8], what: &str) -> Result<()> {
    use rand::TryRngCore;
    use rand::rngs::OsRng;

    OsRng.try_fill_bytes(buf).map_err(|e| CompareError::Io {
        path: None,
        source: std::io::Error::other(format!("failed to generate {what}: {e}")),
    })
}

/// Hash algorithms named by `hashAlgorithm` in Agile descriptors.
#[cfg(feature = "encryption")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

#[cfg(feature = "encryption")]
impl HashAlgorithm {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().replace('-', "").as_str() {
            "SHA1" => Some(Self::Sha1),
            "SHA256" => Some(Self::Sha256),
            "SHA384" => Some(Self::Sha384),
            "SHA512" => Some(Self::Sha512),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha384 => "SHA384",
            Self::Sha512 => "SHA512",
        }
    }

    /// Digest length in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Hash the concatenation of `parts`.
    pub fn digest(self, parts: &[&[u8]]) -> Vec<u8> {
        fn run<D: sha1::Digest>(parts: &[&[u8]]) -> Vec<u8> {
            let mut hasher = D::new();
            for part in parts {
                hasher.update(part);
            }
            hasher.finalize().to_vec()
        }

        match self {
            Self::Sha1 => run::<sha1::Sha1>(parts),
            Self::Sha256 => run::<sha2::Sha256>(parts),
            Self::Sha384 => run::<sha2::Sha384>(parts),
            Self::Sha512 => run::<sha2::Sha512>(parts),
        }
    }

    /// HMAC of `data` keyed with `key`.
    pub fn hmac(self, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        use hmac::{Hmac, Mac};

        macro_rules! hmac_with {
            ($digest:ty) => {{
                let mut mac = Hmac::<$digest>::new_from_slice(key)
                    .map_err(|e| CompareError::Format(format!("failed to init HMAC: {e}")))?;
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }};
        }

        Ok(match self {
            Self::Sha1 => hmac_with!(sha1::Sha1),
            Self::Sha256 => hmac_with!(sha2::Sha256),
            Self::Sha384 => hmac_with!(sha2::Sha384),
            Self::Sha512 => hmac_with!(sha2::Sha512),
        })
    }
}

/// AES with a key size chosen at runtime.
#[cfg(feature = "encryption")]
enum AesCipher {
    Aes128(aes::Aes128),
    Aes192(aes::Aes192),
    Aes256(aes::Aes256),
}

#[cfg(feature = "encryption")]
impl AesCipher {
    const BLOCK_SIZE: usize = 16;

    fn new(key: &[u8]) -> Result<Self> {
        use aes::cipher::KeyInit;

        let invalid = |_| CompareError::Format(format!("invalid AES key length {}", key.len()));
        Ok(match key.len() {
            16 => Self::Aes128(aes::Aes128::new_from_slice(key).map_err(invalid)?),
            24 => Self::Aes192(aes::Aes192::new_from_slice(key).map_err(invalid)?),
            32 => Self::Aes256(aes::Aes256::new_from_slice(key).map_err(invalid)?),
            n => {
                return Err(CompareError::Format(format!("invalid AES key length {n}")));
            },
        })
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        use aes::cipher::{BlockEncrypt, generic_array::GenericArray};

        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.encrypt_block(block),
            Self::Aes192(c) => c.encrypt_block(block),
            Self::Aes256(c) => c.encrypt_block(block),
        }
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        use aes::cipher::{BlockDecrypt, generic_array::GenericArray};

        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.decrypt_block(block),
            Self::Aes192(c) => c.decrypt_block(block),
            Self::Aes256(c) => c.decrypt_block(block),
        }
    }
}

#[cfg(feature = "encryption")]
fn check_blocks(data: &[u8]) -> Result<()> {
    if data.len() % AesCipher::BLOCK_SIZE != 0 {
        return Err(CompareError::Format(format!(
            "ciphertext length {} is not a multiple of the AES block size",
            data.len()
        )));
    }
    Ok(())
}

/// Run a `cbc` mode type over the AES variant matching the key length.
#[cfg(feature = "encryption")]
macro_rules! with_aes_cbc {
    ($mode:ident, $key:expr, $iv:expr, |$cipher:ident| $body:expr) => {{
        use aes::cipher::KeyIvInit;

        let (key, iv): (&[u8], &[u8]) = ($key, $iv);
        let invalid =
            |_| CompareError::Format(format!("invalid AES key/iv length {}/{}", key.len(), iv.len()));
        match key.len() {
            16 => {
                let $cipher = cbc::$mode::<aes::Aes128>::new_from_slices(key, iv).map_err(invalid)?;
                $body
            },
            24 => {
                let $cipher = cbc::$mode::<aes::Aes192>::new_from_slices(key, iv).map_err(invalid)?;
                $body
            },
            32 => {
                let $cipher = cbc::$mode::<aes::Aes256>::new_from_slices(key, iv).map_err(invalid)?;
                $body
            },
            n => return Err(CompareError::Format(format!("invalid AES key length {n}"))),
        }
    }};
}

/// AES-CBC without padding; `data` must be block aligned.
#[cfg(feature = "encryption")]
pub(crate) fn aes_cbc_encrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    use aes::cipher::{BlockEncryptMut, block_padding::NoPadding};

    check_blocks(data)?;
    Ok(with_aes_cbc!(Encryptor, key, iv, |cipher| cipher
        .encrypt_padded_vec_mut::<NoPadding>(data)))
}

/// AES-CBC without padding; `data` must be block aligned.
#[cfg(feature = "encryption")]
pub(crate) fn aes_cbc_decrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    use aes::cipher::{BlockDecryptMut, block_padding::NoPadding};

    check_blocks(data)?;
    with_aes_cbc!(Decryptor, key, iv, |cipher| cipher
        .decrypt_padded_vec_mut::<NoPadding>(data)
        .map_err(|_| CompareError::Format("AES-CBC ciphertext is not block aligned".to_string())))
}

/// AES-ECB without padding; `data` must be block aligned.
#[cfg(feature = "encryption")]
pub(crate) fn aes_ecb_encrypt(key: &[u8], data: &mut [u8]) -> Result<()> {
    check_blocks(data)?;
    let cipher = AesCipher::new(key)?;
    for block in data.chunks_mut(AesCipher::BLOCK_SIZE) {
        cipher.encrypt_block(block);
    }
    Ok(())
}

/// AES-ECB without padding; `data` must be block aligned.
#[cfg(feature = "encryption")]
pub(crate) fn aes_ecb_decrypt(key: &[u8], data: &mut [u8]) -> Result<()> {
    check_blocks(data)?;
    let cipher = AesCipher::new(key)?;
    for block in data.chunks_mut(AesCipher::BLOCK_SIZE) {
        cipher.decrypt_block(block);
    }
    Ok(())
}

#[cfg(all(test, feature = "encryption"))]
mod tests {
    use super::*;

    const PACKAGE: &[u8] = b"PK\x03\x04 not really a zip, but the ciphers do not care";

    #[test]
    fn test_cbc_round_trip() {
        let key = [7u8; 32];
        let iv = [9u8; 16];
        let plain = [0x42u8; 48];
        let ct = aes_cbc_encrypt(&key, &iv, &plain).unwrap();
        assert_ne!(ct, plain);
        // Identical plaintext blocks differ once chained
        assert_ne!(ct[..16], ct[16..32]);
        assert_eq!(aes_cbc_decrypt(&key, &iv, &ct).unwrap(), plain);
        assert!(aes_cbc_encrypt(&key, &iv, &plain[..10]).is_err());
        assert!(aes_cbc_encrypt(&key[..5], &iv, &plain).is_err());
        assert!(aes_cbc_encrypt(&key, &iv[..8], &plain).is_err());
    }

    #[test]
    fn test_cbc_known_vector() {
        // NIST SP 800-38A, F.2.1 CBC-AES128.Encrypt, first two blocks
        let key = hex("2b7e151628aed2a6abf7158809cf4f3c");
        let iv = hex("000102030405060708090a0b0c0d0e0f");
        let plain = hex("6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51");
        let expected = hex("7649abac8119b246cee98e9b12e9197d5086cb9b507219ee95db113a917678b2");
        assert_eq!(aes_cbc_encrypt(&key, &iv, &plain).unwrap(), expected);
        assert_eq!(aes_cbc_decrypt(&key, &iv, &expected).unwrap(), plain);

        for len in [16, 24] {
            let key = vec![3u8; len];
            let ct = aes_cbc_encrypt(&key, &iv, &plain).unwrap();
            assert_eq!(ct.len(), plain.len());
            assert_eq!(aes_cbc_decrypt(&key, &iv, &ct).unwrap(), plain);
        }
    }

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn test_hash_sizes() {
        for alg in [
            HashAlgorithm::Sha1,
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha384,
            HashAlgorithm::Sha512,
        ] {
            assert_eq!(alg.digest(&[b"abc"]).len(), alg.size());
            assert_eq!(alg.digest(&[b"a", b"bc"]), alg.digest(&[b"abc"]));
            assert_eq!(alg.hmac(b"key", b"data").unwrap().len(), alg.size());
            assert_eq!(HashAlgorithm::from_name(alg.name()), Some(alg));
        }
        assert_eq!(HashAlgorithm::from_name("sha-256"), Some(HashAlgorithm::Sha256));
        assert_eq!(HashAlgorithm::from_name("MD5"), None);
    }

    #[test]
    fn test_lock_unlock_both_schemes() {
        for scheme in [EncryptionScheme::Agile, EncryptionScheme::Standard] {
            let locked = lock(PACKAGE, "secret", scheme).unwrap();
            assert!(crate::ole::is_ole_file(&locked));
            assert_eq!(unlock(&locked, "secret").unwrap(), PACKAGE);

            let err = unlock(&locked, "wrong").unwrap_err();
            assert!(err.is_password_error(), "{scheme:?}: {err}");
        }
    }

    #[test]
    fn test_unlock_rejects_plain_ole() {
        let mut writer = crate::ole::OleWriter::new();
        writer.create_stream(&["WordDocument"], b"legacy").unwrap();
        let err = unlock(&writer.to_bytes().unwrap(), "pw").unwrap_err();
        assert!(err.is_format_error());
    }
}
