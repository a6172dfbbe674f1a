//! Agile encryption (EncryptionInfo version 4.4).
//!
//! The descriptor is an XML document listing the cipher parameters, a
//! password key encryptor (salt, spin count, encrypted verifier and
//! encrypted intermediate key) and an HMAC over the encrypted package.
use crate::error::{CompareError, PasswordIssue, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::ole_encrypted_package::build_ole_encrypted_package;
use super::{HashAlgorithm, aes_cbc_decrypt, aes_cbc_encrypt, password_to_utf16le, random_bytes};

const AGILE_BLOCK_SIZE: usize = 16;
const AGILE_KEY_BITS: usize = 256;
const AGILE_KEY_BYTES: usize = AGILE_KEY_BITS / 8;
const AGILE_HASH: HashAlgorithm = HashAlgorithm::Sha512;
const AGILE_SPIN_COUNT: u32 = 100_000;
const AGILE_SEGMENT_SIZE: usize = 4096;
const AGILE_ENCRYPTION_VERSION_MAJOR: u16 = 4;
const AGILE_ENCRYPTION_VERSION_MINOR: u16 = 4;
const AGILE_ENCRYPTION_FLAGS: u32 = 0x0000_0040;
/// Upper bound accepted from untrusted descriptors
const MAX_SPIN_COUNT: u32 = 10_000_000;

const K_VERIFIER_INPUT_BLOCK: [u8; 8] = [0xfe, 0xa7, 0xd2, 0x76, 0x3b, 0x4b, 0x9e, 0x79];
const K_HASHED_VERIFIER_BLOCK: [u8; 8] = [0xd7, 0xaa, 0x0f, 0x6d, 0x30, 0x61, 0x34, 0x4e];
const K_CRYPTO_KEY_BLOCK: [u8; 8] = [0x14, 0x6e, 0x0b, 0xe7, 0xab, 0xac, 0xd0, 0xd6];
const K_INTEGRITY_KEY_BLOCK: [u8; 8] = [0x5f, 0xb2, 0xad, 0x01, 0x0c, 0xb9, 0xe1, 0xf6];
const K_INTEGRITY_VALUE_BLOCK: [u8; 8] = [0xa0, 0x67, 0x7f, 0x02, 0xb2, 0x2c, 0x84, 0x33];

/// Cipher parameters shared by `keyData` and `p:encryptedKey`.
#[derive(Debug, Clone)]
struct CipherParams {
    salt: Vec<u8>,
    hash: HashAlgorithm,
    key_bytes: usize,
    block_size: usize,
}

/// Parsed Agile `EncryptionInfo` descriptor.
#[derive(Debug, Clone)]
struct AgileDescriptor {
    key_data: CipherParams,
    encrypted_hmac_key: Vec<u8>,
    encrypted_hmac_value: Vec<u8>,
    password: CipherParams,
    spin_count: u32,
    encrypted_verifier_input: Vec<u8>,
    encrypted_verifier_value: Vec<u8>,
    encrypted_key_value: Vec<u8>,
}

pub fn encrypt_ooxml_package_agile(package_bytes: &[u8], password: &str) -> Result<Vec<u8>> {
    if package_bytes.is_empty() {
        return Err(CompareError::Format(
            "cannot encrypt empty OOXML package".to_string(),
        ));
    }

    let hash_size = AGILE_HASH.size();

    let mut verifier_salt = [0u8; AGILE_BLOCK_SIZE];
    let mut verifier = [0u8; AGILE_BLOCK_SIZE];
    let mut key_salt = [0u8; AGILE_BLOCK_SIZE];
    let mut content_key = [0u8; AGILE_KEY_BYTES];
    let mut integrity_salt = vec![0u8; hash_size];

    random_bytes(&mut verifier_salt, "Agile verifier salt")?;
    random_bytes(&mut verifier, "Agile verifier")?;
    random_bytes(&mut key_salt, "Agile key salt")?;
    random_bytes(&mut content_key, "Agile content key")?;
    random_bytes(&mut integrity_salt, "Agile integrity salt")?;

    let password_params = CipherParams {
        salt: verifier_salt.to_vec(),
        hash: AGILE_HASH,
        key_bytes: AGILE_KEY_BYTES,
        block_size: AGILE_BLOCK_SIZE,
    };
    let key_data = CipherParams {
        salt: key_salt.to_vec(),
        ..password_params.clone()
    };

    let pw_hash = hash_password_agile(AGILE_HASH, password, &verifier_salt, AGILE_SPIN_COUNT);

    let encrypted_verifier_input =
        hash_input_agile(&password_params, &pw_hash, &K_VERIFIER_INPUT_BLOCK, &verifier)?;
    let verifier_hash = AGILE_HASH.digest(&[&verifier]);
    let encrypted_verifier_value =
        hash_input_agile(&password_params, &pw_hash, &K_HASHED_VERIFIER_BLOCK, &verifier_hash)?;
    let encrypted_key_value =
        hash_input_agile(&password_params, &pw_hash, &K_CRYPTO_KEY_BLOCK, &content_key)?;

    let encrypted_package = encrypt_agile_package_stream(&key_data, &content_key, package_bytes)?;

    // The integrity salt is the HMAC key; it is zero-padded only for AES.
    let iv = generate_iv_agile(&key_data, Some(&K_INTEGRITY_KEY_BLOCK));
    let encrypted_hmac_key = aes_cbc_encrypt(
        &content_key,
        &iv,
        &pad_zero_to_block_multiple(&integrity_salt, AGILE_BLOCK_SIZE),
    )?;

    let hmac_value = AGILE_HASH.hmac(&integrity_salt, &encrypted_package)?;
    let iv = generate_iv_agile(&key_data, Some(&K_INTEGRITY_VALUE_BLOCK));
    let encrypted_hmac_value = aes_cbc_encrypt(
        &content_key,
        &iv,
        &pad_zero_to_block_multiple(&hmac_value, AGILE_BLOCK_SIZE),
    )?;

    let descriptor = AgileDescriptor {
        key_data,
        encrypted_hmac_key,
        encrypted_hmac_value,
        password: password_params,
        spin_count: AGILE_SPIN_COUNT,
        encrypted_verifier_input,
        encrypted_verifier_value,
        encrypted_key_value,
    };
    let xml_bytes = build_agile_encryption_info_xml(&descriptor).into_bytes();

    let mut encryption_info = Vec::with_capacity(8 + xml_bytes.len());
    encryption_info.extend_from_slice(&AGILE_ENCRYPTION_VERSION_MAJOR.to_le_bytes());
    encryption_info.extend_from_slice(&AGILE_ENCRYPTION_VERSION_MINOR.to_le_bytes());
    encryption_info.extend_from_slice(&AGILE_ENCRYPTION_FLAGS.to_le_bytes());
    encryption_info.extend_from_slice(&xml_bytes);

    build_ole_encrypted_package(&encryption_info, &encrypted_package)
}

/// Decrypt an Agile `EncryptedPackage` stream.
///
/// A verifier mismatch is a password error; an HMAC mismatch means the
/// ciphertext was altered and is reported as a format error.
pub fn decrypt_ooxml_package_agile(
    encryption_info: &[u8],
    encrypted_package: &[u8],
    password: &str,
) -> Result<Vec<u8>> {
    let descriptor = parse_agile_encryption_info(encryption_info)?;
    let pw = &descriptor.password;

    let pw_hash = hash_password_agile(pw.hash, password, &pw.salt, descriptor.spin_count);

    let verifier_input = unhash_input_agile(
        pw,
        &pw_hash,
        &K_VERIFIER_INPUT_BLOCK,
        &descriptor.encrypted_verifier_input,
        pw.salt.len(),
    )?;
    let expected = unhash_input_agile(
        pw,
        &pw_hash,
        &K_HASHED_VERIFIER_BLOCK,
        &descriptor.encrypted_verifier_value,
        pw.hash.size(),
    )?;
    if pw.hash.digest(&[&verifier_input]) != expected {
        return Err(CompareError::password(
            PasswordIssue::Incorrect,
            "password verifier mismatch",
        ));
    }

    let content_key = unhash_input_agile(
        pw,
        &pw_hash,
        &K_CRYPTO_KEY_BLOCK,
        &descriptor.encrypted_key_value,
        descriptor.key_data.key_bytes,
    )?;

    verify_data_integrity(&descriptor, &content_key, encrypted_package)?;
    decrypt_agile_package_stream(&descriptor.key_data, &content_key, encrypted_package)
}

fn verify_data_integrity(
    descriptor: &AgileDescriptor,
    content_key: &[u8],
    encrypted_package: &[u8],
) -> Result<()> {
    let key_data = &descriptor.key_data;
    let hash_size = key_data.hash.size();

    let iv = generate_iv_agile(key_data, Some(&K_INTEGRITY_KEY_BLOCK));
    let hmac_key = aes_cbc_decrypt(content_key, &iv, &descriptor.encrypted_hmac_key)?;
    let iv = generate_iv_agile(key_data, Some(&K_INTEGRITY_VALUE_BLOCK));
    let hmac_value = aes_cbc_decrypt(content_key, &iv, &descriptor.encrypted_hmac_value)?;

    if hmac_key.len() < hash_size || hmac_value.len() < hash_size {
        return Err(CompareError::Format(
            "truncated data integrity values".to_string(),
        ));
    }

    let actual = key_data.hash.hmac(&hmac_key[..hash_size], encrypted_package)?;
    if actual != hmac_value[..hash_size] {
        return Err(CompareError::Format(
            "encrypted package failed the data integrity check".to_string(),
        ));
    }
    Ok(())
}

fn hash_password_agile(hash: HashAlgorithm, password: &str, salt: &[u8], spin_count: u32) -> Vec<u8> {
    let pw_bytes = password_to_utf16le(password);
    let mut h = hash.digest(&[salt, &pw_bytes]);
    for i in 0..spin_count {
        // iteratorFirst: H(iterator || hash)
        h = hash.digest(&[&i.to_le_bytes(), &h]);
    }
    h
}

fn generate_key_agile(params: &CipherParams, password_hash: &[u8], block_key: &[u8]) -> Vec<u8> {
    let key = params.hash.digest(&[password_hash, block_key]);
    // pad with 0x36 or truncate to the key size
    let mut out = vec![0x36u8; params.key_bytes];
    let copy = out.len().min(key.len());
    out[..copy].copy_from_slice(&key[..copy]);
    out
}

fn pad_36_to_block(mut iv: Vec<u8>, block_size: usize) -> Vec<u8> {
    iv.resize(block_size, 0x36);
    iv
}

fn generate_iv_agile(params: &CipherParams, block_key: Option<&[u8]>) -> Vec<u8> {
    let iv = match block_key {
        Some(block_key) => params.hash.digest(&[&params.salt, block_key]),
        None => params.salt.clone(),
    };
    pad_36_to_block(iv, params.block_size)
}

fn pad_zero_to_block_multiple(input: &[u8], block_size: usize) -> Vec<u8> {
    if input.is_empty() {
        return vec![0u8; block_size];
    }
    let mut out = Vec::from(input);
    out.resize(input.len().div_ceil(block_size) * block_size, 0);
    out
}

fn hash_input_agile(
    params: &CipherParams,
    pw_hash: &[u8],
    block_key: &[u8],
    input: &[u8],
) -> Result<Vec<u8>> {
    let inter_key = generate_key_agile(params, pw_hash, block_key);
    let iv = generate_iv_agile(params, None);
    aes_cbc_encrypt(
        &inter_key,
        &iv,
        &pad_zero_to_block_multiple(input, params.block_size),
    )
}

fn unhash_input_agile(
    params: &CipherParams,
    pw_hash: &[u8],
    block_key: &[u8],
    input: &[u8],
    len: usize,
) -> Result<Vec<u8>> {
    let inter_key = generate_key_agile(params, pw_hash, block_key);
    let iv = generate_iv_agile(params, None);
    let mut plain = aes_cbc_decrypt(&inter_key, &iv, input)?;
    if plain.len() < len {
        return Err(CompareError::Format(format!(
            "encrypted value holds {} bytes, expected {len}",
            plain.len()
        )));
    }
    plain.truncate(len);
    Ok(plain)
}

fn encrypt_agile_package_stream(
    key_data: &CipherParams,
    content_key: &[u8],
    plain: &[u8],
) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(8 + plain.len() + AGILE_BLOCK_SIZE);
    out.extend_from_slice(&(plain.len() as u64).to_le_bytes()); // StreamSize (unencrypted)

    for (index, segment) in plain.chunks(AGILE_SEGMENT_SIZE).enumerate() {
        let iv = generate_iv_agile(key_data, Some(&(index as u32).to_le_bytes()));
        let padded = pad_zero_to_block_multiple(segment, key_data.block_size);
        out.extend_from_slice(&aes_cbc_encrypt(content_key, &iv, &padded)?);
    }

    Ok(out)
}

fn decrypt_agile_package_stream(
    key_data: &CipherParams,
    content_key: &[u8],
    encrypted: &[u8],
) -> Result<Vec<u8>> {
    if encrypted.len() < 8 {
        return Err(CompareError::Format(
            "EncryptedPackage stream too short".to_string(),
        ));
    }
    let mut size_bytes = [0u8; 8];
    size_bytes.copy_from_slice(&encrypted[..8]);
    let stream_size = u64::from_le_bytes(size_bytes) as usize;

    let body = &encrypted[8..];
    // Some writers leave trailing bytes that are not a whole block
    let body = &body[..body.len() - body.len() % key_data.block_size];

    let mut out = Vec::with_capacity(body.len());
    for (index, segment) in body.chunks(AGILE_SEGMENT_SIZE).enumerate() {
        let iv = generate_iv_agile(key_data, Some(&(index as u32).to_le_bytes()));
        out.extend_from_slice(&aes_cbc_decrypt(content_key, &iv, segment)?);
    }

    if out.len() < stream_size {
        return Err(CompareError::Format(
            "decrypted stream smaller than declared StreamSize".to_string(),
        ));
    }
    out.truncate(stream_size);
    Ok(out)
}

fn build_agile_encryption_info_xml(d: &AgileDescriptor) -> String {
    let b64 = |bytes: &[u8]| BASE64_STANDARD.encode(bytes);

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<encryption xmlns="http://schemas.microsoft.com/office/2006/encryption"
 xmlns:p="http://schemas.microsoft.com/office/2006/keyEncryptor/password">
  <keyData saltSize="{salt_sz}" blockSize="{blk_sz}" keyBits="{key_bits}" hashSize="{hash_sz}"
           cipherAlgorithm="AES" cipherChaining="ChainingModeCBC" hashAlgorithm="{hash_alg}"
           saltValue="{key_salt}"/>
  <dataIntegrity encryptedHmacKey="{enc_hmac_key}" encryptedHmacValue="{enc_hmac_val}"/>
  <keyEncryptors>
    <keyEncryptor uri="http://schemas.microsoft.com/office/2006/keyEncryptor/password">
      <p:encryptedKey spinCount="{spin}" saltSize="{salt_sz}" blockSize="{blk_sz}" keyBits="{key_bits}"
                      hashSize="{hash_sz}" cipherAlgorithm="AES" cipherChaining="ChainingModeCBC"
                      hashAlgorithm="{hash_alg}" saltValue="{ver_salt}"
                      encryptedVerifierHashInput="{enc_ver}" encryptedVerifierHashValue="{enc_ver_hash}"
                      encryptedKeyValue="{enc_key}"/>
    </keyEncryptor>
  </keyEncryptors>
</encryption>"#,
        salt_sz = d.key_data.salt.len(),
        blk_sz = d.key_data.block_size,
        key_bits = d.key_data.key_bytes * 8,
        hash_sz = d.key_data.hash.size(),
        hash_alg = d.key_data.hash.name(),
        key_salt = b64(&d.key_data.salt),
        ver_salt = b64(&d.password.salt),
        enc_ver = b64(&d.encrypted_verifier_input),
        enc_ver_hash = b64(&d.encrypted_verifier_value),
        enc_key = b64(&d.encrypted_key_value),
        enc_hmac_key = b64(&d.encrypted_hmac_key),
        enc_hmac_val = b64(&d.encrypted_hmac_value),
        spin = d.spin_count,
    )
}

/// Attribute lookup helper for descriptor elements.
struct Attrs(Vec<(String, String)>);

impl Attrs {
    fn of(e: &BytesStart<'_>) -> Result<Self> {
        let mut out = Vec::new();
        for attr in e.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            out.push((key, value));
        }
        Ok(Self(out))
    }

    fn get(&self, name: &str) -> Result<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| CompareError::Format(format!("EncryptionInfo lacks attribute {name}")))
    }

    fn number(&self, name: &str) -> Result<usize> {
        self.get(name)?
            .trim()
            .parse()
            .map_err(|_| CompareError::Format(format!("EncryptionInfo attribute {name} is not a number")))
    }

    fn base64(&self, name: &str) -> Result<Vec<u8>> {
        BASE64_STANDARD
            .decode(self.get(name)?.trim())
            .map_err(|e| CompareError::Format(format!("EncryptionInfo attribute {name}: {e}")))
    }

    fn cipher_params(&self) -> Result<CipherParams> {
        let cipher = self.get("cipherAlgorithm")?;
        let chaining = self.get("cipherChaining")?;
        if cipher != "AES" || chaining != "ChainingModeCBC" {
            return Err(CompareError::password(
                PasswordIssue::Unsupported,
                format!("unsupported cipher {cipher}/{chaining}"),
            ));
        }
        let hash_name = self.get("hashAlgorithm")?;
        let hash = HashAlgorithm::from_name(hash_name).ok_or_else(|| {
            CompareError::password(
                PasswordIssue::Unsupported,
                format!("unsupported hash algorithm {hash_name}"),
            )
        })?;
        let key_bits = self.number("keyBits")?;
        if !matches!(key_bits, 128 | 192 | 256) {
            return Err(CompareError::password(
                PasswordIssue::Unsupported,
                format!("unsupported AES key size {key_bits}"),
            ));
        }
        let block_size = self.number("blockSize")?;
        if block_size != AGILE_BLOCK_SIZE {
            return Err(CompareError::Format(format!("invalid AES block size {block_size}")));
        }
        Ok(CipherParams {
            salt: self.base64("saltValue")?,
            hash,
            key_bytes: key_bits / 8,
            block_size,
        })
    }
}

fn parse_agile_encryption_info(info: &[u8]) -> Result<AgileDescriptor> {
    let xml = info
        .get(8..)
        .ok_or_else(|| CompareError::Format("EncryptionInfo stream too short".to_string()))?;

    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut key_data = None;
    let mut integrity = None;
    let mut password = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"keyData" => key_data = Some(Attrs::of(&e)?.cipher_params()?),
                b"dataIntegrity" => {
                    let attrs = Attrs::of(&e)?;
                    integrity = Some((
                        attrs.base64("encryptedHmacKey")?,
                        attrs.base64("encryptedHmacValue")?,
                    ));
                },
                b"encryptedKey" if password.is_none() => {
                    let attrs = Attrs::of(&e)?;
                    let spin_count = attrs.number("spinCount")?;
                    if spin_count > MAX_SPIN_COUNT as usize {
                        return Err(CompareError::Format(format!(
                            "spin count {spin_count} exceeds {MAX_SPIN_COUNT}"
                        )));
                    }
                    password = Some((
                        attrs.cipher_params()?,
                        spin_count as u32,
                        attrs.base64("encryptedVerifierHashInput")?,
                        attrs.base64("encryptedVerifierHashValue")?,
                        attrs.base64("encryptedKeyValue")?,
                    ));
                },
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
        buf.clear();
    }

    let key_data =
        key_data.ok_or_else(|| CompareError::Format("EncryptionInfo lacks keyData".to_string()))?;
    let (encrypted_hmac_key, encrypted_hmac_value) = integrity
        .ok_or_else(|| CompareError::Format("EncryptionInfo lacks dataIntegrity".to_string()))?;
    let (password, spin_count, encrypted_verifier_input, encrypted_verifier_value, encrypted_key_value) =
        password.ok_or_else(|| {
            CompareError::password(
                PasswordIssue::Unsupported,
                "EncryptionInfo has no password key encryptor",
            )
        })?;

    Ok(AgileDescriptor {
        key_data,
        encrypted_hmac_key,
        encrypted_hmac_value,
        password,
        spin_count,
        encrypted_verifier_input,
        encrypted_verifier_value,
        encrypted_key_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ole::OleFile;

    #[test]
    fn test_descriptor_round_trip() {
        let params = CipherParams {
            salt: vec![1u8; 16],
            hash: HashAlgorithm::Sha256,
            key_bytes: 16,
            block_size: 16,
        };
        let descriptor = AgileDescriptor {
            key_data: params.clone(),
            encrypted_hmac_key: vec![2u8; 32],
            encrypted_hmac_value: vec![3u8; 32],
            password: CipherParams {
                salt: vec![4u8; 16],
                ..params
            },
            spin_count: 1000,
            encrypted_verifier_input: vec![5u8; 16],
            encrypted_verifier_value: vec![6u8; 32],
            encrypted_key_value: vec![7u8; 16],
        };
        let mut info = vec![4, 0, 4, 0, 0x40, 0, 0, 0];
        info.extend_from_slice(build_agile_encryption_info_xml(&descriptor).as_bytes());

        let parsed = parse_agile_encryption_info(&info).unwrap();
        assert_eq!(parsed.key_data.hash, HashAlgorithm::Sha256);
        assert_eq!(parsed.key_data.key_bytes, 16);
        assert_eq!(parsed.password.salt, vec![4u8; 16]);
        assert_eq!(parsed.spin_count, 1000);
        assert_eq!(parsed.encrypted_key_value, vec![7u8; 16]);
    }

    #[test]
    fn test_multi_segment_round_trip() {
        let plain: Vec<u8> = (0..AGILE_SEGMENT_SIZE * 2 + 100).map(|i| i as u8).collect();
        let container = encrypt_ooxml_package_agile(&plain, "pässwörd").unwrap();

        let ole = OleFile::from_bytes(container).unwrap();
        let info = ole.open_stream(&["EncryptionInfo"]).unwrap();
        let package = ole.open_stream(&["EncryptedPackage"]).unwrap();
        assert_eq!(&info[..4], &[4, 0, 4, 0]);
        assert_eq!(u64::from_le_bytes(package[..8].try_into().unwrap()), plain.len() as u64);

        let decrypted = decrypt_ooxml_package_agile(&info, &package, "pässwörd").unwrap();
        assert_eq!(decrypted, plain);
    }

    #[test]
    fn test_tampered_package_fails_integrity() {
        let plain = vec![0x5Au8; 100];
        let container = encrypt_ooxml_package_agile(&plain, "pw").unwrap();
        let ole = OleFile::from_bytes(container).unwrap();
        let info = ole.open_stream(&["EncryptionInfo"]).unwrap();
        let mut package = ole.open_stream(&["EncryptedPackage"]).unwrap();
        let last = package.len() - 1;
        package[last] ^= 0xFF;

        let err = decrypt_ooxml_package_agile(&info, &package, "pw").unwrap_err();
        assert!(err.is_format_error(), "{err}");
    }
}
