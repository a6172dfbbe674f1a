//! Standard 2007 encryption (EncryptionInfo version 3.2).
//!
//! SHA-1 key derivation with a fixed 50 000 spin count and AES in ECB
//! mode over the whole package.
use crate::error::{CompareError, PasswordIssue, Result};
use sha1::{Digest, Sha1};

use super::ole_encrypted_package::build_ole_encrypted_package;
use super::{aes_ecb_decrypt, aes_ecb_encrypt, password_to_utf16le, random_bytes};

const SPIN_COUNT: u32 = 50_000;
const CALG_AES_128: u32 = 0x660E;
const CALG_AES_192: u32 = 0x660F;
const CALG_AES_256: u32 = 0x6610;
const CALG_SHA1: u32 = 0x8004;
const PROV_RSA_AES: u32 = 0x18;
/// fCryptoAPI | fAES
const STANDARD_FLAGS: u32 = 0x24;
const CSP_NAME: &str = "Microsoft Enhanced RSA and AES Cryptographic Provider";

#[derive(Debug, Clone, Copy)]
struct Standard2007Verifier {
    key_size: usize,
    salt: [u8; 16],
    encrypted_verifier: [u8; 16],
    encrypted_verifier_hash: [u8; 32],
}

pub fn encrypt_ooxml_package_standard_2007(
    package_bytes: &[u8],
    password: &str,
) -> Result<Vec<u8>> {
    if package_bytes.is_empty() {
        return Err(CompareError::Format(
            "cannot encrypt empty OOXML package".to_string(),
        ));
    }

    let mut salt = [0u8; 16];
    let mut verifier = [0u8; 16];
    random_bytes(&mut salt, "encryption salt")?;
    random_bytes(&mut verifier, "encryption verifier")?;

    let key = derive_standard2007_key(password, &salt, SPIN_COUNT, 16)?;
    let (encrypted_verifier, encrypted_verifier_hash) = encrypt_verifier(&key, &verifier)?;

    let encryption_info =
        build_encryption_info_standard2007(&salt, &encrypted_verifier, &encrypted_verifier_hash);

    let encrypted_package = encrypt_package_stream(&key, package_bytes)?;

    build_ole_encrypted_package(&encryption_info, &encrypted_package)
}

fn derive_standard2007_key(
    password: &str,
    salt: &[u8; 16],
    spin_count: u32,
    key_size: usize,
) -> Result<Vec<u8>> {
    if key_size == 0 || key_size > 32 {
        return Err(CompareError::Format(
            "unsupported key size for Standard 2007 encryption".to_string(),
        ));
    }

    let pw_bytes = password_to_utf16le(password);

    let mut sha = Sha1::new();
    sha.update(salt);
    sha.update(&pw_bytes);
    let mut hash = sha.finalize().to_vec();

    for i in 0..spin_count {
        let mut sha = Sha1::new();
        sha.update(i.to_le_bytes());
        sha.update(&hash);
        hash = sha.finalize().to_vec();
    }

    let block_key = [0u8; 4];
    let mut sha = Sha1::new();
    sha.update(&hash);
    sha.update(block_key);
    let intermediate = sha.finalize().to_vec();

    let x1 = fill_and_xor_sha1(&intermediate, 0x36);
    let x2 = fill_and_xor_sha1(&intermediate, 0x5c);

    let mut combined = Vec::with_capacity(x1.len() + x2.len());
    combined.extend_from_slice(&x1);
    combined.extend_from_slice(&x2);

    Ok(combined[..key_size].to_vec())
}

fn fill_and_xor_sha1(input: &[u8], fill: u8) -> Vec<u8> {
    let mut buff = [fill; 64];
    for (b, i) in buff.iter_mut().zip(input) {
        *b ^= i;
    }
    let mut sha = Sha1::new();
    sha.update(buff);
    sha.finalize().to_vec()
}

fn encrypt_verifier(key: &[u8], verifier: &[u8; 16]) -> Result<([u8; 16], [u8; 32])> {
    let mut encrypted_verifier = *verifier;
    aes_ecb_encrypt(key, &mut encrypted_verifier)?;

    let hash = Sha1::digest(verifier);
    let mut encrypted_hash = [0u8; 32];
    encrypted_hash[..hash.len()].copy_from_slice(&hash);
    aes_ecb_encrypt(key, &mut encrypted_hash)?;

    Ok((encrypted_verifier, encrypted_hash))
}

fn build_encryption_info_standard2007(
    salt: &[u8; 16],
    encrypted_verifier: &[u8; 16],
    encrypted_verifier_hash: &[u8; 32],
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);

    buf.extend_from_slice(&3u16.to_le_bytes());
    buf.extend_from_slice(&2u16.to_le_bytes());
    buf.extend_from_slice(&STANDARD_FLAGS.to_le_bytes());

    let header_start = buf.len();
    buf.extend_from_slice(&0u32.to_le_bytes());

    buf.extend_from_slice(&STANDARD_FLAGS.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes()); // SizeExtra
    buf.extend_from_slice(&CALG_AES_128.to_le_bytes());
    buf.extend_from_slice(&CALG_SHA1.to_le_bytes());
    buf.extend_from_slice(&128u32.to_le_bytes());
    buf.extend_from_slice(&PROV_RSA_AES.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());

    for ch in CSP_NAME.encode_utf16() {
        buf.extend_from_slice(&ch.to_le_bytes());
    }
    buf.extend_from_slice(&0u16.to_le_bytes());

    let header_size = (buf.len() - header_start - 4) as u32;
    buf[header_start..header_start + 4].copy_from_slice(&header_size.to_le_bytes());

    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(salt);
    buf.extend_from_slice(encrypted_verifier);
    buf.extend_from_slice(&20u32.to_le_bytes());
    buf.extend_from_slice(encrypted_verifier_hash);

    buf
}

fn encrypt_package_stream(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let block_size = 16usize;
    let pad_len = block_size - (data.len() % block_size);

    let mut buf = Vec::with_capacity(8 + data.len() + pad_len);
    buf.extend_from_slice(&(data.len() as u64).to_le_bytes());

    let mut padded = Vec::with_capacity(data.len() + pad_len);
    padded.extend_from_slice(data);
    padded.resize(data.len() + pad_len, pad_len as u8);
    aes_ecb_encrypt(key, &mut padded)?;

    buf.extend_from_slice(&padded);
    Ok(buf)
}

pub fn decrypt_ooxml_package_standard_2007(
    encryption_info: &[u8],
    encrypted_package: &[u8],
    password: &str,
) -> Result<Vec<u8>> {
    let verifier = parse_encryption_info_standard2007(encryption_info)?;

    let key = derive_standard2007_key(password, &verifier.salt, SPIN_COUNT, verifier.key_size)?;

    verify_standard2007_password(&key, &verifier)?;

    decrypt_package_stream(&key, encrypted_package)
}

fn read_u32(info: &[u8], offset: usize) -> Result<u32> {
    info.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| {
            CompareError::Format("EncryptionInfo stream too short for Standard 2007".to_string())
        })
}

fn parse_encryption_info_standard2007(info: &[u8]) -> Result<Standard2007Verifier> {
    let header_size = read_u32(info, 8)? as usize;
    let header_start = 12usize;

    let alg_id = read_u32(info, header_start + 8)?;
    let key_bits = read_u32(info, header_start + 16)?;
    let key_size = match (alg_id, key_bits) {
        (CALG_AES_128 | 0, 0 | 128) => 16,
        (CALG_AES_192, 192) => 24,
        (CALG_AES_256, 256) => 32,
        _ => {
            return Err(CompareError::password(
                PasswordIssue::Unsupported,
                format!("unsupported Standard 2007 cipher {alg_id:#x} with {key_bits}-bit key"),
            ));
        },
    };

    let mut offset = header_start.checked_add(header_size).ok_or_else(|| {
        CompareError::Format("EncryptionInfo header size overflow".to_string())
    })?;
    if info.len() < offset + 4 + 16 + 16 + 4 + 32 {
        return Err(CompareError::Format(
            "EncryptionInfo stream too short for Standard 2007 verifier".to_string(),
        ));
    }

    let salt_size = read_u32(info, offset)?;
    offset += 4;
    if salt_size != 16 {
        return Err(CompareError::Format(format!(
            "unexpected Standard 2007 salt size: {salt_size} (expected 16)"
        )));
    }

    let mut salt = [0u8; 16];
    salt.copy_from_slice(&info[offset..offset + 16]);
    offset += 16;

    let mut encrypted_verifier = [0u8; 16];
    encrypted_verifier.copy_from_slice(&info[offset..offset + 16]);
    offset += 16;

    let hash_size = read_u32(info, offset)?;
    offset += 4;
    if hash_size != 20 {
        return Err(CompareError::Format(format!(
            "unexpected Standard 2007 verifier hash size: {hash_size} (expected 20)"
        )));
    }

    let mut encrypted_verifier_hash = [0u8; 32];
    encrypted_verifier_hash.copy_from_slice(&info[offset..offset + 32]);

    Ok(Standard2007Verifier {
        key_size,
        salt,
        encrypted_verifier,
        encrypted_verifier_hash,
    })
}

fn verify_standard2007_password(key: &[u8], verifier: &Standard2007Verifier) -> Result<()> {
    let mut decrypted_verifier = verifier.encrypted_verifier;
    aes_ecb_decrypt(key, &mut decrypted_verifier)?;
    let verifier_hash = Sha1::digest(decrypted_verifier);

    let mut decrypted_hash = verifier.encrypted_verifier_hash;
    aes_ecb_decrypt(key, &mut decrypted_hash)?;

    if decrypted_hash[..verifier_hash.len()] != verifier_hash[..] {
        return Err(CompareError::password(
            PasswordIssue::Incorrect,
            "password verifier mismatch",
        ));
    }

    Ok(())
}

fn decrypt_package_stream(key: &[u8], encrypted: &[u8]) -> Result<Vec<u8>> {
    if encrypted.len() < 8 + 16 {
        return Err(CompareError::Format(
            "EncryptedPackage stream too short for Standard 2007 decryption".to_string(),
        ));
    }

    let mut size_bytes = [0u8; 8];
    size_bytes.copy_from_slice(&encrypted[..8]);
    let stream_size = u64::from_le_bytes(size_bytes) as usize;

    let body = &encrypted[8..];
    // Trailing bytes past the last whole block are sector padding
    let mut data = body[..body.len() - body.len() % 16].to_vec();
    aes_ecb_decrypt(key, &mut data)?;

    if data.len() < stream_size {
        return Err(CompareError::Format(
            "decrypted stream smaller than declared StreamSize".to_string(),
        ));
    }

    data.truncate(stream_size);
    Ok(data)
}
