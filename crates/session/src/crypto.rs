//! AES-ECB decryption of encrypted event ranges.

use aes::{Aes128, Aes192, Aes256};
use ecb::cipher::{BlockDecryptMut, InvalidLength, KeyInit, block_padding::Pkcs7};

use crate::{Result, SessionError};

/// Decrypt whole blocks under AES-ECB and strip PKCS7 padding.
///
/// The key length selects the cipher: 16, 24 or 32 bytes.
///
/// # Errors
/// `DecryptionFailure` for any other key length, a ciphertext that is not a
/// whole number of blocks, or invalid padding.
pub fn decrypt(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let invalid_key = |_: InvalidLength| SessionError::DecryptionFailure("invalid key".to_string());
    let plaintext = match key.len() {
        16 => ecb::Decryptor::<Aes128>::new_from_slice(key)
            .map_err(invalid_key)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        24 => ecb::Decryptor::<Aes192>::new_from_slice(key)
            .map_err(invalid_key)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        32 => ecb::Decryptor::<Aes256>::new_from_slice(key)
            .map_err(invalid_key)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        len => {
            return Err(SessionError::DecryptionFailure(format!(
                "unsupported key length {len}"
            )));
        }
    };
    plaintext.map_err(|_| {
        SessionError::DecryptionFailure(format!(
            "bad padding in {} byte range",
            ciphertext.len()
        ))
    })
}
