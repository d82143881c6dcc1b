use crate::error::DecodeError;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

/// Unpadded base64 over the crypt(3) alphabet
/// (`./ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789`).
///
/// Unused low bits in the final character are tolerated on decode so that hash strings
/// written by other implementations still parse.
const CRYPT_NO_PAD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::BCRYPT,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone)
        .with_decode_allow_trailing_bits(true),
);

/// Returns true if `c` belongs to the crypt alphabet.
#[inline]
pub fn is_alphabet_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '/'
}

pub fn encode<T: AsRef<[u8]>>(bytes: T) -> String {
    CRYPT_NO_PAD.encode(bytes)
}

pub fn decode<T: AsRef<str>>(text: T) -> Result<Vec<u8>, DecodeError> {
    let text = text.as_ref();

    CRYPT_NO_PAD.decode(text).map_err(|e| {
        let offset = match e {
            base64::DecodeError::InvalidByte(offset, _) => offset,
            base64::DecodeError::InvalidLastSymbol(offset, _) => offset,
            // A lone trailing character is the only residue that cannot carry a full byte
            _ => text.len() - text.len() % 4,
        };

        DecodeError { offset }
    })
}
