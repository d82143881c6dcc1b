use thiserror::Error;

/// A failure to decode a salt or hash segment. `offset` is the byte position (within the
/// segment) of the first character that could not be decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("illegal encoded data at input byte {offset}")]
pub struct DecodeError {
    /// Position of the first invalid character
    pub offset: usize,
}

/// Errors that may occur when using this crate
#[derive(Debug, Error)]
pub enum Argon2Error {
    /// The hash string does not follow the `$argon2id<v>$<t>,<m>,<p>$<salt>$<hash>` layout
    #[error("Argon2Error: Invalid hash: {0}")]
    InvalidHash(&'static str),

    /// The salt or hash segment of an otherwise well-formed hash string is not valid
    /// crypt-alphabet text
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The hash string was produced by a different version of Argon2 than the one this
    /// crate computes
    #[error("Argon2Error: Argon2 version is not {} (found {0})", crate::VERSION)]
    InvalidVersion(u32),

    /// Iterations, memory cost, or thread count are outside the range Argon2 accepts
    #[error("Argon2Error: The hash has invalid complexity values")]
    InvalidComplexity,

    /// The password does not hash to the value stored in the hash string
    #[error("Argon2Error: The hash is not the hash of the given password")]
    MismatchedHashAndPassword,

    /// The randomness source could not supply a salt
    #[error("Argon2Error: Could not generate salt: {0}")]
    Randomness(#[from] rand::Error),

    /// Argon2 itself refused the parameters (e.g. an output shorter than 4 bytes)
    #[error("Argon2Error: Key derivation failed: {0}")]
    Derivation(argon2::Error),
}
