#![deny(missing_docs)]

//! Hash passwords with [Argon2id](https://en.wikipedia.org/wiki/Argon2) and store the result
//! as a compact, crypt-style hash string that carries everything needed to verify it later:
//!
//! _$argon2id19$1,65536,4$366MYd8GMqu7TA1pkpzivA$CpSlS4AFCi9byh6RYPzzSMBF4ZPyKSYfT7ITzPQYLjE_
//!
//! The fields are the Argon2 version, the iteration count, the memory cost in kibibytes, the
//! thread count, the salt, and the hash. The salt and hash are encoded with unpadded base64
//! over the crypt alphabet (`./A-Za-z0-9`).
//!
//! Hash strings are checked completely (layout, encoding, version, and cost parameters)
//! before any hashing is attempted, so a malformed or hostile hash string is rejected
//! without spending CPU or memory on it. Hashes are compared in constant time.
//!
//! # Examples
//!
//! Hash a password, then verify it:
//!
//! ```rust
//! let hashed = argon2id_hash::hash_default("password").unwrap();
//!
//! assert!(argon2id_hash::compare(&hashed, "password").is_ok());
//! ```
//!
//! Choose the cost parameters (zero means "use the default"):
//!
//! ```rust
//! use argon2id_hash::Argon2Error;
//!
//! let hashed = argon2id_hash::hash("test2", 2, 32 * 1024, 2, 17).unwrap();
//!
//! assert!(hashed.starts_with("$argon2id19$2,32768,2$"));
//! assert_eq!(hashed.len(), 68);
//!
//! assert!(argon2id_hash::compare(&hashed, "test2").is_ok());
//! assert!(matches!(
//!     argon2id_hash::compare(&hashed, "bad-password"),
//!     Err(Argon2Error::MismatchedHashAndPassword)
//! ));
//! ```
//!
//! Use the builder and inspect a parsed hash string:
//!
//! ```rust
//! use argon2id_hash::{Hash, Hasher};
//! use std::str::FromStr;
//!
//! let hash = Hasher::new()
//!         .iterations(3)
//!         .memory_cost_kib(4096)
//!         .threads(2)
//!         .hash_length(24)
//!         .hash("password")
//!         .unwrap();
//!
//! let parsed = Hash::from_str(&hash.to_string()).unwrap();
//!
//! assert_eq!(parsed.iterations(), 3);
//! assert_eq!(parsed.memory_cost_kib(), 4096);
//! assert_eq!(parsed.threads(), 2);
//! assert_eq!(parsed.as_bytes().len(), 24);
//! assert!(parsed.verify("password").is_ok());
//! ```
//!
//! Tell malformed input apart from a wrong password:
//!
//! ```rust
//! use argon2id_hash::Argon2Error;
//!
//! assert!(!argon2id_hash::is_hashed_password("bad-hash"));
//! assert!(matches!(
//!     argon2id_hash::compare("bad-hash", "password"),
//!     Err(Argon2Error::InvalidHash(_))
//! ));
//! ```

mod encoding;
mod error;
mod hasher;
mod lexer;

pub use error::{Argon2Error, DecodeError};
pub use hasher::{
    Hash, Hasher, DEFAULT_HASH_LEN, DEFAULT_ITERATIONS, DEFAULT_MEM_COST_KIB, DEFAULT_THREADS,
    SALT_LEN, VERSION,
};

use std::str::FromStr;

/// Hashes `password` with the default parameters and returns the hash string.
pub fn hash_default<P>(password: &P) -> Result<String, Argon2Error>
where
    P: AsRef<[u8]> + ?Sized,
{
    hash(password, 0, 0, 0, 0)
}

/// Hashes `password` and returns the hash string. A zero for `iterations`,
/// `mem_cost_kib`, `threads`, or `hash_len` selects that parameter's default.
///
/// Argon2 cannot produce hashes shorter than 4 bytes: a `hash_len` of 1 to 3 returns
/// [`Argon2Error::Derivation`].
pub fn hash<P>(
    password: &P,
    iterations: u32,
    mem_cost_kib: u32,
    threads: u8,
    hash_len: u32,
) -> Result<String, Argon2Error>
where
    P: AsRef<[u8]> + ?Sized,
{
    let hash = Hasher::new()
        .iterations(iterations)
        .memory_cost_kib(mem_cost_kib)
        .threads(threads)
        .hash_length(hash_len)
        .hash(password)?;

    Ok(hash.to_string())
}

/// Checks `password` against `hashed_password`. On success, returns `Ok(())`.
///
/// A wrong password yields [`Argon2Error::MismatchedHashAndPassword`]; any other error means
/// the hash string itself could not be used.
pub fn compare<P>(hashed_password: &str, password: &P) -> Result<(), Argon2Error>
where
    P: AsRef<[u8]> + ?Sized,
{
    let hash = Hash::from_str(hashed_password).map_err(|e| {
        log::debug!("rejected hash string: {}", e);
        e
    })?;

    hash.verify(password)
}

/// Returns true if `hashed_password` has the layout of a hash string. The salt and hash are
/// not decoded and the parameters are not range-checked.
pub fn is_hashed_password(hashed_password: &str) -> bool {
    lexer::is_well_formed(hashed_password)
}
