use crate::encoding;
use crate::error::Argon2Error;
use crate::lexer::TokenizedHash;

use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;

/// The Argon2 version this crate computes and accepts (0x13)
pub const VERSION: u32 = Version::V0x13 as u32;

/// Length of generated salts, in bytes
pub const SALT_LEN: usize = 16;

/// Default number of iterations. One pass is the recommendation for Argon2id when memory
/// is the dominant cost.
pub const DEFAULT_ITERATIONS: u32 = 1;

/// Default memory cost in kibibytes (64 MiB)
pub const DEFAULT_MEM_COST_KIB: u32 = 64 * 1024;

/// Default degree of parallelism
pub const DEFAULT_THREADS: u8 = 4;

/// Default hash length in bytes
pub const DEFAULT_HASH_LEN: u32 = 32;

// Argon2 needs at least 2 blocks per slice in each lane
const MIN_BLOCKS_PER_THREAD: u32 = 8;

/// A builder for a hash. Any parameter left at (or set to) zero falls back to its default.
#[derive(Clone, Debug)]
pub struct Hasher {
    iterations: u32,
    mem_cost_kib: u32,
    threads: u8,
    hash_len: u32,
}

impl Default for Hasher {
    /// Create a new `Hasher` with default values.
    ///
    /// The defaults are as follows:
    ///
    /// * Iterations: 1
    /// * Memory Cost: 65536 kibibytes (64 MiB)
    /// * Parallelization Factor: 4 threads
    /// * Hash Length: 32 bytes
    ///
    /// Salts are always 16 bytes.
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            mem_cost_kib: DEFAULT_MEM_COST_KIB,
            threads: DEFAULT_THREADS,
            hash_len: DEFAULT_HASH_LEN,
        }
    }
}

impl Hasher {
    /// Create a new `Hasher` with default values. See [`Hasher::default()`].
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of passes over memory. Zero selects the default of 1.
    pub fn iterations(mut self, iterations: u32) -> Self {
        self.iterations = non_zero_or(iterations, DEFAULT_ITERATIONS);
        self
    }

    /// The amount of memory, in kibibytes, required to compute a hash. Zero selects the
    /// default of 65536 KiB.
    ///
    /// Set this parameter as high as you can afford to. It is the cost that makes
    /// brute-forcing a password expensive on specialized hardware.
    pub fn memory_cost_kib(mut self, cost: u32) -> Self {
        self.mem_cost_kib = non_zero_or(cost, DEFAULT_MEM_COST_KIB);
        self
    }

    /// The number of lanes (and threads) used to compute a hash. Zero selects the default
    /// of 4.
    pub fn threads(mut self, threads: u8) -> Self {
        self.threads = non_zero_or(threads, DEFAULT_THREADS);
        self
    }

    /// The length of the resulting hash, in bytes. Zero selects the default of 32. Argon2
    /// cannot produce fewer than 4 bytes; a length of 1 to 3 makes hashing fail with
    /// [`Argon2Error::Derivation`].
    ///
    /// The encoded hash in a hash string is longer than this: every 3 bytes take 4
    /// characters.
    pub fn hash_length(mut self, hash_len: u32) -> Self {
        self.hash_len = non_zero_or(hash_len, DEFAULT_HASH_LEN);
        self
    }

    /// Hashes `password` with a salt drawn from the operating system's secure random number
    /// generator.
    ///
    /// This is an expensive operation, by design. For some applications, it might make sense
    /// to move this operation to a separate thread.
    pub fn hash<P>(&self, password: &P) -> Result<Hash, Argon2Error>
    where
        P: AsRef<[u8]> + ?Sized,
    {
        self.hash_with_rng(password, &mut OsRng)
    }

    /// Hashes `password` with a salt drawn from `rng`. If `rng` cannot supply a full salt,
    /// its error is returned and no hashing takes place.
    pub fn hash_with_rng<P, R>(&self, password: &P, rng: &mut R) -> Result<Hash, Argon2Error>
    where
        P: AsRef<[u8]> + ?Sized,
        R: RngCore + CryptoRng,
    {
        let mut salt = vec![0u8; SALT_LEN];
        rng.try_fill_bytes(&mut salt)?;

        log::trace!(
            "hashing password (t={}, m={}, p={}, len={})",
            self.iterations,
            self.mem_cost_kib,
            self.threads,
            self.hash_len,
        );

        let hash_len = usize::try_from(self.hash_len)
            .map_err(|_| Argon2Error::Derivation(argon2::Error::OutputTooLong))?;

        let hash = derive_key(
            password.as_ref(),
            &salt,
            self.iterations,
            self.mem_cost_kib,
            self.threads,
            hash_len,
        )?;

        Ok(Hash {
            version: VERSION,
            iterations: self.iterations,
            mem_cost_kib: self.mem_cost_kib,
            threads: self.threads,
            salt,
            hash,
        })
    }
}

#[inline]
fn non_zero_or<T: Default + PartialEq>(value: T, default: T) -> T {
    if value == T::default() {
        default
    } else {
        value
    }
}

/// Runs Argon2id (version 0x13, no secret, no associated data).
///
/// A memory cost below `8 * threads` KiB is raised to that minimum rather than rejected.
fn derive_key(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    mem_cost_kib: u32,
    threads: u8,
    hash_len: usize,
) -> Result<Vec<u8>, Argon2Error> {
    let threads = u32::from(threads);
    let mem_cost_kib = mem_cost_kib.max(MIN_BLOCKS_PER_THREAD * threads);

    let params = Params::new(mem_cost_kib, iterations, threads, Some(hash_len))
        .map_err(Argon2Error::Derivation)?;

    let mut out = vec![0u8; hash_len];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(password, salt, &mut out)
        .map_err(Argon2Error::Derivation)?;

    Ok(out)
}

/// An Argon2id hash together with the salt and parameters used to compute it.
///
/// A `Hash` is written as (and read from) a hash string that looks like this:
///
/// _$argon2id19$1,65536,4$366MYd8GMqu7TA1pkpzivA$CpSlS4AFCi9byh6RYPzzSMBF4ZPyKSYfT7ITzPQYLjE_
///
/// The fields are the Argon2 version, the iterations, the memory cost in KiB, the thread
/// count, the salt and the hash. Salt and hash use unpadded base64 over the crypt alphabet.
#[derive(Clone)]
pub struct Hash {
    version: u32,
    iterations: u32,
    mem_cost_kib: u32,
    threads: u8,
    salt: Vec<u8>,
    hash: Vec<u8>,
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hash")
            .field("version", &self.version)
            .field("iterations", &self.iterations)
            .field("mem_cost_kib", &self.mem_cost_kib)
            .field("threads", &self.threads)
            .field("salt_len", &self.salt.len())
            .field("hash_len", &self.hash.len())
            .finish()
    }
}

impl fmt::Display for Hash {
    /// Writes the hash string. No validation is done here; a `Hash` is only ever built from
    /// values that already passed it.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "$argon2id{}${},{},{}${}${}",
            self.version,
            self.iterations,
            self.mem_cost_kib,
            self.threads,
            encoding::encode(&self.salt),
            encoding::encode(&self.hash),
        )
    }
}

impl FromStr for Hash {
    type Err = Argon2Error;

    /// Parses a hash string.
    ///
    /// Checks run in a fixed order and the first failure is returned: the layout
    /// ([`Argon2Error::InvalidHash`]), the salt and then the hash encoding
    /// ([`Argon2Error::Decode`]), the version ([`Argon2Error::InvalidVersion`]), and finally
    /// the cost parameters ([`Argon2Error::InvalidComplexity`]). A memory cost of zero is
    /// accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokenized_hash = TokenizedHash::try_from(s)?;

        let salt = encoding::decode(tokenized_hash.b64_salt)?;
        let hash = encoding::decode(tokenized_hash.b64_hash)?;

        if tokenized_hash.v != VERSION {
            return Err(Argon2Error::InvalidVersion(tokenized_hash.v));
        }

        let iterations = u32::try_from(tokenized_hash.iterations)
            .ok()
            .filter(|&t| t != 0)
            .ok_or(Argon2Error::InvalidComplexity)?;
        let mem_cost_kib = u32::try_from(tokenized_hash.mem_cost_kib)
            .map_err(|_| Argon2Error::InvalidComplexity)?;
        let threads = u8::try_from(tokenized_hash.threads)
            .ok()
            .filter(|&p| p != 0)
            .ok_or(Argon2Error::InvalidComplexity)?;

        Ok(Self {
            version: tokenized_hash.v,
            iterations,
            mem_cost_kib,
            threads,
            salt,
            hash,
        })
    }
}

impl Hash {
    /// Returns a reference to a byte slice of the computed hash.
    pub fn as_bytes(&self) -> &[u8] {
        &self.hash
    }

    /// Returns a reference to a byte slice of the salt used to generate the hash.
    pub fn salt_bytes(&self) -> &[u8] {
        &self.salt
    }

    /// The Argon2 version recorded in the hash string. Always [`VERSION`].
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The number of passes over memory.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// The memory cost in kibibytes, as written in the hash string.
    pub fn memory_cost_kib(&self) -> u32 {
        self.mem_cost_kib
    }

    /// The degree of parallelism.
    pub fn threads(&self) -> u8 {
        self.threads
    }

    /// Checks that `password` produces this hash, rehashing it with the stored salt and
    /// parameters. The hash length is always that of the stored hash.
    ///
    /// Returns [`Argon2Error::MismatchedHashAndPassword`] if it does not.
    ///
    /// Because verification requires re-hashing the password, this is an expensive
    /// operation.
    pub fn verify<P>(&self, password: &P) -> Result<(), Argon2Error>
    where
        P: AsRef<[u8]> + ?Sized,
    {
        log::trace!(
            "verifying password (t={}, m={}, p={}, len={})",
            self.iterations,
            self.mem_cost_kib,
            self.threads,
            self.hash.len(),
        );

        let candidate = match derive_key(
            password.as_ref(),
            &self.salt,
            self.iterations,
            self.mem_cost_kib,
            self.threads,
            self.hash.len(),
        ) {
            Ok(candidate) => candidate,
            // Argon2 cannot take a salt or produce a hash this short, so no password matches
            Err(Argon2Error::Derivation(
                argon2::Error::SaltTooShort | argon2::Error::OutputTooShort,
            )) => return Err(Argon2Error::MismatchedHashAndPassword),
            Err(e) => return Err(e),
        };

        // ct_eq returns early only on a length mismatch, which cannot happen here
        if bool::from(candidate.ct_eq(&self.hash)) {
            Ok(())
        } else {
            Err(Argon2Error::MismatchedHashAndPassword)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::mock::StepRng;
    use std::io;

    /// Hands out a fixed byte sequence, then fails.
    struct ScriptedRng(Vec<u8>);

    impl RngCore for ScriptedRng {
        fn next_u32(&mut self) -> u32 {
            let mut buf = [0u8; 4];
            self.fill_bytes(&mut buf);
            u32::from_le_bytes(buf)
        }

        fn next_u64(&mut self) -> u64 {
            let mut buf = [0u8; 8];
            self.fill_bytes(&mut buf);
            u64::from_le_bytes(buf)
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            self.try_fill_bytes(dest).unwrap()
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            if self.0.len() < dest.len() {
                self.0.clear();
                return Err(rand::Error::new(io::Error::from(
                    io::ErrorKind::UnexpectedEof,
                )));
            }

            let rest = self.0.split_off(dest.len());
            dest.copy_from_slice(&self.0);
            self.0 = rest;
            Ok(())
        }
    }

    impl CryptoRng for ScriptedRng {}

    /// `StepRng` is not a `CryptoRng`; tests only need a predictable salt.
    struct PredictableRng(StepRng);

    impl RngCore for PredictableRng {
        fn next_u32(&mut self) -> u32 {
            self.0.next_u32()
        }

        fn next_u64(&mut self) -> u64 {
            self.0.next_u64()
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            self.0.fill_bytes(dest)
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.0.try_fill_bytes(dest)
        }
    }

    impl CryptoRng for PredictableRng {}

    fn cheap_hasher() -> Hasher {
        Hasher::new().iterations(2).memory_cost_kib(128).threads(1)
    }

    #[test]
    fn test_byte_hash_into_hash_string() {
        let hash = Hash {
            version: VERSION,
            iterations: 3,
            mem_cost_kib: 128,
            threads: 2,
            salt: vec![1, 2, 3, 4, 5, 6, 7, 8],
            hash: vec![0xff; 6],
        };

        assert_eq!(hash.to_string(), "$argon2id19$3,128,2$.OGB/.SE/ue$99999999");
    }

    #[test]
    fn test_hash_from_str() {
        let hash = Hash::from_str(
            "$argon2id19$1,65536,4$366MYd8GMqu7TA1pkpzivA$CpSlS4AFCi9byh6RYPzzSMBF4ZPyKSYfT7ITzPQYLjE",
        )
        .unwrap();

        assert_eq!(hash.version(), 19);
        assert_eq!(hash.iterations(), 1);
        assert_eq!(hash.memory_cost_kib(), 65536);
        assert_eq!(hash.threads(), 4);
        assert_eq!(hash.salt_bytes().len(), 16);
        assert_eq!(hash.as_bytes().len(), 32);
    }

    #[test]
    fn test_hash_from_str_accepts_bounds() {
        let hash = Hash::from_str("$argon2id19$4294967295,4294967295,255$AQIDBA$AQIDBA").unwrap();

        assert_eq!(hash.iterations(), u32::MAX);
        assert_eq!(hash.memory_cost_kib(), u32::MAX);
        assert_eq!(hash.threads(), u8::MAX);

        let hash = Hash::from_str("$argon2id19$1,0,1$AQIDBA$AQIDBA").unwrap();
        assert_eq!(hash.memory_cost_kib(), 0);
    }

    #[test]
    fn test_invalid_hash_from_str() {
        for s in [
            "bad-hash",
            "$argon2id,2,32768,2$bad",
            "$argon2id$v=19$m=128,t=3,p=2$AQIDBAUGBwg$7OU7S/azjYpnXXySR52cFWeisxk1VVjNeXqtQ8ZM/Oc",
            "$argon2id19$1,65536,4$PWhquEXHn6p9NoOuQQVwHw$",
            "$argon2id19$1,65536,4$PWhquEXHn6p9NoOuQQVwHw",
            "$argon2id19$1,65536,4$PWhquEXHn6p9NoOuQQVwHw$J2fO7RdTPYGdoBb52cyYVEMdprPkAa/2hny3n0tGNm4$",
        ] {
            assert!(
                matches!(Hash::from_str(s), Err(Argon2Error::InvalidHash(_))),
                "{s}"
            );
        }
    }

    #[test]
    fn test_hash_from_str_decode_errors() {
        let err = Hash::from_str(
            "$argon2id19$1,65536,4$a$J2fO7RdTPYGdoBb52cyYVEMdprPkAa/2hny3n0tGNm4",
        )
        .unwrap_err();
        assert!(matches!(err, Argon2Error::Decode(e) if e.offset == 0));

        let err = Hash::from_str("$argon2id19$1,65536,4$PWhquEXHn6p9NoOuQQVwHw$a").unwrap_err();
        assert!(matches!(err, Argon2Error::Decode(e) if e.offset == 0));

        // The salt is decoded before the version is looked at
        let err = Hash::from_str("$argon2id99$0,65536,4$a$a").unwrap_err();
        assert!(matches!(err, Argon2Error::Decode(_)));
    }

    #[test]
    fn test_hash_from_str_version() {
        let err = Hash::from_str(
            "$argon2id99$1,65536,4$PWhquEXHn6p9NoOuQQVwHw$J2fO7RdTPYGdoBb52cyYVEMdprPkAa/2hny3n0tGNm4",
        )
        .unwrap_err();
        assert!(matches!(err, Argon2Error::InvalidVersion(99)));

        // Version is checked before complexity
        let err = Hash::from_str(
            "$argon2id16$0,65536,0$PWhquEXHn6p9NoOuQQVwHw$J2fO7RdTPYGdoBb52cyYVEMdprPkAa/2hny3n0tGNm4",
        )
        .unwrap_err();
        assert!(matches!(err, Argon2Error::InvalidVersion(16)));
    }

    #[test]
    fn test_hash_from_str_complexity() {
        for params in [
            "0,65536,4",
            "4294967296,65536,4",
            "9999999999,65536,4",
            "1,4294967296,4",
            "1,65536,0",
            "1,65536,256",
            "1,65536,999",
        ] {
            let s = format!(
                "$argon2id19${params}$Oy7MSyjRTCTMTAzROSvSGO$QV5KGjrKZO6C.8St0T7HCTL0AvuCxgf5O.Okwj90a3a"
            );

            assert!(
                matches!(Hash::from_str(&s), Err(Argon2Error::InvalidComplexity)),
                "{params}"
            );
        }
    }

    #[test]
    fn test_defaults_replace_zeros() {
        let hasher = Hasher::new()
            .iterations(0)
            .memory_cost_kib(0)
            .threads(0)
            .hash_length(0);

        assert_eq!(hasher.iterations, DEFAULT_ITERATIONS);
        assert_eq!(hasher.mem_cost_kib, DEFAULT_MEM_COST_KIB);
        assert_eq!(hasher.threads, DEFAULT_THREADS);
        assert_eq!(hasher.hash_len, DEFAULT_HASH_LEN);

        let hasher = Hasher::new()
            .iterations(7)
            .memory_cost_kib(1024)
            .threads(3)
            .hash_length(20);

        assert_eq!(hasher.iterations, 7);
        assert_eq!(hasher.mem_cost_kib, 1024);
        assert_eq!(hasher.threads, 3);
        assert_eq!(hasher.hash_len, 20);
    }

    #[test]
    fn test_hash_and_verify() {
        let auth_string = b"@Pa$$20rd-Test";

        let hash = cheap_hasher().hash_length(32).hash(auth_string).unwrap();
        assert_eq!(hash.salt_bytes().len(), SALT_LEN);
        assert_eq!(hash.as_bytes().len(), 32);

        let parsed = Hash::from_str(&hash.to_string()).unwrap();
        assert!(parsed.verify(auth_string).is_ok());
    }

    #[test]
    fn test_verify_incorrect_auth_string() {
        let hash = cheap_hasher().hash(b"@Pa$$20rd-Test").unwrap().to_string();

        assert!(matches!(
            Hash::from_str(&hash).unwrap().verify(b"@Pa$$20rd-Tesu"),
            Err(Argon2Error::MismatchedHashAndPassword)
        ));
    }

    #[test]
    fn test_verify_uses_stored_hash_length() {
        let hash = cheap_hasher().hash_length(17).hash("pw").unwrap().to_string();
        let parsed = Hash::from_str(&hash).unwrap();

        assert_eq!(parsed.as_bytes().len(), 17);
        assert!(parsed.verify("pw").is_ok());
    }

    #[test]
    fn test_same_salt_same_hash() {
        let first = cheap_hasher()
            .hash_with_rng("password", &mut PredictableRng(StepRng::new(1, 1)))
            .unwrap();
        let second = cheap_hasher()
            .hash_with_rng("password", &mut PredictableRng(StepRng::new(1, 1)))
            .unwrap();

        assert_eq!(first.to_string(), second.to_string());

        let third = cheap_hasher()
            .hash_with_rng("password", &mut PredictableRng(StepRng::new(2, 1)))
            .unwrap();

        assert_ne!(first.as_bytes(), third.as_bytes());
    }

    #[test]
    fn test_known_salt_vector() {
        let salt = encoding::decode("test.using.known.salt.").unwrap();

        let hash = Hasher::default()
            .hash_with_rng("a-password", &mut ScriptedRng(salt))
            .unwrap();

        assert_eq!(
            hash.to_string(),
            "$argon2id19$1,65536,4$test.using.known.salt.$FzP8/LecDac/ywiH46nGLmtMM9skQaqKrttw/K9zp2."
        );
    }

    #[test]
    fn test_truncated_randomness() {
        let result = Hasher::default().hash_with_rng("test", &mut ScriptedRng(b"incomplete".to_vec()));

        match result {
            Err(Argon2Error::Randomness(e)) => {
                let inner = e.inner().downcast_ref::<io::Error>().unwrap();
                assert_eq!(inner.kind(), io::ErrorKind::UnexpectedEof);
            }
            other => panic!("expected a randomness error, got {other:?}"),
        }
    }

    #[test]
    fn test_hash_length_too_short() {
        assert!(matches!(
            cheap_hasher().hash_length(3).hash("pw"),
            Err(Argon2Error::Derivation(_))
        ));
    }

    #[test]
    fn test_low_memory_cost_is_raised() {
        let hash = Hasher::new()
            .iterations(1)
            .memory_cost_kib(1)
            .threads(2)
            .hash("pw")
            .unwrap();

        assert_eq!(hash.memory_cost_kib(), 1);
        assert!(Hash::from_str(&hash.to_string()).unwrap().verify("pw").is_ok());
    }

    #[test]
    fn test_verify_short_salt_or_hash_is_mismatch() {
        let short_salt = format!("$argon2id19$1,64,1$AQIDBA${}", encoding::encode([7u8; 32]));
        let parsed = Hash::from_str(&short_salt).unwrap();

        assert_eq!(parsed.salt_bytes().len(), 4);
        assert!(matches!(
            parsed.verify("wrong"),
            Err(Argon2Error::MismatchedHashAndPassword)
        ));

        let short_hash = "$argon2id19$1,64,1$AQIDBAUGBwgJCgsMDQ4PEA$AQI";
        let parsed = Hash::from_str(short_hash).unwrap();

        assert_eq!(parsed.as_bytes().len(), 2);
        assert!(matches!(
            parsed.verify("wrong"),
            Err(Argon2Error::MismatchedHashAndPassword)
        ));
    }

    #[test]
    fn test_zero_memory_cost_is_not_defaulted_on_verify() {
        let hash = Hasher::new()
            .iterations(1)
            .memory_cost_kib(1)
            .threads(1)
            .hash("pw")
            .unwrap();

        // Both 0 and 1 KiB are raised to the same 8 KiB minimum; 64 MiB would not match
        let stored = format!(
            "$argon2id19$1,0,1${}${}",
            encoding::encode(hash.salt_bytes()),
            encoding::encode(hash.as_bytes()),
        );
        let parsed = Hash::from_str(&stored).unwrap();

        assert_eq!(parsed.memory_cost_kib(), 0);
        assert!(parsed.verify("pw").is_ok());
    }

    #[test]
    fn test_debug_omits_key_material() {
        let hash = cheap_hasher().hash("pw").unwrap();
        let debug = format!("{hash:?}");

        assert!(debug.contains("salt_len: 16"));
        assert!(!debug.contains(&encoding::encode(hash.as_bytes())));
    }
}
