use crate::encoding::is_alphabet_char;
use crate::error::Argon2Error;

use std::str::FromStr;

const PREFIX: &str = "$argon2id";

/// A hash string split into its fields. Only the shape of each field has been checked;
/// the numbers may still be out of range and the salt/hash may still fail to decode.
///
/// Numeric fields are wider than the values Argon2 accepts so that oversized values
/// survive lexing and can be rejected as a complexity error rather than a format error.
#[derive(Debug)]
pub struct TokenizedHash<'a> {
    pub v: u32,
    pub iterations: u64,
    pub mem_cost_kib: u64,
    pub threads: u16,
    pub b64_salt: &'a str,
    pub b64_hash: &'a str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LexState {
    Version,
    Iterations,
    MemCost,
    Threads,
    Salt,
    Hash,
}

impl LexState {
    fn terminator(self) -> Option<char> {
        match self {
            LexState::Version | LexState::Threads | LexState::Salt => Some('$'),
            LexState::Iterations | LexState::MemCost => Some(','),
            LexState::Hash => None,
        }
    }

    fn next(self) -> Self {
        match self {
            LexState::Version => LexState::Iterations,
            LexState::Iterations => LexState::MemCost,
            LexState::MemCost => LexState::Threads,
            LexState::Threads => LexState::Salt,
            LexState::Salt | LexState::Hash => LexState::Hash,
        }
    }

    fn accepts(self, c: char) -> bool {
        match self {
            LexState::Salt | LexState::Hash => is_alphabet_char(c),
            _ => c.is_ascii_digit(),
        }
    }

    // Digit-count limits only bound the grammar; range checks happen after lexing
    fn max_len(self) -> usize {
        match self {
            LexState::Version => 4,
            LexState::Iterations | LexState::MemCost => 10,
            LexState::Threads => 3,
            LexState::Salt | LexState::Hash => usize::MAX,
        }
    }

    fn malformed(self) -> Argon2Error {
        Argon2Error::InvalidHash(match self {
            LexState::Version => "Invalid version",
            LexState::Iterations => "Invalid time",
            LexState::MemCost => "Invalid memory",
            LexState::Threads => "Invalid threads",
            LexState::Salt => "Invalid salt",
            LexState::Hash => "Invalid hash",
        })
    }

    fn field(self, field: &str) -> Result<&str, Argon2Error> {
        if field.is_empty() || field.len() > self.max_len() {
            return Err(self.malformed());
        }

        Ok(field)
    }

    fn number<T: FromStr>(self, field: &str) -> Result<T, Argon2Error> {
        field.parse().map_err(|_| self.malformed())
    }
}

impl<'a> TryFrom<&'a str> for TokenizedHash<'a> {
    type Error = Argon2Error;

    fn try_from(s: &'a str) -> Result<Self, Self::Error> {
        let body = s
            .strip_prefix(PREFIX)
            .ok_or(Argon2Error::InvalidHash("Must begin with $argon2id"))?;

        let mut state = LexState::Version;
        let mut fields = [""; 6];
        let mut start = 0;

        for (i, c) in body.char_indices() {
            if Some(c) == state.terminator() {
                fields[state as usize] = state.field(&body[start..i])?;
                state = state.next();

                // Terminators are ASCII
                start = i + 1;
            } else if !state.accepts(c) {
                return Err(state.malformed());
            }
        }

        if state != LexState::Hash {
            return Err(Argon2Error::InvalidHash("Hash is incomplete"));
        }

        fields[LexState::Hash as usize] = state.field(&body[start..])?;

        Ok(Self {
            v: LexState::Version.number(fields[LexState::Version as usize])?,
            iterations: LexState::Iterations.number(fields[LexState::Iterations as usize])?,
            mem_cost_kib: LexState::MemCost.number(fields[LexState::MemCost as usize])?,
            threads: LexState::Threads.number(fields[LexState::Threads as usize])?,
            b64_salt: fields[LexState::Salt as usize],
            b64_hash: fields[LexState::Hash as usize],
        })
    }
}

/// Checks only the layout of a hash string. Nothing is decoded or range-checked.
pub fn is_well_formed(s: &str) -> bool {
    TokenizedHash::try_from(s).is_ok()
}
