use crate::error::{ProvisionError, Result};
use rand::rngs::OsRng;
use rand::Rng;
use std::fmt;

pub const DEFAULT_PASSWORD_LENGTH: usize = 20;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\
                        abcdefghijklmnopqrstuvwxyz\
                        0123456789!@#$%^&*";

const MIN_LOWERCASE: usize = 1;
const MIN_UPPERCASE: usize = 1;
const MIN_DIGITS: usize = 3;

/// A generated credential. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Secret(********)")
    }
}

/// Length and complexity rules for generated passwords.
///
/// A candidate must contain at least one lowercase letter, one uppercase letter and three
/// digits. Special characters are part of the alphabet but not required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    length: usize,
}

impl PasswordPolicy {
    /// Fails when `length` is too short to ever satisfy the rules, which would make the
    /// rejection loop spin forever.
    pub fn new(length: usize) -> Result<Self> {
        if length < MIN_LOWERCASE + MIN_UPPERCASE + MIN_DIGITS {
            return Err(ProvisionError::UnsatisfiablePasswordPolicy(length));
        }

        Ok(Self { length })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Draw from the OS random source until the candidate meets the rules.
    pub fn generate(&self) -> Secret {
        let mut rng = OsRng;

        loop {
            let candidate: String = (0..self.length)
                .map(|_| {
                    let idx = rng.gen_range(0..CHARSET.len());
                    CHARSET[idx] as char
                })
                .collect();

            if self.accepts(&candidate) {
                return Secret(candidate);
            }
        }
    }

    fn accepts(&self, candidate: &str) -> bool {
        let lower = candidate.chars().filter(|c| c.is_ascii_lowercase()).count();
        let upper = candidate.chars().filter(|c| c.is_ascii_uppercase()).count();
        let digits = candidate.chars().filter(|c| c.is_ascii_digit()).count();

        lower >= MIN_LOWERCASE && upper >= MIN_UPPERCASE && digits >= MIN_DIGITS
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            length: DEFAULT_PASSWORD_LENGTH,
        }
    }
}

/// Generate one password of the given length.
pub fn gen_password(length: usize) -> Result<Secret> {
    Ok(PasswordPolicy::new(length)?.generate())
}
