//! Verification code generation
//!
//! Codes are 8 uppercase hex characters drawn from 4 random bytes. The
//! generator does not check uniqueness; the caller retries on collision.

use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::VecDeque;

/// Random bytes per code.
pub const CODE_BYTES: usize = 4;
/// Characters per code.
pub const CODE_LENGTH: usize = CODE_BYTES * 2;

/// Source of fresh verification codes.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// OS-entropy backed generator used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodeGenerator;

impl RandomCodeGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> String {
        let mut bytes = [0u8; CODE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        hex::encode_upper(bytes)
    }
}

/// Hands out a fixed list of codes first, then falls back to random ones.
///
/// Lets demos and tests pin the codes a record will receive.
#[derive(Debug, Default)]
pub struct ScriptedCodeGenerator {
    queue: Mutex<VecDeque<String>>,
    fallback: RandomCodeGenerator,
}

impl ScriptedCodeGenerator {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queue: Mutex::new(codes.into_iter().map(Into::into).collect()),
            fallback: RandomCodeGenerator,
        }
    }

    pub fn remaining(&self) -> usize {
        self.queue.lock().len()
    }
}

impl CodeGenerator for ScriptedCodeGenerator {
    fn generate(&self) -> String {
        self.queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.generate())
    }
}

/// Whether `code` has the shape of a generated code.
pub fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_random_code_shape() {
        let generator = RandomCodeGenerator::new();
        for _ in 0..100 {
            let code = generator.generate();
            assert_eq!(code.len(), 8);
            assert!(is_well_formed(&code), "bad code {}", code);
        }
    }

    #[test]
    fn test_random_codes_vary() {
        let generator = RandomCodeGenerator::new();
        let codes: HashSet<String> = (0..50).map(|_| generator.generate()).collect();
        assert!(codes.len() > 45);
    }

    #[test]
    fn test_scripted_then_random() {
        let generator = ScriptedCodeGenerator::new(["AB12CD34", "00000001"]);
        assert_eq!(generator.generate(), "AB12CD34");
        assert_eq!(generator.generate(), "00000001");
        assert_eq!(generator.remaining(), 0);
        assert!(is_well_formed(&generator.generate()));
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed("AB12CD34"));
        assert!(!is_well_formed("ab12cd34"));
        assert!(!is_well_formed("AB12CD3"));
        assert!(!is_well_formed("AB12CDZ4"));
    }
}
