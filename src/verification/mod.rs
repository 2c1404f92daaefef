//! Rotating verification codes.

pub mod codes;
pub mod manager;

pub use codes::{CodeGenerator, RandomCodeGenerator, ScriptedCodeGenerator, CODE_LENGTH};
pub use manager::{VerificationManager, VerificationOutcome};
