// src/code.rs
use rand::{rngs::OsRng, Rng};
use std::future::Future;
use tracing::{debug, error};

use crate::error::AttendanceError;

pub const CODE_LENGTH: usize = 8;

/// Rejections tolerated before giving up on a single `generate` call.
pub const MAX_ATTEMPTS: u32 = 10;

const CODE_SPACE: u32 = 100_000_000;

/// Issues 8-digit attendance codes from the OS random source.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeGenerator;

impl CodeGenerator {
    pub fn new() -> Self {
        Self
    }

    /// One zero-padded code drawn uniformly from `[0, 10^8)`.
    pub fn random_code(&self) -> String {
        let n = OsRng.gen_range(0..CODE_SPACE);
        format!("{n:0width$}", width = CODE_LENGTH)
    }

    /// Draw codes until `is_unique` accepts one, at most [`MAX_ATTEMPTS`] times.
    ///
    /// Errors returned by the predicate abort generation and are passed through.
    pub async fn generate<F, Fut>(&self, mut is_unique: F) -> Result<String, AttendanceError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<bool, AttendanceError>>,
    {
        let mut rejected: Vec<String> = Vec::new();

        for attempt in 1..=MAX_ATTEMPTS {
            let code = self.random_code();

            if !rejected.contains(&code) && is_unique(code.clone()).await? {
                return Ok(code);
            }

            debug!(attempt, "attendance code already taken, drawing again");
            rejected.push(code);
        }

        error!(attempts = MAX_ATTEMPTS, "could not find an unused attendance code");
        Err(AttendanceError::Exhausted {
            attempts: MAX_ATTEMPTS,
        })
    }
}

/// True iff `code` is exactly eight ASCII digits.
pub fn validate_format(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn random_codes_are_well_formed() {
        let generator = CodeGenerator::new();
        for _ in 0..1_000 {
            assert!(validate_format(&generator.random_code()));
        }
    }

    #[test]
    fn format_rejects_near_misses() {
        assert!(validate_format("01234567"));
        assert!(!validate_format(""));
        assert!(!validate_format("1234567"));
        assert!(!validate_format("123456789"));
        assert!(!validate_format("1234a678"));
        assert!(!validate_format(" 1234567"));
        assert!(!validate_format("１２３４５６７８"));
    }

    #[tokio::test]
    async fn gives_up_after_exactly_ten_rejections() {
        let calls = Arc::new(Mutex::new(0u32));
        let counter = calls.clone();

        let result = CodeGenerator::new()
            .generate(move |_| {
                let counter = counter.clone();
                async move {
                    *counter.lock().unwrap() += 1;
                    Ok::<_, AttendanceError>(false)
                }
            })
            .await;

        assert!(matches!(result, Err(AttendanceError::Exhausted { attempts: 10 })));
        assert_eq!(*calls.lock().unwrap(), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn never_returns_a_rejected_code() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();

        let code = CodeGenerator::new()
            .generate(move |code| {
                let log = log.clone();
                async move {
                    let mut log = log.lock().unwrap();
                    log.push(code);
                    Ok::<_, AttendanceError>(log.len() > 3)
                }
            })
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen.last(), Some(&code));
        assert!(!seen[..3].contains(&code));
    }

    #[tokio::test]
    async fn predicate_errors_abort_generation() {
        let result = CodeGenerator::new()
            .generate(|_| async {
                Err::<bool, _>(AttendanceError::Store(crate::error::StoreError::Backend(
                    "down".into(),
                )))
            })
            .await;

        assert!(matches!(result, Err(AttendanceError::Store(_))));
    }
}
