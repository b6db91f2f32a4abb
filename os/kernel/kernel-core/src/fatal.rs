use kernel_errors::{KernelError, Result};
use log::error;

/// Passes `result` through unless it reports corruption, which halts.
pub(crate) fn escalate<T>(result: Result<T>) -> Result<T> {
    if let Err(KernelError::Corrupted) = result {
        error!("core: kernel heap corruption detected, halting");
        panic!("{}", KernelError::Corrupted);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_errors_pass_through() {
        assert_eq!(escalate(Ok::<_, KernelError>(3)), Ok(3));
        for e in KernelError::ALL.into_iter().filter(|e| e.is_recoverable()) {
            assert_eq!(escalate::<()>(Err(e)), Err(e));
        }
    }

    #[test]
    #[should_panic(expected = "heap corruption detected")]
    fn corruption_halts() {
        let _ = escalate::<()>(Err(KernelError::Corrupted));
    }
}
