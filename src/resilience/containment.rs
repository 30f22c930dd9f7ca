use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use anyhow::{anyhow, Result};

/// Run a synchronous stage, turning a panic into an error so the cycle can
/// be abandoned instead of taking the process down.
pub fn contain_panic<T>(stage: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(anyhow!("{} stage panicked: {}", stage, panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_through() {
        assert_eq!(contain_panic("tracking", || Ok(3)).unwrap(), 3);
        assert!(contain_panic::<()>("tracking", || Err(anyhow!("lost"))).is_err());
    }

    #[test]
    fn test_panic_becomes_error() {
        let err = contain_panic::<()>("tracking", || panic!("feature map empty")).unwrap_err();
        assert_eq!(err.to_string(), "tracking stage panicked: feature map empty");
    }
}
