//! Hook for platforms without a supported global input API.
//!
//! Lets the crate build everywhere; `install` always fails with
//! [`CaptureError::HookUnavailable`] so capture degrades gracefully.

use crate::collector::hook::{CaptureError, HookTarget, InputHook, RawInputSink};
use std::sync::Arc;

pub struct NoopHook {
    target: HookTarget,
}

impl NoopHook {
    pub fn new(target: HookTarget) -> Self {
        Self { target }
    }
}

impl InputHook for NoopHook {
    fn target(&self) -> HookTarget {
        self.target
    }

    fn install(&mut self, _sink: Arc<dyn RawInputSink>) -> Result<(), CaptureError> {
        Err(CaptureError::HookUnavailable(format!(
            "no global {} hook on {}",
            self.target.as_str(),
            std::env::consts::OS
        )))
    }

    fn uninstall(&mut self) {}
}

/// No global input hook exists on this platform.
pub fn check_permission() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::RawInput;

    struct Discard;

    impl RawInputSink for Discard {
        fn deliver(&self, _input: RawInput) {}
    }

    #[test]
    fn test_install_reports_unavailable() {
        let mut hook = NoopHook::new(HookTarget::Keyboard);
        let err = hook.install(Arc::new(Discard)).unwrap_err();
        assert!(matches!(err, CaptureError::HookUnavailable(_)));
        assert!(!check_permission());
    }
}
