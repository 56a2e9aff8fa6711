//! Point-in-time permission queries

/// Errors from a permission probe
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionError {
    #[error("accessibility permission cannot be queried on this platform")]
    Unsupported,
}

/// Asks the OS whether input interception is allowed
pub trait PermissionProbe: Send + Sync {
    fn check(&self) -> Result<bool, PermissionError>;

    /// Ask the OS to show its grant dialog
    fn prompt(&self) {}
}

#[cfg(target_os = "macos")]
mod macos {
    use core_foundation::base::TCFType;
    use core_foundation::boolean::CFBoolean;
    use core_foundation::dictionary::{CFDictionary, CFDictionaryRef};
    use core_foundation::string::{CFString, CFStringRef};

    use super::{PermissionError, PermissionProbe};

    #[link(name = "ApplicationServices", kind = "framework")]
    extern "C" {
        fn AXIsProcessTrusted() -> bool;
        fn AXIsProcessTrustedWithOptions(options: CFDictionaryRef) -> bool;
        static kAXTrustedCheckOptionPrompt: CFStringRef;
    }

    /// TCC Accessibility grant for this process
    pub struct AccessibilityProbe;

    impl PermissionProbe for AccessibilityProbe {
        fn check(&self) -> Result<bool, PermissionError> {
            Ok(unsafe { AXIsProcessTrusted() })
        }

        fn prompt(&self) {
            let key = unsafe { CFString::wrap_under_get_rule(kAXTrustedCheckOptionPrompt) };
            let options = CFDictionary::from_CFType_pairs(&[(
                key.as_CFType(),
                CFBoolean::true_value().as_CFType(),
            )]);

            // The answer is ignored: if not trusted this shows the system prompt
            let _trusted = unsafe { AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef()) };
        }
    }
}

#[cfg(target_os = "macos")]
pub use macos::AccessibilityProbe;

/// Probe for platforms without an accessibility grant
#[cfg(not(target_os = "macos"))]
pub struct UnsupportedProbe;

#[cfg(not(target_os = "macos"))]
impl PermissionProbe for UnsupportedProbe {
    fn check(&self) -> Result<bool, PermissionError> {
        Err(PermissionError::Unsupported)
    }
}
