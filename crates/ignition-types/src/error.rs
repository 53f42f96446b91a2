use std::fmt;

/// The five error domains in the core's taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Engine,
    Function,
    Registry,
    Plugin,
    Execution,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Engine => "engine",
            Domain::Function => "function",
            Domain::Registry => "registry",
            Domain::Plugin => "plugin",
            Domain::Execution => "execution",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A domain-tagged core error: `(domain, code, message)`.
///
/// `code` is a stable machine-readable string (`not_loaded`,
/// `circuit_breaker_open`, ...) used both for `{error, status, domain, code}`
/// HTTP envelopes and for tests that assert on the exact outcome.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{domain}/{code}: {message}")]
pub struct Error {
    pub domain: Domain,
    pub code: &'static str,
    pub message: String,
}

impl Error {
    pub fn new(domain: Domain, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            domain,
            code,
            message: message.into(),
        }
    }

    pub fn is(&self, domain: Domain, code: &str) -> bool {
        self.domain == domain && self.code == code
    }
}

impl PartialEq for Domain {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}
impl Eq for Domain {}

macro_rules! ctor {
    ($name:ident, $domain:expr, $code:expr, $doc:expr) => {
        #[doc = $doc]
        pub fn $name(message: impl Into<String>) -> Error {
            Error::new($domain, $code, message)
        }
    };
}

impl Error {
    ctor!(not_initialized, Domain::Engine, "not_initialized", "engine/not_initialized");
    ctor!(invalid_state, Domain::Engine, "invalid_state", "engine/invalid_state");
    ctor!(already_running, Domain::Engine, "already_running", "engine/already_running");
    ctor!(engine_shutdown, Domain::Engine, "shutdown", "engine/shutdown");
    ctor!(internal, Domain::Engine, "internal", "engine/internal");

    ctor!(function_not_found, Domain::Function, "not_found", "function/not_found");
    ctor!(not_loaded, Domain::Function, "not_loaded", "function/not_loaded");
    ctor!(already_loaded, Domain::Function, "already_loaded", "function/already_loaded");
    ctor!(stopped, Domain::Function, "stopped", "function/stopped");
    ctor!(invalid, Domain::Function, "invalid", "function/invalid");
    ctor!(invalid_config, Domain::Function, "invalid_config", "function/invalid_config");
    ctor!(
        not_found_or_stopped,
        Domain::Function,
        "not_found_or_stopped",
        "function/not_found_or_stopped"
    );

    ctor!(registry_not_found, Domain::Registry, "not_found", "registry/not_found");
    ctor!(
        version_not_found,
        Domain::Registry,
        "version_not_found",
        "registry/version_not_found"
    );
    ctor!(tag_not_found, Domain::Registry, "tag_not_found", "registry/tag_not_found");
    ctor!(registry_error, Domain::Registry, "error", "registry/error");
    ctor!(
        invalid_reference,
        Domain::Registry,
        "invalid_reference",
        "registry/invalid_reference"
    );

    ctor!(
        creation_failed,
        Domain::Plugin,
        "creation_failed",
        "plugin/creation_failed"
    );
    ctor!(plugin_not_found, Domain::Plugin, "not_found", "plugin/not_found");
    ctor!(already_exists, Domain::Plugin, "already_exists", "plugin/already_exists");

    ctor!(timeout, Domain::Execution, "timeout", "execution/timeout");
    ctor!(cancelled, Domain::Execution, "cancelled", "execution/cancelled");
    ctor!(
        circuit_breaker_open,
        Domain::Execution,
        "circuit_breaker_open",
        "execution/circuit_breaker_open"
    );
    ctor!(call_failed, Domain::Execution, "failed", "execution/failed");
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_as_domain_slash_code() {
        let err = Error::not_loaded("no instance cached");
        assert_eq!(err.to_string(), "function/not_loaded: no instance cached");
        assert!(err.is(Domain::Function, "not_loaded"));
    }
}
