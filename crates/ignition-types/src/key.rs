use std::fmt;

/// Identifies a function as the pair `(namespace, name)`.
///
/// Both components must be non-empty and must not contain `/`; this is
/// checked once at construction so every other component can treat a
/// `FunctionKey` as already-valid.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionKey {
    namespace: String,
    name: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FunctionKeyError {
    #[error("namespace must not be empty")]
    EmptyNamespace,
    #[error("name must not be empty")]
    EmptyName,
    #[error("namespace must not contain '/'")]
    NamespaceContainsSlash,
    #[error("name must not contain '/'")]
    NameContainsSlash,
}

impl FunctionKey {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, FunctionKeyError> {
        let namespace = namespace.into();
        let name = name.into();
        if namespace.is_empty() {
            return Err(FunctionKeyError::EmptyNamespace);
        }
        if name.is_empty() {
            return Err(FunctionKeyError::EmptyName);
        }
        if namespace.contains('/') {
            return Err(FunctionKeyError::NamespaceContainsSlash);
        }
        if name.contains('/') {
            return Err(FunctionKeyError::NameContainsSlash);
        }
        Ok(Self { namespace, name })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renders as `namespace/name`, the canonical keying string used by the
    /// registry and the Plugin Manager's maps.
    pub fn as_storage_key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_slashed_components() {
        assert_eq!(
            FunctionKey::new("", "f").unwrap_err(),
            FunctionKeyError::EmptyNamespace
        );
        assert_eq!(
            FunctionKey::new("ns", "").unwrap_err(),
            FunctionKeyError::EmptyName
        );
        assert_eq!(
            FunctionKey::new("n/s", "f").unwrap_err(),
            FunctionKeyError::NamespaceContainsSlash
        );
        assert_eq!(
            FunctionKey::new("ns", "f/2").unwrap_err(),
            FunctionKeyError::NameContainsSlash
        );
    }

    #[test]
    fn renders_as_namespace_slash_name() {
        let key = FunctionKey::new("ns1", "f").unwrap();
        assert_eq!(key.to_string(), "ns1/f");
        assert_eq!(key.as_storage_key(), "ns1/f");
    }
}
