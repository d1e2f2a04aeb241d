use crate::store::ProtectedResourceDirectory;
use std::fmt;
use thiserror::Error;

/// Errors raised when building an [`AuthorizationRequirement`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequirementError {
    #[error("Resource name must not be empty")]
    EmptyResourceName,
    #[error("Scope must not be empty")]
    EmptyScope,
    #[error("Resource name '{0}' must not contain '#'")]
    InvalidResourceName(String),
}

/// A permission a request must hold: `scope` on the resource `resource_name`.
///
/// Displays as `{resource_name}#{scope}`, the UMA permission identifier sent
/// to the identity server.
#[derive(Clone)]
pub struct AuthorizationRequirement {
    directory: ProtectedResourceDirectory,
    resource_name: String,
    scope: String,
}

impl AuthorizationRequirement {
    pub fn new(
        directory: ProtectedResourceDirectory,
        resource_name: impl Into<String>,
        scope: impl Into<String>,
    ) -> Result<Self, RequirementError> {
        let resource_name = resource_name.into();
        let scope = scope.into();

        if resource_name.trim().is_empty() {
            return Err(RequirementError::EmptyResourceName);
        }
        if resource_name.contains('#') {
            return Err(RequirementError::InvalidResourceName(resource_name));
        }
        if scope.trim().is_empty() {
            return Err(RequirementError::EmptyScope);
        }

        Ok(Self {
            directory,
            resource_name,
            scope,
        })
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Directory used to resolve the protected resource per realm
    pub fn directory(&self) -> &ProtectedResourceDirectory {
        &self.directory
    }
}

impl fmt::Display for AuthorizationRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.resource_name, self.scope)
    }
}

impl fmt::Debug for AuthorizationRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationRequirement")
            .field("resource_name", &self.resource_name)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
