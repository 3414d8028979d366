//! Authorization predicate consulted before every exposed operation
//!
//! The actual policy lives outside fleetplane. It is reached through the
//! [`Authorizer`] trait, which any `Fn(&Subject, Action, ResourceKind) -> bool`
//! closure also implements.

use std::fmt;

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Get,
    List,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Get => write!(f, "get"),
            Action::List => write!(f, "list"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ManagementCluster,
    Cluster,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::ManagementCluster => write!(f, "managementcluster"),
            ResourceKind::Cluster => write!(f, "cluster"),
        }
    }
}

/// Identity on whose behalf an operation runs
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subject(String);

impl Subject {
    pub fn new(name: impl Into<String>) -> Self {
        Subject(name.into())
    }

    pub fn anonymous() -> Self {
        Subject("anonymous".to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait Authorizer: Send + Sync {
    fn is_allowed(&self, subject: &Subject, action: Action, resource: ResourceKind) -> bool;
}

impl<F> Authorizer for F
where
    F: Fn(&Subject, Action, ResourceKind) -> bool + Send + Sync,
{
    fn is_allowed(&self, subject: &Subject, action: Action, resource: ResourceKind) -> bool {
        self(subject, action, resource)
    }
}

/// Permits everything; the default until a real policy is plugged in.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn is_allowed(&self, _: &Subject, _: Action, _: ResourceKind) -> bool {
        true
    }
}

/// Turn a denial into [`Error::Forbidden`].
pub fn authorize(
    authorizer: &dyn Authorizer,
    subject: &Subject,
    action: Action,
    resource: ResourceKind,
) -> Result<()> {
    if authorizer.is_allowed(subject, action, resource) {
        Ok(())
    } else {
        Err(Error::Forbidden {
            subject: subject.to_string(),
            action: action.to_string(),
            resource: resource.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_allow_all() {
        assert!(authorize(
            &AllowAll,
            &Subject::anonymous(),
            Action::Delete,
            ResourceKind::ManagementCluster
        )
        .is_ok());
    }

    #[test]
    fn test_closure_policy() {
        let read_only = |_: &Subject, action: Action, _: ResourceKind| {
            matches!(action, Action::Get | Action::List)
        };
        let alice = Subject::new("alice");
        assert!(authorize(&read_only, &alice, Action::List, ResourceKind::Cluster).is_ok());

        let err = authorize(&read_only, &alice, Action::Create, ResourceKind::Cluster).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(err.to_string(), "alice is not allowed to create cluster");
    }
}
