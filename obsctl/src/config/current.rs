use std::fmt;
use std::str::FromStr;

use super::{ApiEntry, ApiName, Config, Current, TenantContext, TenantName};
use crate::error::{Error, Result};

/// A selected (api, tenant) pair. Holding one says nothing about whether it still
/// exists; every use goes through [`ContextRef::resolve`] against the live document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextRef {
    pub api: ApiName,
    pub tenant: TenantName,
}

impl ContextRef {
    pub fn new(api: impl Into<ApiName>, tenant: impl Into<TenantName>) -> Self {
        Self {
            api: api.into(),
            tenant: tenant.into(),
        }
    }

    /// Only a fully populated pointer counts as a selection.
    pub(super) fn from_current(current: &Current) -> Option<Self> {
        match (&current.api, &current.tenant) {
            (Some(api), Some(tenant)) => Some(Self::new(api.clone(), tenant.clone())),
            _ => None,
        }
    }

    pub fn resolve<'a>(&self, config: &'a Config) -> Result<(&'a ApiEntry, &'a TenantContext)> {
        let api = config.api(self.api.as_str())?;
        let tenant = config.tenant(self.api.as_str(), self.tenant.as_str())?;
        Ok((api, tenant))
    }
}

impl fmt::Display for ContextRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api, self.tenant)
    }
}

impl FromStr for ContextRef {
    type Err = Error;

    /// Parses `<api>/<tenant>`. API names are hosts and may not contain '/', so the first slash splits.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((api, tenant)) if !api.is_empty() && !tenant.is_empty() => {
                Ok(Self::new(api, tenant))
            }
            _ => Err(Error::validation(
                "context",
                format!("'{}' is not of the form <api>/<tenant>", s),
            )),
        }
    }
}

impl Config {
    /// The selected context, without resolving it.
    pub fn current_ref(&self) -> Result<ContextRef> {
        if self.current.is_unset() {
            return Err(Error::NoCurrentContext);
        }
        ContextRef::from_current(&self.current).ok_or_else(|| {
            Error::InvalidContext(format!(
                "{}/{}",
                self.current.api.as_ref().map(ApiName::as_str).unwrap_or_default(),
                self.current
                    .tenant
                    .as_ref()
                    .map(TenantName::as_str)
                    .unwrap_or_default()
            ))
        })
    }

    pub fn get_current(&self) -> Result<(ContextRef, &ApiEntry, &TenantContext)> {
        let selected = self.current_ref()?;
        let (api, tenant) = selected.resolve(self).map_err(|err| match err {
            Error::NotFound { .. } => Error::InvalidContext(selected.to_string()),
            other => other,
        })?;
        Ok((selected, api, tenant))
    }

    /// Commits the selection only once both halves resolve.
    pub fn set_current(&mut self, selected: &ContextRef) -> Result<()> {
        selected.resolve(self)?;
        self.current = Current {
            api: Some(selected.api.clone()),
            tenant: Some(selected.tenant.clone()),
        };
        Ok(())
    }
}
