//! Remote service identifiers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Remote key-value service a staged change targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// Parameter store
    Param,
    /// Secret store
    Secret,
}

impl Service {
    /// Every known service, in stable order
    pub const ALL: [Service; 2] = [Service::Param, Service::Secret];

    /// Wire / file name of the service
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Param => "param",
            Self::Secret => "secret",
        }
    }

    /// Services covered by an optional scope (`None` means all)
    #[must_use]
    pub fn scope(service: Option<Service>) -> &'static [Service] {
        match service {
            Some(Service::Param) => &[Service::Param],
            Some(Service::Secret) => &[Service::Secret],
            None => &Self::ALL,
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "param" => Ok(Self::Param),
            "secret" => Ok(Self::Secret),
            other => Err(CoreError::UnknownService(other.to_string())),
        }
    }
}
