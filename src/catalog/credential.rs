use std::fmt;

/// A known target service and the app id its tokens carry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Service {
    pub name: String,
    pub app_id: String,
}

impl Service {
    pub fn new(name: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            app_id: app_id.into(),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One login against one target service.
/// Matching key: (id, service)
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: String,
    pub secret: String,
    pub service: Service,
}

impl Credential {
    pub fn new(id: impl Into<String>, secret: impl Into<String>, service: Service) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
            service,
        }
    }

    /// True when the token identity (owner, app id) belongs to this credential
    pub fn matches(&self, owner_id: &str, app_id: &str) -> bool {
        self.id == owner_id && self.service.app_id == app_id
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.service)
    }
}

// secret stays out of logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}
