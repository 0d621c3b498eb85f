//! Pool keys.

use std::fmt;

/// The parameters that make two connections interchangeable.
///
/// The password is deliberately not part of the identity: it is held by the
/// [`ConnectionCreator`](crate::ConnectionCreator) and never compared,
/// hashed, or printed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionIdentity {
    host: String,
    port: Option<u16>,
    dbname: String,
    user: String,
}

impl ConnectionIdentity {
    /// Create an identity using the backend's default port.
    #[must_use]
    pub fn new(host: impl Into<String>, dbname: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            dbname: dbname.into(),
            user: user.into(),
        }
    }

    /// Pin the identity to an explicit port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Server host name or address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Explicit port, if any.
    #[must_use]
    pub const fn port(&self) -> Option<u16> {
        self.port
    }

    /// Database name.
    #[must_use]
    pub fn dbname(&self) -> &str {
        &self.dbname
    }

    /// Login role.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }
}

impl fmt::Display for ConnectionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.user.is_empty() {
            write!(f, "{}@", self.user)?;
        }
        f.write_str(&self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        write!(f, "/{}", self.dbname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    #[rstest]
    #[case(ConnectionIdentity::new("db", "gis", "render"), "render@db/gis")]
    #[case(ConnectionIdentity::new("db", "gis", "").with_port(5433), "db:5433/gis")]
    fn display_is_compact(#[case] identity: ConnectionIdentity, #[case] expected: &str) {
        assert_eq!(identity.to_string(), expected);
    }

    #[rstest]
    fn port_distinguishes_identities() {
        let mut seen = HashSet::new();
        seen.insert(ConnectionIdentity::new("db", "gis", "render"));
        seen.insert(ConnectionIdentity::new("db", "gis", "render"));
        seen.insert(ConnectionIdentity::new("db", "gis", "render").with_port(5433));
        assert_eq!(seen.len(), 2);
    }
}
