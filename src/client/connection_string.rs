//! Connection string parsing
//!
//! Supports formats:
//! * mongodb://[user[:password]@]host[:port][,host[:port]...][/database][?options]
//! * mongodb+srv://[user[:password]@]host[/database][?options]

use crate::{Error, Result};

/// Default MongoDB port
pub const DEFAULT_PORT: u16 = 27017;

/// Parsed connection info
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// The string this was parsed from
    uri: String,
    /// URI scheme
    pub scheme: Scheme,
    /// Seed hosts
    pub hosts: Vec<HostAddr>,
    /// Default database
    pub database: Option<String>,
    /// Username
    pub user: Option<String>,
    /// Password
    pub password: Option<String>,
    /// Query options, in order of appearance
    pub params: Vec<(String, String)>,
}

/// URI scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// `mongodb://`, explicit host list
    Standard,
    /// `mongodb+srv://`, hosts resolved through DNS SRV records
    Srv,
}

impl Scheme {
    fn prefix(&self) -> &'static str {
        match self {
            Self::Standard => "mongodb://",
            Self::Srv => "mongodb+srv://",
        }
    }
}

/// One seed host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAddr {
    /// Host name or address
    pub host: String,
    /// Port
    pub port: u16,
}

impl std::fmt::Display for HostAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Split `key=value&key=value` into pairs
fn parse_query_params(query_string: &str) -> Result<Vec<(String, String)>> {
    let query = query_string.trim_start_matches('?');
    if query.is_empty() {
        return Ok(Vec::new());
    }

    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(Error::ConnectionString(format!(
                "malformed option '{}'",
                pair
            ))),
        })
        .collect()
}

fn parse_host(scheme: Scheme, raw: &str) -> Result<HostAddr> {
    if raw.is_empty() {
        return Err(Error::ConnectionString("empty host".into()));
    }

    // Bracketed IPv6 literal: [::1]:27017
    let (host, port) = if let Some(rest) = raw.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| Error::ConnectionString(format!("unterminated IPv6 host '{}'", raw)))?;
        let port = match after {
            "" => None,
            _ => Some(after.strip_prefix(':').ok_or_else(|| {
                Error::ConnectionString(format!("unexpected text after IPv6 host '{}'", raw))
            })?),
        };
        (host, port)
    } else if let Some((host, port)) = raw.rsplit_once(':') {
        (host, Some(port))
    } else {
        (raw, None)
    };

    if host.is_empty() {
        return Err(Error::ConnectionString("empty host".into()));
    }
    if host.contains(['[', ']']) {
        return Err(Error::ConnectionString(format!("invalid host '{}'", raw)));
    }
    if scheme == Scheme::Srv && host.contains(':') {
        return Err(Error::ConnectionString(
            "mongodb+srv:// needs a DNS host name".into(),
        ));
    }

    let port = match port {
        Some(_) if scheme == Scheme::Srv => {
            return Err(Error::ConnectionString(
                "mongodb+srv:// hosts must not specify a port".into(),
            ))
        }
        Some(port) => port
            .parse::<u16>()
            .ok()
            .filter(|port| *port != 0)
            .ok_or_else(|| Error::ConnectionString(format!("invalid port '{}'", port)))?,
        None => DEFAULT_PORT,
    };

    Ok(HostAddr {
        host: host.to_string(),
        port,
    })
}

impl ConnectionInfo {
    /// Parse connection string
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::ConnectionString("connection string is empty".into()));
        }

        let (scheme, rest) = if let Some(rest) = s.strip_prefix(Scheme::Srv.prefix()) {
            (Scheme::Srv, rest)
        } else if let Some(rest) = s.strip_prefix(Scheme::Standard.prefix()) {
            (Scheme::Standard, rest)
        } else {
            return Err(Error::ConnectionString(
                "connection string must start with mongodb:// or mongodb+srv://".into(),
            ));
        };

        // Credentials end at the last '@' before the path
        let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
        let (auth, rest) = match rest[..authority_end].rfind('@') {
            Some(pos) => (Some(&rest[..pos]), &rest[pos + 1..]),
            None => (None, rest),
        };

        let (user, password) = match auth {
            Some(auth) => match auth.split_once(':') {
                Some((user, pass)) => (Some(user.to_string()), Some(pass.to_string())),
                None => (Some(auth.to_string()), None),
            },
            None => (None, None),
        };
        if user.as_deref() == Some("") {
            return Err(Error::ConnectionString("empty username".into()));
        }

        // Split off query string before parsing hosts/database
        let (rest, query_string) = match rest.find('?') {
            Some(pos) => rest.split_at(pos),
            None => (rest, ""),
        };

        let (host_list, database) = match rest.find('/') {
            Some(pos) => {
                let db = &rest[pos + 1..];
                (&rest[..pos], (!db.is_empty()).then(|| db.to_string()))
            }
            None => (rest, None),
        };

        if host_list.is_empty() {
            return Err(Error::ConnectionString("no hosts given".into()));
        }

        let hosts = host_list
            .split(',')
            .map(|raw| parse_host(scheme, raw))
            .collect::<Result<Vec<_>>>()?;

        if scheme == Scheme::Srv && hosts.len() != 1 {
            return Err(Error::ConnectionString(
                "mongodb+srv:// takes exactly one host".into(),
            ));
        }

        Ok(Self {
            uri: s.to_string(),
            scheme,
            hosts,
            database,
            user,
            password,
            params: parse_query_params(query_string)?,
        })
    }

    /// The original connection string
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// First value of a query option, matched case-insensitively
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Comma-separated `host:port` list
    pub fn hosts_display(&self) -> String {
        self.hosts
            .iter()
            .map(HostAddr::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Connection string with the password masked, safe for logs
    pub fn redacted(&self) -> String {
        let mut out = String::from(self.scheme.prefix());
        if let Some(user) = &self.user {
            out.push_str(user);
            if self.password.is_some() {
                out.push_str(":****");
            }
            out.push('@');
        }
        match self.scheme {
            Scheme::Standard => out.push_str(&self.hosts_display()),
            Scheme::Srv => out.push_str(&self.hosts[0].host),
        }
        if let Some(db) = &self.database {
            out.push('/');
            out.push_str(db);
        }
        if !self.params.is_empty() {
            if self.database.is_none() {
                out.push('/');
            }
            out.push('?');
            let query = self
                .params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            out.push_str(&query);
        }
        out
    }
}
