use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

use crate::auth::Auth;
use crate::project_id::{ParseProjectIdError, ProjectId};

/// Represents a dsn url parsing error.
#[derive(Debug, Error)]
pub enum ParseDsnError {
    /// raised on completely invalid urls
    #[error("no valid url provided")]
    InvalidUrl,
    /// raised the scheme is invalid / unsupported.
    #[error("no valid scheme")]
    InvalidScheme,
    /// raised if the username (public key) portion is missing.
    #[error("username is empty")]
    NoUsername,
    /// raised the project is is missing (last path component)
    #[error("empty path")]
    NoProjectId,
    /// raised the project id is invalid.
    #[error("invalid project id")]
    InvalidProjectId(#[from] ParseProjectIdError),
}

/// Represents the scheme of an url http/https.
///
/// This holds schemes that are supported by sentry and relays.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Scheme {
    /// unencrypted HTTP scheme (should not be used)
    Http,
    /// encrypted HTTPS scheme
    Https,
}

impl Scheme {
    /// Returns the default port for this scheme.
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match *self {
                Scheme::Https => "https",
                Scheme::Http => "http",
            }
        )
    }
}

/// Represents a Sentry dsn.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Dsn {
    scheme: Scheme,
    public_key: String,
    secret_key: Option<String>,
    host: String,
    port: Option<u16>,
    path: String,
    project_id: ProjectId,
    envelope_url: Url,
}

impl Dsn {
    /// Converts the dsn into an auth object.
    ///
    /// This always attaches the latest and greatest protocol
    /// version to the auth header.
    pub fn to_auth(&self, client_agent: Option<&str>) -> Auth {
        Auth::from_dsn(self, client_agent)
    }

    /// Returns the URL of the envelope endpoint for this DSN.
    pub fn envelope_api_url(&self) -> &Url {
        &self.envelope_url
    }

    /// Returns the scheme
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Returns the public_key
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Returns secret_key
    pub fn secret_key(&self) -> Option<&str> {
        self.secret_key.as_deref()
    }

    /// Returns the host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port, falling back to the scheme default.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.scheme.default_port())
    }

    /// Returns the path prefix in front of the project id.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the project_id
    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }
}

impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.public_key)?;
        if let Some(ref secret_key) = self.secret_key {
            write!(f, ":{}", secret_key)?;
        }
        write!(f, "@{}", self.host)?;
        if let Some(ref port) = self.port {
            write!(f, ":{}", port)?;
        }
        write!(f, "{}/{}", self.path, self.project_id)?;
        Ok(())
    }
}

impl FromStr for Dsn {
    type Err = ParseDsnError;

    fn from_str(s: &str) -> Result<Dsn, ParseDsnError> {
        let url = Url::parse(s).map_err(|_| ParseDsnError::InvalidUrl)?;

        if url.path() == "/" {
            return Err(ParseDsnError::NoProjectId);
        }

        let mut path_segments: Vec<_> = url
            .path_segments()
            .ok_or(ParseDsnError::NoProjectId)?
            .collect();

        let project_id = path_segments
            .pop()
            .ok_or(ParseDsnError::NoProjectId)?
            .parse()?;
        let path = match path_segments.len() {
            0 => "".to_owned(),
            _ => format!("/{}", path_segments.join("/")),
        };

        let public_key = match url.username() {
            "" => return Err(ParseDsnError::NoUsername),
            username => username.to_string(),
        };

        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            _ => return Err(ParseDsnError::InvalidScheme),
        };

        let secret_key = url.password().map(|s| s.into());
        let port = url.port();
        let host = match url.host_str() {
            Some(host) => host.into(),
            None => return Err(ParseDsnError::InvalidUrl),
        };

        let mut envelope_url = format!("{}://{}", scheme, host);
        if let Some(port) = port {
            envelope_url.push_str(&format!(":{}", port));
        }
        envelope_url.push_str(&format!("{}/api/{}/envelope/", path, project_id));
        let envelope_url = envelope_url
            .parse()
            .map_err(|_| ParseDsnError::InvalidUrl)?;

        Ok(Dsn {
            scheme,
            public_key,
            secret_key,
            port,
            host,
            path,
            project_id,
            envelope_url,
        })
    }
}
