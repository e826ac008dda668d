use std::{fmt, sync::Arc};

use crate::error::Error;

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Region(String);

impl Region {
    pub fn new(value: impl Into<String>) -> Result<Self, Error> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(Error::invalid_config("region must not be empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn is_us_east_1(&self) -> bool {
        self.0 == "us-east-1"
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Region").field(&self.0).finish()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for Region {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Result<Self, Error> {
        let access_key_id = access_key_id.into();
        let secret_access_key = secret_access_key.into();

        if access_key_id.trim().is_empty() {
            return Err(Error::invalid_config("access_key_id must not be empty"));
        }
        if secret_access_key.trim().is_empty() {
            return Err(Error::invalid_config("secret_access_key must not be empty"));
        }

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token: None,
        })
    }

    pub fn with_session_token(mut self, session_token: impl Into<String>) -> Result<Self, Error> {
        let session_token = session_token.into();
        if session_token.trim().is_empty() {
            return Err(Error::invalid_config("session_token must not be empty"));
        }
        self.session_token = Some(session_token);
        Ok(self)
    }

    fn is_usable(&self) -> bool {
        !self.access_key_id.trim().is_empty() && !self.secret_access_key.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &masked(&self.access_key_id))
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_deref().map(masked),
            )
            .finish()
    }
}

/// Shows only the first four characters of longer values.
fn masked(value: &str) -> String {
    let value = value.trim();
    match value.char_indices().nth(4) {
        Some((cut, _)) if value.len() > 8 => format!("{}****", &value[..cut]),
        _ => "<redacted>".to_string(),
    }
}

/// Source of credentials consulted once per signed request.
///
/// Implementations own refresh and caching; the engine only asks for the current pair.
pub trait CredentialsProvider: Send + Sync + fmt::Debug {
    fn credentials(&self) -> Result<Credentials, Error>;
}

pub type DynCredentialsProvider = Arc<dyn CredentialsProvider>;

#[non_exhaustive]
#[derive(Clone, Debug)]
pub enum Auth {
    /// Send requests unsigned.
    Anonymous,
    Static(Credentials),
    Provider(DynCredentialsProvider),
}

impl Auth {
    pub fn from_env() -> Result<Self, Error> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| Error::invalid_config("missing AWS_ACCESS_KEY_ID"))?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .map_err(|_| Error::invalid_config("missing AWS_SECRET_ACCESS_KEY"))?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        let mut creds = Credentials::new(access_key_id, secret_access_key)?;
        if let Some(token) = session_token {
            creds = creds.with_session_token(token)?;
        }

        Ok(Self::Static(creds))
    }

    pub fn provider(provider: impl CredentialsProvider + 'static) -> Self {
        Self::Provider(Arc::new(provider))
    }

    /// Resolves the credentials for one request. `None` means the request goes unsigned.
    pub(crate) fn resolve(&self) -> Result<Option<Credentials>, Error> {
        match self {
            Self::Anonymous => Ok(None),
            Self::Static(creds) => Ok(Some(creds.clone())),
            Self::Provider(provider) => {
                let creds = provider.credentials().map_err(|err| match err {
                    Error::Signing { .. } => err,
                    other => Error::signing(format!("credentials provider failed: {other}")),
                })?;
                if !creds.is_usable() {
                    return Err(Error::signing(
                        "credentials provider returned empty credentials",
                    ));
                }
                Ok(Some(creds))
            }
        }
    }
}

#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressingStyle {
    Auto,
    Path,
    VirtualHosted,
}

/// Request signing scheme.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SignatureVersion {
    /// AWS Signature Version 4 (HMAC-SHA256).
    #[default]
    V4,
    /// Legacy S3 signature (HMAC-SHA1 over the canonical string).
    V2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fixed(Option<Credentials>);

    impl CredentialsProvider for Fixed {
        fn credentials(&self) -> Result<Credentials, Error> {
            self.0
                .clone()
                .ok_or_else(|| Error::invalid_config("no credentials configured"))
        }
    }

    #[test]
    fn provider_failure_becomes_signing_error() {
        let auth = Auth::provider(Fixed(None));
        match auth.resolve() {
            Err(Error::Signing { message }) => assert!(message.contains("no credentials")),
            other => panic!("expected signing error, got {other:?}"),
        }
    }

    #[test]
    fn provider_with_blank_secret_is_rejected() {
        let creds = Credentials {
            access_key_id: "AKID".to_string(),
            secret_access_key: " ".to_string(),
            session_token: None,
        };
        let auth = Auth::provider(Fixed(Some(creds)));
        assert!(matches!(auth.resolve(), Err(Error::Signing { .. })));
    }

    #[test]
    fn anonymous_resolves_to_none() {
        assert!(Auth::Anonymous.resolve().unwrap().is_none());
    }

    #[test]
    fn debug_output_masks_secrets() {
        let creds = Credentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI")
            .unwrap()
            .with_session_token("tok")
            .unwrap();
        let shown = format!("{creds:?}");
        assert!(shown.contains("AKID****"));
        assert!(!shown.contains("AKIDEXAMPLE"));
        assert!(!shown.contains("wJalr"));
        assert!(!shown.contains("\"tok\""));
    }
}
