/*!
 * Locator parsing for provider detection
 */

use std::fmt;

use crate::error::{Result, TransferError};

/// Cloud storage provider identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    S3,
    Gcs,
    Azure,
}

impl Provider {
    /// Canonical locator scheme for this provider
    pub fn scheme(&self) -> &'static str {
        match self {
            Provider::S3 => "s3",
            Provider::Gcs => "gs",
            Provider::Azure => "azure",
        }
    }

    /// Short name used in logs and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::S3 => "s3",
            Provider::Gcs => "gcs",
            Provider::Azure => "azure",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed storage location: provider, container, and object path
///
/// Immutable once parsed. Re-serializing with [`Endpoint::to_locator`]
/// yields a canonical locator that parses back to an equal endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub provider: Provider,
    pub container: String,
    pub path: String,
    /// Storage account (Azure only); may instead come from
    /// `AZURE_STORAGE_ACCOUNT` at connect time
    pub account: Option<String>,
}

impl Endpoint {
    /// Parse a storage locator string
    ///
    /// Supported formats:
    /// - `s3://bucket/key`
    /// - `gs://bucket/key`
    /// - `azure://container/key`
    /// - `azure://account@container/key`
    /// - `https://account.blob.core.windows.net/container/key`
    pub fn parse(locator: &str) -> Result<Self> {
        let (scheme, rest) = locator
            .split_once("://")
            .ok_or_else(|| TransferError::InvalidLocator(format!("missing scheme: {locator}")))?;

        match scheme {
            "s3" => Self::parse_flat(Provider::S3, rest, locator),
            "gs" => Self::parse_flat(Provider::Gcs, rest, locator),
            "azure" => Self::parse_azure(rest, locator),
            "https" if rest.contains(".blob.core.windows.net") => {
                Self::parse_azure_https(rest, locator)
            }
            other => Err(TransferError::InvalidLocator(format!(
                "unsupported scheme '{other}': {locator}"
            ))),
        }
    }

    /// Parse `bucket/key` style locators (S3, GCS)
    fn parse_flat(provider: Provider, rest: &str, locator: &str) -> Result<Self> {
        let (container, path) = split_container_path(rest, locator)?;
        Ok(Self {
            provider,
            container,
            path,
            account: None,
        })
    }

    /// Parse `azure://[account@]container/key`
    ///
    /// An `@` only introduces an account when it precedes the container
    /// segment; an `@` inside the object path is part of the path.
    fn parse_azure(rest: &str, locator: &str) -> Result<Self> {
        let (account, rest) = match rest.split_once('@') {
            Some((account, tail)) if !account.is_empty() && !account.contains('/') => {
                (Some(account.to_string()), tail)
            }
            Some((account, _)) if account.is_empty() => {
                return Err(TransferError::InvalidLocator(format!(
                    "empty account name: {locator}"
                )))
            }
            _ => (None, rest),
        };
        let (container, path) = split_container_path(rest, locator)?;
        Ok(Self {
            provider: Provider::Azure,
            container,
            path,
            account,
        })
    }

    /// Parse `https://<account>.blob.core.windows.net/<container>/<key>`
    fn parse_azure_https(rest: &str, locator: &str) -> Result<Self> {
        let (host, tail) = rest.split_once('/').ok_or_else(|| {
            TransferError::InvalidLocator(format!("missing container and key: {locator}"))
        })?;
        let account = host.split('.').next().unwrap_or_default();
        if account.is_empty() {
            return Err(TransferError::InvalidLocator(format!(
                "missing account name: {locator}"
            )));
        }
        let (container, path) = split_container_path(tail, locator)?;
        Ok(Self {
            provider: Provider::Azure,
            container,
            path,
            account: Some(account.to_string()),
        })
    }

    /// Serialize back to a canonical locator string
    pub fn to_locator(&self) -> String {
        match (&self.provider, &self.account) {
            (Provider::Azure, Some(account)) => {
                format!("azure://{account}@{}/{}", self.container, self.path)
            }
            (provider, _) => format!("{}://{}/{}", provider.scheme(), self.container, self.path),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_locator())
    }
}

/// Split `container/path`, rejecting empty components
fn split_container_path(rest: &str, locator: &str) -> Result<(String, String)> {
    match rest.split_once('/') {
        Some((container, path)) if !container.is_empty() && !path.is_empty() => {
            Ok((container.to_string(), path.to_string()))
        }
        _ => Err(TransferError::InvalidLocator(format!(
            "locator must include container and object path: {locator}"
        ))),
    }
}
