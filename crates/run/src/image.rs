use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Maximum total number of characters in a repository name.
pub const NAME_TOTAL_LENGTH_MAX: usize = 255;
/// Tag used when a reference carries no tag or digest.
pub const DEFAULT_TAG: &str = "latest";
/// Registry assumed when a reference names no host.
pub const DEFAULT_HOSTNAME: &str = "docker.io";
/// Legacy registry host, canonicalized to [`DEFAULT_HOSTNAME`].
pub const LEGACY_DEFAULT_HOSTNAME: &str = "index.docker.io";
/// Prefix for single-component repositories on the default host.
pub const DEFAULT_REPO_PREFIX: &str = "library/";

/// Repository path: lowercase components separated by `/`, each allowing
/// `.`, `_`, `__` or runs of `-` between alphanumeric runs.
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-z0-9]+(?:(?:\.|_|__|-+)[a-z0-9]+)*(?:/[a-z0-9]+(?:(?:\.|_|__|-+)[a-z0-9]+)*)*$",
    )
    .expect("repository name regex")
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").expect("tag regex"));

static DIGEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9]*(?:[+._-][a-z][a-z0-9]*)*:[A-Fa-f0-9]{32,}$")
        .expect("digest regex")
});

static HOSTNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?)*(?::[0-9]+)?$",
    )
    .expect("hostname regex")
});

/// Failures while parsing an image reference, each a distinct kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("repository name must have at least one component")]
    NameEmpty,
    #[error("repository name must not be more than {NAME_TOTAL_LENGTH_MAX} characters")]
    NameTooLong,
    #[error("invalid reference format")]
    InvalidFormat,
    #[error("invalid tag format")]
    InvalidTag,
    #[error("invalid digest format")]
    InvalidDigest,
}

/// A normalized container image reference: `host/repo[:tag][@digest]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Registry host, e.g. `docker.io`.
    pub hostname: String,
    /// Repository component of the full name, e.g. `library/ubuntu`.
    pub remote_name: String,
    /// Tag, e.g. `latest`.
    pub tag: String,
    /// Content digest, when the reference pins one.
    pub digest: Option<String>,
}

impl ImageRef {
    /// Parse a reference string, applying the registry defaults: host
    /// `docker.io` (with `index.docker.io` canonicalized), repository
    /// prefix `library/` for single-component names on the default host,
    /// and tag `latest`.
    pub fn parse(s: &str) -> Result<Self, ImageError> {
        if s.is_empty() {
            return Err(ImageError::NameEmpty);
        }

        let (rest, digest) = match s.split_once('@') {
            Some((rest, digest)) => {
                if !DIGEST_RE.is_match(digest) {
                    return Err(ImageError::InvalidDigest);
                }
                (rest, Some(digest.to_string()))
            }
            None => (s, None),
        };

        // A colon after the final slash separates the tag; earlier colons
        // belong to a registry port.
        let path_start = rest.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (name_part, tag) = match rest[path_start..].rfind(':') {
            Some(offset) => {
                let idx = path_start + offset;
                let tag = &rest[idx + 1..];
                if !TAG_RE.is_match(tag) {
                    return Err(ImageError::InvalidTag);
                }
                (&rest[..idx], tag.to_string())
            }
            None => (rest, DEFAULT_TAG.to_string()),
        };

        if name_part.is_empty() {
            return Err(ImageError::NameEmpty);
        }

        let (hostname, remote_name) = match name_part.split_once('/') {
            Some((first, path))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_string(), path.to_string())
            }
            _ => (DEFAULT_HOSTNAME.to_string(), name_part.to_string()),
        };

        let hostname = if hostname == LEGACY_DEFAULT_HOSTNAME {
            DEFAULT_HOSTNAME.to_string()
        } else {
            hostname
        };

        let remote_name = if hostname == DEFAULT_HOSTNAME && !remote_name.contains('/') {
            format!("{DEFAULT_REPO_PREFIX}{remote_name}")
        } else {
            remote_name
        };

        if remote_name.len() > NAME_TOTAL_LENGTH_MAX {
            return Err(ImageError::NameTooLong);
        }
        if remote_name.is_empty() || !NAME_RE.is_match(&remote_name) {
            return Err(ImageError::InvalidFormat);
        }
        if !HOSTNAME_RE.is_match(&hostname) {
            return Err(ImageError::InvalidFormat);
        }

        Ok(Self {
            hostname,
            remote_name,
            tag,
            digest,
        })
    }

    /// Short repository name without host or prefix path, e.g. `ubuntu`.
    pub fn name(&self) -> &str {
        self.remote_name
            .rsplit_once('/')
            .map(|(_, short)| short)
            .unwrap_or(&self.remote_name)
    }

    /// Full repository name with host, e.g. `docker.io/library/ubuntu`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.hostname, self.remote_name)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.hostname, self.remote_name, self.tag)?;
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}
