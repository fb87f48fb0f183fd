//! OCI image reference parsing.
//!
//! Parses references like `ghcr.io/org/app:v1.2@sha256:…` into structured
//! components. The textual form is kept as written: `nginx:1.21` displays as
//! `nginx:1.21`, while [`ImageReference::registry`] and
//! [`ImageReference::repository`] carry the normalised coordinates used for
//! registry calls.

use imagepin_core::error::{PinError, Result};

/// Default registry when none is specified.
const DEFAULT_REGISTRY: &str = "docker.io";

/// Default tag when none is specified.
const DEFAULT_TAG: &str = "latest";

/// Namespace for single-component Docker Hub repositories.
const DOCKER_HUB_NAMESPACE: &str = "library";

const MAX_NAME_LENGTH: usize = 255;
const MAX_TAG_LENGTH: usize = 128;
const MIN_DIGEST_HEX_LENGTH: usize = 32;
const SHA256_HEX_LENGTH: usize = 64;

/// Parsed OCI image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry hostname (e.g., "ghcr.io", "docker.io")
    pub registry: String,
    /// Repository path (e.g., "library/nginx", "org/app")
    pub repository: String,
    /// Tag as written, if any
    pub tag: Option<String>,
    /// Digest (e.g., "sha256:abc123...")
    pub digest: Option<String>,
    /// Name portion exactly as written (registry and repository)
    name: String,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// Supports formats:
    /// - `nginx` → docker.io/library/nginx
    /// - `nginx:1.25` → docker.io/library/nginx:1.25
    /// - `myuser/myimage` → docker.io/myuser/myimage
    /// - `ghcr.io/org/image:tag` → ghcr.io/org/image:tag
    /// - `localhost:5000/image@sha256:abc...` → localhost:5000/image@sha256:abc...
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(invalid(reference, "empty image reference"));
        }
        if let Some(c) = reference
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || "._-/:@+".contains(*c)))
        {
            return Err(invalid(reference, &format!("invalid character '{}'", c)));
        }

        let (name_tag, digest) = match reference.split_once('@') {
            Some((_, rest)) if rest.contains('@') => {
                return Err(invalid(reference, "more than one '@' delimiter"));
            }
            Some((name_tag, digest)) => {
                validate_digest(digest).map_err(|reason| invalid(reference, &reason))?;
                (name_tag, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        // Tag separator is the last colon after the last slash
        let last_slash = name_tag.rfind('/').map(|p| p + 1).unwrap_or(0);
        let (name, tag) = match name_tag[last_slash..].rfind(':') {
            Some(colon) => {
                let split = last_slash + colon;
                (&name_tag[..split], Some(&name_tag[split + 1..]))
            }
            None => (name_tag, None),
        };
        if let Some(tag) = tag {
            validate_tag(tag).map_err(|reason| invalid(reference, &reason))?;
        }

        if name.len() > MAX_NAME_LENGTH {
            return Err(invalid(
                reference,
                &format!("repository name longer than {} characters", MAX_NAME_LENGTH),
            ));
        }
        let (registry, repository) =
            Self::split_registry_repository(name).map_err(|reason| invalid(reference, &reason))?;

        Ok(ImageReference {
            registry,
            repository,
            tag: tag.map(str::to_string),
            digest,
            name: name.to_string(),
        })
    }

    /// Split a name into registry and repository components.
    fn split_registry_repository(name: &str) -> std::result::Result<(String, String), String> {
        // The first component is a registry hostname when it contains a dot
        // or colon, or is "localhost"
        if let Some((first, rest)) = name.split_once('/') {
            if first.contains('.') || first.contains(':') || first == "localhost" {
                validate_domain(first)?;
                validate_path(rest)?;
                return Ok((first.to_string(), rest.to_string()));
            }
        }

        validate_path(name)?;
        let repository = if name.contains('/') {
            name.to_string()
        } else {
            format!("{}/{}", DOCKER_HUB_NAMESPACE, name)
        };
        Ok((DEFAULT_REGISTRY.to_string(), repository))
    }

    /// Registry and repository as written, without tag or digest.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag to request from the registry when resolving by tag.
    pub fn tag_or_default(&self) -> &str {
        self.tag.as_deref().unwrap_or(DEFAULT_TAG)
    }

    /// Same reference with any digest removed.
    pub fn without_digest(&self) -> Self {
        Self {
            digest: None,
            ..self.clone()
        }
    }

    /// Pin this reference to `digest`, re-parsing the combined text so the
    /// result is canonical.
    pub fn with_digest(&self, digest: &str) -> Result<Self> {
        Self::parse(&format!("{}@{}", self.without_digest(), digest))
    }

    /// Get the fully-qualified reference string.
    pub fn full_reference(&self) -> String {
        let mut s = format!("{}/{}", self.registry, self.repository);
        if let Some(ref tag) = self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(ref digest) = self.digest {
            s.push('@');
            s.push_str(digest);
        }
        s
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)?;
        if let Some(ref tag) = self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(ref digest) = self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ImageReference {
    type Err = PinError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn invalid(reference: &str, reason: &str) -> PinError {
    PinError::OciImageError(format!(
        "Invalid image reference '{}': {}",
        reference, reason
    ))
}

/// Validate a content digest of the form `algorithm:hex`.
pub fn validate_digest(digest: &str) -> std::result::Result<(), String> {
    let (algorithm, hex) = digest
        .split_once(':')
        .ok_or_else(|| format!("digest '{}' is not in algorithm:hex form", digest))?;

    let valid_algorithm = !algorithm.is_empty()
        && algorithm.starts_with(|c: char| c.is_ascii_alphabetic())
        && algorithm
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_+.".contains(c));
    if !valid_algorithm {
        return Err(format!("invalid digest algorithm '{}'", algorithm));
    }
    if hex.len() < MIN_DIGEST_HEX_LENGTH || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("invalid digest hex '{}'", hex));
    }
    if algorithm == "sha256"
        && (hex.len() != SHA256_HEX_LENGTH || hex.chars().any(|c| c.is_ascii_uppercase()))
    {
        return Err(format!(
            "sha256 digest must be {} lowercase hex characters",
            SHA256_HEX_LENGTH
        ));
    }
    Ok(())
}

fn validate_tag(tag: &str) -> std::result::Result<(), String> {
    if tag.is_empty() {
        return Err("empty tag".to_string());
    }
    if tag.len() > MAX_TAG_LENGTH {
        return Err(format!("tag longer than {} characters", MAX_TAG_LENGTH));
    }
    let mut chars = tag.chars();
    let first_ok = chars
        .next()
        .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_');
    if !first_ok || !chars.all(|c| c.is_ascii_alphanumeric() || "_.-".contains(c)) {
        return Err(format!("invalid tag '{}'", tag));
    }
    Ok(())
}

fn validate_domain(domain: &str) -> std::result::Result<(), String> {
    let (host, port) = match domain.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (domain, None),
    };
    if let Some(port) = port {
        if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("invalid registry port in '{}'", domain));
        }
    }
    let valid_label = |label: &str| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    };
    if host.is_empty() || !host.split('.').all(valid_label) {
        return Err(format!("invalid registry host '{}'", domain));
    }
    Ok(())
}

/// Validate slash-separated repository path components.
///
/// Each component is lowercase alphanumerics joined by single `.`, single or
/// double `_`, or runs of `-`.
fn validate_path(path: &str) -> std::result::Result<(), String> {
    for component in path.split('/') {
        if !valid_component(component) {
            return Err(format!("invalid repository component '{}'", component));
        }
    }
    Ok(())
}

fn valid_component(component: &str) -> bool {
    let bytes = component.as_bytes();
    let alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if bytes.is_empty() || !alnum(bytes[0]) || !alnum(bytes[bytes.len() - 1]) {
        return false;
    }

    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if alnum(b) {
            i += 1;
            continue;
        }
        // Separator run
        let start = i;
        while i < bytes.len() && !alnum(bytes[i]) {
            i += 1;
        }
        let sep = &component[start..i];
        let ok = sep == "." || sep == "_" || sep == "__" || sep.bytes().all(|b| b == b'-');
        if !ok {
            return false;
        }
    }
    true
}
