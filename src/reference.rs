//! `repository:tag` references and repository name checks

use crate::error::{RegistryError, Result};
use std::fmt;
use std::str::FromStr;

const MAX_TAG_LEN: usize = 128;

/// A tag inside a repository, as typed on the command line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManifestRef {
    pub repository: String,
    pub tag: String,
}

impl ManifestRef {
    /// Parse `repository:tag`, splitting on the first `:`.
    ///
    /// The repository must follow the distribution naming rules and the tag
    /// the tag grammar, so neither can change the request path.
    pub fn parse(reference: &str) -> Result<Self> {
        let (repository, tag) = reference
            .split_once(':')
            .ok_or_else(|| RegistryError::invalid_reference(reference, "expected repository:tag"))?;

        if repository.is_empty() {
            return Err(RegistryError::invalid_reference(
                reference,
                "repository name is empty",
            ));
        }
        if tag.is_empty() {
            return Err(RegistryError::invalid_reference(reference, "tag is empty"));
        }
        validate_repository_name(repository).map_err(|err| within(reference, err))?;
        validate_tag(tag).map_err(|err| within(reference, err))?;

        Ok(Self {
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }
}

/// Report a part's validation error against the whole reference
fn within(reference: &str, err: RegistryError) -> RegistryError {
    match err {
        RegistryError::InvalidReference { message, .. } => {
            RegistryError::invalid_reference(reference, message)
        }
        other => other,
    }
}

impl fmt::Display for ManifestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

impl FromStr for ManifestRef {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Check a repository name against the distribution naming rules: `/`
/// separated components of lowercase alphanumerics, joined inside a
/// component by `.`, `_`, `__` or runs of `-`.
pub fn validate_repository_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RegistryError::invalid_reference(name, "repository name is empty"));
    }
    if name.len() > 255 {
        return Err(RegistryError::invalid_reference(
            name,
            "repository name is longer than 255 characters",
        ));
    }

    for component in name.split('/') {
        if !is_valid_component(component) {
            return Err(RegistryError::invalid_reference(
                name,
                format!("invalid path component '{}'", component),
            ));
        }
    }

    Ok(())
}

/// Check a tag against `[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}`
pub fn validate_tag(tag: &str) -> Result<()> {
    let bytes = tag.as_bytes();
    let word = |b: &u8| b.is_ascii_alphanumeric() || *b == b'_';

    let Some(first) = bytes.first() else {
        return Err(RegistryError::invalid_reference(tag, "tag is empty"));
    };
    if bytes.len() > MAX_TAG_LEN {
        return Err(RegistryError::invalid_reference(
            tag,
            format!("tag is longer than {} characters", MAX_TAG_LEN),
        ));
    }
    if !word(first) || !bytes[1..].iter().all(|b| word(b) || *b == b'.' || *b == b'-') {
        return Err(RegistryError::invalid_reference(
            tag,
            "tag may only contain letters, digits, '_', '.' and '-' and cannot start with '.' or '-'",
        ));
    }

    Ok(())
}

fn is_valid_component(component: &str) -> bool {
    let bytes = component.as_bytes();
    let alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();

    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };
    if !alnum(first) || !alnum(last) {
        return false;
    }

    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if alnum(&b) {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && !alnum(&bytes[i]) {
            i += 1;
        }
        let separator = &component[start..i];
        let ok = matches!(separator, "." | "_" | "__") || separator.bytes().all(|c| c == b'-');
        if !ok {
            return false;
        }
    }

    true
}
