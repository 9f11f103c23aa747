//! Destination reference resolution for bundles.

use oci_distribution::Reference;
use std::str::FromStr;

use crate::bundle::Metadata;
use crate::constants::OCI_SCHEME;
use crate::error::{Error, Result};

/// Prefix `location` with `oci://` unless it already carries the scheme
pub fn ensure_oci_prefix(location: &str) -> String {
    if location.starts_with(OCI_SCHEME) {
        location.to_string()
    } else {
        format!("{}{}", OCI_SCHEME, location)
    }
}

/// Derive the bundle reference `<location>/<name>:<version>`
pub fn reference_from_metadata(location: &str, metadata: &Metadata) -> Result<Reference> {
    if metadata.name.is_empty() {
        return Err(Error::MissingName);
    }
    if metadata.version.is_empty() {
        return Err(Error::MissingVersion);
    }

    let location = location
        .strip_prefix(OCI_SCHEME)
        .unwrap_or(location)
        .trim_end_matches('/');
    let raw = format!("{}/{}:{}", location, metadata.name, metadata.version);

    Reference::from_str(&raw).map_err(|e| Error::InvalidReference {
        reference: raw.clone(),
        reason: e.to_string(),
    })
}

/// Render a reference the way users type it back into the CLI
pub fn display_reference(reference: &Reference) -> String {
    match reference.tag() {
        Some(tag) => format!(
            "{}/{}:{}",
            reference.registry(),
            reference.repository(),
            tag
        ),
        None => reference.whole(),
    }
}
