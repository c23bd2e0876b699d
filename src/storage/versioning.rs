//! Object versioning helpers

/// Container header naming the archive container for old versions
pub const VERSIONS_LOCATION_HEADER: &str = "X-Versions-Location";

/// Prefix under which the service archives old versions of `object`:
/// the name length as three hex digits, the name, then `/`.
pub fn versioned_object_prefix(object: &str) -> String {
    format!("{:03x}{}/", object.len(), object)
}
