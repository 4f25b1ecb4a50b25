//! Maps OCFL object ids to directories under the storage root.

use once_cell::sync::Lazy;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

static NON_ALPHA_PLUS: Lazy<AsciiSet> = Lazy::new(|| NON_ALPHANUMERIC.remove(b'-').remove(b'_'));

/// Maps an object id to its directory name under the storage root. The mapping is a flat
/// layout with every character outside `[A-Za-z0-9_-]` percent encoded, so arbitrary ids
/// (including hierarchical Fedora ids containing `/`) produce a single safe path segment.
pub fn object_root_name(object_id: &str) -> String {
    utf8_percent_encode(object_id, &NON_ALPHA_PLUS).to_string()
}
