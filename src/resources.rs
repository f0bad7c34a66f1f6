//! # Embedded Resources
//!
//! Script modules compiled into the binary, addressable by logical path.
//!
//! The map is process-wide, read-only and shared across engines; the module
//! resolver consults it after the filesystem search path comes up empty.

/// Logical path to bytes, baked in at compile time.
static EMBEDDED: &[(&str, &[u8])] = &[
    ("node/format.rhai", include_bytes!("../resources/node/format.rhai")),
    ("node/greeting.rhai", include_bytes!("../resources/node/greeting.rhai")),
    (
        "node/node_modules/strings.rhai",
        include_bytes!("../resources/node/node_modules/strings.rhai"),
    ),
];

/// Look up an embedded resource by its logical path.
pub fn lookup(path: &str) -> Option<&'static [u8]> {
    EMBEDDED
        .iter()
        .find(|(key, _)| *key == path)
        .map(|(_, bytes)| *bytes)
}

/// Logical paths of all embedded resources, in registration order.
pub fn paths() -> impl Iterator<Item = &'static str> {
    EMBEDDED.iter().map(|(key, _)| *key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_hits_registered_paths() {
        for path in paths() {
            assert!(lookup(path).is_some(), "missing resource {path}");
        }
        assert!(lookup("node/absent.rhai").is_none());
    }

    #[test]
    fn resources_are_valid_utf8() {
        for path in paths() {
            let bytes = lookup(path).unwrap();
            assert!(std::str::from_utf8(bytes).is_ok(), "{path} is not utf-8");
        }
    }
}
