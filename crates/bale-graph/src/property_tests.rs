//! Property-based tests for identities and vendor naming.
//!
//! Run with: cargo test --features proptest --package bale-graph property_tests

use crate::{installed_package, vendor_chunk_name, ModuleId};
use proptest::prelude::*;
use std::path::PathBuf;

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,8}"
}

fn package_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        segment(),
        (segment(), segment()).prop_map(|(scope, name)| format!("@{scope}/{name}")),
    ]
}

fn installed_path(package: &str, rest: &[String]) -> PathBuf {
    let mut path = PathBuf::from("/app/node_modules");
    for part in package.split('/') {
        path.push(part);
    }
    for part in rest {
        path.push(part);
    }
    path.set_extension("js");
    path
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Two files of the same package always map to the same vendor chunk.
    #[test]
    fn prop_same_package_same_vendor_chunk(
        package in package_strategy(),
        a in prop::collection::vec(segment(), 1..4),
        b in prop::collection::vec(segment(), 1..4),
    ) {
        let dirs = vec!["node_modules".to_string()];
        let pa = installed_package(&installed_path(&package, &a), &dirs);
        let pb = installed_package(&installed_path(&package, &b), &dirs);
        prop_assert_eq!(pa.as_deref(), Some(package.as_str()));
        prop_assert_eq!(
            vendor_chunk_name(&package, "npm."),
            vendor_chunk_name(pb.as_deref().unwrap_or_default(), "npm.")
        );
    }

    /// Distinct unscoped packages never share a vendor chunk name.
    #[test]
    fn prop_distinct_packages_distinct_chunks(a in segment(), b in segment()) {
        prop_assume!(a != b);
        prop_assert_ne!(vendor_chunk_name(&a, "npm."), vendor_chunk_name(&b, "npm."));
    }

    /// Cleaning is idempotent: an id built from another id's path is equal.
    #[test]
    fn prop_module_id_clean_idempotent(parts in prop::collection::vec(segment(), 1..6)) {
        let raw = format!("/app/{}/../{}.js", parts.join("/"), parts[0]);
        let once = ModuleId::new(&raw).unwrap();
        let twice = ModuleId::new(once.as_path()).unwrap();
        prop_assert_eq!(once, twice);
    }
}
