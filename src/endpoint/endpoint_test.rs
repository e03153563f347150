use std::collections::BTreeSet;

use super::*;

#[test]
fn test_endpoints_are_ordered_by_hostname_then_port() {
    let members: BTreeSet<Endpoint> = [
        Endpoint::new("b", 80, 1),
        Endpoint::new("a", 9090, 1),
        Endpoint::new("a", 80, 5),
    ]
    .into_iter()
    .collect();

    let ordered: Vec<_> = members.iter().map(|e| (e.hostname.as_str(), e.port)).collect();
    assert_eq!(ordered, vec![("a", 80), ("a", 9090), ("b", 80)]);
}

#[test]
fn test_identical_endpoints_are_deduplicated() {
    let members: BTreeSet<Endpoint> = [
        Endpoint::new("a", 80, 1),
        Endpoint::new("a", 80, 1),
        Endpoint::new("a", 80, 2),
    ]
    .into_iter()
    .collect();

    assert_eq!(members.len(), 2);
}

#[test]
fn test_same_address_ignores_weight() {
    let a1 = Endpoint::new("a", 80, 1);
    let a2 = Endpoint::new("a", 80, 2);

    assert_ne!(a1, a2);
    assert!(a1.same_address(&a2));
    assert!(!a1.same_address(&Endpoint::new("a", 81, 1)));
}

#[test]
fn test_placeholder_set_is_empty_at_version_zero() {
    let set = EndpointSet::empty("svc");

    assert_eq!(set.target(), "svc");
    assert_eq!(set.version(), 0);
    assert!(set.is_empty());
}

#[test]
fn test_same_members_ignores_version() {
    let members: BTreeSet<Endpoint> = [Endpoint::new("a", 80, 1)].into_iter().collect();
    let v1 = EndpointSet::new("svc", members.clone(), 1);
    let v2 = EndpointSet::new("svc", members, 2);

    assert!(v1.same_members(&v2));
    assert_ne!(v1, v2);
}

#[test]
fn test_display_renders_canonical_order() {
    let members: BTreeSet<Endpoint> =
        [Endpoint::new("b", 80, 0), Endpoint::new("a", 80, 3)].into_iter().collect();
    let set = EndpointSet::new("svc", members, 7);

    assert_eq!(set.to_string(), "svc@v7 [a:80@3, b:80@0]");
}
