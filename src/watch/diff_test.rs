use super::*;
use crate::Endpoint;
use crate::EndpointSet;

fn ep(
    host: &str,
    port: u16,
    weight: u32,
) -> Endpoint {
    Endpoint::new(host, port, weight)
}

#[test]
fn test_first_non_empty_candidate_publishes_version_one() {
    let previous = EndpointSet::empty("svc");

    let publication = diff(&previous, vec![ep("b", 80, 1), ep("a", 80, 1)]).expect("publish");

    assert_eq!(publication.snapshot.version(), 1);
    assert_eq!(publication.snapshot.target(), "svc");
    assert_eq!(publication.diff.added, vec![ep("a", 80, 1), ep("b", 80, 1)]);
    assert!(publication.diff.removed.is_empty());
}

#[test]
fn test_unchanged_candidate_is_suppressed() {
    let previous = EndpointSet::empty("svc");
    let v1 = diff(&previous, vec![ep("a", 80, 1), ep("b", 80, 1)]).unwrap().snapshot;

    assert!(diff(&v1, vec![ep("b", 80, 1), ep("a", 80, 1)]).is_none());
    assert!(diff(&v1, vec![ep("a", 80, 1), ep("a", 80, 1), ep("b", 80, 1)]).is_none());
}

#[test]
fn test_empty_candidate_against_placeholder_is_suppressed() {
    let previous = EndpointSet::empty("svc");

    assert!(diff(&previous, Vec::new()).is_none());
}

#[test]
fn test_weight_change_publishes_as_remove_plus_add() {
    let v1 = diff(&EndpointSet::empty("svc"), vec![ep("a", 80, 1), ep("b", 80, 1)])
        .unwrap()
        .snapshot;

    let publication = diff(&v1, vec![ep("a", 80, 2), ep("b", 80, 1)]).expect("publish");

    assert_eq!(publication.snapshot.version(), 2);
    assert_eq!(publication.diff.added, vec![ep("a", 80, 2)]);
    assert_eq!(publication.diff.removed, vec![ep("a", 80, 1)]);
    assert_eq!(
        publication.diff.reweighted(),
        vec![(&ep("a", 80, 1), &ep("a", 80, 2))]
    );
}

#[test]
fn test_losing_all_members_publishes_empty_set() {
    let v1 = diff(&EndpointSet::empty("svc"), vec![ep("a", 80, 1)]).unwrap().snapshot;

    let publication = diff(&v1, Vec::new()).expect("publish");

    assert!(publication.snapshot.is_empty());
    assert_eq!(publication.snapshot.version(), 2);
    assert_eq!(publication.diff.removed, vec![ep("a", 80, 1)]);
}

#[test]
fn test_resolver_sequence_yields_three_versions() {
    let outputs = vec![
        vec![ep("a", 80, 1), ep("b", 80, 1)],
        vec![ep("a", 80, 1), ep("b", 80, 1)],
        vec![ep("a", 80, 2), ep("b", 80, 1)],
        vec![],
    ];

    let mut current = EndpointSet::empty("svc");
    let mut published = Vec::new();
    for candidate in outputs {
        if let Some(publication) = diff(&current, candidate) {
            current = publication.snapshot;
            published.push(current.version());
        }
    }

    assert_eq!(published, vec![1, 2, 3]);
    assert!(current.is_empty());
}

#[test]
fn test_port_change_is_not_reported_as_reweight() {
    let d = EndpointDiff::between(
        &[ep("a", 80, 1)].into_iter().collect(),
        &[ep("a", 81, 1)].into_iter().collect(),
    );

    assert!(should_publish(&d));
    assert!(d.reweighted().is_empty());
}

#[test]
fn test_same_address_with_two_weights_collapsing_to_one() {
    let v1 = diff(&EndpointSet::empty("svc"), vec![ep("a", 80, 1), ep("a", 80, 2)])
        .unwrap()
        .snapshot;
    assert_eq!(v1.len(), 2);

    let publication = diff(&v1, vec![ep("a", 80, 3)]).expect("publish");

    assert_eq!(publication.diff.added, vec![ep("a", 80, 3)]);
    assert_eq!(publication.diff.removed, vec![ep("a", 80, 1), ep("a", 80, 2)]);
    let reweighted = publication.diff.reweighted();
    assert_eq!(reweighted, vec![(&ep("a", 80, 1), &ep("a", 80, 3))]);
    assert!(reweighted.len() <= publication.diff.added.len());
    assert!(reweighted.len() <= publication.diff.removed.len());
}
