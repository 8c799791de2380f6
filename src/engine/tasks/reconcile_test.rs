use rustc_hash::FxHashSet;

use crate::engine::tasks::reconcile::reconcile;

#[test]
fn launches_new_tasks_in_registration_order() {
    let (launched, to_start) = reconcile(&[5, 3, 4], FxHashSet::default());
    assert_eq!(to_start, vec![5, 3, 4]);
    assert_eq!(launched.len(), 3);
}

#[test]
fn never_relaunches_an_already_launched_identity() {
    let (launched, first) = reconcile(&[1, 2], FxHashSet::default());
    assert_eq!(first, vec![1, 2]);

    // Same snapshot observed again while the tasks are still registered.
    let (launched, second) = reconcile(&[1, 2], launched);
    assert!(second.is_empty());
    assert_eq!(launched.len(), 2);
}

#[test]
fn collects_identities_that_left_the_registry() {
    let (launched, _) = reconcile(&[1, 2], FxHashSet::default());

    let (launched, to_start) = reconcile(&[2, 3], launched);
    assert_eq!(to_start, vec![3]);
    assert!(launched.contains(&2));
    assert!(launched.contains(&3));
    assert!(!launched.contains(&1));
}

#[test]
fn empty_registry_clears_the_launched_set() {
    let (launched, _) = reconcile(&[7], FxHashSet::default());
    let (launched, to_start) = reconcile(&[], launched);
    assert!(to_start.is_empty());
    assert!(launched.is_empty());
}
