#![allow(dead_code)]

use super::builders::*;
use proptest::prelude::*;

/// Statuses covering every phase plus unrecognized and administrative ones
pub fn status_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(RECEIVED),
        Just(AWAITING),
        Just(LIBRARY_PREP_DONE),
        Just(LIBRARY_PREP_FAILED),
        Just("In Processing - KAPA Library Preparation"),
        Just(QC_DONE),
        Just("Failed - Quality Control"),
        Just(SEQUENCING_DONE),
        Just(SEQUENCING_FAILED),
        Just(SEQUENCING_PENDING),
        Just(DELIVERED),
        Just("Under-Review"),
        Just("Returned to User"),
        Just("Failed - Mystery Process"),
        Just("Something odd"),
        Just(""),
    ]
    .prop_map(str::to_string)
}

/// Random lineage trees up to a few levels deep
pub fn lineage_strategy() -> impl Strategy<Value = Lineage> {
    let leaf = status_strategy().prop_map(|status| Lineage::leaf(&status));
    leaf.prop_recursive(4, 32, 4, |inner| {
        (status_strategy(), prop::collection::vec(inner, 1..4))
            .prop_map(|(status, children)| Lineage::node(&status, children))
    })
}

/// A request's worth of lineages
pub fn lineages_strategy() -> impl Strategy<Value = Vec<Lineage>> {
    prop::collection::vec(lineage_strategy(), 0..8)
}
