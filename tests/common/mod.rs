//! Shared fixtures for the integration tests
//!
//! The generators are the ones the unit tests use; their `crate::` paths
//! resolve through the module imports at the root of the test crate.

use neo_fci::{IntegralSet, SpeciesSet};
use rand::rngs::StdRng;

#[path = "../../src/test_utils.rs"]
mod fixtures;

pub(crate) use fixtures::{random_vector, symmetric_diatomic};

/// Random integrals with nucleus pairs stored as `g2[l][k]`.
pub(crate) fn random_integrals(rng: &mut StdRng, species: &SpeciesSet) -> IntegralSet {
    fixtures::random_integrals(rng, species, true)
}
