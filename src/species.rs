//! Particle species and the tensor-product string space they span

use crate::cistring_impl::num_strings;
use crate::error::{FciError, Result};
use serde::{Deserialize, Serialize};

/// One distinguishable particle type with its own orbital basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    pub norb: usize,
    pub nparticle: usize,
}

impl Species {
    pub fn new(norb: usize, nparticle: usize) -> Self {
        Species { norb, nparticle }
    }

    /// Number of occupation strings of this species.
    pub fn nstrings(&self) -> usize {
        num_strings(self.norb, self.nparticle)
    }
}

/// Ordered species of a multicomponent system.
///
/// Species 0 and 1 are the spin-up and spin-down electrons, species 2.. are
/// quantum nuclei. The CI vector has one axis per species, axis `k` running
/// over the string addresses of species `k`, flattened row-major with species
/// 0 outermost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesSet {
    species: Vec<Species>,
}

impl SpeciesSet {
    pub fn new(species: Vec<Species>) -> Self {
        SpeciesSet { species }
    }

    /// Two electron spin species sharing `norb_e` orbitals plus one species
    /// per quantum nucleus, each holding a single particle.
    pub fn electrons_and_nuclei(norb_e: usize, nelec: (usize, usize), norb_nuc: &[usize]) -> Self {
        let mut species = vec![Species::new(norb_e, nelec.0), Species::new(norb_e, nelec.1)];
        species.extend(norb_nuc.iter().map(|&n| Species::new(n, 1)));
        SpeciesSet { species }
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Species> {
        self.species.iter()
    }

    pub fn get(&self, k: usize) -> Result<&Species> {
        self.species.get(k).ok_or(FciError::InvalidSpecies {
            index: k,
            nspecies: self.species.len(),
        })
    }

    pub fn norb(&self) -> Vec<usize> {
        self.species.iter().map(|s| s.norb).collect()
    }

    pub fn nparticle(&self) -> Vec<usize> {
        self.species.iter().map(|s| s.nparticle).collect()
    }

    /// Per-species string counts (the CI tensor shape).
    pub fn dims(&self) -> Vec<usize> {
        self.species.iter().map(|s| s.nstrings()).collect()
    }

    /// Total CI dimension.
    pub fn size(&self) -> usize {
        self.dims().iter().product()
    }

    /// Number of quantum nuclei (species beyond the two electron spins).
    pub fn nuclear_count(&self) -> usize {
        self.species.len().saturating_sub(2)
    }

    pub(crate) fn check_vector(&self, len: usize, context: &str) -> Result<()> {
        let size = self.size();
        if len != size {
            return Err(FciError::shape(
                context,
                format!("CI vector of length {} (shape {:?})", size, self.dims()),
                len,
            ));
        }
        Ok(())
    }

    pub(crate) fn check_index(&self, k: usize) -> Result<()> {
        self.get(k).map(|_| ())
    }
}

/// `(outer, len, inner)` of a row-major tensor viewed around `axis`.
pub(crate) fn split_axis(dims: &[usize], axis: usize) -> (usize, usize, usize) {
    let outer = dims[..axis].iter().product();
    let inner = dims[axis + 1..].iter().product();
    (outer, dims[axis], inner)
}

/// `(outer, len_a, middle, len_b, inner)` for two axes `a < b`.
pub(crate) fn split_two_axes(
    dims: &[usize],
    a: usize,
    b: usize,
) -> (usize, usize, usize, usize, usize) {
    debug_assert!(a < b);
    let outer = dims[..a].iter().product();
    let middle = dims[a + 1..b].iter().product();
    let inner = dims[b + 1..].iter().product();
    (outer, dims[a], middle, dims[b], inner)
}

/// Copy of `dims` with `axis` resized.
pub(crate) fn with_axis(dims: &[usize], axis: usize, len: usize) -> Vec<usize> {
    let mut out = dims.to_vec();
    out[axis] = len;
    out
}
