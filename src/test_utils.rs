//! Random integrals with the physical permutation symmetries

use crate::cneo_impl::{CneoProblem, NuclearSite};
use crate::integrals_impl::IntegralSet;
use crate::species::SpeciesSet;
use nalgebra::Vector3;
use ndarray::{Array1, Array2, Array4};
use rand::rngs::StdRng;
use rand::Rng;

pub(crate) fn random_symmetric(rng: &mut StdRng, n: usize, scale: f64) -> Array2<f64> {
    let a = Array2::from_shape_fn((n, n), |_| rng.gen_range(-scale..scale));
    (&a + &a.t()) * 0.5
}

/// `g[p,q,r,s]` with the 8-fold symmetry of a same-species Coulomb block.
pub(crate) fn random_eri(rng: &mut StdRng, n: usize, scale: f64) -> Array4<f64> {
    let raw = Array4::from_shape_fn((n, n, n, n), |_| rng.gen_range(-scale..scale));
    Array4::from_shape_fn((n, n, n, n), |(p, q, r, s)| {
        (raw[[p, q, r, s]]
            + raw[[q, p, r, s]]
            + raw[[p, q, s, r]]
            + raw[[q, p, s, r]]
            + raw[[r, s, p, q]]
            + raw[[s, r, p, q]]
            + raw[[r, s, q, p]]
            + raw[[s, r, q, p]])
            / 8.0
    })
}

/// Inter-species block, symmetric within each index pair.
pub(crate) fn random_coupling(rng: &mut StdRng, n: usize, m: usize, scale: f64) -> Array4<f64> {
    let raw = Array4::from_shape_fn((n, n, m, m), |_| rng.gen_range(-scale..scale));
    Array4::from_shape_fn((n, n, m, m), |(p, q, r, s)| {
        (raw[[p, q, r, s]] + raw[[q, p, r, s]] + raw[[p, q, s, r]] + raw[[q, p, s, r]]) / 4.0
    })
}

/// Full random integral set: every one-body block, electron blocks, same-species
/// blocks of nuclei with more than one particle and every inter-species pair.
/// With `reverse`, pairs involving a nucleus are stored as `g2[l][k]`.
pub(crate) fn random_integrals(rng: &mut StdRng, species: &SpeciesSet, reverse: bool) -> IntegralSet {
    let norb = species.norb();
    let nparticle = species.nparticle();
    let n = species.len();
    let mut ints = IntegralSet::new(n);
    for k in 0..n {
        ints.set_one_body(k, random_symmetric(rng, norb[k], 1.0));
    }
    ints.set_two_body(0, 0, random_eri(rng, norb[0], 0.5));
    ints.set_two_body(1, 1, random_eri(rng, norb[1], 0.5));
    ints.set_two_body(0, 1, random_eri(rng, norb[0], 0.5));
    for k in 2..n {
        if nparticle[k] > 1 {
            ints.set_two_body(k, k, random_eri(rng, norb[k], 0.5));
        }
    }
    for l in 2..n {
        for k in 0..l {
            if reverse {
                ints.set_two_body(l, k, random_coupling(rng, norb[l], norb[k], 0.5));
            } else {
                ints.set_two_body(k, l, random_coupling(rng, norb[k], norb[l], 0.5));
            }
        }
    }
    ints
}

pub(crate) fn random_vector(rng: &mut StdRng, n: usize) -> Array1<f64> {
    let v = Array1::from_shape_fn(n, |_| rng.gen_range(-1.0f64..1.0));
    let norm = v.dot(&v).sqrt();
    v / norm
}

/// Two identical single-particle nuclei at `(0, 0, ±0.7)` sharing one electron
/// pair. Nucleus A has position operator `z`, nucleus B `-z`, and the
/// Hamiltonian is symmetric under exchanging them.
pub(crate) fn symmetric_diatomic(rng: &mut StdRng, guess: f64) -> CneoProblem {
    let species = SpeciesSet::electrons_and_nuclei(2, (1, 1), &[2, 2]);
    let mut ints = IntegralSet::new(4);
    let he = random_symmetric(rng, 2, 1.0);
    ints.set_one_body(0, he.clone());
    ints.set_one_body(1, he);
    let eri = random_eri(rng, 2, 0.5);
    ints.set_two_body(0, 0, eri.clone());
    ints.set_two_body(1, 1, eri.clone());
    ints.set_two_body(0, 1, eri);

    let hn = Array2::from_diag(&Array1::from(vec![0.0, 1.0]));
    let coupling = random_coupling(rng, 2, 2, 0.002);
    for k in 2..4 {
        ints.set_one_body(k, hn.clone());
        ints.set_two_body(k, 0, coupling.clone());
        ints.set_two_body(k, 1, coupling.clone());
    }
    ints.set_two_body(2, 3, random_eri(rng, 2, 0.002));

    let z = Array2::from_shape_vec((2, 2), vec![0.1, 0.3, 0.3, -0.1]).unwrap();
    let zeros = Array2::zeros((2, 2));
    let position = vec![
        [zeros.clone(), zeros.clone(), z.clone()],
        [zeros.clone(), zeros, -z],
    ];
    let atoms = vec![
        NuclearSite::quantum(1836.15, Vector3::new(0.0, 0.0, 0.7), "pb4d"),
        NuclearSite::quantum(1836.15, Vector3::new(0.0, 0.0, -0.7), "pb4d"),
    ];
    CneoProblem {
        integrals: ints,
        species,
        ecore: 0.7,
        position,
        atoms,
        initial_forces: vec![Vector3::new(0.0, 0.0, guess), Vector3::new(0.0, 0.0, -guess)],
    }
}
