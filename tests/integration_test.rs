//! End-to-end checks of the contraction engines, the FCI driver, the
//! density analysis and the constrained nuclear solver.

mod common;

// module paths used by the shared fixtures
use neo_fci::{cneo_impl, integrals_impl, species};

use common::{random_integrals, random_vector, symmetric_diatomic};
use ndarray::Array1;
use neo_fci::cistring_impl::{AnnihilationTables, LinkTables};
use neo_fci::fci_impl::{n_minus_2, n_resolution};
use neo_fci::integrals_impl::{prepare_n_minus_2, prepare_n_resolution};
use neo_fci::{
    energy, entropy, make_hdiag, make_rdm1, CneoSolver, Config, ConstraintStrategy, FciSolver, Hamiltonian,
    Resolution, Species, SpeciesSet,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn max_diff(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
}

#[test]
fn test_n_and_n_minus_2_agree() {
    for (seed, species) in [
        (1, SpeciesSet::electrons_and_nuclei(3, (2, 0), &[2])),
        (2, SpeciesSet::electrons_and_nuclei(4, (1, 1), &[3])),
        (3, SpeciesSet::electrons_and_nuclei(3, (2, 1), &[2, 3])),
    ] {
        let mut rng = StdRng::seed_from_u64(seed);
        let ints = random_integrals(&mut rng, &species);
        let c = random_vector(&mut rng, species.size());
        let n = Hamiltonian::new(&ints, &species, Resolution::N).unwrap();
        let n2 = Hamiltonian::new(&ints, &species, Resolution::NMinus2).unwrap();
        let hc = n.contract(&c).unwrap();
        let hc2 = n2.contract(&c).unwrap();
        assert!(max_diff(&hc, &hc2) < 1e-10, "species {:?}", species.dims());
    }
}

#[test]
fn test_contraction_is_hermitian() {
    let species = SpeciesSet::electrons_and_nuclei(3, (2, 1), &[2]);
    let mut rng = StdRng::seed_from_u64(4);
    let ints = random_integrals(&mut rng, &species);
    let u = random_vector(&mut rng, species.size());
    let v = random_vector(&mut rng, species.size());
    for resolution in [Resolution::N, Resolution::NMinus2] {
        let ham = Hamiltonian::new(&ints, &species, resolution).unwrap();
        let uhv = u.dot(&ham.contract(&v).unwrap());
        let vhu = v.dot(&ham.contract(&u).unwrap());
        assert!((uhv - vhu).abs() < 1e-10, "{}", resolution);
    }
}

#[test]
fn test_hdiag_matches_unit_vector_energies() {
    let species = SpeciesSet::electrons_and_nuclei(3, (2, 1), &[2]);
    let mut rng = StdRng::seed_from_u64(5);
    let ints = random_integrals(&mut rng, &species);
    let hdiag = make_hdiag(&ints.h1, Some(&ints.g2), &species).unwrap();
    for addr in 0..species.size() {
        let mut e = Array1::zeros(species.size());
        e[addr] = 1.0;
        let expected = energy(&ints, &e, &species, Resolution::N, 0.0).unwrap();
        assert!((hdiag[addr] - expected).abs() < 1e-10, "address {}", addr);
    }
}

#[test]
fn test_cached_tables_give_identical_results() {
    let species = SpeciesSet::electrons_and_nuclei(3, (1, 2), &[2, 2]);
    let mut rng = StdRng::seed_from_u64(6);
    let ints = random_integrals(&mut rng, &species);
    let c = random_vector(&mut rng, species.size());

    let h2 = prepare_n_resolution(&ints.h1, &ints.g2, &species).unwrap();
    let link = LinkTables::new(&species).unwrap();
    let fresh = n_resolution::contract(&ints.h1, &h2, &c, &species, None).unwrap();
    let cached = n_resolution::contract(&ints.h1, &h2, &c, &species, Some(&link)).unwrap();
    assert_eq!(fresh, cached);
    assert_eq!(cached, n_resolution::contract(&ints.h1, &h2, &c, &species, Some(&link)).unwrap());

    let h2 = prepare_n_minus_2(&ints.g2);
    let tables = AnnihilationTables::new(&species).unwrap();
    let fresh = n_minus_2::contract(&ints.h1, &h2, &c, &species, None).unwrap();
    let cached = n_minus_2::contract(&ints.h1, &h2, &c, &species, Some(&tables)).unwrap();
    assert_eq!(fresh, cached);
}

#[test]
fn test_hydrogen_atom_with_quantum_proton() {
    let species = SpeciesSet::electrons_and_nuclei(2, (1, 1), &[2]);
    let mut rng = StdRng::seed_from_u64(7);
    let ints = random_integrals(&mut rng, &species);
    let ecore = 0.0;
    let hdiag = ints.make_hdiag(&species).unwrap();

    for resolution in [Resolution::N, Resolution::NMinus2] {
        let result = FciSolver::new(resolution, 1)
            .kernel(&ints, &species, ecore, None, None)
            .unwrap();
        assert!(result.converged[0]);
        let e = result.energies[0];
        // the mean-field determinant is the lowest-address basis state
        assert!(e <= hdiag[0] + ecore + 1e-12);
        assert!(e <= hdiag.iter().cloned().fold(f64::INFINITY, f64::min) + ecore + 1e-12);

        let c = &result.vectors[0];
        for (k, sp) in species.iter().enumerate() {
            let dm = make_rdm1(c, k, &species, None).unwrap();
            assert!((dm.diag().sum() - sp.nparticle as f64).abs() < 1e-10);
        }
        let recomputed = energy(&ints, c, &species, resolution, ecore).unwrap();
        assert!((recomputed - e).abs() < 1e-8);
    }
}

#[test]
fn test_entropy_bounds() {
    let species = SpeciesSet::electrons_and_nuclei(2, (1, 1), &[2]);
    let mut rng = StdRng::seed_from_u64(8);
    let ints = random_integrals(&mut rng, &species);
    let result = FciSolver::default().kernel(&ints, &species, 0.0, None, None).unwrap();
    let c = &result.vectors[0];

    let s_nuc = entropy(&[2], c, &species).unwrap();
    let s_elec = entropy(&[0, 1], c, &species).unwrap();
    assert!(s_nuc >= 0.0);
    assert!(s_nuc <= 2.0f64.ln() + 1e-12);
    // pure state: both sides of a bipartition share one spectrum
    assert!((s_nuc - s_elec).abs() < 1e-10);

    let product = SpeciesSet::new(vec![Species::new(2, 1), Species::new(3, 1)]);
    let a = random_vector(&mut rng, 2);
    let b = random_vector(&mut rng, 3);
    let c = Array1::from_iter(a.iter().flat_map(|&x| b.iter().map(move |&y| x * y)));
    assert!(entropy(&[0], &c, &product).unwrap().abs() < 1e-10);
}

#[test]
fn test_symmetric_diatomic_constraint() {
    let mut rng = StdRng::seed_from_u64(9);
    let problem = symmetric_diatomic(&mut rng, 0.45);
    let mut solver = CneoSolver::default();
    solver.fci.davidson.residual_tol = 1e-9;
    let result = solver.kernel(&problem).unwrap();

    assert_eq!(result.strategy, ConstraintStrategy::SymmetricScalar { axis: 2 });
    assert!(result.converged, "{}", result.message);
    assert_eq!(result.forces[0].z, -result.forces[1].z);
    assert!(result.max_displacement < 1e-5);
    assert!(result.energy_difference.abs() < 1e-5);
}

#[test]
fn test_solvers_from_yaml() {
    let config = Config::from_yaml_str(
        r#"
resolution: n-2
davidson:
  nroots: 2
  residual_tol: 1.0e-8
"#,
    )
    .unwrap();
    let species = SpeciesSet::electrons_and_nuclei(2, (1, 1), &[2]);
    let mut rng = StdRng::seed_from_u64(10);
    let ints = random_integrals(&mut rng, &species);

    let solver = FciSolver::from_config(&config).unwrap();
    assert_eq!(solver.resolution, Resolution::NMinus2);
    let result = solver.kernel(&ints, &species, 1.5, None, None).unwrap();
    assert_eq!(result.energies.len(), 2);
    assert!(result.all_converged());
    assert!(result.energies[0] <= result.energies[1]);
    assert!(result.vectors[0].dot(&result.vectors[1]).abs() < 1e-8);

    let reference = FciSolver::new(Resolution::N, 1)
        .kernel(&ints, &species, 1.5, None, None)
        .unwrap();
    assert!((reference.energies[0] - result.energies[0]).abs() < 1e-8);
}
