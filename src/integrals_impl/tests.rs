//! Tests for integral containers, preprocessing and MO assembly

#[cfg(test)]
mod tests {
    use super::super::assembly::{transform_one_body, transform_two_body};
    use super::super::{
        absorb_h1e, cross_block, prepare_n_minus_2, CrossBlock, IntegralSet, MeanFieldIntegrals,
        NuclearMeanField,
    };
    use crate::error::FciError;
    use crate::fci_impl::Resolution;
    use crate::species::SpeciesSet;
    use crate::test_utils::{random_coupling, random_eri, random_symmetric};
    use ndarray::{Array2, Array4};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-1.0..1.0))
    }

    #[test]
    fn test_validate_shapes() {
        let species = SpeciesSet::electrons_and_nuclei(2, (1, 1), &[3]);
        let mut ints = IntegralSet::new(3);
        ints.set_one_body(0, Array2::zeros((2, 2)));
        ints.set_one_body(1, Array2::zeros((2, 2)));
        ints.set_one_body(2, Array2::zeros((3, 3)));
        ints.set_two_body(2, 0, Array4::zeros((3, 3, 2, 2)));
        assert!(ints.validate(&species).is_ok());

        ints.set_two_body(0, 2, Array4::zeros((2, 2, 2, 2)));
        assert!(matches!(ints.validate(&species), Err(FciError::ShapeMismatch { .. })));

        let mut ints = IntegralSet::new(3);
        ints.set_one_body(0, Array2::zeros((2, 2)));
        ints.set_one_body(1, Array2::zeros((2, 2)));
        assert!(matches!(
            ints.validate(&species),
            Err(FciError::MissingIntegral { species: 2, .. })
        ));
    }

    #[test]
    fn test_absorb_h1e_without_two_body() {
        let mut rng = StdRng::seed_from_u64(1);
        let n = 3;
        let h = random_symmetric(&mut rng, n, 1.0);
        let zeros = Array4::zeros((n, n, n, n));
        let (aa, ab, bb) = absorb_h1e((&h, &h), (&zeros, &zeros, &zeros), n, 2, 1.0);
        let f = &h / 2.0;
        assert!((aa[[0, 1, 2, 2]] - f[[0, 1]]).abs() < 1e-14);
        assert!((aa[[1, 1, 2, 2]] - (f[[1, 1]] + f[[2, 2]])).abs() < 1e-14);
        assert!((ab[[2, 2, 0, 1]] - f[[0, 1]]).abs() < 1e-14);
        assert!((bb[[0, 2, 1, 1]] - f[[0, 2]]).abs() < 1e-14);
        assert_eq!(aa[[0, 1, 0, 2]], 0.0);
    }

    #[test]
    fn test_absorb_h1e_scales_and_keeps_input() {
        let mut rng = StdRng::seed_from_u64(2);
        let n = 2;
        let h = random_symmetric(&mut rng, n, 1.0);
        let g = random_eri(&mut rng, n, 0.5);
        let before = g.clone();
        let (full, _, _) = absorb_h1e((&h, &h), (&g, &g, &g), n, 2, 1.0);
        let (half, _, _) = absorb_h1e((&h, &h), (&g, &g, &g), n, 2, 0.5);
        assert_eq!(g, before);
        for (a, b) in full.iter().zip(half.iter()) {
            assert!((a * 0.5 - b).abs() < 1e-14);
        }
    }

    #[test]
    fn test_prepare_n_minus_2_halves_same_species_only() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut ints = IntegralSet::new(3);
        let g00 = random_eri(&mut rng, 2, 1.0);
        let g20 = random_coupling(&mut rng, 3, 2, 1.0);
        ints.set_two_body(0, 0, g00.clone());
        ints.set_two_body(2, 0, g20.clone());
        let h2 = prepare_n_minus_2(&ints.g2);
        assert_eq!(h2[0][0].as_ref().unwrap(), &(&g00 * 0.5));
        assert_eq!(h2[2][0].as_ref().unwrap(), &g20);
        assert!(h2[1][1].is_none());
    }

    #[test]
    fn test_cross_block_orientation() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut ints = IntegralSet::new(3);
        let g20 = random_coupling(&mut rng, 3, 2, 1.0);
        ints.set_two_body(2, 0, g20.clone());
        let block = cross_block(&ints.g2, 0, 2).unwrap();
        assert!(matches!(block, CrossBlock::Reverse(_)));
        let view = block.view();
        assert_eq!(view.dim(), (2, 2, 3, 3));
        assert_eq!(view[[0, 1, 2, 1]], g20[[2, 1, 0, 1]]);

        let g02 = random_coupling(&mut rng, 2, 3, 1.0);
        ints.set_two_body(0, 2, g02.clone());
        assert!(matches!(cross_block(&ints.g2, 0, 2), Some(CrossBlock::Forward(_))));
        assert!(cross_block(&ints.g2, 0, 1).is_none());
    }

    #[test]
    fn test_two_body_transformation() {
        let mut rng = StdRng::seed_from_u64(5);
        let (n1, m1, n2, m2) = (3, 2, 2, 3);
        let eri = Array4::from_shape_fn((n1, n1, n2, n2), |_| rng.gen_range(-1.0..1.0));
        let c1 = random_matrix(&mut rng, n1, m1);
        let c2 = random_matrix(&mut rng, n2, m2);
        let mo = transform_two_body(&eri, &c1, &c2).unwrap();
        assert_eq!(mo.dim(), (m1, m1, m2, m2));

        for p in 0..m1 {
            for q in 0..m1 {
                for r in 0..m2 {
                    for s in 0..m2 {
                        let mut v = 0.0;
                        for a in 0..n1 {
                            for b in 0..n1 {
                                for c in 0..n2 {
                                    for d in 0..n2 {
                                        v += c1[[a, p]] * c1[[b, q]] * c2[[c, r]] * c2[[d, s]] * eri[[a, b, c, d]];
                                    }
                                }
                            }
                        }
                        assert!((mo[[p, q, r, s]] - v).abs() < 1e-12);
                    }
                }
            }
        }

        let h = random_symmetric(&mut rng, n1, 1.0);
        let h_mo = transform_one_body(&h, &c1);
        let v: f64 = (0..n1)
            .flat_map(|a| (0..n1).map(move |b| (a, b)))
            .map(|(a, b)| c1[[a, 1]] * h[[a, b]] * c1[[b, 0]])
            .sum();
        assert!((h_mo[[1, 0]] - v).abs() < 1e-12);
    }

    fn mean_field(rng: &mut StdRng) -> MeanFieldIntegrals {
        let ne = 2;
        let nn = 3;
        let nucleus = |rng: &mut StdRng, charge: f64| NuclearMeanField {
            mo_coeff: Array2::eye(nn),
            hcore: random_symmetric(rng, nn, 1.0),
            charge,
            eri_ne: random_coupling(rng, nn, ne, 1.0),
        };
        let nuclei = vec![nucleus(rng, 1.0), nucleus(rng, 2.0)];
        MeanFieldIntegrals {
            mo_coeff_elec: [Array2::eye(ne), Array2::eye(ne)],
            hcore_elec: random_symmetric(rng, ne, 1.0),
            eri_elec: random_eri(rng, ne, 1.0),
            nuclei,
            eri_nn: vec![((0, 1), random_coupling(rng, nn, nn, 1.0))],
        }
    }

    #[test]
    fn test_assemble_full_layout() {
        let mut rng = StdRng::seed_from_u64(6);
        let mf = mean_field(&mut rng);
        let (ints, species) = mf.assemble((1, 1), Resolution::N).unwrap();
        assert_eq!(species.norb(), vec![2, 2, 3, 3]);
        assert_eq!(species.nparticle(), vec![1, 1, 1, 1]);

        assert!(ints.two_body(0, 0).is_some());
        assert!(ints.two_body(1, 1).is_some());
        let g20 = ints.two_body(2, 0).unwrap();
        let g31 = ints.two_body(3, 1).unwrap();
        assert!((g20[[0, 1, 1, 0]] + mf.nuclei[0].eri_ne[[0, 1, 1, 0]]).abs() < 1e-12);
        assert!((g31[[2, 1, 0, 0]] + 2.0 * mf.nuclei[1].eri_ne[[2, 1, 0, 0]]).abs() < 1e-12);
        let g23 = ints.two_body(2, 3).unwrap();
        assert!((g23[[1, 2, 0, 1]] - 2.0 * mf.eri_nn[0].1[[1, 2, 0, 1]]).abs() < 1e-12);
    }

    #[test]
    fn test_assemble_sparse_layout() {
        let mut rng = StdRng::seed_from_u64(7);
        let mf = mean_field(&mut rng);
        let (ints, _) = mf.assemble((1, 0), Resolution::NMinus2).unwrap();
        assert!(ints.one_body(0).is_some());
        assert!(ints.one_body(1).is_none());
        assert!(ints.two_body(0, 0).is_none());
        assert!(ints.two_body(0, 1).is_none());
        assert!(ints.two_body(2, 0).is_some());
        assert!(ints.two_body(2, 1).is_none());

        let (ints, _) = mf.assemble((1, 0), Resolution::N).unwrap();
        assert!(ints.one_body(1).is_some());
        assert!(ints.two_body(2, 1).is_some());
    }

    #[test]
    fn test_assemble_rejects_bad_pair_key() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut mf = mean_field(&mut rng);
        mf.eri_nn[0].0 = (1, 0);
        assert!(matches!(
            mf.assemble((1, 1), Resolution::N),
            Err(FciError::InvalidSpecies { .. })
        ));
    }
}
