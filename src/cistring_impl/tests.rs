//! Tests for string enumeration and excitation tables

#[cfg(test)]
mod tests {
    use super::super::{
        gen_occslst, gen_strings, num_strings, str2addr, AnnihilationTables, ExcitationTable,
        LinkTables, TableKind,
    };
    use crate::error::FciError;
    use crate::species::{Species, SpeciesSet};
    use std::collections::HashMap;

    #[test]
    fn test_num_strings() {
        assert_eq!(num_strings(4, 2), 6);
        assert_eq!(num_strings(5, 0), 1);
        assert_eq!(num_strings(2, 3), 0);
        assert_eq!(num_strings(10, 5), 252);
    }

    #[test]
    fn test_strings_are_addressed_in_order() {
        let strings = gen_strings(4, 2).unwrap();
        assert_eq!(strings, vec![0b0011, 0b0101, 0b0110, 0b1001, 0b1010, 0b1100]);
        for (addr, &s) in strings.iter().enumerate() {
            assert_eq!(str2addr(4, 2, s), addr);
        }

        let strings = gen_strings(7, 3).unwrap();
        assert_eq!(strings.len(), 35);
        for (addr, &s) in strings.iter().enumerate() {
            assert_eq!(str2addr(7, 3, s), addr);
        }
    }

    #[test]
    fn test_occupation_lists() {
        let occ = gen_occslst(3, 2).unwrap();
        assert_eq!(occ, vec![vec![0, 1], vec![0, 2], vec![1, 2]]);
        assert_eq!(gen_occslst(3, 0).unwrap(), vec![Vec::<usize>::new()]);
    }

    #[test]
    fn test_string_limit() {
        match gen_strings(64, 2) {
            Err(FciError::NotImplemented(_)) => {}
            other => panic!("expected NotImplemented, got {:?}", other),
        }
    }

    #[test]
    fn test_single_excitation_row_lengths() {
        let table = ExcitationTable::single_excitation(4, 2).unwrap();
        assert_eq!(table.nstrings(), 6);
        assert_eq!(table.ntargets(), 6);
        assert_eq!(table.nops(), 16);

        let mut per_source = vec![0usize; 6];
        let mut diagonal = 0;
        table.for_each(|t| {
            per_source[t.source] += 1;
            if t.op / 4 == t.op % 4 {
                assert_eq!(t.source, t.target);
                assert_eq!(t.sign, 1.0);
                diagonal += 1;
            }
        });
        // nparticle * (norb - nparticle + 1)
        assert!(per_source.iter().all(|&n| n == 6));
        assert_eq!(diagonal, 12);
    }

    #[test]
    fn test_single_excitation_adjoint_symmetry() {
        let norb = 5;
        let table = ExcitationTable::single_excitation(norb, 3).unwrap();
        let entries: HashMap<(usize, usize, usize), f64> = table
            .transitions()
            .into_iter()
            .map(|t| ((t.op, t.source, t.target), t.sign))
            .collect();
        for (&(op, source, target), &sign) in &entries {
            let (a, i) = (op / norb, op % norb);
            let mirror = entries.get(&(i * norb + a, target, source));
            assert_eq!(mirror, Some(&sign));
        }
    }

    #[test]
    fn test_double_annihilation_signs() {
        // |01> = a1^† a0^† |vac>, so a0 a1 |01> = +|vac>
        let table = ExcitationTable::double_annihilation(3, 2).unwrap();
        assert_eq!(table.ntargets(), 1);
        let row: Vec<_> = table.transitions().into_iter().filter(|t| t.source == 0).collect();
        assert_eq!(row.len(), 2);
        for t in row {
            match t.op {
                1 => assert_eq!(t.sign, 1.0),
                3 => assert_eq!(t.sign, -1.0),
                op => panic!("unexpected operator {}", op),
            }
            assert_eq!(t.target, 0);
        }
    }

    #[test]
    fn test_double_annihilation_matches_two_single() {
        let norb = 5;
        let first = ExcitationTable::single_annihilation(norb, 3).unwrap();
        let second = ExcitationTable::single_annihilation(norb, 2).unwrap();
        let second_rows: Vec<_> = {
            let mut rows = vec![Vec::new(); second.nstrings()];
            second.for_each(|t| rows[t.source].push(t));
            rows
        };

        let mut composed = HashMap::new();
        first.for_each(|tj| {
            for ti in &second_rows[tj.target] {
                composed.insert((tj.source, ti.op * norb + tj.op), (ti.target, tj.sign * ti.sign));
            }
        });

        let double = ExcitationTable::double_annihilation(norb, 3).unwrap();
        let transitions = double.transitions();
        assert_eq!(transitions.len(), composed.len());
        for t in transitions {
            assert_eq!(composed.get(&(t.source, t.op)), Some(&(t.target, t.sign)));
        }
    }

    #[test]
    fn test_single_particle_tables() {
        let table = ExcitationTable::single_annihilation(70, 1).unwrap();
        assert!(matches!(
            table,
            ExcitationTable::SingleParticle {
                kind: TableKind::SingleAnnihilation,
                ..
            }
        ));
        assert_eq!(table.nstrings(), 70);
        assert_eq!(table.ntargets(), 1);
        let transitions = table.transitions();
        assert_eq!(transitions.len(), 70);
        assert!(transitions.iter().all(|t| t.target == 0 && t.sign == 1.0 && t.op == t.source));

        let link = ExcitationTable::single_excitation(66, 1).unwrap();
        assert_eq!(link.nops(), 66 * 66);
        assert_eq!(link.transitions().len(), 66 * 66);
    }

    #[test]
    fn test_single_particle_fallback_matches_enumeration() {
        let enumerated = ExcitationTable::single_annihilation(6, 1).unwrap();
        for t in enumerated.transitions() {
            assert_eq!(t.op, t.source);
            assert_eq!(t.target, 0);
            assert_eq!(t.sign, 1.0);
        }
    }

    #[test]
    fn test_unsupported_large_annihilation() {
        match ExcitationTable::single_annihilation(64, 2) {
            Err(FciError::NotImplemented(_)) => {}
            other => panic!("expected NotImplemented, got {:?}", other),
        }
        assert!(ExcitationTable::single_annihilation(4, 0).is_err());
        assert!(ExcitationTable::double_annihilation(4, 1).is_err());
    }

    #[test]
    fn test_table_caches() {
        let species = SpeciesSet::new(vec![
            Species::new(3, 2),
            Species::new(3, 1),
            Species::new(4, 1),
            Species::new(2, 0),
        ]);
        let link = LinkTables::new(&species).unwrap();
        assert_eq!(link.link.len(), 4);
        assert_eq!(link.link[0].nstrings(), 3);
        assert_eq!(link.link[3].nstrings(), 1);

        let ann = AnnihilationTables::new(&species).unwrap();
        assert!(ann.double[0].is_some());
        assert!(ann.double[1].is_none());
        assert!(ann.single[2].is_some());
        assert!(ann.single[3].is_none());
    }
}
