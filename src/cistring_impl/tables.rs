//! Excitation and annihilation tables

use super::strings::{gen_strings, num_strings, parity_above, str2addr, MAX_ORBITALS};
use crate::error::{FciError, Result};
use crate::species::SpeciesSet;
use tracing::debug;

/// One table entry: `op |source> = sign |target>`.
///
/// `op` is a combined operator index: `a*norb + i` for `a_a^† a_i`,
/// `i` for `a_i`, and `i*norb + j` for `a_i a_j`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub source: usize,
    pub op: usize,
    pub target: usize,
    pub sign: f64,
}

/// Operator family of a synthetic one-particle table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    SingleExcitation,
    SingleAnnihilation,
}

/// Operator table of one species.
///
/// `Enumerated` stores explicit rows built from the bit-string service.
/// `SingleParticle` is the degenerate one-particle case, whose string
/// address equals the occupied orbital; it needs no string enumeration and
/// therefore also covers orbital counts beyond the bit-string limit.
#[derive(Debug, Clone)]
pub enum ExcitationTable {
    Enumerated {
        norb: usize,
        nops: usize,
        ntargets: usize,
        rows: Vec<Vec<(usize, usize, f64)>>,
    },
    SingleParticle { norb: usize, kind: TableKind },
}

impl ExcitationTable {
    /// Table of `a_a^† a_i`, diagonal (`a == i`) entries included.
    pub fn single_excitation(norb: usize, nparticle: usize) -> Result<Self> {
        if norb >= MAX_ORBITALS && nparticle == 1 {
            return Ok(ExcitationTable::SingleParticle {
                norb,
                kind: TableKind::SingleExcitation,
            });
        }
        let strings = gen_strings(norb, nparticle)?;
        let rows = strings
            .iter()
            .map(|&s0| {
                let mut row = Vec::with_capacity(nparticle * (norb - nparticle + 1));
                for i in occupied(s0, norb) {
                    for a in 0..norb {
                        if a == i {
                            row.push((a * norb + i, str2addr(norb, nparticle, s0), 1.0));
                        } else if s0 & (1u64 << a) == 0 {
                            let removed = s0 ^ (1u64 << i);
                            let sign = parity_above(i, s0) * parity_above(a, removed);
                            let s1 = removed | (1u64 << a);
                            row.push((a * norb + i, str2addr(norb, nparticle, s1), sign));
                        }
                    }
                }
                row
            })
            .collect();
        Ok(ExcitationTable::Enumerated {
            norb,
            nops: norb * norb,
            ntargets: strings.len(),
            rows,
        })
    }

    /// Table of `a_i`, mapping N-particle strings onto (N-1)-particle strings.
    pub fn single_annihilation(norb: usize, nparticle: usize) -> Result<Self> {
        if nparticle == 0 {
            return Err(FciError::shape(
                "single annihilation table",
                "at least one particle",
                nparticle,
            ));
        }
        if norb >= MAX_ORBITALS {
            if nparticle == 1 {
                return Ok(ExcitationTable::SingleParticle {
                    norb,
                    kind: TableKind::SingleAnnihilation,
                });
            }
            return Err(FciError::NotImplemented(format!(
                "{} orbitals or more and not 1 occupation",
                MAX_ORBITALS
            )));
        }
        let strings = gen_strings(norb, nparticle)?;
        let rows = strings
            .iter()
            .map(|&s0| {
                occupied(s0, norb)
                    .map(|i| {
                        let s1 = s0 ^ (1u64 << i);
                        (i, str2addr(norb, nparticle - 1, s1), parity_above(i, s0))
                    })
                    .collect()
            })
            .collect();
        Ok(ExcitationTable::Enumerated {
            norb,
            nops: norb,
            ntargets: num_strings(norb, nparticle - 1),
            rows,
        })
    }

    /// Table of `a_i a_j` (`a_j` acts first), mapping N onto N-2 particles.
    pub fn double_annihilation(norb: usize, nparticle: usize) -> Result<Self> {
        if nparticle < 2 {
            return Err(FciError::shape(
                "double annihilation table",
                "at least two particles",
                nparticle,
            ));
        }
        let strings = gen_strings(norb, nparticle)?;
        let rows = strings
            .iter()
            .map(|&s0| {
                let mut row = Vec::with_capacity(nparticle * (nparticle - 1));
                for j in occupied(s0, norb) {
                    let s1 = s0 ^ (1u64 << j);
                    let sign_j = parity_above(j, s0);
                    for i in occupied(s1, norb) {
                        let s2 = s1 ^ (1u64 << i);
                        let sign = sign_j * parity_above(i, s1);
                        row.push((i * norb + j, str2addr(norb, nparticle - 2, s2), sign));
                    }
                }
                row
            })
            .collect();
        Ok(ExcitationTable::Enumerated {
            norb,
            nops: norb * norb,
            ntargets: num_strings(norb, nparticle - 2),
            rows,
        })
    }

    pub fn norb(&self) -> usize {
        match self {
            ExcitationTable::Enumerated { norb, .. } => *norb,
            ExcitationTable::SingleParticle { norb, .. } => *norb,
        }
    }

    /// Number of source strings.
    pub fn nstrings(&self) -> usize {
        match self {
            ExcitationTable::Enumerated { rows, .. } => rows.len(),
            ExcitationTable::SingleParticle { norb, .. } => *norb,
        }
    }

    /// Number of strings in the target particle-number sector.
    pub fn ntargets(&self) -> usize {
        match self {
            ExcitationTable::Enumerated { ntargets, .. } => *ntargets,
            ExcitationTable::SingleParticle { norb, kind } => match kind {
                TableKind::SingleExcitation => *norb,
                TableKind::SingleAnnihilation => 1,
            },
        }
    }

    /// Size of the combined operator index.
    pub fn nops(&self) -> usize {
        match self {
            ExcitationTable::Enumerated { nops, .. } => *nops,
            ExcitationTable::SingleParticle { norb, kind } => match kind {
                TableKind::SingleExcitation => norb * norb,
                TableKind::SingleAnnihilation => *norb,
            },
        }
    }

    /// Visit every transition in source-string order.
    pub fn for_each<F: FnMut(Transition)>(&self, mut f: F) {
        match self {
            ExcitationTable::Enumerated { rows, .. } => {
                for (source, row) in rows.iter().enumerate() {
                    for &(op, target, sign) in row {
                        f(Transition {
                            source,
                            op,
                            target,
                            sign,
                        });
                    }
                }
            }
            ExcitationTable::SingleParticle { norb, kind } => {
                let norb = *norb;
                for i in 0..norb {
                    match kind {
                        TableKind::SingleExcitation => {
                            for a in 0..norb {
                                f(Transition {
                                    source: i,
                                    op: a * norb + i,
                                    target: a,
                                    sign: 1.0,
                                });
                            }
                        }
                        TableKind::SingleAnnihilation => f(Transition {
                            source: i,
                            op: i,
                            target: 0,
                            sign: 1.0,
                        }),
                    }
                }
            }
        }
    }

    /// Collected transitions, mostly useful for inspection and tests.
    pub fn transitions(&self) -> Vec<Transition> {
        let mut out = Vec::new();
        self.for_each(|t| out.push(t));
        out
    }
}

fn occupied(string: u64, norb: usize) -> impl Iterator<Item = usize> {
    (0..norb).filter(move |&p| string & (1u64 << p) != 0)
}

/// Single-excitation tables for every species (N-resolution contraction).
#[derive(Debug, Clone)]
pub struct LinkTables {
    pub link: Vec<ExcitationTable>,
}

impl LinkTables {
    pub fn new(species: &SpeciesSet) -> Result<Self> {
        let link = species
            .iter()
            .map(|s| ExcitationTable::single_excitation(s.norb, s.nparticle))
            .collect::<Result<Vec<_>>>()?;
        debug!("Built single-excitation tables for {} species", link.len());
        Ok(LinkTables { link })
    }
}

/// Annihilation tables for every species (N-2-resolution contraction).
///
/// `double[k]` exists only for species with more than one particle,
/// `single[k]` only for species with at least one particle.
#[derive(Debug, Clone)]
pub struct AnnihilationTables {
    pub double: Vec<Option<ExcitationTable>>,
    pub single: Vec<Option<ExcitationTable>>,
}

impl AnnihilationTables {
    pub fn new(species: &SpeciesSet) -> Result<Self> {
        let mut double = Vec::with_capacity(species.len());
        let mut single = Vec::with_capacity(species.len());
        for s in species.iter() {
            double.push(if s.nparticle > 1 {
                Some(ExcitationTable::double_annihilation(s.norb, s.nparticle)?)
            } else {
                None
            });
            single.push(if s.nparticle > 0 {
                Some(ExcitationTable::single_annihilation(s.norb, s.nparticle)?)
            } else {
                None
            });
        }
        debug!("Built annihilation tables for {} species", species.len());
        Ok(AnnihilationTables { double, single })
    }
}
