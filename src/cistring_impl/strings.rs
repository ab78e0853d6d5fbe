//! String enumeration and addressing

use crate::error::{FciError, Result};

/// Orbital count limit of the bit-string representation.
pub const MAX_ORBITALS: usize = 64;

/// Number of strings C(norb, nparticle).
pub fn num_strings(norb: usize, nparticle: usize) -> usize {
    if nparticle > norb {
        return 0;
    }
    let k = nparticle.min(norb - nparticle);
    let mut count: u128 = 1;
    for i in 0..k {
        count = count * (norb - i) as u128 / (i + 1) as u128;
    }
    count as usize
}

fn check_addressable(norb: usize, nparticle: usize) -> Result<()> {
    if norb >= MAX_ORBITALS {
        return Err(FciError::NotImplemented(format!(
            "{} orbitals or more with {} particles",
            MAX_ORBITALS, nparticle
        )));
    }
    if nparticle > norb {
        return Err(FciError::shape(
            "string generation",
            format!("nparticle <= {}", norb),
            nparticle,
        ));
    }
    Ok(())
}

/// All occupation strings in ascending order (which is also address order).
pub fn gen_strings(norb: usize, nparticle: usize) -> Result<Vec<u64>> {
    check_addressable(norb, nparticle)?;
    let count = num_strings(norb, nparticle);
    let mut strings = Vec::with_capacity(count);
    if nparticle == 0 {
        strings.push(0);
        return Ok(strings);
    }

    // Gosper's hack: next larger integer with the same popcount
    let mut x: u64 = (1u64 << nparticle) - 1;
    for n in 0..count {
        strings.push(x);
        if n + 1 == count {
            break;
        }
        let c = x & x.wrapping_neg();
        let r = x.wrapping_add(c);
        x = (((r ^ x) >> 2) / c) | r;
    }
    Ok(strings)
}

/// Dense address of a string: Σ_k C(p_k, k+1) over occupied orbitals p_0 < p_1 < ...
pub fn str2addr(norb: usize, nparticle: usize, string: u64) -> usize {
    debug_assert_eq!(string.count_ones() as usize, nparticle);
    debug_assert!(norb >= MAX_ORBITALS || string < (1u64 << norb));
    let mut addr = 0;
    let mut k = 0;
    let mut bits = string;
    while bits != 0 {
        let p = bits.trailing_zeros() as usize;
        k += 1;
        addr += num_strings(p, k);
        bits &= bits - 1;
    }
    addr
}

/// Occupied orbital lists for every string, in address order.
pub fn gen_occslst(norb: usize, nparticle: usize) -> Result<Vec<Vec<usize>>> {
    Ok(gen_strings(norb, nparticle)?
        .into_iter()
        .map(occupied_orbitals)
        .collect())
}

pub(crate) fn occupied_orbitals(string: u64) -> Vec<usize> {
    let mut occ = Vec::with_capacity(string.count_ones() as usize);
    let mut bits = string;
    while bits != 0 {
        occ.push(bits.trailing_zeros() as usize);
        bits &= bits - 1;
    }
    occ
}

/// Sign picked up by creating or annihilating orbital `p` in `string`:
/// one factor of -1 per occupied orbital above `p`.
pub(crate) fn parity_above(p: usize, string: u64) -> f64 {
    let above = if p + 1 >= 64 { 0 } else { string >> (p + 1) };
    if above.count_ones() % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}
