//! Table-driven scatter and gather along one axis of the CI tensor
//!
//! Every routine takes `dims`, the shape of the tensor whose axis `axis` runs
//! over the source strings of `table`. The other side of the table lives on
//! the same shape with that axis resized to `table.ntargets()`.

use crate::cistring_impl::ExcitationTable;
use crate::error::{FciError, Result};
use crate::species::split_axis;
use ndarray::{s, Array2, ArrayView1, ArrayView2, ArrayView3, ArrayViewMut1, Axis};

fn check_table(table: &ExcitationTable, dims: &[usize], axis: usize) -> Result<(usize, usize, usize)> {
    let (outer, m, inner) = split_axis(dims, axis);
    if table.nstrings() != m {
        return Err(FciError::shape(
            format!("excitation table on axis {}", axis),
            m,
            table.nstrings(),
        ));
    }
    Ok((outer, m, inner))
}

fn rows_3d<'a>(g: &'a ArrayView2<'_, f64>, shape: (usize, usize, usize)) -> Result<Vec<ArrayView3<'a, f64>>> {
    g.outer_iter()
        .map(|row| row.into_shape(shape).map_err(FciError::from))
        .collect()
}

/// Apply every operator of `table` to `c`.
///
/// Row `op` of the result is `op · c`: for every transition,
/// `t[op][.., target, ..] += sign · c[.., source, ..]`.
pub(crate) fn apply(
    table: &ExcitationTable,
    c: ArrayView1<'_, f64>,
    dims: &[usize],
    axis: usize,
) -> Result<Array2<f64>> {
    let (outer, m, inner) = check_table(table, dims, axis)?;
    let nt = table.ntargets();
    let nops = table.nops();
    let c3 = c.into_shape((outer, m, inner))?;

    let mut t = Array2::zeros((nops, outer * nt * inner));
    {
        let mut t4 = t.view_mut().into_shape((nops, outer, nt, inner))?;
        table.for_each(|tr| {
            t4.slice_mut(s![tr.op, .., tr.target, ..])
                .scaled_add(tr.sign, &c3.index_axis(Axis(1), tr.source));
        });
    }
    Ok(t)
}

/// Sum `Σ_op op · g[op]` in the table direction.
///
/// `g` rows live on `dims`; `out` lives on the target side.
pub(crate) fn collect(
    table: &ExcitationTable,
    g: ArrayView2<'_, f64>,
    dims: &[usize],
    axis: usize,
    out: ArrayViewMut1<'_, f64>,
) -> Result<()> {
    let (outer, m, inner) = check_table(table, dims, axis)?;
    let nt = table.ntargets();
    if g.nrows() != table.nops() {
        return Err(FciError::shape("operator intermediate", table.nops(), g.nrows()));
    }
    let rows = rows_3d(&g, (outer, m, inner))?;
    let mut o3 = out.into_shape((outer, nt, inner))?;
    table.for_each(|tr| {
        o3.slice_mut(s![.., tr.target, ..])
            .scaled_add(tr.sign, &rows[tr.op].index_axis(Axis(1), tr.source));
    });
    Ok(())
}

/// Sum `Σ_op op^† · g[op]`, moving back from the target side.
///
/// `g` rows live on the target side; `out` lives on `dims`.
pub(crate) fn collect_adjoint(
    table: &ExcitationTable,
    g: ArrayView2<'_, f64>,
    dims: &[usize],
    axis: usize,
    out: ArrayViewMut1<'_, f64>,
) -> Result<()> {
    let (outer, m, inner) = check_table(table, dims, axis)?;
    let nt = table.ntargets();
    if g.nrows() != table.nops() {
        return Err(FciError::shape("operator intermediate", table.nops(), g.nrows()));
    }
    let rows = rows_3d(&g, (outer, nt, inner))?;
    let mut o3 = out.into_shape((outer, m, inner))?;
    table.for_each(|tr| {
        o3.slice_mut(s![.., tr.source, ..])
            .scaled_add(tr.sign, &rows[tr.op].index_axis(Axis(1), tr.target));
    });
    Ok(())
}
