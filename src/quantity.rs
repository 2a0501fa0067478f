//! Free quantity under a "buy n take m" rule

/// Number of free units owed for `total` eligible units under a "buy `n`
/// take `m`" rule.
///
/// Whole `n + m` cycles give `m` free units each. A partial cycle whose
/// charged units already exceed the next `n` threshold unlocks part of the
/// next free batch:
///
/// ```text
///        buy 2 take 1           buy 2 take 3
///   units  charged  free    units  charged  free
///       3        2     1        4        2     2
///       5        4     1        5        2     3
///       6        4     2        8        4     4
///      10        7     3       10        4     6
/// ```
///
/// `n` must be at least one; `n = 0` yields no free units.
pub fn compute_free_quantity(total: u32, n: u32, m: u32) -> u32 {
    let Some(cycle) = n.checked_add(m).filter(|cycle| *cycle > 0 && n > 0) else {
        return 0;
    };

    let factor = total / cycle;
    let free = factor.saturating_mul(m);
    let charged = total - free;

    let next = factor.saturating_add(1);
    let x = next.saturating_mul(n);
    let y = x.saturating_add(next.saturating_mul(m));

    if (x..y).contains(&charged) {
        free + (charged - x)
    } else {
        free
    }
}
