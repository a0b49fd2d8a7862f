use anyhow::{Result, bail};
use itertools::Itertools;
use ndarray::{Array1, Array2};

/// Within-support probabilities may dip this far below zero before the
/// candidate is rejected as infeasible.
pub const NEGATIVE_PROB_TOL: f64 = -1e-10;

/// Tolerance of the best-response verification.
pub const BEST_RESPONSE_TOL: f64 = 1e-6;

/// Two equilibria whose probability vectors differ by less than this
/// elementwise are the same equilibrium.
pub const DUPLICATE_TOL: f64 = 1e-8;

/// Pivots below this magnitude make the indifference system singular.
const SINGULAR_TOL: f64 = 1e-12;

/// A mixed-strategy Nash equilibrium of a bimatrix game.
///
/// Both vectors are simplex-valid: non-negative, summing to 1, with zero
/// mass outside the support the solver selected.
#[derive(Debug, Clone, PartialEq)]
pub struct Equilibrium {
    pub attacker: Array1<f64>,
    pub defender: Array1<f64>,
}

impl Equilibrium {
    /// Indices of the attacker strategies played with positive probability.
    pub fn attacker_support(&self) -> Vec<usize> {
        support_of(&self.attacker)
    }

    /// Indices of the defender strategies played with positive probability.
    pub fn defender_support(&self) -> Vec<usize> {
        support_of(&self.defender)
    }

    fn is_close(&self, other: &Self) -> bool {
        vectors_close(&self.attacker, &other.attacker)
            && vectors_close(&self.defender, &other.defender)
    }
}

/// Search limits for the support enumeration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolveOptions {
    /// Abort the search after examining this many support candidates.
    /// `None` enumerates the full candidate space.
    pub max_candidates: Option<usize>,
}

/// Find every mixed-strategy Nash equilibrium of the bimatrix game (A, B)
/// by support enumeration.
///
/// Candidate supports of equal size are enumerated for both players, the
/// indifference equations are solved for each pair, and each solution is
/// verified against the full best-response condition before it is accepted.
/// Equilibria are returned in increasing-support-size, then lexicographic
/// combination order, deduplicated; an empty result is a valid outcome.
///
/// The candidate space grows combinatorially with the matrix dimensions,
/// so callers with large grids should set
/// [`SolveOptions::max_candidates`]; exceeding the cap is a distinct
/// error, never a silent truncation.
pub fn solve_nash(
    a: &Array2<f64>,
    b: &Array2<f64>,
    options: &SolveOptions,
) -> Result<Vec<Equilibrium>> {
    if a.dim() != b.dim() {
        bail!(
            "payoff matrices must share shape, but are {:?} and {:?}",
            a.dim(),
            b.dim()
        );
    }
    let (m, n) = a.dim();
    if m == 0 || n == 0 {
        bail!("payoff matrices must be non-empty");
    }

    let mut equilibria: Vec<Equilibrium> = Vec::new();
    let mut examined = 0_usize;

    for (support_row, support_col) in support_candidates(m, n) {
        examined += 1;
        if let Some(cap) = options.max_candidates {
            if examined > cap {
                bail!(
                    "support enumeration exceeded the budget of {cap} candidates; \
                     reduce the strategy grid"
                );
            }
        }

        let Some(candidate) = examine_support(a, b, &support_row, &support_col) else {
            continue;
        };
        if equilibria.iter().any(|eq| eq.is_close(&candidate)) {
            continue;
        }
        equilibria.push(candidate);
    }

    Ok(equilibria)
}

/// Lazily enumerate candidate support pairs: size k = 1..=min(m, n), row
/// combinations in lexicographic order, column combinations innermost.
fn support_candidates(m: usize, n: usize) -> impl Iterator<Item = (Vec<usize>, Vec<usize>)> {
    (1..=m.min(n))
        .flat_map(move |k| (0..m).combinations(k).cartesian_product((0..n).combinations(k)))
}

/// Solve the indifference equations on one support pair and verify the
/// result. `None` means the candidate is not an equilibrium (infeasible
/// probabilities, a failed best-response check, or a singular system).
fn examine_support(
    a: &Array2<f64>,
    b: &Array2<f64>,
    support_row: &[usize],
    support_col: &[usize],
) -> Option<Equilibrium> {
    let (m, n) = a.dim();

    // The defender is indifferent among the supported columns when the
    // attacker mixes p over the supported rows: Bᵗ|support · p = v·1.
    let p_sub = solve_indifference(&restrict_transposed(b, support_row, support_col))?;
    // The attacker is indifferent among the supported rows when the
    // defender mixes q over the supported columns: A|support · q = u·1.
    let q_sub = solve_indifference(&restrict(a, support_row, support_col))?;

    if p_sub
        .iter()
        .chain(q_sub.iter())
        .any(|&prob| prob < NEGATIVE_PROB_TOL)
    {
        return None;
    }

    let p = expand(&p_sub, support_row, m)?;
    let q = expand(&q_sub, support_col, n)?;

    // Best-response condition over the full strategy sets: neither player
    // may gain by deviating to any pure strategy, inside or outside the
    // chosen support.
    let attacker_payoffs = a.dot(&q);
    let attacker_best = max_entry(&attacker_payoffs);
    let attacker_current = p.dot(&attacker_payoffs);

    let defender_payoffs = p.dot(b);
    let defender_best = max_entry(&defender_payoffs);
    let defender_current = defender_payoffs.dot(&q);

    if (attacker_best - attacker_current).abs() >= BEST_RESPONSE_TOL
        || (defender_best - defender_current).abs() >= BEST_RESPONSE_TOL
    {
        return None;
    }

    Some(Equilibrium {
        attacker: p,
        defender: q,
    })
}

/// Solve for the within-support probabilities that equalize the opponent's
/// payoff across `block`'s rows.
///
/// The system is `block`, bordered with a column of -1 (the unknown
/// equalized value) and a row of ones enforcing that the probabilities sum
/// to 1. `None` means the system is singular.
fn solve_indifference(block: &Array2<f64>) -> Option<Vec<f64>> {
    let k = block.nrows();

    let mut system = Array2::zeros((k + 1, k + 1));
    for row in 0..k {
        for col in 0..k {
            system[[row, col]] = block[[row, col]];
        }
        system[[row, k]] = -1.0;
    }
    for col in 0..k {
        system[[k, col]] = 1.0;
    }

    let mut rhs = Array1::zeros(k + 1);
    rhs[k] = 1.0;

    let sol = solve_dense(system, rhs)?;
    Some(sol.iter().take(k).copied().collect())
}

/// Direct dense solve by Gaussian elimination with partial pivoting.
/// Returns `None` when the system is singular.
fn solve_dense(mut mat: Array2<f64>, mut rhs: Array1<f64>) -> Option<Array1<f64>> {
    let dim = mat.nrows();

    for col in 0..dim {
        let mut pivot_row = col;
        for row in col + 1..dim {
            if mat[[row, col]].abs() > mat[[pivot_row, col]].abs() {
                pivot_row = row;
            }
        }
        if mat[[pivot_row, col]].abs() < SINGULAR_TOL {
            return None;
        }
        if pivot_row != col {
            for idx in col..dim {
                mat.swap([col, idx], [pivot_row, idx]);
            }
            rhs.swap(col, pivot_row);
        }

        for row in col + 1..dim {
            let factor = mat[[row, col]] / mat[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for idx in col..dim {
                let above = mat[[col, idx]];
                mat[[row, idx]] -= factor * above;
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut sol = Array1::zeros(dim);
    for row in (0..dim).rev() {
        let mut acc = rhs[row];
        for idx in row + 1..dim {
            acc -= mat[[row, idx]] * sol[idx];
        }
        sol[row] = acc / mat[[row, row]];
    }
    Some(sol)
}

/// Expand within-support probabilities to the full strategy set: zero
/// outside the support, tiny negatives clipped, renormalized to sum 1.
fn expand(sub: &[f64], support: &[usize], len: usize) -> Option<Array1<f64>> {
    let mut full = Array1::zeros(len);
    for (&idx, &prob) in support.iter().zip(sub) {
        full[idx] = prob.max(0.0);
    }
    let sum = full.sum();
    if sum <= 0.0 {
        return None;
    }
    full /= sum;
    Some(full)
}

fn restrict(mat: &Array2<f64>, rows: &[usize], cols: &[usize]) -> Array2<f64> {
    Array2::from_shape_fn((rows.len(), cols.len()), |(i, j)| mat[[rows[i], cols[j]]])
}

fn restrict_transposed(mat: &Array2<f64>, rows: &[usize], cols: &[usize]) -> Array2<f64> {
    Array2::from_shape_fn((cols.len(), rows.len()), |(i, j)| mat[[rows[j], cols[i]]])
}

fn max_entry(vec: &Array1<f64>) -> f64 {
    vec.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn support_of(vec: &Array1<f64>) -> Vec<usize> {
    vec.iter()
        .enumerate()
        .filter(|&(_, &prob)| prob > 0.0)
        .map(|(idx, _)| idx)
        .collect()
}

fn vectors_close(a: &Array1<f64>, b: &Array1<f64>) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| (x - y).abs() < DUPLICATE_TOL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn dense_solve_recovers_a_known_solution() {
        // x + 2y = 5, 3x - y = 1  =>  x = 1, y = 2
        let mat = array![[1.0, 2.0], [3.0, -1.0]];
        let rhs = array![5.0, 1.0];
        let sol = solve_dense(mat, rhs).unwrap();
        assert_abs_diff_eq!(sol[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sol[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn dense_solve_rejects_singular_systems() {
        let mat = array![[1.0, 2.0], [2.0, 4.0]];
        let rhs = array![1.0, 2.0];
        assert!(solve_dense(mat, rhs).is_none());
    }

    #[test]
    fn dense_solve_pivots_past_a_leading_zero() {
        let mat = array![[0.0, 1.0], [1.0, 0.0]];
        let rhs = array![3.0, 7.0];
        let sol = solve_dense(mat, rhs).unwrap();
        assert_abs_diff_eq!(sol[0], 7.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sol[1], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn candidates_grow_by_support_size() {
        let candidates: Vec<_> = support_candidates(2, 2).collect();
        assert_eq!(
            candidates,
            vec![
                (vec![0], vec![0]),
                (vec![0], vec![1]),
                (vec![1], vec![0]),
                (vec![1], vec![1]),
                (vec![0, 1], vec![0, 1]),
            ]
        );
    }

    #[test]
    fn expand_clips_noise_and_renormalizes() {
        let full = expand(&[0.5, -1e-12, 0.5], &[0, 2, 3], 4).unwrap();
        assert_abs_diff_eq!(full.sum(), 1.0, epsilon = 1e-12);
        assert_eq!(full[1], 0.0);
        assert_eq!(full[2], 0.0);
        assert!(full[0] > 0.0 && full[3] > 0.0);
    }
}
