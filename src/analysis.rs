use crate::engine::{Outcome, Sample};
use crate::matrix::{DefenderMove, PayoffMatrices};
use crate::nash::Equilibrium;
use ndarray::Array2;
use serde_json::json;

/// Render the simulated trajectory as CSV, one row per sample.
pub fn history_csv(history: &[Sample]) -> String {
    let mut out = String::from("time,S,I,R\n");
    for sample in history {
        out.push_str(&format!(
            "{},{},{},{}\n",
            sample.t, sample.s, sample.i, sample.r
        ));
    }
    out
}

/// Render one payoff matrix as CSV with strategy-valued row and column
/// labels, in the order of the configured strategy lists.
pub fn matrix_csv(
    matrix: &Array2<f64>,
    attacker_betas: &[f64],
    defender_moves: &[DefenderMove],
) -> String {
    let mut out = String::from("strategy");
    for mv in defender_moves {
        out.push_str(&format!(
            ",gamma={} r={} lambda={}",
            mv.gamma, mv.r, mv.lambda
        ));
    }
    out.push('\n');

    for (row, &beta) in attacker_betas.iter().enumerate() {
        out.push_str(&format!("beta={beta}"));
        for col in 0..defender_moves.len() {
            out.push_str(&format!(",{}", matrix[[row, col]]));
        }
        out.push('\n');
    }
    out
}

/// JSON report of a single completed run.
pub fn outcome_report(outcome: &Outcome) -> serde_json::Value {
    json!({ "outcome": outcome })
}

/// JSON report of the equilibrium analysis: every equilibrium with its
/// supports and expected payoffs, in discovery order.
pub fn equilibria_report(
    matrices: &PayoffMatrices,
    equilibria: &[Equilibrium],
    attacker_betas: &[f64],
    defender_moves: &[DefenderMove],
) -> serde_json::Value {
    let entries: Vec<_> = equilibria
        .iter()
        .map(|eq| {
            let (expected_attacker, expected_defender) =
                matrices.expected(&eq.attacker, &eq.defender);
            json!({
                "attacker_strategy": eq.attacker.to_vec(),
                "defender_strategy": eq.defender.to_vec(),
                "attacker_support": eq.attacker_support(),
                "defender_support": eq.defender_support(),
                "expected_payoff_attacker": expected_attacker,
                "expected_payoff_defender": expected_defender,
            })
        })
        .collect();

    json!({
        "attacker_betas": attacker_betas,
        "defender_moves": defender_moves,
        "equilibria": entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn history_csv_has_one_row_per_sample() {
        let history = vec![
            Sample {
                t: 0.0,
                s: 9985.0,
                i: 15.0,
                r: 0.0,
            },
            Sample {
                t: 1.0,
                s: 9970.0,
                i: 25.0,
                r: 5.0,
            },
        ];
        let csv = history_csv(&history);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "time,S,I,R");
        assert_eq!(lines[1], "0,9985,15,0");
    }

    #[test]
    fn matrix_csv_is_labelled_in_strategy_order() {
        let matrix = array![[1.0, 2.0], [3.0, 4.0]];
        let moves = [
            DefenderMove {
                gamma: 0.0,
                r: 1.0,
                lambda: 0.0,
            },
            DefenderMove {
                gamma: 0.0,
                r: 2.0,
                lambda: 0.0,
            },
        ];
        let csv = matrix_csv(&matrix, &[0.5, 1.0], &moves);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "strategy,gamma=0 r=1 lambda=0,gamma=0 r=2 lambda=0");
        assert_eq!(lines[1], "beta=0.5,1,2");
        assert_eq!(lines[2], "beta=1,3,4");
    }
}
