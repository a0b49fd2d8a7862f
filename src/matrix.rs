use crate::engine::{Engine, Outcome};
use crate::model::{CostPolicy, Model, Rates, State, Variant};
use anyhow::{Context, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Defender strategy: the defensive rates applied over the full horizon.
///
/// Two-compartment grids leave `gamma` and `lambda` at 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DefenderMove {
    #[serde(default)]
    pub gamma: f64,
    pub r: f64,
    #[serde(default)]
    pub lambda: f64,
}

/// Everything held fixed across the strategy grid.
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub variant: Variant,
    pub costs: CostPolicy,
    pub initial_state: State,
    pub dt: f64,
    pub total_time: f64,
}

/// Attacker and defender payoffs over a grid of discrete strategies.
///
/// Cell (row, col) holds the payoffs of a completed simulation with the
/// attacker's row-th infection rate against the defender's col-th move.
#[derive(Debug, Clone)]
pub struct PayoffMatrices {
    pub attacker: Array2<f64>,
    pub defender: Array2<f64>,
}

impl PayoffMatrices {
    /// Simulate every strategy pair and record both players' payoffs.
    ///
    /// Every cell runs a fresh model and engine; cells share no state, and
    /// the grid is filled in row-major order.
    pub fn build(
        scenario: &Scenario,
        attacker_betas: &[f64],
        defender_moves: &[DefenderMove],
    ) -> Result<Self> {
        let shape = (attacker_betas.len(), defender_moves.len());
        let mut attacker = Array2::zeros(shape);
        let mut defender = Array2::zeros(shape);

        for (row, &beta) in attacker_betas.iter().enumerate() {
            for (col, mv) in defender_moves.iter().enumerate() {
                let outcome = run_cell(scenario, beta, mv)
                    .with_context(|| format!("failed to simulate cell ({row}, {col})"))?;
                attacker[[row, col]] = outcome.payoff_attacker;
                defender[[row, col]] = outcome.payoff_defender;
            }
        }

        Ok(Self { attacker, defender })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.attacker.dim()
    }

    /// Expected payoff of each attacker pure strategy against the defender
    /// mix `q`.
    pub fn attacker_response(&self, q: &Array1<f64>) -> Array1<f64> {
        self.attacker.dot(q)
    }

    /// Expected payoff of each defender pure strategy against the attacker
    /// mix `p`.
    pub fn defender_response(&self, p: &Array1<f64>) -> Array1<f64> {
        p.dot(&self.defender)
    }

    /// Expected payoffs of the profile (p, q), attacker first.
    pub fn expected(&self, p: &Array1<f64>, q: &Array1<f64>) -> (f64, f64) {
        (
            p.dot(&self.attacker.dot(q)),
            p.dot(&self.defender.dot(q)),
        )
    }
}

/// Run one cell of the grid to completion.
pub fn run_cell(scenario: &Scenario, beta: f64, mv: &DefenderMove) -> Result<Outcome> {
    let rates = Rates {
        beta,
        r: mv.r,
        gamma: mv.gamma,
        lambda: mv.lambda,
    };
    let model = Model::new(scenario.variant, rates, scenario.costs)
        .context("failed to construct model")?;
    let mut engine = Engine::new(model, scenario.initial_state, scenario.dt, scenario.total_time)
        .context("failed to construct engine")?;
    engine.run()
}
