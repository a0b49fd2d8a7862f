use crate::matrix::{DefenderMove, Scenario};
use crate::model::{CostPolicy, Model, Rates, State, Variant};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Scenario configuration.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub init: State,
    pub sim: SimConfig,
    pub game: GameConfig,
}

/// Model variant, baseline rates and cost policy.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub variant: Variant,
    #[serde(flatten)]
    pub rates: Rates,
    #[serde(default)]
    pub costs: CostPolicy,
}

/// Integration parameters.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct SimConfig {
    /// Euler step size.
    pub dt: f64,
    /// Time horizon.
    pub total_time: f64,
}

/// Discrete strategy grids for the payoff matrices.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Attacker strategies: one infection rate per row.
    pub attacker_betas: Vec<f64>,
    /// Defender strategies: one set of defensive rates per column.
    pub defender_moves: Vec<DefenderMove>,
    /// Optional cap on the equilibrium search, see
    /// [`crate::nash::SolveOptions`].
    #[serde(default)]
    pub max_candidates: Option<usize>,
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or deserialized, or if
    /// the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        // The model's own constructor checks the baseline rates and costs.
        self.baseline_model().context("invalid model parameters")?;

        for (name, val) in [("s", self.init.s), ("i", self.init.i), ("r", self.init.r)] {
            if !val.is_finite() || val < 0.0 {
                bail!("initial compartment {name} must be finite and non-negative, but is {val}");
            }
        }
        if self.init.total() <= 0.0 {
            bail!("initial population must be positive");
        }

        check_positive(self.sim.dt).context("invalid step size")?;
        check_positive(self.sim.total_time).context("invalid time horizon")?;

        if self.game.attacker_betas.is_empty() {
            bail!("at least one attacker strategy is required");
        }
        if self.game.defender_moves.is_empty() {
            bail!("at least one defender strategy is required");
        }
        for (idx, &beta) in self.game.attacker_betas.iter().enumerate() {
            let rates = Rates {
                beta,
                ..self.model.rates
            };
            Model::new(self.model.variant, rates, self.model.costs)
                .with_context(|| format!("invalid attacker strategy {idx}"))?;
        }
        for (idx, mv) in self.game.defender_moves.iter().enumerate() {
            let rates = Rates {
                beta: self.model.rates.beta,
                r: mv.r,
                gamma: mv.gamma,
                lambda: mv.lambda,
            };
            Model::new(self.model.variant, rates, self.model.costs)
                .with_context(|| format!("invalid defender strategy {idx}"))?;
        }

        Ok(())
    }

    /// The model at the configured baseline rates.
    pub fn baseline_model(&self) -> Result<Model> {
        Model::new(self.model.variant, self.model.rates, self.model.costs)
    }

    /// The fixed per-cell parameters of the strategy grid.
    pub fn scenario(&self) -> Scenario {
        Scenario {
            variant: self.model.variant,
            costs: self.model.costs,
            initial_state: self.init,
            dt: self.sim.dt,
            total_time: self.sim.total_time,
        }
    }
}

fn check_positive(num: f64) -> Result<()> {
    if !num.is_finite() || num <= 0.0 {
        bail!("number must be positive and finite, but is {num}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_toml() -> String {
        String::new()
            + "[model]\n"
            + "variant = \"sir-normalized\"\n"
            + "beta = 1.62\n"
            + "r = 2.0\n"
            + "gamma = 1.0\n"
            + "lambda = 15.0\n"
            + "\n"
            + "[init]\n"
            + "s = 9985.0\n"
            + "i = 15.0\n"
            + "\n"
            + "[sim]\n"
            + "dt = 1.0\n"
            + "total_time = 168.0\n"
            + "\n"
            + "[game]\n"
            + "attacker_betas = [0.5, 1.0, 1.62]\n"
            + "defender_moves = [ { gamma = 1.0, r = 2.0, lambda = 5.0 }, { r = 2.0 } ]\n"
    }

    fn parse(contents: &str) -> Result<Config> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn well_formed_config_parses() {
        let config = parse(&base_toml()).unwrap();
        assert_eq!(config.model.variant, Variant::SirNormalized);
        assert_eq!(config.init.r, 0.0);
        assert_eq!(config.game.attacker_betas.len(), 3);
        assert_eq!(config.game.defender_moves[1].lambda, 0.0);
        assert_eq!(config.model.costs, CostPolicy::default());
        assert_eq!(config.game.max_candidates, None);
    }

    #[test]
    fn event_costs_parse() {
        let contents = base_toml()
            + "\n[model.costs]\n"
            + "policy = \"event\"\n"
            + "attacker_coeff = 1000.0\n"
            + "disinfection = 10.0\n"
            + "immunization = 100.0\n";
        let config = parse(&contents).unwrap();
        assert_eq!(
            config.model.costs,
            CostPolicy::Event {
                attacker_coeff: 1000.0,
                disinfection: 10.0,
                immunization: 100.0,
            }
        );
    }

    #[test]
    fn negative_rate_fails_validation() {
        let contents = base_toml().replace("beta = 1.62", "beta = -0.5");
        assert!(parse(&contents).is_err());
    }

    #[test]
    fn non_positive_step_size_fails_validation() {
        let contents = base_toml().replace("dt = 1.0", "dt = 0.0");
        assert!(parse(&contents).is_err());
    }

    #[test]
    fn zero_population_fails_validation() {
        let contents = base_toml()
            .replace("s = 9985.0", "s = 0.0")
            .replace("i = 15.0", "i = 0.0");
        assert!(parse(&contents).is_err());
    }

    #[test]
    fn empty_strategy_grid_fails_validation() {
        let contents = base_toml().replace("attacker_betas = [0.5, 1.0, 1.62]", "attacker_betas = []");
        assert!(parse(&contents).is_err());
    }

    #[test]
    fn sis_grid_with_defensive_extras_fails_validation() {
        let contents = base_toml()
            .replace("variant = \"sir-normalized\"", "variant = \"sis\"")
            .replace("gamma = 1.0\n", "")
            .replace("lambda = 15.0\n", "");
        // The first defender move still carries gamma and lambda.
        assert!(parse(&contents).is_err());
    }
}
