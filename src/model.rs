use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Default cost coefficient per unit of defensive rate.
pub const DEFAULT_K0: f64 = 0.01;
/// Default cost coefficient per unit of infection rate.
pub const DEFAULT_K1: f64 = 0.01;

/// Equation set driven by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Two compartments (S, I): infection and disinfection only.
    Sis,
    /// Three compartments (S, I, R) with the infection term scaled by I/N.
    SirNormalized,
    /// Three compartments (S, I, R) with the raw S·I infection term.
    SirUnnormalized,
}

/// Transition rates of the model.
///
/// A rate of exactly 0 disables that transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    /// Infection rate (attacker-controlled).
    pub beta: f64,

    /// Disinfection rate, I -> S.
    pub r: f64,

    /// Immunization rate, S -> R.
    #[serde(default)]
    pub gamma: f64,

    /// Combined disinfection-and-immunization rate, I -> R.
    #[serde(default)]
    pub lambda: f64,
}

/// Cost accounting policy.
///
/// The source material charges defender effort in two different ways, so
/// the choice is explicit instead of baked into the model equations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum CostPolicy {
    /// Costs linear in the configured rates: the attacker pays `k1 * beta`,
    /// the defender pays `k0 * (gamma + r + lambda)`.
    Rate { k0: f64, k1: f64 },

    /// The defender pays per accumulated event: disinfections at
    /// `disinfection`, immunizations at `immunization`, combined events at
    /// the sum of both. The attacker still pays `attacker_coeff * beta`.
    Event {
        attacker_coeff: f64,
        disinfection: f64,
        immunization: f64,
    },
}

impl Default for CostPolicy {
    fn default() -> Self {
        Self::Rate {
            k0: DEFAULT_K0,
            k1: DEFAULT_K1,
        }
    }
}

/// Compartment sizes at one instant.
///
/// Two-compartment runs carry `r = 0` throughout, so `s + i + r` is the
/// conserved total population for every variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub s: f64,
    pub i: f64,
    #[serde(default)]
    pub r: f64,
}

impl State {
    pub fn total(&self) -> f64 {
        self.s + self.i + self.r
    }
}

/// Instantaneous rate of change of each compartment.
#[derive(Debug, Clone, Copy)]
pub struct Deriv {
    pub ds: f64,
    pub di: f64,
    pub dr: f64,
}

/// Instantaneous defensive event rates.
#[derive(Debug, Clone, Copy)]
pub struct EventRates {
    /// Disinfection-only events, `r * I`.
    pub disinfection: f64,
    /// Immunization-only events, `gamma * S`.
    pub immunization: f64,
    /// Disinfection-and-immunization events, `lambda * I`.
    pub combined: f64,
}

/// Defensive events accumulated over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EventTotals {
    pub disinfections: f64,
    pub immunizations: f64,
    pub combined: f64,
}

/// Compartmental epidemic model.
///
/// Holds the rate parameters and cost policy, and evaluates the chosen
/// variant's derivatives as a pure function of the supplied state. Carries
/// no simulation state of its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Model {
    variant: Variant,
    rates: Rates,
    costs: CostPolicy,
}

impl Model {
    pub fn new(variant: Variant, rates: Rates, costs: CostPolicy) -> Result<Self> {
        check_rate(rates.beta).context("invalid infection rate beta")?;
        check_rate(rates.r).context("invalid disinfection rate r")?;
        check_rate(rates.gamma).context("invalid immunization rate gamma")?;
        check_rate(rates.lambda).context("invalid combined rate lambda")?;

        if variant == Variant::Sis && (rates.gamma != 0.0 || rates.lambda != 0.0) {
            bail!("the two-compartment model has no gamma or lambda transition");
        }

        match costs {
            CostPolicy::Rate { k0, k1 } => {
                check_rate(k0).context("invalid cost coefficient k0")?;
                check_rate(k1).context("invalid cost coefficient k1")?;
            }
            CostPolicy::Event {
                attacker_coeff,
                disinfection,
                immunization,
            } => {
                check_rate(attacker_coeff).context("invalid attacker cost coefficient")?;
                check_rate(disinfection).context("invalid disinfection cost")?;
                check_rate(immunization).context("invalid immunization cost")?;
            }
        }

        Ok(Self {
            variant,
            rates,
            costs,
        })
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn rates(&self) -> &Rates {
        &self.rates
    }

    /// Evaluate the derivatives at the given state for total population `n`.
    ///
    /// Every variant's derivatives sum to zero, so the dynamics themselves
    /// conserve the population.
    pub fn deriv(&self, state: &State, n: f64) -> Deriv {
        let State { s, i, .. } = *state;
        let Rates {
            beta,
            r,
            gamma,
            lambda,
        } = self.rates;

        match self.variant {
            Variant::Sis => {
                let infection = beta * (i / n) * s;
                Deriv {
                    ds: -infection + r * i,
                    di: infection - r * i,
                    dr: 0.0,
                }
            }
            Variant::SirNormalized => {
                let infection = beta * (i / n) * s;
                Deriv {
                    ds: r * i - infection - gamma * s,
                    di: infection - lambda * i - r * i,
                    dr: lambda * i + gamma * s,
                }
            }
            Variant::SirUnnormalized => {
                let infection = beta * s * i;
                Deriv {
                    ds: r * i - infection - gamma * s,
                    di: infection - lambda * i - r * i,
                    dr: gamma * s + lambda * i,
                }
            }
        }
    }

    pub fn event_rates(&self, state: &State) -> EventRates {
        EventRates {
            disinfection: self.rates.r * state.i,
            immunization: self.rates.gamma * state.s,
            combined: self.rates.lambda * state.i,
        }
    }

    pub fn attacker_cost(&self) -> f64 {
        match self.costs {
            CostPolicy::Rate { k1, .. } => k1 * self.rates.beta,
            CostPolicy::Event { attacker_coeff, .. } => attacker_coeff * self.rates.beta,
        }
    }

    pub fn defender_cost(&self, events: &EventTotals) -> f64 {
        match self.costs {
            CostPolicy::Rate { k0, .. } => {
                k0 * (self.rates.gamma + self.rates.r + self.rates.lambda)
            }
            CostPolicy::Event {
                disinfection,
                immunization,
                ..
            } => {
                events.disinfections * disinfection
                    + events.immunizations * immunization
                    + events.combined * (disinfection + immunization)
            }
        }
    }
}

fn check_rate(rate: f64) -> Result<()> {
    if !rate.is_finite() || rate < 0.0 {
        bail!("rate must be finite and non-negative, but is {rate}");
    }
    Ok(())
}
