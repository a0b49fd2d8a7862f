use crate::model::{EventTotals, Model, State};
use crate::stats::TimeSeries;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Gains, costs and payoffs at or above this magnitude are treated as
/// numerically unstable.
pub const MAGNITUDE_GUARD: f64 = 1e10;

/// Substitute for an unstable gain or cost.
pub const GUARDED_VALUE: f64 = 0.0;

/// Finite penalty substituted for an unstable payoff.
pub const PAYOFF_PENALTY: f64 = -1e6;

/// One recorded point of the simulated trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub t: f64,
    pub s: f64,
    pub i: f64,
    pub r: f64,
}

/// Final scores of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub gain_attacker: f64,
    pub gain_defender: f64,
    pub cost_attacker: f64,
    pub cost_defender: f64,
    pub payoff_attacker: f64,
    pub payoff_defender: f64,
    pub events: EventTotals,
}

/// Fixed-step explicit Euler simulator.
///
/// Owns the population state and advances it with the model's derivatives
/// until the time horizon is reached, recording the full trajectory. After
/// the run it turns the trajectory into time-averaged gains and, together
/// with the model's cost policy, into per-player payoffs.
pub struct Engine {
    model: Model,
    state: State,
    n: f64,
    dt: f64,
    total_time: f64,
    time: f64,
    history: Vec<Sample>,
    frac_infected: TimeSeries,
    frac_healthy: TimeSeries,
    events: EventTotals,
    outcome: Option<Outcome>,
}

impl Engine {
    /// Create a new `Engine` at time zero.
    ///
    /// # Errors
    /// Fails on a non-positive step size or horizon, a negative compartment,
    /// or a zero-total initial population.
    pub fn new(model: Model, initial_state: State, dt: f64, total_time: f64) -> Result<Self> {
        if !dt.is_finite() || dt <= 0.0 {
            bail!("step size must be positive and finite, but is {dt}");
        }
        if !total_time.is_finite() || total_time <= 0.0 {
            bail!("time horizon must be positive and finite, but is {total_time}");
        }
        for (name, val) in [
            ("s", initial_state.s),
            ("i", initial_state.i),
            ("r", initial_state.r),
        ] {
            if !val.is_finite() || val < 0.0 {
                bail!("initial compartment {name} must be finite and non-negative, but is {val}");
            }
        }
        let n = initial_state.total();
        if n <= 0.0 {
            bail!("initial population must be positive, but is {n}");
        }

        let n_samples = (total_time / dt).ceil() as usize + 1;
        let mut history = Vec::with_capacity(n_samples);
        let mut frac_infected = TimeSeries::with_capacity(n_samples);
        let mut frac_healthy = TimeSeries::with_capacity(n_samples);

        history.push(Sample {
            t: 0.0,
            s: initial_state.s,
            i: initial_state.i,
            r: initial_state.r,
        });
        frac_infected.push(0.0, initial_state.i / n);
        frac_healthy.push(0.0, (initial_state.s + initial_state.r) / n);

        Ok(Self {
            model,
            state: initial_state,
            n,
            dt,
            total_time,
            time: 0.0,
            history,
            frac_infected,
            frac_healthy,
            events: EventTotals::default(),
            outcome: None,
        })
    }

    fn step(&mut self) {
        let deriv = self.model.deriv(&self.state, self.n);
        let rates = self.model.event_rates(&self.state);

        self.state.s += deriv.ds * self.dt;
        self.state.i += deriv.di * self.dt;
        self.state.r += deriv.dr * self.dt;

        // Euler overshoot guard: clamp to [0, N], then rescale so the
        // compartments sum to N again. A zero post-clamp total is the
        // degenerate absorption state and is left alone.
        self.state.s = self.state.s.clamp(0.0, self.n);
        self.state.i = self.state.i.clamp(0.0, self.n);
        self.state.r = self.state.r.clamp(0.0, self.n);
        let total = self.state.total();
        if total > 0.0 {
            let scale = self.n / total;
            self.state.s *= scale;
            self.state.i *= scale;
            self.state.r *= scale;
        }

        // Event counters use the rates at the pre-update state.
        self.events.disinfections += rates.disinfection * self.dt;
        self.events.immunizations += rates.immunization * self.dt;
        self.events.combined += rates.combined * self.dt;

        self.time += self.dt;

        self.history.push(Sample {
            t: self.time,
            s: self.state.s,
            i: self.state.i,
            r: self.state.r,
        });
        self.frac_infected.push(self.time, self.state.i / self.n);
        self.frac_healthy
            .push(self.time, (self.state.s + self.state.r) / self.n);
    }

    /// Run the simulation to the time horizon and score both players.
    ///
    /// The attacker's gain is the time-averaged infected fraction, the
    /// defender's the time-averaged healthy (susceptible plus recovered)
    /// fraction. A completed engine cannot be run again.
    pub fn run(&mut self) -> Result<Outcome> {
        if self.outcome.is_some() {
            bail!("the simulation has already run to completion");
        }

        while self.time < self.total_time {
            self.step();
        }

        let gain_attacker = guard_value(self.frac_infected.time_average(self.total_time));
        let gain_defender = guard_value(self.frac_healthy.time_average(self.total_time));
        let cost_attacker = guard_value(self.model.attacker_cost());
        let cost_defender = guard_value(self.model.defender_cost(&self.events));

        let outcome = Outcome {
            gain_attacker,
            gain_defender,
            cost_attacker,
            cost_defender,
            payoff_attacker: guard_payoff(gain_attacker - cost_attacker),
            payoff_defender: guard_payoff(gain_defender - cost_defender),
            events: self.events,
        };
        self.outcome = Some(outcome);

        Ok(outcome)
    }

    /// Full recorded trajectory, one sample per step including t = 0.
    pub fn history(&self) -> &[Sample] {
        &self.history
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn n(&self) -> f64 {
        self.n
    }
}

fn guard_value(val: f64) -> f64 {
    if val.is_finite() && val.abs() < MAGNITUDE_GUARD {
        val
    } else {
        GUARDED_VALUE
    }
}

fn guard_payoff(val: f64) -> f64 {
    if val.is_finite() && val.abs() < MAGNITUDE_GUARD {
        val
    } else {
        PAYOFF_PENALTY
    }
}
