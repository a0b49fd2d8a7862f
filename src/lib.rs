//! Attacker/defender security games over compartmental epidemic dynamics.
//!
//! The core pipeline: a [`model::Model`] turns a pair of strategy rates
//! into compartment derivatives and per-player costs; an
//! [`engine::Engine`] integrates them over a fixed horizon into
//! time-averaged payoffs; [`matrix::PayoffMatrices`] sweeps a grid of
//! discrete strategies into a bimatrix game; and [`nash::solve_nash`]
//! searches that game for mixed-strategy equilibria by support
//! enumeration.

pub mod analysis;
pub mod config;
pub mod engine;
pub mod manager;
pub mod matrix;
pub mod model;
pub mod nash;
pub mod stats;

pub use engine::{Engine, Outcome, Sample};
pub use matrix::{DefenderMove, PayoffMatrices, Scenario};
pub use model::{CostPolicy, Model, Rates, State, Variant};
pub use nash::{Equilibrium, SolveOptions, solve_nash};
