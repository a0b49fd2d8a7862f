use crate::analysis;
use crate::config::Config;
use crate::engine::Engine;
use crate::matrix::PayoffMatrices;
use crate::nash::{SolveOptions, solve_nash};
use anyhow::{Context, Result};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub struct Manager {
    work_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(work_dir: P) -> Result<Self> {
        let work_dir = work_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(work_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { work_dir, cfg })
    }

    /// Run the baseline scenario once and write its trajectory and outcome.
    pub fn simulate(&self) -> Result<()> {
        let run_dir = self.create_run_dir().context("failed to create run dir")?;

        let model = self
            .cfg
            .baseline_model()
            .context("failed to construct model")?;
        let mut engine = Engine::new(model, self.cfg.init, self.cfg.sim.dt, self.cfg.sim.total_time)
            .context("failed to construct engine")?;
        let outcome = engine.run().context("failed to run simulation")?;
        log::info!(
            "attacker payoff: {:.6}, defender payoff: {:.6}",
            outcome.payoff_attacker,
            outcome.payoff_defender
        );

        write_file(
            &run_dir.join("history.csv"),
            &analysis::history_csv(engine.history()),
        )?;
        let report = serde_json::to_string_pretty(&analysis::outcome_report(&outcome))
            .context("failed to serialize outcome report")?;
        write_file(&run_dir.join("outcome.json"), &report)?;

        Ok(())
    }

    /// Build the payoff matrices over the configured strategy grids, search
    /// them for equilibria, and write all result artifacts.
    pub fn analyze(&self) -> Result<()> {
        let run_dir = self.create_run_dir().context("failed to create run dir")?;

        let scenario = self.cfg.scenario();
        let matrices = PayoffMatrices::build(
            &scenario,
            &self.cfg.game.attacker_betas,
            &self.cfg.game.defender_moves,
        )
        .context("failed to build payoff matrices")?;
        log::info!("built {:?} payoff matrices", matrices.shape());

        write_file(
            &run_dir.join("payoff_attacker.csv"),
            &analysis::matrix_csv(
                &matrices.attacker,
                &self.cfg.game.attacker_betas,
                &self.cfg.game.defender_moves,
            ),
        )?;
        write_file(
            &run_dir.join("payoff_defender.csv"),
            &analysis::matrix_csv(
                &matrices.defender,
                &self.cfg.game.attacker_betas,
                &self.cfg.game.defender_moves,
            ),
        )?;

        let options = SolveOptions {
            max_candidates: self.cfg.game.max_candidates,
        };
        let equilibria = solve_nash(&matrices.attacker, &matrices.defender, &options)
            .context("failed to search for equilibria")?;
        log::info!("found {} equilibria", equilibria.len());

        let report = serde_json::to_string_pretty(&analysis::equilibria_report(
            &matrices,
            &equilibria,
            &self.cfg.game.attacker_betas,
            &self.cfg.game.defender_moves,
        ))
        .context("failed to serialize equilibria report")?;
        write_file(&run_dir.join("equilibria.json"), &report)?;

        Ok(())
    }

    /// Remove every run directory under the working directory.
    pub fn clean(&self) -> Result<()> {
        let pattern = self.work_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        for entry in glob(pattern).context("failed to glob run dirs")? {
            let path = entry.context("failed to read glob entry")?;
            if path.is_dir() {
                fs::remove_dir_all(&path).with_context(|| format!("failed to remove {path:?}"))?;
                log::info!("removed {path:?}");
            }
        }
        Ok(())
    }

    fn count_run_dirs(&self) -> Result<usize> {
        let pattern = self.work_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|path| path.is_dir())
            .count();
        Ok(count)
    }

    fn create_run_dir(&self) -> Result<PathBuf> {
        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;
        let run_dir = self.work_dir.join(format!("run-{run_idx:04}"));
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");
        Ok(run_dir)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {path:?}"))
}
