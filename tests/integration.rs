use std::{env, fs, path::PathBuf, process::Command};

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "[model]\n"
        + "variant = \"sir-normalized\"\n"
        + "beta = 1.62\n"
        + "r = 2.0\n"
        + "gamma = 1.0\n"
        + "lambda = 15.0\n"
        + "\n"
        + "[model.costs]\n"
        + "policy = \"event\"\n"
        + "attacker_coeff = 1000.0\n"
        + "disinfection = 10.0\n"
        + "immunization = 100.0\n"
        + "\n"
        + "[init]\n"
        + "s = 9985.0\n"
        + "i = 15.0\n"
        + "r = 0.0\n"
        + "\n"
        + "[sim]\n"
        + "dt = 1.0\n"
        + "total_time = 168.0\n"
        + "\n"
        + "[game]\n"
        + "attacker_betas = [0.5, 1.0, 1.62]\n"
        + "defender_moves = [\n"
        + "  { gamma = 1.0, r = 2.0, lambda = 5.0 },\n"
        + "  { gamma = 1.0, r = 2.0, lambda = 15.0 },\n"
        + "]\n";

    fs::write(&config_path, config_contents).expect("failed to write config file");

    fn run_bin(args: &[&str]) {
        let bin = PathBuf::from(env!("CARGO_BIN_EXE_epigame"));

        let output = Command::new(bin)
            .args(args)
            .output()
            .expect("failed to execute command");

        let stdout_str =
            std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
        let stderr_str =
            std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

        assert!(
            output.status.success(),
            "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
        );
    }

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--work-dir", test_dir_str, "simulate"]);

    let history = fs::read_to_string(test_dir.join("run-0000").join("history.csv"))
        .expect("failed to read history.csv");
    // Header plus the initial sample plus one row per step.
    assert_eq!(history.lines().count(), 170);
    assert!(history.starts_with("time,S,I,R\n"));
    assert!(test_dir.join("run-0000").join("outcome.json").is_file());

    run_bin(&["--work-dir", test_dir_str, "analyze"]);

    let run_dir = test_dir.join("run-0001");
    let attacker_csv = fs::read_to_string(run_dir.join("payoff_attacker.csv"))
        .expect("failed to read payoff_attacker.csv");
    assert_eq!(attacker_csv.lines().count(), 4);
    assert!(run_dir.join("payoff_defender.csv").is_file());

    let equilibria = fs::read_to_string(run_dir.join("equilibria.json"))
        .expect("failed to read equilibria.json");
    let report: serde_json::Value =
        serde_json::from_str(&equilibria).expect("failed to parse equilibria.json");
    assert!(report["equilibria"].is_array());

    run_bin(&["--work-dir", test_dir_str, "clean"]);
    assert!(!test_dir.join("run-0000").exists());
    assert!(!test_dir.join("run-0001").exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn invalid_config_is_rejected() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("invalid_config");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_contents = String::new()
        + "[model]\n"
        + "variant = \"sis\"\n"
        + "beta = -1.0\n"
        + "r = 2.0\n"
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
        + "attacker_betas = [0.5]\n"
        + "defender_moves = [ { r = 2.0 } ]\n";

    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");

    let bin = PathBuf::from(env!("CARGO_BIN_EXE_epigame"));
    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");
    let output = Command::new(bin)
        .args(["--work-dir", test_dir_str, "simulate"])
        .output()
        .expect("failed to execute command");

    assert!(!output.status.success());

    fs::remove_dir_all(&test_dir).ok();
}
