use assert_cmd::Command;

#[test]
fn cli_help_runs() {
    let mut cmd = Command::cargo_bin("trial-scout").expect("binary exists");
    cmd.arg("--help").assert().success();
}

#[test]
fn search_requires_condition_and_location() {
    let mut cmd = Command::cargo_bin("trial-scout").expect("binary exists");
    cmd.arg("search").assert().failure();
}
