//! The checkpoint/restore/update subcommands are explicit stubs (no spec
//! counterpart); this just pins that they fail loudly instead of silently
//! no-op'ing, parametrized the way `examples/uran0sH-boxlite` parametrizes
//! its own CLI tests with `rstest`.

use assert_cmd::Command;
use rstest::rstest;

#[rstest]
#[case(&["checkpoint", "c1"])]
#[case(&["restore", "c1"])]
#[case(&["update", "c1"])]
fn unimplemented_subcommand_fails(#[case] args: &[&str]) {
    let tmp = tempfile::tempdir().unwrap();
    Command::cargo_bin("runtime")
        .unwrap()
        .args(["--root"])
        .arg(tmp.path())
        .args(args)
        .assert()
        .failure();
}
