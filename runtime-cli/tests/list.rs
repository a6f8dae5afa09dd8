//! CLI-level coverage of spec.md §8's literal end-to-end scenario 1 and
//! the table/json format surface, exercised via `assert_cmd` the way
//! `examples/uran0sH-boxlite/boxlite-cli` tests its binary.

use assert_cmd::Command;
use predicates::prelude::*;

use runtime::layout::RuntimeRoot;

fn runtime_cmd(root: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("runtime").unwrap();
    cmd.arg("--root").arg(root);
    cmd
}

fn write_raw_state(root: &std::path::Path, id: &str, pid: i32, status: &str, bundle: &str) {
    let layout = RuntimeRoot::new(root).container(id);
    layout.prepare().unwrap();
    let body = serde_json::json!({
        "ociVersion": "1.0.2",
        "id": id,
        "pid": pid,
        "bundlePath": bundle,
        "commsPath": "/var/run/cc-oci-runtime/x",
        "processPath": "/var/run/cc-oci-runtime/x/process.sock",
        "status": status,
        "created": chrono::Utc::now().to_rfc3339(),
        "vm": {
            "hypervisor_path": "/usr/bin/qemu",
            "image_path": "/var/lib/image.img",
            "kernel_path": "/var/lib/vmlinuz",
            "kernel_params": "console=ttyS0",
            "pid": pid,
        },
        "proxy": {
            "ctlSocket": "/run/proxy.sock",
            "ioSocket": "/run/proxy-io.sock",
            "consoleSocket": "/run/proxy-console.sock",
        },
    });
    std::fs::write(layout.state_path(), serde_json::to_vec(&body).unwrap()).unwrap();
}

#[test]
fn list_json_on_empty_root_prints_null() {
    let tmp = tempfile::tempdir().unwrap();
    runtime_cmd(tmp.path())
        .args(["list", "-f", "json"])
        .assert()
        .success()
        .stdout("null\n");
}

#[test]
fn list_table_on_empty_root_prints_only_header() {
    let tmp = tempfile::tempdir().unwrap();
    runtime_cmd(tmp.path())
        .args(["list", "-f", "table"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ID"))
        .stdout(predicate::str::contains("STATUS"));
}

#[test]
fn state_on_unknown_id_fails() {
    let tmp = tempfile::tempdir().unwrap();
    runtime_cmd(tmp.path())
        .args(["state", "does-not-exist"])
        .assert()
        .failure();
}

#[test]
fn delete_on_unknown_id_tolerates_double_delete() {
    let tmp = tempfile::tempdir().unwrap();
    runtime_cmd(tmp.path())
        .args(["delete", "does-not-exist"])
        .assert()
        .success();
}

#[test]
fn list_table_second_line_is_the_data_row() {
    let tmp = tempfile::tempdir().unwrap();
    let pid = std::process::id() as i32;
    write_raw_state(tmp.path(), "vm1", pid, "created", "/tmp/b1");

    let output = runtime_cmd(tmp.path())
        .args(["list", "-f", "table"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).unwrap();
    let second_line = text.lines().nth(1).unwrap();
    let re = predicate::str::is_match(format!(
        r"vm1\s+{pid}\s+created\s+/tmp/b1\s+\S+"
    ))
    .unwrap();
    assert!(re.eval(second_line), "unexpected second line: {second_line:?}");
}

#[test]
fn list_reports_dead_shim_pid_as_stopped() {
    let tmp = tempfile::tempdir().unwrap();
    write_raw_state(tmp.path(), "c1", i32::MAX, "running", "/tmp/b1");

    runtime_cmd(tmp.path())
        .args(["list", "-f", "table"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"c1\s+\d+\s+stopped").unwrap());
}
