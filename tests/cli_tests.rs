//! Integration tests for the CLI interface
//!
//! Tests command parsing, exit codes and the rendered output of both
//! subcommands

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const VALID_TASK: &str = r#"
apiVersion: tekton.dev/v1
kind: Task
metadata:
  name: build
spec:
  params:
    - name: image
      default: golang
    - name: flags
      type: array
  workspaces:
    - name: source
  steps:
    - name: compile
      image: $(params.image)
      args: ["build", "$(params.flags[*])"]
      workingDir: $(workspaces.source.path)
      script: echo running $(context.task.name)
"#;

const INVALID_TASK: &str = r#"
kind: Task
metadata:
  name: broken
spec:
  params:
    - name: flags
      type: array
  steps:
    - name: s
      image: alpine
      args: ["--flag=$(params.inexistent)", "not isolated: $(params.flags)"]
"#;

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn taskvars() -> Command {
    Command::cargo_bin("taskvars").unwrap()
}

#[test]
fn test_cli_help_flag() {
    taskvars()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("substitute"));
}

#[test]
fn test_invalid_command() {
    taskvars()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn test_validate_accepts_valid_task() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "task.yaml", VALID_TASK);

    taskvars()
        .arg("validate")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"Task "build" is valid"#));
}

#[test]
fn test_validate_reports_every_error() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "task.yaml", INVALID_TASK);

    taskvars()
        .arg("validate")
        .arg(&file)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("[E3001]"))
        .stderr(predicate::str::contains(
            r#"non-existent variable in "--flag=$(params.inexistent)": spec.steps[0].args[0]"#,
        ))
        .stderr(predicate::str::contains(
            r#"variable is not properly isolated in "not isolated: $(params.flags)": spec.steps[0].args[1]"#,
        ));
}

#[test]
fn test_validate_missing_file() {
    taskvars()
        .arg("validate")
        .arg("/nonexistent/task.yaml")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("[E2001]"));
}

#[test]
fn test_validate_unknown_kind() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "pipeline.yaml", "kind: Pipeline\nmetadata:\n  name: p\n");

    taskvars()
        .arg("validate")
        .arg(&file)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("[E2004]"));
}

#[test]
fn test_validate_api_fields_gate() {
    let dir = TempDir::new().unwrap();
    let file = write(
        &dir,
        "task.yaml",
        r#"
kind: Task
metadata:
  name: ws
spec:
  workspaces:
    - name: source
  steps:
    - name: s
      image: alpine
      workspaces:
        - name: source
"#,
    );

    taskvars().arg("validate").arg(&file).assert().success();
    taskvars()
        .args(["validate", "--api-fields", "stable"])
        .arg(&file)
        .assert()
        .code(4)
        .stderr(predicate::str::contains(
            r#"step workspaces requires "enable-api-fields" feature gate to be "alpha" or "beta" but it is "stable""#,
        ));
}

#[test]
fn test_validate_enum_flag_from_config_file() {
    let dir = TempDir::new().unwrap();
    let task = write(
        &dir,
        "task.yaml",
        r#"
kind: Task
metadata:
  name: enums
spec:
  params:
    - name: mode
      enum: [fast, slow]
      default: fast
  steps:
    - name: s
      image: alpine
      script: echo $(params.mode)
"#,
    );
    let config = write(
        &dir,
        "flags.yaml",
        "apiVersion: v1\nkind: ConfigMap\ndata:\n  enable-param-enum: \"true\"\n",
    );

    taskvars()
        .arg("validate")
        .arg(&task)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("enable-param-enum"));
    taskvars()
        .arg("validate")
        .arg(&task)
        .arg("--config")
        .arg(&config)
        .assert()
        .success();
}

#[test]
fn test_invalid_api_fields_value() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "task.yaml", VALID_TASK);

    taskvars()
        .args(["validate", "--api-fields", "gamma"])
        .arg(&file)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("[E1005]"));
}

#[test]
fn test_substitute_prints_resolved_task() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "task.yaml", VALID_TASK);

    taskvars()
        .arg("substitute")
        .arg(&file)
        .args(["--param", "flags=[-v, -race]"])
        .assert()
        .success()
        .stdout(predicate::str::contains("image: golang"))
        .stdout(predicate::str::contains("- -v\n"))
        .stdout(predicate::str::contains("- -race\n"))
        .stdout(predicate::str::contains("workingDir: /workspace/source"))
        .stdout(predicate::str::contains("echo running build"))
        .stdout(predicate::str::contains("$(").not());
}

#[test]
fn test_substitute_uses_context_file() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "task.yaml", VALID_TASK);
    let context = write(
        &dir,
        "run.yaml",
        "taskName: nightly\nparams:\n  - name: flags\n    value: [-x]\n  - name: image\n    value: rust\n",
    );

    taskvars()
        .arg("substitute")
        .arg(&file)
        .arg("--context")
        .arg(&context)
        .args(["--param", "image=alpine"])
        .assert()
        .success()
        .stdout(predicate::str::contains("image: alpine"))
        .stdout(predicate::str::contains("echo running nightly"));
}

#[test]
fn test_substitute_rejects_missing_param() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "task.yaml", VALID_TASK);

    taskvars()
        .arg("substitute")
        .arg(&file)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("[E3002]"))
        .stderr(predicate::str::contains(
            r#"missing value for parameter "flags": params[flags]"#,
        ));
}

#[test]
fn test_substitute_rejects_malformed_param_flag() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "task.yaml", VALID_TASK);

    taskvars()
        .arg("substitute")
        .arg(&file)
        .args(["--param", "flags"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("expected name=value"));
}

#[test]
fn test_substitute_step_action() {
    let dir = TempDir::new().unwrap();
    let file = write(
        &dir,
        "action.yaml",
        r#"
apiVersion: tekton.dev/v1beta1
kind: StepAction
metadata:
  name: greet
spec:
  image: alpine
  params:
    - name: who
  results:
    - name: out
  script: echo hello $(params.who) > $(step.results.out.path) in $(workspaces.src.path)
"#,
    );

    taskvars()
        .arg("substitute")
        .arg(&file)
        .args(["-p", "who=world"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "hello world > /tekton/steps/step-greet/results/out",
        ))
        .stdout(predicate::str::contains("$(workspaces.src.path)"));
}
