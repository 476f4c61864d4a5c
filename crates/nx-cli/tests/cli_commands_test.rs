use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn cargo_bin() -> PathBuf {
    if let Ok(path) = env::var("CARGO_BIN_EXE_nx") {
        return PathBuf::from(path);
    }

    let target_dir = env::var("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| repo_root().join("target"));
    let fallback = target_dir
        .join("debug")
        .join(format!("nx{}", std::env::consts::EXE_SUFFIX));

    if fallback.exists() {
        return fallback;
    }

    panic!(
        "CARGO_BIN_EXE_nx is not set and fallback binary was not found at {}",
        fallback.display()
    );
}

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

fn schema_dir() -> PathBuf {
    repo_root().join("crates/nx-schema/tests/data")
}

fn run(args: &[&str]) -> Output {
    Command::new(cargo_bin())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("nx should execute")
}

fn assert_exit_code(output: &Output, expected: i32) {
    let actual = output.status.code().unwrap_or(-1);
    assert_eq!(
        actual,
        expected,
        "unexpected exit code; stdout: {}; stderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn lossy(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn template_prints_the_application_paths() {
    let output = run(&["template", "XRDMeasurement", "-s", &lossy(&schema_dir())]);

    assert_exit_code(&output, 0);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("# Template for XRDMeasurement"), "{stdout}");
    assert!(stdout.contains("/beam/energy"), "{stdout}");
}

#[test]
fn dialect_commands_round_trip_a_definition() {
    let dir = tempfile::tempdir().expect("temp dir");
    let dialect = dir.path().join("NXbeam.yaml");
    let xml = dir.path().join("NXbeam.nxdl.xml");
    let source = schema_dir().join("base_classes/NXbeam.nxdl.xml");

    let output = run(&["nxdl2dialect", &lossy(&source), "-o", &lossy(&dialect)]);
    assert_exit_code(&output, 0);
    let text = std::fs::read_to_string(&dialect).expect("dialect written");
    assert!(text.contains("NXbeam(NXobject):"), "{text}");

    let output = run(&["dialect2nxdl", &lossy(&dialect), "-o", &lossy(&xml)]);
    assert_exit_code(&output, 0);
    let written = std::fs::read_to_string(&xml).expect("nxdl written");
    assert!(written.contains("<definition"), "{written}");
    assert!(written.contains("name=\"NXbeam\""), "{written}");

    let output = run(&["nxdl2dialect", &lossy(&xml)]);
    assert_exit_code(&output, 0);
    assert_eq!(String::from_utf8_lossy(&output.stdout), text);
}

#[test]
fn dialect2nxdl_reports_the_failing_line() {
    let dir = tempfile::tempdir().expect("temp dir");
    let broken = dir.path().join("broken.yaml");
    std::fs::write(&broken, "category: base\nNXbroken:\n  energy:\n    colour: red\n")
        .expect("write dialect");

    let output = run(&["dialect2nxdl", &lossy(&broken)]);
    assert_exit_code(&output, 1);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("line 4"), "{stderr}");
}

/// Write a one-field input and mapping into `dir`, returning their paths
fn beam_inputs(dir: &Path) -> (PathBuf, PathBuf) {
    let input = dir.join("beam.json");
    std::fs::write(&input, r#"{"energy": 8.0}"#).expect("write input");
    let mapping = dir.join("beam.mapping.yaml");
    std::fs::write(
        &mapping,
        "name: beam\nrules:\n  - type: field\n    source: /energy\n    target: /beam/energy\n    unit: keV\n",
    )
    .expect("write mapping");
    (input, mapping)
}

fn convert_beam(dir: &Path, target: &Path) -> Output {
    let (input, mapping) = beam_inputs(dir);
    run(&[
        "convert",
        "-a",
        "XRDMeasurement",
        "-s",
        &lossy(&schema_dir()),
        "-i",
        &lossy(&input),
        "-m",
        &lossy(&mapping),
        "-o",
        &lossy(target),
    ])
}

#[test]
fn convert_commits_a_container_from_flags() {
    let dir = tempfile::tempdir().expect("temp dir");
    let target = dir.path().join("beam.nxs");

    let output = convert_beam(dir.path(), &target);

    assert_exit_code(&output, 0);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Wrote"));
    assert!(target.exists());
}

#[test]
fn inspect_annotates_a_converted_container() {
    let dir = tempfile::tempdir().expect("temp dir");
    let target = dir.path().join("beam.nxs");
    assert_exit_code(&convert_beam(dir.path(), &target), 0);

    let output = run(&[
        "inspect",
        &lossy(&target),
        "-s",
        &lossy(&schema_dir()),
        "-a",
        "XRDMeasurement",
    ]);

    assert_exit_code(&output, 0);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("# Inspection against XRDMeasurement"), "{stdout}");
    assert!(stdout.contains("/beam/energy (field) -> /beam/energy"), "{stdout}");
    assert!(stdout.contains("/beam/energy/@units (attribute) -> "), "{stdout}");
}

#[test]
fn inspect_without_a_definition_needs_an_application() {
    let dir = tempfile::tempdir().expect("temp dir");
    let target = dir.path().join("beam.nxs");
    assert_exit_code(&convert_beam(dir.path(), &target), 0);

    let output = run(&["inspect", &lossy(&target), "-s", &lossy(&schema_dir())]);

    assert_exit_code(&output, 1);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no entry records a definition"), "{stderr}");
}

#[test]
fn convert_rejection_prints_the_report() {
    let dir = tempfile::tempdir().expect("temp dir");
    let target = dir.path().join("beam.nxs");

    let output = run(&[
        "convert",
        "-a",
        "XRDMeasurement",
        "-s",
        &lossy(&schema_dir()),
        "-o",
        &lossy(&target),
    ]);

    assert_exit_code(&output, 2);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("MissingRequiredField at /beam/energy"), "{stdout}");
    assert!(!target.exists());
}

#[test]
fn convert_requires_a_target() {
    let output = run(&["convert", "-a", "XRDMeasurement"]);
    assert_exit_code(&output, 1);
    assert!(String::from_utf8_lossy(&output.stderr).contains("--output"));
}
