//! Integration tests for tessera-cli.
//!
//! Every invocation passes `--config` pointing into a temporary directory so
//! the user's own configuration never leaks into the results.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Helper to get the path to the `tessera` binary built by cargo.
fn tessera_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tessera"))
}

/// An empty (all-defaults) config file inside `dir`.
fn default_config(dir: &Path) -> PathBuf {
    let path = dir.join("compiler.toml");
    std::fs::write(&path, "").expect("write config");
    path
}

fn run(args: &[&str], config: &Path) -> Output {
    tessera_bin()
        .args(args)
        .arg("--config")
        .arg(config)
        .output()
        .expect("failed to run tessera")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// ---------------------------------------------------------------------------
// `tessera emit`
// ---------------------------------------------------------------------------

#[test]
fn emit_fft_prints_recursive_kernel() {
    let temp = TempDir::new().unwrap();
    let output = run(&["emit", "fft", "--size", "8"], &default_config(temp.path()));
    assert!(output.status.success(), "emit fft failed");

    let source = stdout(&output);
    assert!(source.contains("__kernel void fft_kernel("));
    assert!(source.contains("fft_radix_forward"));
}

#[test]
fn emit_unrolled_fft_has_no_recursive_function() {
    let temp = TempDir::new().unwrap();
    let output = run(
        &["emit", "fft", "--size", "8", "--strategy", "unrolled"],
        &default_config(temp.path()),
    );
    assert!(output.status.success());
    let source = stdout(&output);
    assert!(source.contains("fft_kernel"));
    assert!(!source.contains("fft_radix_forward"));
}

#[test]
fn configured_strategy_is_used_without_override() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("unrolled.toml");
    std::fs::write(&config, "[compile]\nstrategy = \"unrolled\"\n").unwrap();
    let output = run(&["emit", "ifft", "--size", "16"], &config);
    assert!(output.status.success());
    assert!(!stdout(&output).contains("fft_radix_inverse"));
}

#[test]
fn emit_window_and_stft() {
    let temp = TempDir::new().unwrap();
    let config = default_config(temp.path());

    let window = run(&["emit", "window", "--window", "blackman"], &config);
    assert!(window.status.success());
    assert!(stdout(&window).contains("window_blackman_kernel"));

    let stft = run(&["emit", "stft", "--size", "8", "--length", "64"], &config);
    assert!(stft.status.success());
    assert!(stdout(&stft).contains("fft_kernel"));
}

#[test]
fn emit_writes_output_file() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("filter.cl");
    let output = run(
        &["emit", "filter", "--size", "5", "--output", target.to_str().unwrap()],
        &default_config(temp.path()),
    );
    assert!(output.status.success());
    assert!(stdout(&output).is_empty());
    let source = std::fs::read_to_string(&target).unwrap();
    assert!(source.contains("multi_order_filter_kernel"));
}

// ---------------------------------------------------------------------------
// `tessera fft` / `tessera window`
// ---------------------------------------------------------------------------

#[test]
fn fft_of_impulse_is_flat() {
    let temp = TempDir::new().unwrap();
    let output = run(&["fft", "1,0,0,0"], &default_config(temp.path()));
    assert!(output.status.success());

    let text = stdout(&output);
    let rows: Vec<&str> = text.lines().skip(1).collect();
    assert_eq!(rows.len(), 4);
    for row in rows {
        let magnitude: f64 = row.split_whitespace().last().unwrap().parse().unwrap();
        assert!((magnitude - 1.0).abs() < 1e-6, "{row}");
    }
}

#[test]
fn fft_rejects_non_power_of_two() {
    let temp = TempDir::new().unwrap();
    let output = run(&["fft", "1,2,3"], &default_config(temp.path()));
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("power of two"), "{stderr}");
}

#[test]
fn window_prints_every_point() {
    let temp = TempDir::new().unwrap();
    let output = run(&["window", "bartlett", "--size", "5"], &default_config(temp.path()));
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.starts_with("bartlett window, 5 points"));
    assert_eq!(text.lines().count(), 6);
    assert!(text.contains("1.000000"));
}

#[test]
fn unknown_window_is_a_usage_error() {
    let temp = TempDir::new().unwrap();
    let output = run(&["window", "kaiser"], &default_config(temp.path()));
    assert!(!output.status.success());
}

// ---------------------------------------------------------------------------
// `tessera config`
// ---------------------------------------------------------------------------

#[test]
fn config_init_then_show() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sub").join("compiler.toml");

    let init = run(&["config", "init"], &path);
    assert!(init.status.success());
    assert!(path.is_file());

    let show = run(&["config", "show"], &path);
    assert!(show.status.success());
    let text = stdout(&show);
    assert!(text.contains("[parallelism]"));
    assert!(text.contains("min_count = 256"));
    assert!(text.contains("strategy = \"recursive\""));
}

#[test]
fn config_init_refuses_to_overwrite() {
    let temp = TempDir::new().unwrap();
    let path = default_config(temp.path());
    assert!(!run(&["config", "init"], &path).status.success());
    assert!(run(&["config", "init", "--force"], &path).status.success());
}

#[test]
fn missing_explicit_config_fails() {
    let temp = TempDir::new().unwrap();
    let output = run(&["emit", "fft"], &temp.path().join("absent.toml"));
    assert!(!output.status.success());
}
