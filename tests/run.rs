//! Integration tests for the `run` command.
use ccfe::cli::{RunOpts, handle_run_command};
use ccfe::settings::Settings;
use std::path::PathBuf;
use tempfile::tempdir;

/// Get the path to the demo model.
fn get_model_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

/// An integration test for the `run` command.
#[test]
fn test_handle_run_command() {
    unsafe { std::env::set_var("CCFE_LOG_LEVEL", "off") };

    // Save results to non-existent directory to check that directory creation works
    let tempdir = tempdir().unwrap();
    let output_dir = tempdir.path().join("results");
    let opts = RunOpts {
        output_dir: Some(output_dir.clone()),
        ..Default::default()
    };
    handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).unwrap();
    for file_name in [
        "vehicle_frontiers.csv",
        "composite_frontiers.csv",
        "vehicles.csv",
        "metadata.toml",
        "ccfe_info.log",
        "ccfe_error.log",
    ] {
        assert!(output_dir.join(file_name).is_file(), "{file_name} missing");
    }
    assert!(!output_dir.join("debug_clouds.csv").exists());

    // The folder now has results in it, so a second run must be allowed to overwrite them
    assert_eq!(
        handle_run_command(&get_model_dir(), &opts, Some(Settings::default()))
            .unwrap_err()
            .chain()
            .next()
            .unwrap()
            .to_string(),
        format!("Failed to create output directory: {}", output_dir.display())
    );

    let opts = RunOpts {
        overwrite: true,
        debug_model: true,
        ..opts
    };
    handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).unwrap();
    assert!(output_dir.join("debug_clouds.csv").is_file());
}
