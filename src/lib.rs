//! Common functionality for the cost-curve frontier engine.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod attribute;
pub mod cli;
pub mod cloud;
pub mod composite;
pub mod cost;
pub mod expression;
pub mod frontier;
pub mod id;
pub mod input;
pub mod interp;
pub mod log;
pub mod material;
pub mod model;
pub mod output;
pub mod package;
pub mod policy;
pub mod settings;
pub mod simulation;
pub mod sizing;
pub mod units;
pub mod vehicle;

#[cfg(test)]
mod fixture;

/// Get the config dir for the program
pub fn get_ccfe_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        // No sensible place for the settings file on this platform
        return PathBuf::from(".");
    };
    config_dir.push("ccfe");

    config_dir
}
