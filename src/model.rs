//! The model represents the static input data provided by the user.
use crate::material::StructureMaterialMap;
use crate::package::PackageMap;
use crate::policy::RegClassMap;
use std::path::PathBuf;

pub mod parameters;
pub use parameters::{ModelParameters, OperatingPoint};

/// Model definition
#[derive(Debug)]
pub struct Model {
    /// Path to model folder
    pub model_path: PathBuf,
    /// Parameters from the model TOML file
    pub parameters: ModelParameters,
    /// Technology packages
    pub packages: PackageMap,
    /// Body structure materials
    pub structure_materials: StructureMaterialMap,
    /// Regulatory classes
    pub regulatory_classes: RegClassMap,
}

impl Model {
    /// Iterate over the model's years
    pub fn iter_years(&self) -> impl Iterator<Item = u32> + '_ {
        self.parameters.model_years.iter().copied()
    }

    /// Names of the drive cycles, in the order response surfaces are stored
    pub fn drive_cycles(&self) -> impl Iterator<Item = &str> {
        self.parameters.drive_cycle_weights.keys().map(String::as_str)
    }

    /// Weights of the drive cycles, in the order response surfaces are stored
    pub fn drive_cycle_weights(&self) -> impl Iterator<Item = &f64> {
        self.parameters.drive_cycle_weights.values()
    }
}
