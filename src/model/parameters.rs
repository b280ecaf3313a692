//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::input::{
    deserialise_gap, deserialise_proportion, input_err_msg, is_sorted_and_unique, read_toml,
};
use crate::units::{Co2ePerEnergy, Distance, MassPerArea, MoneyPerMass, Power, UnitType};
use anyhow::{Context, Result, ensure};
use float_cmp::approx_eq;
use indexmap::IndexMap;
use log::warn;
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

macro_rules! define_unit_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            <$type>::new($value)
        }
    };
}

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_scaler, f64, 1.0);
define_param_default!(default_convergence_tolerance, f64, 0.01);
define_param_default!(default_max_sizing_iterations, u32, 50);
define_unit_param_default!(default_max_rated_power, Power, 1000.0);
define_param_default!(default_frontier_affinity_factor, f64, 10.0);
define_param_default!(default_onroad_co2_gap, f64, 0.2);
define_param_default!(default_onroad_kwh_gap, f64, 0.3);
define_param_default!(default_usable_battery_soc, f64, 0.9);
define_unit_param_default!(default_phev_range, Distance, 40.0);
define_param_default!(default_gasoline_co2e_per_gallon, f64, 8887.0);

/// Represents the contents of the entire model file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelParameters {
    /// Model years to simulate
    pub model_years: Vec<u32>,
    /// How an operating point is chosen on each composite frontier
    #[serde(default)]
    pub operating_point: OperatingPoint,
    /// Controls how closely simplified frontiers follow the underlying points.
    ///
    /// Higher values retain more points.
    #[serde(default = "default_frontier_affinity_factor")]
    pub frontier_affinity_factor: f64,
    /// Whether to discard redesign options which increase a vehicle's own-fuel emissions
    #[serde(default)]
    pub no_backsliding: bool,
    /// Relative change below which the sizing iteration is considered converged
    #[serde(default = "default_convergence_tolerance")]
    pub convergence_tolerance: f64,
    /// Maximum number of sizing iterations before giving up
    #[serde(default = "default_max_sizing_iterations")]
    pub max_sizing_iterations: u32,
    /// Upper limit on rated power
    #[serde(default = "default_max_rated_power")]
    pub max_rated_power: Power,
    /// Smallest footprint considered, relative to nominal
    #[serde(default = "default_scaler")]
    pub footprint_min_scaler: f64,
    /// Largest footprint considered, relative to nominal
    #[serde(default = "default_scaler")]
    pub footprint_max_scaler: f64,
    /// Smallest road load at 20 mph considered, relative to nominal
    #[serde(default = "default_scaler")]
    pub rlhp20_min_scaler: f64,
    /// Largest road load at 20 mph considered, relative to nominal
    #[serde(default = "default_scaler")]
    pub rlhp20_max_scaler: f64,
    /// Smallest road load at 60 mph considered, relative to nominal
    #[serde(default = "default_scaler")]
    pub rlhp60_min_scaler: f64,
    /// Largest road load at 60 mph considered, relative to nominal
    #[serde(default = "default_scaler")]
    pub rlhp60_max_scaler: f64,
    /// Drive cycle names and the weights used to combine them
    pub drive_cycle_weights: IndexMap<String, f64>,
    /// Shortfall of on-road fuel economy relative to certification
    #[serde(default = "default_onroad_co2_gap")]
    #[serde(deserialize_with = "deserialise_gap")]
    pub onroad_co2_gap: f64,
    /// Shortfall of on-road energy consumption relative to certification
    #[serde(default = "default_onroad_kwh_gap")]
    #[serde(deserialize_with = "deserialise_gap")]
    pub onroad_kwh_gap: f64,
    /// Fraction of battery capacity available for driving
    #[serde(default = "default_usable_battery_soc")]
    #[serde(deserialize_with = "deserialise_proportion")]
    pub usable_battery_soc: f64,
    /// Charge-depleting range PHEV batteries are sized for
    #[serde(default = "default_phev_range")]
    pub phev_range: Distance,
    /// Change in non-structure glider mass per unit change in footprint
    #[serde(default)]
    pub glider_non_structure_mass_per_area: MassPerArea,
    /// Cost per unit of non-structure glider mass
    #[serde(default)]
    pub glider_non_structure_cost_per_mass: MoneyPerMass,
    /// Emissions from generating one kWh of grid electricity
    #[serde(default)]
    pub upstream_co2e_per_kwh: Co2ePerEnergy,
    /// Retail gasoline price ($/gallon)
    #[serde(default)]
    pub gasoline_price: f64,
    /// Tailpipe CO2e from burning one gallon of gasoline (g)
    #[serde(default = "default_gasoline_co2e_per_gallon")]
    pub gasoline_co2e_per_gallon: f64,
    /// Retail electricity price ($/kWh)
    #[serde(default)]
    pub electricity_price: f64,
    /// Distance over which fuel costs are added to generalized cost
    #[serde(default)]
    pub generalized_cost_distance: Distance,
}

/// How the operating point on a composite frontier is chosen
#[derive(DeserializeLabeledStringEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperatingPoint {
    /// The cheapest point on the frontier
    #[string = "min_cost"]
    MinCost,
    /// The sales-weighted CO2e target, clamped to the frontier's range
    #[default]
    #[string = "target"]
    Target,
}

/// Check that the `model_years` parameter is valid
fn check_model_years(years: &[u32]) -> Result<()> {
    ensure!(!years.is_empty(), "`model_years` is empty");

    ensure!(
        is_sorted_and_unique(years),
        "`model_years` must be composed of unique values in order"
    );

    Ok(())
}

/// Check that a min/max pair of sweep scalers is valid
fn check_scalers(name: &str, min: f64, max: f64) -> Result<()> {
    ensure!(
        min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0,
        "{name} scalers must be finite numbers greater than zero"
    );
    ensure!(
        min <= max,
        "{name}_min_scaler cannot be greater than {name}_max_scaler"
    );
    if min > 1.0 || max < 1.0 {
        warn!("{name} scalers do not include the nominal value");
    }

    Ok(())
}

/// Check that the `convergence_tolerance` parameter is valid
fn check_convergence_tolerance(value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value > 0.0,
        "convergence_tolerance must be a finite number greater than zero"
    );

    Ok(())
}

/// Check that the `max_sizing_iterations` parameter is valid
fn check_max_sizing_iterations(value: u32) -> Result<()> {
    ensure!(value > 0, "max_sizing_iterations cannot be zero");

    Ok(())
}

/// Check that the `max_rated_power` parameter is valid
fn check_max_rated_power(value: Power) -> Result<()> {
    ensure!(
        value.is_finite() && value > Power(0.0),
        "max_rated_power must be a finite number greater than zero"
    );

    Ok(())
}

/// Check that the `frontier_affinity_factor` parameter is valid
fn check_frontier_affinity_factor(value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value >= 0.0,
        "frontier_affinity_factor must be a finite, non-negative number"
    );

    Ok(())
}

/// Check that drive cycle weights are non-negative and sum to one
fn check_drive_cycle_weights(weights: &IndexMap<String, f64>) -> Result<()> {
    ensure!(!weights.is_empty(), "`drive_cycle_weights` is empty");
    for (cycle, weight) in weights {
        ensure!(
            weight.is_finite() && *weight >= 0.0,
            "Weight for drive cycle {cycle} must be a finite, non-negative number"
        );
    }

    let total: f64 = weights.values().sum();
    ensure!(
        approx_eq!(f64, total, 1.0, epsilon = 1e-6),
        "Drive cycle weights must sum to one (sum is {total})"
    );

    Ok(())
}

/// Check that the `usable_battery_soc` parameter is valid
fn check_usable_battery_soc(value: f64) -> Result<()> {
    ensure!(value > 0.0, "usable_battery_soc must be greater than zero");

    Ok(())
}

/// Check that non-negative quantities are valid
fn check_non_negative(name: &str, value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value >= 0.0,
        "{name} must be a finite, non-negative number"
    );

    Ok(())
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file
    pub fn validate(&self) -> Result<()> {
        check_model_years(&self.model_years)?;
        check_scalers(
            "footprint",
            self.footprint_min_scaler,
            self.footprint_max_scaler,
        )?;
        check_scalers("rlhp20", self.rlhp20_min_scaler, self.rlhp20_max_scaler)?;
        check_scalers("rlhp60", self.rlhp60_min_scaler, self.rlhp60_max_scaler)?;
        check_convergence_tolerance(self.convergence_tolerance)?;
        check_max_sizing_iterations(self.max_sizing_iterations)?;
        check_max_rated_power(self.max_rated_power)?;
        check_frontier_affinity_factor(self.frontier_affinity_factor)?;
        check_drive_cycle_weights(&self.drive_cycle_weights)?;

        // onroad gaps and usable_battery_soc already range-checked on deserialisation
        check_usable_battery_soc(self.usable_battery_soc)?;

        for (name, value) in [
            ("phev_range", self.phev_range.value()),
            (
                "glider_non_structure_mass_per_area",
                self.glider_non_structure_mass_per_area.value(),
            ),
            (
                "glider_non_structure_cost_per_mass",
                self.glider_non_structure_cost_per_mass.value(),
            ),
            ("upstream_co2e_per_kwh", self.upstream_co2e_per_kwh.value()),
            ("gasoline_price", self.gasoline_price),
            ("electricity_price", self.electricity_price),
            (
                "generalized_cost_distance",
                self.generalized_cost_distance.value(),
            ),
        ] {
            check_non_negative(name, value)?;
        }
        ensure!(
            self.gasoline_co2e_per_gallon.is_finite() && self.gasoline_co2e_per_gallon > 0.0,
            "gasoline_co2e_per_gallon must be a finite number greater than zero"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::model_parameters;
    use rstest::rstest;
    use std::fmt::Display;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    /// Helper function to assert validation result based on expected validity
    fn assert_validation_result<T, U: Display>(
        result: Result<T>,
        expected_valid: bool,
        value: U,
        expected_error_fragment: &str,
    ) {
        if expected_valid {
            assert!(
                result.is_ok(),
                "Expected value {} to be valid, but got error: {:?}",
                value,
                result.err()
            );
        } else {
            assert!(
                result.is_err(),
                "Expected value {value} to be invalid, but it was accepted",
            );
            let error_message = result.err().unwrap().to_string();
            assert!(
                error_message.contains(expected_error_fragment),
                "Error message should mention the validation constraint, got: {error_message}",
            );
        }
    }

    #[test]
    fn test_check_model_years() {
        // Valid
        assert!(check_model_years(&[2027]).is_ok());
        assert!(check_model_years(&[2027, 2028]).is_ok());

        // Invalid
        assert!(check_model_years(&[]).is_err());
        assert!(check_model_years(&[2027, 2027]).is_err());
        assert!(check_model_years(&[2028, 2027]).is_err());
    }

    #[test]
    fn test_model_params_from_path() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(MODEL_PARAMETERS_FILE_NAME)).unwrap();
            writeln!(
                file,
                "model_years = [2027, 2030]
operating_point = \"min_cost\"

[drive_cycle_weights]
ftp = 0.55
hwfet = 0.45"
            )
            .unwrap();
        }

        let model_params = ModelParameters::from_path(dir.path()).unwrap();
        assert_eq!(model_params.model_years, [2027, 2030]);
        assert_eq!(model_params.operating_point, OperatingPoint::MinCost);
        assert_eq!(
            model_params.drive_cycle_weights.keys().collect::<Vec<_>>(),
            ["ftp", "hwfet"]
        );
        assert_eq!(model_params.max_sizing_iterations, 50);
        assert_eq!(model_params.convergence_tolerance, 0.01);
        assert_eq!(model_params.max_rated_power, Power(1000.0));
        assert_eq!(model_params.frontier_affinity_factor, 10.0);
        assert!(!model_params.no_backsliding);
    }

    #[test]
    fn test_model_params_from_path_invalid_gap() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(MODEL_PARAMETERS_FILE_NAME)).unwrap();
            writeln!(
                file,
                "model_years = [2027]
onroad_co2_gap = 1.0

[drive_cycle_weights]
ftp = 1.0"
            )
            .unwrap();
        }

        assert!(ModelParameters::from_path(dir.path()).is_err());
    }

    #[rstest]
    #[case(0.9, 1.1, true)]
    #[case(1.0, 1.0, true)]
    #[case(1.1, 1.2, true)] // Valid, but with a warning
    #[case(1.1, 0.9, false)]
    #[case(0.0, 1.0, false)]
    #[case(f64::NAN, 1.0, false)]
    fn test_check_scalers(#[case] min: f64, #[case] max: f64, #[case] expected_valid: bool) {
        let result = check_scalers("footprint", min, max);
        assert_validation_result(result, expected_valid, min, "footprint");
    }

    #[rstest]
    #[case(0.01, true)]
    #[case(1e-9, true)]
    #[case(0.0, false)]
    #[case(-0.01, false)]
    #[case(f64::INFINITY, false)]
    #[case(f64::NAN, false)]
    fn test_check_convergence_tolerance(#[case] value: f64, #[case] expected_valid: bool) {
        assert_validation_result(
            check_convergence_tolerance(value),
            expected_valid,
            value,
            "convergence_tolerance must be a finite number greater than zero",
        );
    }

    #[rstest]
    #[case(1, true)]
    #[case(50, true)]
    #[case(0, false)]
    fn test_check_max_sizing_iterations(#[case] value: u32, #[case] expected_valid: bool) {
        assert_validation_result(
            check_max_sizing_iterations(value),
            expected_valid,
            value,
            "max_sizing_iterations cannot be zero",
        );
    }

    #[rstest]
    #[case(1000.0, true)]
    #[case(0.0, false)]
    #[case(f64::INFINITY, false)]
    fn test_check_max_rated_power(#[case] value: f64, #[case] expected_valid: bool) {
        assert_validation_result(
            check_max_rated_power(Power(value)),
            expected_valid,
            value,
            "max_rated_power must be a finite number greater than zero",
        );
    }

    #[rstest]
    #[case(0.0, true)]
    #[case(10.0, true)]
    #[case(-1.0, false)]
    #[case(f64::NAN, false)]
    fn test_check_frontier_affinity_factor(#[case] value: f64, #[case] expected_valid: bool) {
        assert_validation_result(
            check_frontier_affinity_factor(value),
            expected_valid,
            value,
            "frontier_affinity_factor must be a finite, non-negative number",
        );
    }

    #[rstest]
    #[case(&[("ftp", 0.55), ("hwfet", 0.45)], true)]
    #[case(&[("ftp", 1.0)], true)]
    #[case(&[("ftp", 0.5), ("hwfet", 0.4)], false)]
    #[case(&[("ftp", 1.5), ("hwfet", -0.5)], false)]
    #[case(&[], false)]
    fn test_check_drive_cycle_weights(
        #[case] weights: &[(&str, f64)],
        #[case] expected_valid: bool,
    ) {
        let weights: IndexMap<String, f64> = weights
            .iter()
            .map(|(cycle, weight)| ((*cycle).to_string(), *weight))
            .collect();
        assert_eq!(check_drive_cycle_weights(&weights).is_ok(), expected_valid);
    }

    #[rstest]
    fn test_validate(mut model_parameters: ModelParameters) {
        assert!(model_parameters.validate().is_ok());

        model_parameters.gasoline_price = -1.0;
        assert_validation_result(
            model_parameters.validate(),
            false,
            -1.0,
            "gasoline_price must be a finite, non-negative number",
        );
    }
}
