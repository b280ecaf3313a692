//! Converges a vehicle design to a self-consistent rated power, powertrain mass and battery size.
//!
//! Rated power depends on curb weight, curb weight depends on the powertrain and battery, and the
//! battery of a plug-in vehicle depends on energy consumption, which depends on weight. These are
//! resolved by fixed-point iteration, updating each quantity in turn from the latest values of the
//! others.
use crate::expression::SurfaceInputs;
use crate::material::StructureMaterial;
use crate::model::ModelParameters;
use crate::package::{CycleResult, PackageID, PowertrainType, TechnologyPackage, combine_cycles};
use crate::policy::{RegulatoryClass, onroad_kwh};
use crate::units::{Area, Dimensionless, Distance, Energy, Mass, MassPerPower, Power, UnitType};
use anyhow::Result;
use log::trace;
use std::error::Error;
use std::fmt;

/// Everything which determines the outcome of sizing a vehicle
#[derive(Debug, Clone, Copy)]
pub struct SizingInputs<'a> {
    /// The technology package fitted
    pub package: &'a TechnologyPackage,
    /// The body structure material
    pub material: &'a StructureMaterial,
    /// The vehicle's regulatory class (which determines test weight)
    pub reg_class: &'a RegulatoryClass,
    /// Vehicle footprint
    pub footprint: Area,
    /// Road-load horsepower at 20 mph
    pub rlhp20: Power,
    /// Road-load horsepower at 60 mph
    pub rlhp60: Power,
    /// Footprint at which the base glider mass was measured
    pub base_footprint: Area,
    /// Non-structure glider mass at the base footprint
    pub base_glider_non_structure_mass: Mass,
    /// Target curb weight per unit of rated power
    pub curb_weight_per_power: MassPerPower,
    /// Target range (only used for BEVs)
    pub bev_range: Distance,
}

/// Starting values for the iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingSeed {
    /// Rated power
    pub rated_power: Power,
    /// Battery capacity (plug-in powertrains only)
    pub battery: Energy,
    /// Powertrain mass
    pub powertrain_mass: Mass,
}

impl Default for SizingSeed {
    fn default() -> Self {
        Self {
            rated_power: Power(1.0),
            battery: Energy(1.0),
            powertrain_mass: Mass(1.0),
        }
    }
}

/// The converged design of a vehicle
#[derive(Debug, Clone, PartialEq)]
pub struct SizedVehicle {
    /// Rated power
    pub rated_power: Power,
    /// Battery capacity
    pub battery: Energy,
    /// Electric machine power
    pub e_machine_power: Power,
    /// Body structure mass
    pub structure_mass: Mass,
    /// Battery mass
    pub battery_mass: Mass,
    /// Powertrain mass (excluding battery)
    pub powertrain_mass: Mass,
    /// Non-structure glider mass, including the footprint adjustment
    pub glider_non_structure_mass: Mass,
    /// Footprint adjustment to the non-structure glider mass
    pub delta_glider_non_structure_mass: Mass,
    /// Curb weight
    pub curb_weight: Mass,
    /// Equivalent test weight
    pub etw: Mass,
    /// Per-drive-cycle results
    pub cycles: Vec<CycleResult>,
    /// Cycle-weighted results
    pub combined: CycleResult,
    /// Number of iterations taken
    pub iterations: u32,
}

impl SizedVehicle {
    /// Use this design as the starting point for another iteration
    pub fn as_seed(&self) -> SizingSeed {
        SizingSeed {
            rated_power: self.rated_power,
            battery: self.battery,
            powertrain_mass: self.powertrain_mass,
        }
    }
}

/// Sizing did not reach a fixed point
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceError {
    /// The package being sized
    pub package_id: PackageID,
    /// Iterations completed before giving up
    pub iterations: u32,
    /// Last relative change in rated power
    pub rated_power_change: f64,
    /// Last relative change in powertrain mass
    pub powertrain_mass_change: f64,
    /// Last relative change in battery capacity
    pub battery_change: f64,
}

impl fmt::Display for ConvergenceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Sizing for package {} did not converge after {} iterations (relative changes: \
            rated power {:.4}, powertrain mass {:.4}, battery {:.4})",
            self.package_id,
            self.iterations,
            self.rated_power_change,
            self.powertrain_mass_change,
            self.battery_change
        )
    }
}

impl Error for ConvergenceError {}

/// Relative change from `old` to `new`
fn relative_change<T: UnitType>(old: T, new: T) -> f64 {
    let diff = (new.value() - old.value()).abs();
    if diff == 0.0 {
        0.0
    } else {
        diff / old.value().abs()
    }
}

/// The battery a powertrain carries, given its energy consumption
fn battery_for_range(
    inputs: &SizingInputs,
    parameters: &ModelParameters,
    combined: &CycleResult,
    current: Energy,
) -> Energy {
    let range = match inputs.package.powertrain_type {
        PowertrainType::Bev => inputs.bev_range,
        PowertrainType::Phev => parameters.phev_range,
        PowertrainType::Hev | PowertrainType::Ice => return current,
    };

    onroad_kwh(parameters, combined.kwh) * range / Dimensionless(parameters.usable_battery_soc)
}

/// Converge a vehicle design from the default seed.
///
/// # Arguments
///
/// * `inputs` - The package, material and sweep values being sized
/// * `parameters` - Model parameters
///
/// # Returns
///
/// The converged design, or a [`ConvergenceError`] if no fixed point was found.
pub fn converge(inputs: &SizingInputs, parameters: &ModelParameters) -> Result<SizedVehicle> {
    converge_from(inputs, parameters, SizingSeed::default())
}

/// Converge a vehicle design from the given seed
pub fn converge_from(
    inputs: &SizingInputs,
    parameters: &ModelParameters,
    seed: SizingSeed,
) -> Result<SizedVehicle> {
    let package = inputs.package;
    let powertrain_type = package.powertrain_type;

    let mut rated_power = seed.rated_power;
    let mut powertrain_mass = seed.powertrain_mass;
    let mut battery = match powertrain_type {
        PowertrainType::Ice => Energy(0.0),
        PowertrainType::Hev => package.nominal_battery,
        PowertrainType::Phev | PowertrainType::Bev => seed.battery,
    };

    // Independent of the iteration
    let structure_mass = inputs.material.structure_mass(inputs.footprint);
    let delta_glider_non_structure_mass =
        parameters.glider_non_structure_mass_per_area * (inputs.footprint - inputs.base_footprint);
    let glider_non_structure_mass =
        inputs.base_glider_non_structure_mass + delta_glider_non_structure_mass;

    let mut changes = (f64::NAN, f64::NAN, f64::NAN);
    let mut iterations = 0;
    for iteration in 1..=parameters.max_sizing_iterations {
        iterations = iteration;
        let battery_mass = package.mass.battery_per_energy * battery;
        let new_powertrain_mass =
            package.mass.powertrain_fixed + package.mass.powertrain_per_power * rated_power;
        let curb_weight =
            glider_non_structure_mass + new_powertrain_mass + structure_mass + battery_mass;
        let etw = inputs.reg_class.equivalent_test_weight(curb_weight);
        let new_rated_power =
            (curb_weight / inputs.curb_weight_per_power).min(parameters.max_rated_power);

        let surface_inputs =
            SurfaceInputs::new(etw.0, inputs.rlhp20.0, inputs.rlhp60.0, new_rated_power.0);
        let cycles = package.evaluate_cycles(&surface_inputs);
        let combined = combine_cycles(&cycles, parameters.drive_cycle_weights.values());
        let new_battery = battery_for_range(inputs, parameters, &combined, battery);

        changes = (
            relative_change(rated_power, new_rated_power),
            relative_change(powertrain_mass, new_powertrain_mass),
            relative_change(battery, new_battery),
        );
        trace!(
            "Sizing {} iteration {iteration}: curb weight {curb_weight}, rated power \
            {new_rated_power}, battery {new_battery}",
            package.id
        );

        rated_power = new_rated_power;
        powertrain_mass = new_powertrain_mass;
        battery = new_battery;

        let finite = curb_weight.is_finite()
            && rated_power.is_finite()
            && battery.is_finite()
            && combined.co2.is_finite()
            && combined.kwh.is_finite();
        if !finite {
            break;
        }

        let tolerance = parameters.convergence_tolerance;
        let converged = changes.0 <= tolerance
            && changes.1 <= tolerance
            && (!powertrain_type.is_plugin() || changes.2 <= tolerance);
        if converged {
            // Report masses and drive-cycle results for the converged power and battery
            let battery_mass = package.mass.battery_per_energy * battery;
            let powertrain_mass =
                package.mass.powertrain_fixed + package.mass.powertrain_per_power * rated_power;
            let curb_weight =
                glider_non_structure_mass + powertrain_mass + structure_mass + battery_mass;
            let etw = inputs.reg_class.equivalent_test_weight(curb_weight);
            let surface_inputs =
                SurfaceInputs::new(etw.0, inputs.rlhp20.0, inputs.rlhp60.0, rated_power.0);
            let cycles = package.evaluate_cycles(&surface_inputs);
            let combined = combine_cycles(&cycles, parameters.drive_cycle_weights.values());

            let e_machine_power = match powertrain_type {
                PowertrainType::Ice => Power(0.0),
                PowertrainType::Hev | PowertrainType::Phev => package.nominal_motor_power,
                PowertrainType::Bev => rated_power,
            };

            return Ok(SizedVehicle {
                rated_power,
                battery,
                e_machine_power,
                structure_mass,
                battery_mass,
                powertrain_mass,
                glider_non_structure_mass,
                delta_glider_non_structure_mass,
                curb_weight,
                etw,
                cycles,
                combined,
                iterations: iteration,
            });
        }
    }

    Err(ConvergenceError {
        package_id: package.id.clone(),
        iterations,
        rated_power_change: changes.0,
        powertrain_mass_change: changes.1,
        battery_change: changes.2,
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expression;
    use crate::fixture::{bev_package, ice_package, model_parameters, reg_class, steel};
    use crate::package::TechnologyPackage;
    use crate::units::{EnergyPerDistance, MassPerEnergy};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn inputs<'a>(
        package: &'a TechnologyPackage,
        material: &'a StructureMaterial,
        reg_class: &'a RegulatoryClass,
    ) -> SizingInputs<'a> {
        SizingInputs {
            package,
            material,
            reg_class,
            footprint: Area(46.0),
            rlhp20: Power(10.0),
            rlhp60: Power(18.0),
            base_footprint: Area(46.0),
            base_glider_non_structure_mass: Mass(1800.0),
            curb_weight_per_power: MassPerPower(20.0),
            bev_range: Distance(250.0),
        }
    }

    #[rstest]
    fn test_converge_ice(
        model_parameters: ModelParameters,
        ice_package: TechnologyPackage,
        steel: StructureMaterial,
        reg_class: RegulatoryClass,
    ) {
        let sized = converge(&inputs(&ice_package, &steel, &reg_class), &model_parameters).unwrap();

        // Fixed point of curb = 1800 + 828 + 300 + 1.5 * curb / 20
        assert_approx_eq!(Mass, sized.curb_weight, Mass(3165.4), epsilon = 2.0);
        let tolerance = model_parameters.convergence_tolerance;
        let expected_power = sized.curb_weight / MassPerPower(20.0);
        assert!(relative_change(sized.rated_power, expected_power) <= tolerance);
        assert_eq!(sized.structure_mass, Mass(828.0));
        assert_eq!(sized.battery, Energy(0.0));
        assert_eq!(sized.e_machine_power, Power(0.0));
        assert_eq!(sized.etw, sized.curb_weight + Mass(300.0));
        assert!(sized.iterations < model_parameters.max_sizing_iterations);
        assert!(sized.combined.co2 > crate::units::Co2ePerDistance(0.0));
    }

    #[rstest]
    fn test_converge_max_rated_power(
        mut model_parameters: ModelParameters,
        ice_package: TechnologyPackage,
        steel: StructureMaterial,
        reg_class: RegulatoryClass,
    ) {
        model_parameters.max_rated_power = Power(100.0);
        let sized = converge(&inputs(&ice_package, &steel, &reg_class), &model_parameters).unwrap();
        assert_eq!(sized.rated_power, Power(100.0));
    }

    #[rstest]
    fn test_converge_footprint_change(
        mut model_parameters: ModelParameters,
        ice_package: TechnologyPackage,
        steel: StructureMaterial,
        reg_class: RegulatoryClass,
    ) {
        model_parameters.glider_non_structure_mass_per_area = crate::units::MassPerArea(10.0);
        let mut inputs = inputs(&ice_package, &steel, &reg_class);
        inputs.footprint = Area(48.0);
        let sized = converge(&inputs, &model_parameters).unwrap();
        assert_eq!(sized.delta_glider_non_structure_mass, Mass(20.0));
        assert_eq!(sized.glider_non_structure_mass, Mass(1820.0));
        assert_eq!(sized.structure_mass, Mass(864.0));
    }

    #[rstest]
    fn test_converge_bev(
        model_parameters: ModelParameters,
        bev_package: TechnologyPackage,
        steel: StructureMaterial,
        reg_class: RegulatoryClass,
    ) {
        let sized = converge(&inputs(&bev_package, &steel, &reg_class), &model_parameters).unwrap();
        let expected_battery = onroad_kwh(&model_parameters, sized.combined.kwh) * Distance(250.0)
            / Dimensionless(model_parameters.usable_battery_soc);
        let tolerance = model_parameters.convergence_tolerance;
        assert!(relative_change(sized.battery, expected_battery) <= tolerance);
        assert!(sized.battery > Energy(50.0));
        assert_eq!(sized.e_machine_power, sized.rated_power);
    }

    #[rstest]
    fn test_converge_mass_breakdown(
        model_parameters: ModelParameters,
        bev_package: TechnologyPackage,
        steel: StructureMaterial,
        reg_class: RegulatoryClass,
    ) {
        let sized = converge(&inputs(&bev_package, &steel, &reg_class), &model_parameters).unwrap();

        assert_approx_eq!(
            Mass,
            sized.battery_mass,
            bev_package.mass.battery_per_energy * sized.battery
        );
        assert_approx_eq!(
            Mass,
            sized.powertrain_mass,
            bev_package.mass.powertrain_fixed
                + bev_package.mass.powertrain_per_power * sized.rated_power
        );
        assert_approx_eq!(
            Mass,
            sized.curb_weight,
            sized.glider_non_structure_mass
                + sized.powertrain_mass
                + sized.structure_mass
                + sized.battery_mass
        );
        assert_eq!(sized.etw, reg_class.equivalent_test_weight(sized.curb_weight));
    }

    #[rstest]
    fn test_converge_hev_uses_nominal_battery(
        model_parameters: ModelParameters,
        mut ice_package: TechnologyPackage,
        steel: StructureMaterial,
        reg_class: RegulatoryClass,
    ) {
        ice_package.powertrain_type = PowertrainType::Hev;
        ice_package.nominal_battery = Energy(1.5);
        ice_package.mass.battery_per_energy = MassPerEnergy(20.0);
        let sized = converge(&inputs(&ice_package, &steel, &reg_class), &model_parameters).unwrap();
        assert_eq!(sized.battery, Energy(1.5));
        assert_eq!(sized.battery_mass, Mass(30.0));
        assert_eq!(sized.e_machine_power, ice_package.nominal_motor_power);
    }

    #[rstest]
    fn test_converge_idempotent(
        model_parameters: ModelParameters,
        bev_package: TechnologyPackage,
        steel: StructureMaterial,
        reg_class: RegulatoryClass,
    ) {
        let inputs = inputs(&bev_package, &steel, &reg_class);
        let sized = converge(&inputs, &model_parameters).unwrap();
        let resized = converge_from(&inputs, &model_parameters, sized.as_seed()).unwrap();

        let tolerance = model_parameters.convergence_tolerance;
        assert!(relative_change(sized.rated_power, resized.rated_power) <= tolerance);
        assert!(relative_change(sized.powertrain_mass, resized.powertrain_mass) <= tolerance);
        assert!(relative_change(sized.battery, resized.battery) <= tolerance);
        assert!(relative_change(sized.curb_weight, resized.curb_weight) <= tolerance);

        // Sizing is a pure function of its inputs
        assert_eq!(converge(&inputs, &model_parameters).unwrap(), sized);
    }

    #[rstest]
    fn test_converge_too_few_iterations(
        mut model_parameters: ModelParameters,
        ice_package: TechnologyPackage,
        steel: StructureMaterial,
        reg_class: RegulatoryClass,
    ) {
        model_parameters.max_sizing_iterations = 1;
        let err = converge(&inputs(&ice_package, &steel, &reg_class), &model_parameters)
            .unwrap_err();
        let err = err.downcast_ref::<ConvergenceError>().unwrap();
        assert_eq!(err.package_id, ice_package.id);
        assert_eq!(err.iterations, 1);
    }

    /// Energy consumption falls so steeply with weight that a large battery makes the vehicle
    /// need no battery at all, and vice versa
    #[rstest]
    fn test_converge_oscillating(
        model_parameters: ModelParameters,
        mut bev_package: TechnologyPackage,
        steel: StructureMaterial,
        reg_class: RegulatoryClass,
    ) {
        let expression = Expression::parse("5 - 0.001 * ETW").unwrap();
        for surface in &mut bev_package.surfaces {
            surface.kwh = Some(expression.clone());
        }
        bev_package.mass.battery_per_energy = MassPerEnergy(10.0);

        let err = converge(&inputs(&bev_package, &steel, &reg_class), &model_parameters)
            .unwrap_err();
        let err = err.downcast_ref::<ConvergenceError>().unwrap();
        assert_eq!(err.iterations, model_parameters.max_sizing_iterations);
        assert!(err.battery_change > model_parameters.convergence_tolerance);
    }

    #[test]
    fn test_relative_change() {
        assert_eq!(relative_change(Mass(100.0), Mass(100.0)), 0.0);
        assert_approx_eq!(f64, relative_change(Mass(100.0), Mass(90.0)), 0.1);
        assert_eq!(relative_change(Energy(0.0), Energy(0.0)), 0.0);
        assert!(relative_change(Energy(0.0), Energy(1.0)).is_infinite());
        assert_eq!(
            onroad_kwh(
                &crate::fixture::model_parameters(),
                EnergyPerDistance(0.0)
            ),
            EnergyPerDistance(0.0)
        );
    }
}
