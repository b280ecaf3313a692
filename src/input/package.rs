//! Code for reading technology packages and their response surfaces from CSV files.
use super::{check_non_negative, input_err_msg, read_csv, read_csv_id_file};
use crate::expression::Expression;
use crate::id::{IDCollection, define_id_getter};
use crate::package::{
    ApplicationClass, CycleSurfaces, DriveSystem, PackageCosts, PackageID, PackageMap,
    PackageMass, PowertrainType, TechFlags, TechnologyPackage,
};
use crate::units::{
    Co2ePerDistance, Dimensionless, Energy, Mass, MassPerEnergy, MassPerPower, Money,
    MoneyPerEnergy, MoneyPerPower, Power,
};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

const PACKAGES_FILE_NAME: &str = "technology_packages.csv";
const RESPONSE_SURFACES_FILE_NAME: &str = "response_surfaces.csv";

/// A row of the technology packages file
#[derive(Debug, PartialEq, Deserialize)]
struct PackageRaw {
    id: PackageID,
    description: String,
    powertrain_type: PowertrainType,
    drive_system: DriveSystem,
    application_class: ApplicationClass,
    turbocharged: bool,
    cooled_egr: bool,
    cylinder_deactivation: bool,
    direct_injection: bool,
    start_stop: bool,
    engine_displacement: f64,
    nominal_motor_power: f64,
    nominal_battery_kwh: f64,
    powertrain_fixed_mass: f64,
    powertrain_mass_per_power: f64,
    battery_mass_per_kwh: f64,
    engine_fixed_cost: f64,
    engine_cost_per_power: f64,
    driveline_cost: f64,
    e_machine_cost_per_kw: f64,
    battery_cost_per_kwh: f64,
    learning_rate: f64,
    cost_base_year: u32,
    offcycle_credit: f64,
}
define_id_getter! {PackageRaw, PackageID}

/// The quantity a response surface predicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DeserializeLabeledStringEnum)]
enum SurfaceQuantity {
    #[string = "co2_grams_per_mile"]
    Co2,
    #[string = "kwh_per_mile"]
    Kwh,
}

/// A row of the response surfaces file
#[derive(Debug, PartialEq, Deserialize)]
struct ResponseSurfaceRaw {
    package_id: String,
    drive_cycle: String,
    quantity: SurfaceQuantity,
    expression: String,
}

impl PackageRaw {
    /// Check the numeric fields of the package
    fn validate(&self) -> Result<()> {
        check_non_negative(&[
            ("engine_displacement", self.engine_displacement),
            ("nominal_motor_power", self.nominal_motor_power),
            ("nominal_battery_kwh", self.nominal_battery_kwh),
            ("powertrain_fixed_mass", self.powertrain_fixed_mass),
            ("powertrain_mass_per_power", self.powertrain_mass_per_power),
            ("battery_mass_per_kwh", self.battery_mass_per_kwh),
            ("engine_fixed_cost", self.engine_fixed_cost),
            ("engine_cost_per_power", self.engine_cost_per_power),
            ("driveline_cost", self.driveline_cost),
            ("e_machine_cost_per_kw", self.e_machine_cost_per_kw),
            ("battery_cost_per_kwh", self.battery_cost_per_kwh),
            ("offcycle_credit", self.offcycle_credit),
        ])?;
        ensure!(
            (0.0..1.0).contains(&self.learning_rate),
            "learning_rate must be at least 0 and less than 1"
        );

        Ok(())
    }

    fn into_package(self, surfaces: Vec<CycleSurfaces>) -> TechnologyPackage {
        TechnologyPackage {
            id: self.id,
            description: self.description,
            powertrain_type: self.powertrain_type,
            drive_system: self.drive_system,
            application_class: self.application_class,
            flags: TechFlags {
                turbocharged: self.turbocharged,
                cooled_egr: self.cooled_egr,
                cylinder_deactivation: self.cylinder_deactivation,
                direct_injection: self.direct_injection,
                start_stop: self.start_stop,
            },
            engine_displacement: self.engine_displacement,
            nominal_motor_power: Power(self.nominal_motor_power),
            nominal_battery: Energy(self.nominal_battery_kwh),
            mass: PackageMass {
                powertrain_fixed: Mass(self.powertrain_fixed_mass),
                powertrain_per_power: MassPerPower(self.powertrain_mass_per_power),
                battery_per_energy: MassPerEnergy(self.battery_mass_per_kwh),
            },
            costs: PackageCosts {
                engine_fixed: Money(self.engine_fixed_cost),
                engine_per_power: MoneyPerPower(self.engine_cost_per_power),
                driveline: Money(self.driveline_cost),
                e_machine_per_kw: self.e_machine_cost_per_kw,
                battery_per_energy: MoneyPerEnergy(self.battery_cost_per_kwh),
                learning_rate: Dimensionless(self.learning_rate),
                base_year: self.cost_base_year,
            },
            offcycle_credit: Co2ePerDistance(self.offcycle_credit),
            surfaces,
        }
    }
}

/// Read technology packages and their response surfaces from the model directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `drive_cycles` - Names of the model's drive cycles, in order
///
/// # Returns
///
/// A map of packages, keyed by ID
pub fn read_packages(model_dir: &Path, drive_cycles: &[String]) -> Result<PackageMap> {
    let file_path = model_dir.join(PACKAGES_FILE_NAME);
    let packages: IndexMap<PackageID, PackageRaw> = read_csv_id_file(&file_path)?;
    for package in packages.values() {
        package
            .validate()
            .with_context(|| format!("Invalid parameters for package {}", package.id))
            .with_context(|| input_err_msg(&file_path))?;
    }

    let file_path = model_dir.join(RESPONSE_SURFACES_FILE_NAME);
    let surfaces = read_csv(&file_path)?;
    read_packages_from_iter(packages, surfaces, drive_cycles)
        .with_context(|| input_err_msg(&file_path))
}

/// Combine packages with their response surfaces, compiling every expression
fn read_packages_from_iter<I>(
    packages: IndexMap<PackageID, PackageRaw>,
    iter: I,
    drive_cycles: &[String],
) -> Result<PackageMap>
where
    I: Iterator<Item = ResponseSurfaceRaw>,
{
    let mut surfaces: IndexMap<PackageID, Vec<CycleSurfaces>> = packages
        .keys()
        .map(|id| (id.clone(), vec![CycleSurfaces::default(); drive_cycles.len()]))
        .collect();

    let mut seen = HashSet::new();
    for row in iter {
        let package_id = packages.get_id(&row.package_id)?.clone();
        let cycle_idx = drive_cycles
            .iter()
            .position(|cycle| *cycle == row.drive_cycle)
            .with_context(|| format!("Unknown drive cycle {}", row.drive_cycle))?;
        ensure!(
            seen.insert((package_id.clone(), cycle_idx, row.quantity)),
            "Duplicate response surface for package {package_id}, drive cycle {}",
            row.drive_cycle
        );

        let expression = Expression::parse(&row.expression).with_context(|| {
            format!(
                "Invalid response surface for package {package_id}, drive cycle {}: {}",
                row.drive_cycle, row.expression
            )
        })?;

        // Every package ID has an entry
        let cycle = &mut surfaces[&package_id][cycle_idx];
        match row.quantity {
            SurfaceQuantity::Co2 => cycle.co2 = Some(expression),
            SurfaceQuantity::Kwh => cycle.kwh = Some(expression),
        }
    }

    packages
        .into_iter()
        .zip(surfaces.into_values())
        .map(|((id, raw), surfaces)| {
            check_surfaces_complete(raw.powertrain_type, &surfaces, drive_cycles)
                .with_context(|| format!("Missing response surfaces for package {id}"))?;
            Ok((id, Arc::new(raw.into_package(surfaces))))
        })
        .collect()
}

/// Check that the surfaces a powertrain needs are present for every drive cycle
fn check_surfaces_complete(
    powertrain_type: PowertrainType,
    surfaces: &[CycleSurfaces],
    drive_cycles: &[String],
) -> Result<()> {
    for (cycle, surface) in drive_cycles.iter().zip(surfaces) {
        if powertrain_type.has_engine() {
            ensure!(surface.co2.is_some(), "No CO2 surface for drive cycle {cycle}");
        }
        if powertrain_type.is_plugin() {
            ensure!(surface.kwh.is_some(), "No kWh surface for drive cycle {cycle}");
        }
    }

    Ok(())
}
