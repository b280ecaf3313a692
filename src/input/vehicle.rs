//! Code for reading the initial vehicle fleet from a CSV file.
use super::{check_non_negative, input_err_msg, read_csv_id_file};
use crate::attribute::AttributeValues;
use crate::id::{IDCollection, define_id_getter};
use crate::material::{StructureMaterialID, StructureMaterialMap};
use crate::package::{ApplicationClass, DriveSystem, FuelingClass, PackageID, PackageMap};
use crate::policy::RegClassMap;
use crate::units::{Area, Distance, Mass, MassPerPower, Power};
use crate::vehicle::{MarketClassID, Vehicle, VehicleID, VehicleSizing};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

const VEHICLES_FILE_NAME: &str = "vehicles.csv";

/// A row of the vehicles file
#[derive(Debug, PartialEq, Deserialize)]
struct VehicleRaw {
    id: VehicleID,
    description: String,
    market_class_id: MarketClassID,
    reg_class_id: String,
    fueling_class: FuelingClass,
    drive_system: DriveSystem,
    application_class: ApplicationClass,
    package_id: String,
    structure_material_id: String,
    footprint: f64,
    rlhp20: f64,
    rlhp60: f64,
    glider_non_structure_mass: f64,
    curb_weight_per_power: f64,
    bev_range: f64,
    initial_registered_count: f64,
    redesign_interval: u32,
    last_redesign_year: Option<u32>,
    /// Certified emissions for the vehicle's own fuel in the base year (g/mi for ICE, kWh/mi
    /// for BEV)
    #[serde(default)]
    prior_cert_emissions: Option<f64>,
}
define_id_getter! {VehicleRaw, VehicleID}

impl VehicleRaw {
    /// Check the vehicle's own values, which don't depend on other input files
    fn validate(&self) -> Result<()> {
        check_non_negative(&[
            ("rlhp20", self.rlhp20),
            ("rlhp60", self.rlhp60),
            ("glider_non_structure_mass", self.glider_non_structure_mass),
            ("bev_range", self.bev_range),
            ("initial_registered_count", self.initial_registered_count),
        ])?;
        ensure!(
            self.footprint.is_finite() && self.footprint > 0.0,
            "footprint must be a finite, positive number"
        );
        ensure!(
            self.curb_weight_per_power.is_finite() && self.curb_weight_per_power > 0.0,
            "curb_weight_per_power must be a finite, positive number"
        );
        ensure!(
            self.redesign_interval >= 1,
            "redesign_interval must be at least 1"
        );
        if self.fueling_class == FuelingClass::Bev {
            ensure!(self.bev_range > 0.0, "BEVs must have a positive bev_range");
        }
        if let Some(prior) = self.prior_cert_emissions {
            check_non_negative(&[("prior_cert_emissions", prior)])?;
        }

        Ok(())
    }

    /// Resolve references to other input data
    fn into_vehicle(
        self,
        packages: &PackageMap,
        structure_materials: &StructureMaterialMap,
        regulatory_classes: &RegClassMap,
    ) -> Result<Vehicle> {
        let package_id: PackageID = packages.get_id(&self.package_id)?.clone();
        let package = &packages[&package_id];
        ensure!(
            package.is_compatible_with(
                self.fueling_class,
                self.drive_system,
                self.application_class
            ),
            "Package {package_id} is not compatible with the vehicle's fueling class, drive \
            system and application class"
        );
        let structure_material_id: StructureMaterialID = structure_materials
            .get_id(&self.structure_material_id)?
            .clone();
        let reg_class = regulatory_classes
            .get(self.reg_class_id.as_str())
            .with_context(|| format!("Unknown regulatory class {}", self.reg_class_id))?;

        let footprint = Area(self.footprint);
        Ok(Vehicle {
            id: self.id,
            description: self.description,
            market_class_id: self.market_class_id,
            reg_class: Arc::clone(reg_class),
            fueling_class: self.fueling_class,
            drive_system: self.drive_system,
            application_class: self.application_class,
            sizing: VehicleSizing {
                package_id,
                structure_material_id,
                footprint,
                rlhp20: Power(self.rlhp20),
                rlhp60: Power(self.rlhp60),
            },
            base_footprint: footprint,
            base_glider_non_structure_mass: Mass(self.glider_non_structure_mass),
            curb_weight_per_power: MassPerPower(self.curb_weight_per_power),
            bev_range: Distance(self.bev_range),
            initial_registered_count: self.initial_registered_count,
            redesign_interval: self.redesign_interval,
            last_redesign_year: self.last_redesign_year,
            prior_cert_emissions: self.prior_cert_emissions,
            values: AttributeValues::default(),
            cert_co2e_megagrams: 0.0,
            target_co2e_megagrams: 0.0,
            frontier: Vec::new(),
        })
    }
}

/// Read the initial vehicle fleet from the model directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `packages` - Technology packages
/// * `structure_materials` - Structure materials
/// * `regulatory_classes` - Regulatory classes
///
/// # Returns
///
/// Vehicles in file order
pub fn read_vehicles(
    model_dir: &Path,
    packages: &PackageMap,
    structure_materials: &StructureMaterialMap,
    regulatory_classes: &RegClassMap,
) -> Result<Vec<Vehicle>> {
    let file_path = model_dir.join(VEHICLES_FILE_NAME);
    let vehicles: IndexMap<VehicleID, VehicleRaw> = read_csv_id_file(&file_path)?;

    vehicles
        .into_values()
        .map(|raw| {
            let id = raw.id.clone();
            raw.validate()
                .and_then(|()| raw.into_vehicle(packages, structure_materials, regulatory_classes))
                .with_context(|| format!("Invalid vehicle {id}"))
                .with_context(|| input_err_msg(&file_path))
        })
        .try_collect()
}
