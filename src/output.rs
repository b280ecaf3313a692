//! The module responsible for writing output data to disk.
use crate::attribute::{Attribute, AttributeValues};
use crate::cloud::{Cloud, CloudPoint};
use crate::composite::CompositeVehicle;
use crate::material::StructureMaterialID;
use crate::package::PackageID;
use crate::policy::RegClassID;
use crate::units::{Area, Power};
use crate::vehicle::{MarketClassID, Vehicle, VehicleID};
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "ccfe_results";

/// The output file name for per-vehicle frontiers
const VEHICLE_FRONTIERS_FILE_NAME: &str = "vehicle_frontiers.csv";

/// The output file name for composite frontiers
const COMPOSITE_FRONTIERS_FILE_NAME: &str = "composite_frontiers.csv";

/// The output file name for decomposed vehicles
const VEHICLES_FILE_NAME: &str = "vehicles.csv";

/// The output file name for every cloud point
const DEBUG_CLOUDS_FILE_NAME: &str = "debug_clouds.csv";

/// Get the model name from the specified directory path
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Canonicalise in case the user has specified "."
    let model_dir = model_dir
        .canonicalize()
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory for the model specified at `model_dir`.
///
/// # Returns
///
/// Whether an existing, non-empty directory was overwritten.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if let Ok(mut it) = fs::read_dir(output_dir) {
        if it.next().is_none() {
            // Empty folder
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. \
            Please delete the folder or pass the --overwrite command-line option."
        );

        fs::remove_dir_all(output_dir).context("Could not delete folder")?;
        true
    } else {
        false
    };

    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// The tracked attributes, one column each
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct AttributeRow {
    cert_co2e_grams_per_mile: f64,
    cert_direct_co2e_grams_per_mile: f64,
    cert_direct_kwh_per_mile: f64,
    onroad_direct_co2e_grams_per_mile: f64,
    onroad_direct_kwh_per_mile: f64,
    target_co2e_grams_per_mile: f64,
    cert_co2e_megagrams: f64,
    target_co2e_megagrams: f64,
    new_vehicle_mfr_cost: f64,
    new_vehicle_mfr_generalized_cost: f64,
    curb_weight: f64,
    rated_power: f64,
    battery_kwh: f64,
    footprint: f64,
}

impl From<&AttributeValues> for AttributeRow {
    fn from(values: &AttributeValues) -> Self {
        Self {
            cert_co2e_grams_per_mile: values[Attribute::CertCo2eGramsPerMile],
            cert_direct_co2e_grams_per_mile: values[Attribute::CertDirectCo2eGramsPerMile],
            cert_direct_kwh_per_mile: values[Attribute::CertDirectKwhPerMile],
            onroad_direct_co2e_grams_per_mile: values[Attribute::OnroadDirectCo2eGramsPerMile],
            onroad_direct_kwh_per_mile: values[Attribute::OnroadDirectKwhPerMile],
            target_co2e_grams_per_mile: values[Attribute::TargetCo2eGramsPerMile],
            cert_co2e_megagrams: values[Attribute::CertCo2eMegagrams],
            target_co2e_megagrams: values[Attribute::TargetCo2eMegagrams],
            new_vehicle_mfr_cost: values[Attribute::NewVehicleMfrCost],
            new_vehicle_mfr_generalized_cost: values[Attribute::NewVehicleMfrGeneralizedCost],
            curb_weight: values[Attribute::CurbWeight],
            rated_power: values[Attribute::RatedPower],
            battery_kwh: values[Attribute::BatteryKwh],
            footprint: values[Attribute::Footprint],
        }
    }
}

/// Identifies one design of one vehicle.
///
/// Written along with an [`AttributeRow`].
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct DesignRow {
    model_year: u32,
    vehicle_id: VehicleID,
    point: usize,
    package_id: PackageID,
    structure_material_id: StructureMaterialID,
    rlhp20: Power,
    rlhp60: Power,
}

impl DesignRow {
    fn new(model_year: u32, vehicle_id: &VehicleID, point: usize, design: &CloudPoint) -> Self {
        let sizing = design.sizing();
        Self {
            model_year,
            vehicle_id: vehicle_id.clone(),
            point,
            package_id: sizing.package_id,
            structure_material_id: sizing.structure_material_id,
            rlhp20: sizing.rlhp20,
            rlhp60: sizing.rlhp60,
        }
    }
}

/// Represents a row in the composite frontiers CSV file.
///
/// Written along with an [`AttributeRow`].
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CompositeFrontierRow {
    model_year: u32,
    market_class_id: MarketClassID,
    reg_class_id: RegClassID,
    point: usize,
}

/// Represents the state of a vehicle after decomposition.
///
/// Written along with an [`AttributeRow`].
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct VehicleRow {
    model_year: u32,
    vehicle_id: VehicleID,
    market_class_id: MarketClassID,
    reg_class_id: RegClassID,
    package_id: PackageID,
    structure_material_id: StructureMaterialID,
    sized_footprint: Area,
    registered_count: f64,
    vehicle_cert_co2e_megagrams: f64,
    vehicle_target_co2e_megagrams: f64,
}

impl VehicleRow {
    fn new(model_year: u32, vehicle: &Vehicle) -> Self {
        Self {
            model_year,
            vehicle_id: vehicle.id.clone(),
            market_class_id: vehicle.market_class_id.clone(),
            reg_class_id: vehicle.reg_class_id().clone(),
            package_id: vehicle.sizing.package_id.clone(),
            structure_material_id: vehicle.sizing.structure_material_id.clone(),
            sized_footprint: vehicle.sizing.footprint,
            registered_count: vehicle.initial_registered_count,
            vehicle_cert_co2e_megagrams: vehicle.cert_co2e_megagrams,
            vehicle_target_co2e_megagrams: vehicle.target_co2e_megagrams,
        }
    }
}

/// An object for writing engine results to file
pub struct DataWriter {
    vehicle_frontiers_writer: csv::Writer<File>,
    composite_frontiers_writer: csv::Writer<File>,
    vehicles_writer: csv::Writer<File>,
    debug_clouds_writer: Option<csv::Writer<File>>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `save_debug_info` - Whether to write every cloud point as well as the frontiers
    pub fn create(output_path: &Path, save_debug_info: bool) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(&file_path)
                .with_context(|| format!("Could not create {}", file_path.display()))
        };

        let debug_clouds_writer = if save_debug_info {
            Some(new_writer(DEBUG_CLOUDS_FILE_NAME)?)
        } else {
            None
        };

        Ok(Self {
            vehicle_frontiers_writer: new_writer(VEHICLE_FRONTIERS_FILE_NAME)?,
            composite_frontiers_writer: new_writer(COMPOSITE_FRONTIERS_FILE_NAME)?,
            vehicles_writer: new_writer(VEHICLES_FILE_NAME)?,
            debug_clouds_writer,
        })
    }

    /// Whether every cloud point is being written
    pub fn is_writing_clouds(&self) -> bool {
        self.debug_clouds_writer.is_some()
    }

    /// Write a vehicle's frontier to file
    pub fn write_vehicle_frontier(&mut self, model_year: u32, vehicle: &Vehicle) -> Result<()> {
        for (point, design) in vehicle.frontier.iter().enumerate() {
            let design_row = DesignRow::new(model_year, &vehicle.id, point, design);
            self.vehicle_frontiers_writer
                .serialize((design_row, AttributeRow::from(design.values())))?;
        }

        Ok(())
    }

    /// Write the whole of a vehicle's cloud to file, if debug output is enabled
    pub fn write_cloud(
        &mut self,
        model_year: u32,
        vehicle_id: &VehicleID,
        cloud: &Cloud,
    ) -> Result<()> {
        let Some(writer) = &mut self.debug_clouds_writer else {
            return Ok(());
        };

        for (point, design) in cloud.points.iter().enumerate() {
            let design_row = DesignRow::new(model_year, vehicle_id, point, design);
            writer.serialize((design_row, AttributeRow::from(design.values())))?;
        }

        Ok(())
    }

    /// Write a composite vehicle's frontier to file
    pub fn write_composite_frontier(
        &mut self,
        model_year: u32,
        composite: &CompositeVehicle,
    ) -> Result<()> {
        for (point, composite_point) in composite.frontier().iter().enumerate() {
            let row = CompositeFrontierRow {
                model_year,
                market_class_id: composite.market_class_id.clone(),
                reg_class_id: composite.reg_class_id.clone(),
                point,
            };
            self.composite_frontiers_writer
                .serialize((row, AttributeRow::from(&composite_point.values)))?;
        }

        Ok(())
    }

    /// Write decomposed vehicles to file
    pub fn write_vehicles<'a, I>(&mut self, model_year: u32, vehicles: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Vehicle>,
    {
        for vehicle in vehicles {
            let row = VehicleRow::new(model_year, vehicle);
            self.vehicles_writer
                .serialize((row, AttributeRow::from(&vehicle.values)))?;
        }

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.vehicle_frontiers_writer.flush()?;
        self.composite_frontiers_writer.flush()?;
        self.vehicles_writer.flush()?;
        if let Some(writer) = &mut self.debug_clouds_writer {
            writer.flush()?;
        }

        Ok(())
    }
}
