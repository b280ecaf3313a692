//! Vehicles are the designs a manufacturer sells, each with its own frontier of redesign options.
use crate::attribute::{Attribute, AttributeValues};
use crate::cloud::{Cloud, CloudPoint, SweepParameters};
use crate::frontier::{FrontierPoint, build_frontier};
use crate::id::{define_id_getter, define_id_type};
use crate::material::{StructureMaterial, StructureMaterialID};
use crate::package::{ApplicationClass, DriveSystem, FuelingClass, PackageID, TechnologyPackage};
use crate::policy::{RegClassID, RegulatoryClass};
use crate::sizing::SizingInputs;
use crate::units::{Area, Distance, Mass, MassPerPower, Power};
use anyhow::{Context, Result};
use std::sync::Arc;

define_id_type! {VehicleID}
define_id_type! {MarketClassID}

/// The technology and sizing choices which are carried from one model year to the next
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleSizing {
    /// Technology package
    pub package_id: PackageID,
    /// Body structure material
    pub structure_material_id: StructureMaterialID,
    /// Footprint
    pub footprint: Area,
    /// Road-load horsepower at 20 mph
    pub rlhp20: Power,
    /// Road-load horsepower at 60 mph
    pub rlhp60: Power,
}

/// A vehicle design
#[derive(Debug, Clone)]
pub struct Vehicle {
    /// Unique identifier for the vehicle
    pub id: VehicleID,
    /// Text description of the vehicle
    pub description: String,
    /// The market class the vehicle competes in
    pub market_class_id: MarketClassID,
    /// The regulatory class the vehicle is certified in
    pub reg_class: Arc<RegulatoryClass>,
    /// Fueling class
    pub fueling_class: FuelingClass,
    /// Drive system
    pub drive_system: DriveSystem,
    /// Application class
    pub application_class: ApplicationClass,
    /// Current technology and sizing choices
    pub sizing: VehicleSizing,
    /// Footprint at which the base glider mass was measured
    pub base_footprint: Area,
    /// Non-structure glider mass at the base footprint
    pub base_glider_non_structure_mass: Mass,
    /// Target curb weight per unit of rated power
    pub curb_weight_per_power: MassPerPower,
    /// Target range (BEVs only)
    pub bev_range: Distance,
    /// Sales
    pub initial_registered_count: f64,
    /// Years between redesigns
    pub redesign_interval: u32,
    /// The year the vehicle was last redesigned
    pub last_redesign_year: Option<u32>,
    /// Certified emissions for the vehicle's own fuel in the previous model year
    pub prior_cert_emissions: Option<f64>,
    /// Current values of tracked attributes
    pub values: AttributeValues,
    /// Lifetime certification CO2e over all sales (Mg)
    pub cert_co2e_megagrams: f64,
    /// Lifetime target CO2e over all sales (Mg)
    pub target_co2e_megagrams: f64,
    /// Cost-minimal redesign options for the current model year
    pub frontier: Vec<CloudPoint>,
}
define_id_getter! {Vehicle, VehicleID}

impl Vehicle {
    /// The ID of the vehicle's regulatory class
    pub fn reg_class_id(&self) -> &RegClassID {
        &self.reg_class.id
    }

    /// Whether the full set of redesign options is available in `year`
    pub fn is_redesign_year(&self, year: u32) -> bool {
        self.last_redesign_year
            .is_none_or(|last| year >= last.saturating_add(self.redesign_interval))
    }

    /// The attribute holding certified emissions for the vehicle's own fuel
    pub fn own_fuel_attribute(&self) -> Attribute {
        match self.fueling_class {
            FuelingClass::Ice => Attribute::CertDirectCo2eGramsPerMile,
            FuelingClass::Bev => Attribute::CertDirectKwhPerMile,
        }
    }

    /// Inputs for sizing this vehicle with the given choices
    pub fn sizing_inputs<'a>(
        &'a self,
        package: &'a TechnologyPackage,
        material: &'a StructureMaterial,
        sweep: &SweepParameters,
    ) -> SizingInputs<'a> {
        SizingInputs {
            package,
            material,
            reg_class: &self.reg_class,
            footprint: sweep.footprint,
            rlhp20: sweep.rlhp20,
            rlhp60: sweep.rlhp60,
            base_footprint: self.base_footprint,
            base_glider_non_structure_mass: self.base_glider_non_structure_mass,
            curb_weight_per_power: self.curb_weight_per_power,
            bev_range: self.bev_range,
        }
    }

    /// Replace the vehicle's frontier with one built from this year's cloud.
    ///
    /// The vehicle takes on the attribute values of the cloud's baseline design until an
    /// operating point is chosen.
    pub fn update_frontier(&mut self, cloud: Cloud, year: u32, affinity_factor: f64) -> Result<()> {
        if self.is_redesign_year(year) {
            self.last_redesign_year = Some(year);
        }

        self.values = *cloud.baseline.values();
        self.update_megagrams();
        self.frontier = build_frontier(cloud.points, affinity_factor)
            .with_context(|| format!("Failed to build frontier for vehicle {}", self.id))?;

        Ok(())
    }

    /// Apply values decomposed from a composite frontier.
    ///
    /// The design carried forward to the next model year is the frontier point closest in
    /// emissions to the decomposed values.
    pub fn apply_operating_point(&mut self, values: AttributeValues, registered_count: f64) {
        self.values = values;
        self.initial_registered_count = registered_count;
        self.update_megagrams();
        self.prior_cert_emissions = Some(values[self.own_fuel_attribute()]);

        let level = values[Attribute::CertCo2eGramsPerMile];
        let nearest = self.frontier.iter().min_by(|a, b| {
            let a = (a.emissions() - level).abs();
            let b = (b.emissions() - level).abs();
            a.total_cmp(&b)
        });
        if let Some(point) = nearest {
            self.sizing = point.sizing();
        }
    }

    /// Recalculate lifetime CO2e totals from per-vehicle values and sales
    fn update_megagrams(&mut self) {
        self.cert_co2e_megagrams =
            self.values[Attribute::CertCo2eMegagrams] * self.initial_registered_count;
        self.target_co2e_megagrams =
            self.values[Attribute::TargetCo2eMegagrams] * self.initial_registered_count;
    }
}
