//! Generates the cloud of candidate designs for a vehicle in one model year.
//!
//! In a redesign year every compatible technology package is tried with every structure material
//! and each combination of footprint and road-load values around the vehicle's current design.
//! Otherwise only the vehicle's current combination is re-sized and re-costed.
use crate::attribute::{Attribute, AttributeValues};
use crate::cost::{CostBreakdown, generalized_cost};
use crate::frontier::FrontierPoint;
use crate::material::{StructureMaterial, StructureMaterialID};
use crate::model::Model;
use crate::package::{PackageID, TechnologyPackage};
use crate::policy::{ComplianceValues, RegClassID};
use crate::sizing::{SizedVehicle, SizingInputs, converge};
use crate::units::{Area, Money, Power, UnitType};
use crate::vehicle::{Vehicle, VehicleSizing};
use anyhow::{Context, Result, ensure};
use itertools::{Itertools, iproduct};
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

/// One combination of exogenous sizing choices
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepParameters {
    /// Vehicle footprint
    pub footprint: Area,
    /// Road-load horsepower at 20 mph
    pub rlhp20: Power,
    /// Road-load horsepower at 60 mph
    pub rlhp60: Power,
}

/// A fully sized and costed candidate design
#[derive(Debug, Clone, PartialEq)]
pub struct CloudPoint {
    /// Technology package
    pub package: Arc<TechnologyPackage>,
    /// Body structure material
    pub structure_material: Arc<StructureMaterial>,
    /// Footprint and road loads
    pub sweep: SweepParameters,
    /// The converged design
    pub sized: SizedVehicle,
    /// Manufacturer cost by component
    pub costs: CostBreakdown,
    /// Emissions, energy and target values
    pub compliance: ComplianceValues,
    /// Manufacturer cost plus consumer fuel costs
    pub generalized_cost: Money,
    values: AttributeValues,
}

impl CloudPoint {
    /// Assemble a point from its sized design, costing it and computing compliance values
    pub fn new(
        model: &Model,
        vehicle: &Vehicle,
        package: Arc<TechnologyPackage>,
        structure_material: Arc<StructureMaterial>,
        sweep: SweepParameters,
        sized: SizedVehicle,
        year: u32,
    ) -> Self {
        let parameters = &model.parameters;
        let costs = CostBreakdown::new(parameters, &package, &structure_material, &sized, year);
        let compliance = ComplianceValues::new(
            parameters,
            &package,
            &vehicle.reg_class,
            &sized.combined,
            sweep.footprint,
        );
        let generalized_cost = generalized_cost(parameters, costs.total(), &compliance);

        let values = AttributeValues::from_fn(|attribute| match attribute {
            Attribute::CertCo2eGramsPerMile => compliance.cert_co2e.value(),
            Attribute::CertDirectCo2eGramsPerMile => compliance.cert_direct_co2e.value(),
            Attribute::CertDirectKwhPerMile => compliance.cert_direct_kwh.value(),
            Attribute::OnroadDirectCo2eGramsPerMile => compliance.onroad_direct_co2e.value(),
            Attribute::OnroadDirectKwhPerMile => compliance.onroad_direct_kwh.value(),
            Attribute::TargetCo2eGramsPerMile => compliance.target_co2e.value(),
            Attribute::CertCo2eMegagrams => compliance.cert_co2e_megagrams,
            Attribute::TargetCo2eMegagrams => compliance.target_co2e_megagrams,
            Attribute::NewVehicleMfrCost => costs.total().value(),
            Attribute::NewVehicleMfrGeneralizedCost => generalized_cost.value(),
            Attribute::CurbWeight => sized.curb_weight.value(),
            Attribute::RatedPower => sized.rated_power.value(),
            Attribute::BatteryKwh => sized.battery.value(),
            Attribute::Footprint => sweep.footprint.value(),
        });

        Self {
            package,
            structure_material,
            sweep,
            sized,
            costs,
            compliance,
            generalized_cost,
            values,
        }
    }

    /// Values of all tracked attributes
    pub fn values(&self) -> &AttributeValues {
        &self.values
    }

    /// The combination of choices which produced this point
    pub fn sizing(&self) -> VehicleSizing {
        VehicleSizing {
            package_id: self.package.id.clone(),
            structure_material_id: self.structure_material.id.clone(),
            footprint: self.sweep.footprint,
            rlhp20: self.sweep.rlhp20,
            rlhp60: self.sweep.rlhp60,
        }
    }
}

impl FrontierPoint for CloudPoint {
    fn emissions(&self) -> f64 {
        self.values.emissions()
    }

    fn cost(&self) -> f64 {
        self.values.cost()
    }
}

/// All candidate designs for one vehicle in one model year
#[derive(Debug, Clone)]
pub struct Cloud {
    /// Candidate designs remaining after filtering
    pub points: Vec<CloudPoint>,
    /// The design matching the vehicle's current (unperturbed) sizing
    pub baseline: CloudPoint,
}

/// Key identifying everything a sizing depends on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SizingKey {
    package_id: PackageID,
    structure_material_id: StructureMaterialID,
    reg_class_id: RegClassID,
    /// Bit patterns of footprint, road loads, base footprint, base glider mass, curb weight per
    /// power and BEV range
    values: [u64; 7],
}

impl SizingKey {
    fn new(inputs: &SizingInputs) -> Self {
        Self {
            package_id: inputs.package.id.clone(),
            structure_material_id: inputs.material.id.clone(),
            reg_class_id: inputs.reg_class.id.clone(),
            values: [
                inputs.footprint.value(),
                inputs.rlhp20.value(),
                inputs.rlhp60.value(),
                inputs.base_footprint.value(),
                inputs.base_glider_non_structure_mass.value(),
                inputs.curb_weight_per_power.value(),
                inputs.bev_range.value(),
            ]
            .map(f64::to_bits),
        }
    }
}

/// Remembers converged sizings so that identical combinations are only sized once
#[derive(Debug, Default)]
pub struct SizingCache {
    sizings: HashMap<SizingKey, SizedVehicle>,
    hits: usize,
}

impl SizingCache {
    /// Return the cached sizing for these inputs, converging and caching it if not present
    pub fn get_or_converge(
        &mut self,
        inputs: &SizingInputs,
        model: &Model,
    ) -> Result<SizedVehicle> {
        let key = SizingKey::new(inputs);
        if let Some(sized) = self.sizings.get(&key) {
            self.hits += 1;
            return Ok(sized.clone());
        }

        let sized = converge(inputs, &model.parameters)?;
        self.sizings.insert(key, sized.clone());
        Ok(sized)
    }

    /// Number of distinct sizings held
    pub fn len(&self) -> usize {
        self.sizings.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.sizings.is_empty()
    }

    /// Number of lookups answered from the cache
    pub fn hits(&self) -> usize {
        self.hits
    }
}

/// The nominal value followed by its scaled variants, without duplicates
fn sweep_values<T: UnitType>(nominal: T, min_scaler: f64, max_scaler: f64) -> Vec<T> {
    let mut values = vec![nominal];
    for scaler in [min_scaler, max_scaler] {
        let value = T::new(nominal.value() * scaler);
        if !values.iter().any(|v| same_value(*v, value)) {
            values.push(value);
        }
    }

    values
}

/// Whether two quantities are bitwise identical
fn same_value<T: UnitType>(a: T, b: T) -> bool {
    a.value().to_bits() == b.value().to_bits()
}

/// Generates clouds for vehicles in one model year
pub struct CloudGenerator<'a> {
    model: &'a Model,
    year: u32,
    cache: SizingCache,
}

/// A combination to be sized
struct Candidate {
    package: Arc<TechnologyPackage>,
    structure_material: Arc<StructureMaterial>,
    sweep: SweepParameters,
    is_baseline: bool,
}

impl<'a> CloudGenerator<'a> {
    /// Create a generator with an empty cache
    pub fn new(model: &'a Model, year: u32) -> Self {
        Self {
            model,
            year,
            cache: SizingCache::default(),
        }
    }

    /// The generator's sizing cache
    pub fn cache(&self) -> &SizingCache {
        &self.cache
    }

    /// Generate the cloud of candidate designs for a vehicle
    pub fn generate(&mut self, vehicle: &Vehicle) -> Result<Cloud> {
        let candidates = if vehicle.is_redesign_year(self.year) {
            self.redesign_candidates(vehicle)?
        } else {
            vec![self.carried_forward_candidate(vehicle)?]
        };

        let mut baseline = None;
        let mut points = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let inputs = vehicle.sizing_inputs(
                &candidate.package,
                &candidate.structure_material,
                &candidate.sweep,
            );
            let sized = self
                .cache
                .get_or_converge(&inputs, self.model)
                .with_context(|| {
                    format!(
                        "Failed to size vehicle {} with package {} in {}",
                        vehicle.id, candidate.package.id, self.year
                    )
                })?;
            let point = CloudPoint::new(
                self.model,
                vehicle,
                candidate.package,
                candidate.structure_material,
                candidate.sweep,
                sized,
                self.year,
            );

            if candidate.is_baseline {
                baseline = Some(point.clone());
            }
            points.push(point);
        }

        let baseline = baseline.with_context(|| {
            format!(
                "Current design of vehicle {} is not among its candidate designs",
                vehicle.id
            )
        })?;

        if self.model.parameters.no_backsliding && vehicle.is_redesign_year(self.year) {
            if let Some(prior) = vehicle.prior_cert_emissions {
                let attribute = vehicle.own_fuel_attribute();
                points.retain(|point| point.values()[attribute] <= prior);
            }
        }
        ensure!(
            !points.is_empty(),
            "No candidate designs remain for vehicle {} in {} after removing designs with \
            higher emissions than the prior design",
            vehicle.id,
            self.year
        );

        debug!(
            "Generated {} cloud points for vehicle {} in {} (sizing cache: {} entries, {} hits)",
            points.len(),
            vehicle.id,
            self.year,
            self.cache.len(),
            self.cache.hits()
        );

        Ok(Cloud { points, baseline })
    }

    /// Every combination of compatible package, material and sweep values
    fn redesign_candidates(&self, vehicle: &Vehicle) -> Result<Vec<Candidate>> {
        let parameters = &self.model.parameters;
        let packages = self
            .model
            .packages
            .values()
            .filter(|package| {
                package.is_compatible_with(
                    vehicle.fueling_class,
                    vehicle.drive_system,
                    vehicle.application_class,
                )
            })
            .collect_vec();
        ensure!(
            !packages.is_empty(),
            "No technology packages are compatible with vehicle {}",
            vehicle.id
        );

        let sizing = &vehicle.sizing;
        // Footprint is swept about the base footprint, and the current footprint is always a
        // candidate
        let mut footprints = sweep_values(
            vehicle.base_footprint,
            parameters.footprint_min_scaler,
            parameters.footprint_max_scaler,
        );
        if !footprints.iter().any(|fp| same_value(*fp, sizing.footprint)) {
            footprints.push(sizing.footprint);
        }
        let rlhp20s = sweep_values(
            sizing.rlhp20,
            parameters.rlhp20_min_scaler,
            parameters.rlhp20_max_scaler,
        );
        let rlhp60s = sweep_values(
            sizing.rlhp60,
            parameters.rlhp60_min_scaler,
            parameters.rlhp60_max_scaler,
        );

        let candidates = iproduct!(
            packages,
            self.model.structure_materials.values(),
            footprints.iter(),
            rlhp20s.iter().enumerate(),
            rlhp60s.iter().enumerate()
        )
        .map(
            |(package, material, &footprint, (i_20, &rlhp20), (i_60, &rlhp60))| {
                // The nominal value is first in each road-load sweep
                let is_baseline = package.id == sizing.package_id
                    && material.id == sizing.structure_material_id
                    && same_value(footprint, sizing.footprint)
                    && i_20 == 0
                    && i_60 == 0;

                Candidate {
                    package: Arc::clone(package),
                    structure_material: Arc::clone(material),
                    sweep: SweepParameters {
                        footprint,
                        rlhp20,
                        rlhp60,
                    },
                    is_baseline,
                }
            },
        )
        .collect();

        Ok(candidates)
    }

    /// The vehicle's current combination
    fn carried_forward_candidate(&self, vehicle: &Vehicle) -> Result<Candidate> {
        let sizing = &vehicle.sizing;
        let package = self
            .model
            .packages
            .get(&sizing.package_id)
            .with_context(|| format!("Unknown technology package {}", sizing.package_id))?;
        let structure_material = self
            .model
            .structure_materials
            .get(&sizing.structure_material_id)
            .with_context(|| {
                format!("Unknown structure material {}", sizing.structure_material_id)
            })?;

        Ok(Candidate {
            package: Arc::clone(package),
            structure_material: Arc::clone(structure_material),
            sweep: SweepParameters {
                footprint: sizing.footprint,
                rlhp20: sizing.rlhp20,
                rlhp60: sizing.rlhp60,
            },
            is_baseline: true,
        })
    }
}
