//! Functionality for running the engine over every model year.
//!
//! Each year, every vehicle's cloud is generated and reduced to a frontier, vehicles are grouped
//! into composites, an operating point is chosen on each composite frontier and the composite is
//! decomposed back onto its members, which are then carried into the next year.
use crate::attribute::Attribute;
use crate::cloud::{Cloud, CloudGenerator};
use crate::composite::{CompositeVehicle, group_vehicles};
use crate::frontier::FrontierPoint;
use crate::model::{Model, OperatingPoint};
use crate::output::DataWriter;
use crate::vehicle::Vehicle;
use anyhow::{Context, Result};
use itertools::Itertools;
use log::{debug, info};
use rayon::prelude::*;
use std::path::Path;

/// Run the engine.
///
/// # Arguments:
///
/// * `model` - The model to run
/// * `vehicles` - The vehicle fleet in its initial state
/// * `output_path` - The folder to which output files will be written
/// * `debug_model` - Whether to write every cloud point to file
/// * `parallelize` - Whether to spread per-vehicle work over multiple threads
///
/// # Returns
///
/// The vehicles as decomposed in the final model year.
pub fn run(
    model: &Model,
    mut vehicles: Vec<Vehicle>,
    output_path: &Path,
    debug_model: bool,
    parallelize: bool,
) -> Result<Vec<Vehicle>> {
    let mut writer = DataWriter::create(output_path, debug_model)?;

    for year in model.iter_years() {
        info!("Model year: {year}");
        vehicles = run_year(model, vehicles, year, &mut writer, parallelize)
            .with_context(|| format!("Model year {year} failed"))?;
    }
    writer.flush()?;

    Ok(vehicles)
}

/// Generate frontiers, compose, choose operating points and decompose for one model year
fn run_year(
    model: &Model,
    mut vehicles: Vec<Vehicle>,
    year: u32,
    writer: &mut DataWriter,
    parallelize: bool,
) -> Result<Vec<Vehicle>> {
    let clouds = generate_clouds(model, &vehicles, year, parallelize)?;
    if writer.is_writing_clouds() {
        for (vehicle, cloud) in vehicles.iter().zip(&clouds) {
            writer.write_cloud(year, &vehicle.id, cloud)?;
        }
    }

    update_frontiers(model, &mut vehicles, clouds, year, parallelize)?;
    for vehicle in &vehicles {
        writer.write_vehicle_frontier(year, vehicle)?;
    }

    let mut composites = build_composites(model, vehicles, parallelize)?;
    info!("Built {} composite vehicles for {year}", composites.len());
    for composite in &mut composites {
        let emissions = select_operating_point(composite, model.parameters.operating_point)?;
        debug!(
            "Operating point for {}/{} in {year}: {emissions:.2} g/mi",
            composite.market_class_id, composite.reg_class_id
        );
        composite.decompose(emissions)?;

        writer.write_composite_frontier(year, composite)?;
        writer.write_vehicles(year, composite.vehicles())?;
    }

    Ok(composites
        .into_iter()
        .flat_map(CompositeVehicle::into_vehicles)
        .collect())
}

/// Generate every vehicle's cloud, with one sizing cache per worker thread
fn generate_clouds(
    model: &Model,
    vehicles: &[Vehicle],
    year: u32,
    parallelize: bool,
) -> Result<Vec<Cloud>> {
    if parallelize {
        vehicles
            .par_iter()
            .map_init(
                || CloudGenerator::new(model, year),
                |generator, vehicle| generator.generate(vehicle),
            )
            .collect()
    } else {
        let mut generator = CloudGenerator::new(model, year);
        vehicles
            .iter()
            .map(|vehicle| generator.generate(vehicle))
            .try_collect()
    }
}

/// Reduce each vehicle's cloud to a frontier
fn update_frontiers(
    model: &Model,
    vehicles: &mut [Vehicle],
    clouds: Vec<Cloud>,
    year: u32,
    parallelize: bool,
) -> Result<()> {
    let affinity_factor = model.parameters.frontier_affinity_factor;
    let update = |(vehicle, cloud): (&mut Vehicle, Cloud)| {
        vehicle.update_frontier(cloud, year, affinity_factor)
    };

    if parallelize {
        vehicles.par_iter_mut().zip(clouds).try_for_each(update)
    } else {
        vehicles.iter_mut().zip(clouds).try_for_each(update)
    }
}

/// Group vehicles by market class and regulatory class and compose each group's frontiers
fn build_composites(
    model: &Model,
    vehicles: Vec<Vehicle>,
    parallelize: bool,
) -> Result<Vec<CompositeVehicle>> {
    let affinity_factor = model.parameters.frontier_affinity_factor;
    let groups = group_vehicles(vehicles).into_values().collect_vec();

    if parallelize {
        groups
            .into_par_iter()
            .map(|members| CompositeVehicle::new(members, affinity_factor))
            .collect()
    } else {
        groups
            .into_iter()
            .map(|members| CompositeVehicle::new(members, affinity_factor))
            .try_collect()
    }
}

/// Choose the emissions level at which a composite vehicle is decomposed.
///
/// A composite with no sales has no meaningful target, so it operates at minimum cost.
pub fn select_operating_point(
    composite: &CompositeVehicle,
    operating_point: OperatingPoint,
) -> Result<f64> {
    let frontier = composite.frontier();
    let (lowest, cheapest) = frontier
        .first()
        .zip(frontier.last())
        .context("Composite frontier is empty")?;

    if operating_point == OperatingPoint::MinCost || composite.total_registered_count() <= 0.0 {
        return Ok(cheapest.emissions());
    }

    let target = composite.weighted_attribute(Attribute::TargetCo2eGramsPerMile);
    Ok(target.clamp(lowest.emissions(), cheapest.emissions()))
}
