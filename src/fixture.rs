//! Fixtures for tests

use crate::attribute::{Attribute, AttributeValues};
use crate::cloud::CloudGenerator;
use crate::expression::{Expression, SurfaceInputs};
use crate::material::{StructureMaterial, StructureMaterialMap};
use crate::model::{Model, ModelParameters};
use crate::package::{
    ApplicationClass, CycleResult, CycleSurfaces, DriveSystem, FuelingClass, PackageCosts,
    PackageMap, PackageMass, PowertrainType, TechFlags, TechnologyPackage,
};
use crate::policy::{RegClassMap, RegulatoryClass};
use crate::sizing::SizedVehicle;
use crate::units::{
    Area, Co2ePerDistance, Dimensionless, Distance, Energy, Mass, MassPerArea, MassPerEnergy,
    MassPerPower, Money, MoneyPerEnergy, MoneyPerMass, MoneyPerPower, Power,
};
use crate::vehicle::{Vehicle, VehicleSizing};
use indexmap::indexmap;
use rstest::fixture;
use std::path::PathBuf;
use std::sync::Arc;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

fn surfaces(co2: &[&str], kwh: &[&str]) -> Vec<CycleSurfaces> {
    (0..co2.len().max(kwh.len()))
        .map(|i| CycleSurfaces {
            co2: co2.get(i).map(|text| Expression::parse(text).unwrap()),
            kwh: kwh.get(i).map(|text| Expression::parse(text).unwrap()),
        })
        .collect()
}

#[fixture]
pub fn surface_inputs() -> SurfaceInputs {
    SurfaceInputs::new(3500.0, 10.0, 18.0, 160.0)
}

#[fixture]
pub fn model_parameters() -> ModelParameters {
    toml::from_str(
        "model_years = [2027, 2028, 2029, 2030]

[drive_cycle_weights]
ftp = 0.55
hwfet = 0.45",
    )
    .unwrap()
}

#[fixture]
pub fn ice_package() -> TechnologyPackage {
    TechnologyPackage {
        id: "ice_base".into(),
        description: "Naturally aspirated gasoline".into(),
        powertrain_type: PowertrainType::Ice,
        drive_system: DriveSystem::Fwd,
        application_class: ApplicationClass::SedanWagon,
        flags: TechFlags::default(),
        engine_displacement: 2.5,
        nominal_motor_power: Power(0.0),
        nominal_battery: Energy(0.0),
        mass: PackageMass {
            powertrain_fixed: Mass(300.0),
            powertrain_per_power: MassPerPower(1.5),
            battery_per_energy: MassPerEnergy(0.0),
        },
        costs: PackageCosts {
            engine_fixed: Money(1500.0),
            engine_per_power: MoneyPerPower(10.0),
            driveline: Money(1000.0),
            e_machine_per_kw: 0.0,
            battery_per_energy: MoneyPerEnergy(0.0),
            learning_rate: Dimensionless(0.0),
            base_year: 2020,
        },
        offcycle_credit: Co2ePerDistance(0.0),
        surfaces: surfaces(
            &[
                "20 + 0.04 * ETW + 8000 * RLHP20 + 2500 * RLHP60 + 1200 * HP_ETW",
                "10 + 0.028 * ETW + 3000 * RLHP20 + 6000 * RLHP60 + 600 * HP_ETW",
            ],
            &[],
        ),
    }
}

#[fixture]
pub fn turbo_package(ice_package: TechnologyPackage) -> TechnologyPackage {
    TechnologyPackage {
        id: "ice_turbo".into(),
        description: "Turbocharged direct-injection gasoline".into(),
        flags: TechFlags {
            turbocharged: true,
            direct_injection: true,
            ..Default::default()
        },
        engine_displacement: 1.6,
        costs: PackageCosts {
            engine_fixed: Money(2300.0),
            ..ice_package.costs
        },
        surfaces: surfaces(
            &[
                "15 + 0.036 * ETW + 8000 * RLHP20 + 2500 * RLHP60 + 1000 * HP_ETW",
                "10 + 0.028 * ETW + 3000 * RLHP20 + 6000 * RLHP60 + 600 * HP_ETW",
            ],
            &[],
        ),
        ..ice_package
    }
}

#[fixture]
pub fn bev_package() -> TechnologyPackage {
    let kwh = "0.03 + 0.00005 * ETW + 8 * RLHP20 + 3 * RLHP60 + 0.2 * HP_ETW";
    TechnologyPackage {
        id: "bev".into(),
        description: "Battery electric".into(),
        powertrain_type: PowertrainType::Bev,
        drive_system: DriveSystem::Fwd,
        application_class: ApplicationClass::SedanWagon,
        flags: TechFlags::default(),
        engine_displacement: 0.0,
        nominal_motor_power: Power(0.0),
        nominal_battery: Energy(0.0),
        mass: PackageMass {
            powertrain_fixed: Mass(200.0),
            powertrain_per_power: MassPerPower(0.5),
            battery_per_energy: MassPerEnergy(8.0),
        },
        costs: PackageCosts {
            engine_fixed: Money(0.0),
            engine_per_power: MoneyPerPower(0.0),
            driveline: Money(500.0),
            e_machine_per_kw: 20.0,
            battery_per_energy: MoneyPerEnergy(150.0),
            learning_rate: Dimensionless(0.0),
            base_year: 2020,
        },
        offcycle_credit: Co2ePerDistance(0.0),
        surfaces: surfaces(&[], &[kwh, kwh]),
    }
}

#[fixture]
pub fn steel() -> StructureMaterial {
    StructureMaterial {
        id: "steel".into(),
        description: "Mild steel".into(),
        mass_per_area: MassPerArea(18.0),
        cost_per_mass: MoneyPerMass(2.0),
    }
}

#[fixture]
pub fn aluminum() -> StructureMaterial {
    StructureMaterial {
        id: "aluminum".into(),
        description: "Aluminum".into(),
        mass_per_area: MassPerArea(12.0),
        cost_per_mass: MoneyPerMass(5.0),
    }
}

#[fixture]
pub fn reg_class() -> RegulatoryClass {
    RegulatoryClass {
        id: "car".into(),
        description: "Passenger cars".into(),
        ballast_mass: Mass(300.0),
        ballast_fraction: Dimensionless(0.0),
        target_slope: 4.0,
        target_intercept: Co2ePerDistance(0.0),
        target_min: Co2ePerDistance(160.0),
        target_max: Co2ePerDistance(240.0),
        lifetime_vmt: Distance(150_000.0),
    }
}

#[fixture]
pub fn sized_vehicle() -> SizedVehicle {
    SizedVehicle {
        rated_power: Power(160.0),
        battery: Energy(0.0),
        e_machine_power: Power(0.0),
        structure_mass: Mass(828.0),
        battery_mass: Mass(0.0),
        powertrain_mass: Mass(540.0),
        glider_non_structure_mass: Mass(1800.0),
        delta_glider_non_structure_mass: Mass(0.0),
        curb_weight: Mass(3168.0),
        etw: Mass(3468.0),
        cycles: vec![CycleResult::default(); 2],
        combined: CycleResult::default(),
        iterations: 5,
    }
}

#[fixture]
pub fn model(
    mut model_parameters: ModelParameters,
    ice_package: TechnologyPackage,
    turbo_package: TechnologyPackage,
    bev_package: TechnologyPackage,
    steel: StructureMaterial,
    aluminum: StructureMaterial,
    reg_class: RegulatoryClass,
) -> Model {
    model_parameters.gasoline_price = 3.0;
    model_parameters.electricity_price = 0.15;
    model_parameters.generalized_cost_distance = Distance(15_000.0);

    let packages: PackageMap = [ice_package, turbo_package, bev_package]
        .into_iter()
        .map(|package| (package.id.clone(), Arc::new(package)))
        .collect();
    let structure_materials: StructureMaterialMap = [steel, aluminum]
        .into_iter()
        .map(|material| (material.id.clone(), Arc::new(material)))
        .collect();
    let regulatory_classes: RegClassMap = indexmap! {reg_class.id.clone() => Arc::new(reg_class)};

    Model {
        model_path: PathBuf::new(),
        parameters: model_parameters,
        packages,
        structure_materials,
        regulatory_classes,
    }
}

fn vehicle(model: &Model, id: &str, package_id: &str, fueling_class: FuelingClass) -> Vehicle {
    Vehicle {
        id: id.into(),
        description: String::new(),
        market_class_id: "sedan".into(),
        reg_class: Arc::clone(&model.regulatory_classes["car"]),
        fueling_class,
        drive_system: DriveSystem::Fwd,
        application_class: ApplicationClass::SedanWagon,
        sizing: VehicleSizing {
            package_id: package_id.into(),
            structure_material_id: "steel".into(),
            footprint: Area(46.0),
            rlhp20: Power(10.0),
            rlhp60: Power(18.0),
        },
        base_footprint: Area(46.0),
        base_glider_non_structure_mass: Mass(1800.0),
        curb_weight_per_power: MassPerPower(20.0),
        bev_range: Distance(0.0),
        initial_registered_count: 1000.0,
        redesign_interval: 3,
        last_redesign_year: None,
        prior_cert_emissions: None,
        values: AttributeValues::default(),
        cert_co2e_megagrams: 0.0,
        target_co2e_megagrams: 0.0,
        frontier: Vec::new(),
    }
}

/// A turbocharged sedan, so that some redesign options have higher emissions than the baseline
#[fixture]
pub fn ice_vehicle(model: Model) -> Vehicle {
    vehicle(&model, "sedan_ice", "ice_turbo", FuelingClass::Ice)
}

#[fixture]
pub fn bev_vehicle(model: Model) -> Vehicle {
    Vehicle {
        bev_range: Distance(250.0),
        initial_registered_count: 200.0,
        redesign_interval: 2,
        ..vehicle(&model, "sedan_bev", "bev", FuelingClass::Bev)
    }
}

/// Values lying on a frontier where cost falls as emissions rise
pub fn convex_frontier(emissions: &[f64]) -> Vec<AttributeValues> {
    emissions
        .iter()
        .map(|&emissions| {
            let mut values = AttributeValues::default();
            values[Attribute::CertCo2eGramsPerMile] = emissions;
            values[Attribute::NewVehicleMfrGeneralizedCost] = 20_000.0 + 1e6 / emissions;
            values[Attribute::CurbWeight] = 5000.0 - 10.0 * emissions;
            values
        })
        .collect()
}

/// Give a vehicle a frontier for the first model year
pub fn with_frontier(model: &Model, mut vehicle: Vehicle) -> Vehicle {
    let cloud = CloudGenerator::new(model, 2027).generate(&vehicle).unwrap();
    vehicle.update_frontier(cloud, 2027, 10.0).unwrap();
    vehicle
}
