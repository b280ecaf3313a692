//! Manufacturer and generalized costs of a sized vehicle.
use crate::material::StructureMaterial;
use crate::model::ModelParameters;
use crate::package::TechnologyPackage;
use crate::policy::ComplianceValues;
use crate::sizing::SizedVehicle;
use crate::units::{Money, MoneyPerDistance};

/// The manufacturer cost of a vehicle, split by component
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CostBreakdown {
    /// Body structure
    pub structure: Money,
    /// Non-structure glider (interior, chassis, etc.)
    pub glider_non_structure: Money,
    /// Engine
    pub engine: Money,
    /// Driveline
    pub driveline: Money,
    /// Electric machine
    pub e_machine: Money,
    /// Battery
    pub battery: Money,
}

impl CostBreakdown {
    /// Cost the components of a sized vehicle in the given year.
    ///
    /// Powertrain component costs fall over time according to the package learning rate.
    pub fn new(
        parameters: &ModelParameters,
        package: &TechnologyPackage,
        material: &StructureMaterial,
        sized: &SizedVehicle,
        year: u32,
    ) -> Self {
        let costs = &package.costs;
        let learning = package.learning_factor(year);

        let engine = if package.powertrain_type.has_engine() {
            (costs.engine_fixed + costs.engine_per_power * sized.rated_power) * learning
        } else {
            Money(0.0)
        };

        Self {
            structure: material.structure_cost(sized.structure_mass),
            glider_non_structure: parameters.glider_non_structure_cost_per_mass
                * sized.glider_non_structure_mass,
            engine,
            driveline: costs.driveline * learning,
            e_machine: Money(costs.e_machine_per_kw * sized.e_machine_power.to_kw()) * learning,
            battery: costs.battery_per_energy * sized.battery * learning,
        }
    }

    /// Cost of the powertrain components
    pub fn powertrain(&self) -> Money {
        self.engine + self.driveline + self.e_machine + self.battery
    }

    /// Cost of the glider (structure and non-structure)
    pub fn glider(&self) -> Money {
        self.structure + self.glider_non_structure
    }

    /// Total manufacturer cost
    pub fn total(&self) -> Money {
        self.glider() + self.powertrain()
    }
}

/// Manufacturer cost plus the consumer's fuel costs over the generalized-cost distance
pub fn generalized_cost(
    parameters: &ModelParameters,
    mfr_cost: Money,
    compliance: &ComplianceValues,
) -> Money {
    let fuel_cost = compliance.onroad_direct_co2e.0 / parameters.gasoline_co2e_per_gallon
        * parameters.gasoline_price;
    let electricity_cost = compliance.onroad_direct_kwh.0 * parameters.electricity_price;

    mfr_cost + MoneyPerDistance(fuel_cost + electricity_cost) * parameters.generalized_cost_distance
}
