//! Technology packages describe a powertrain configuration and its fitted response surfaces.
use crate::expression::{Expression, SurfaceInputs};
use crate::id::{define_id_getter, define_id_type};
use crate::units::{
    Co2ePerDistance, Dimensionless, Energy, EnergyPerDistance, Mass, MassPerEnergy, MassPerPower,
    Money, MoneyPerEnergy, MoneyPerPower, Power,
};
use indexmap::IndexMap;
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};
use std::sync::Arc;

define_id_type! {PackageID}

/// A map of [`TechnologyPackage`]s, keyed by package ID
pub type PackageMap = IndexMap<PackageID, Arc<TechnologyPackage>>;

/// The type of powertrain fitted to a vehicle
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    DeserializeLabeledStringEnum,
    SerializeLabeledStringEnum,
)]
pub enum PowertrainType {
    /// Internal combustion engine only
    #[string = "ICE"]
    Ice,
    /// Hybrid electric vehicle
    #[string = "HEV"]
    Hev,
    /// Plug-in hybrid electric vehicle
    #[string = "PHEV"]
    Phev,
    /// Battery electric vehicle
    #[string = "BEV"]
    Bev,
}

impl PowertrainType {
    /// The fueling class a powertrain belongs to.
    ///
    /// PHEVs are fuelled primarily by gasoline and so are grouped with ICE vehicles.
    pub fn fueling_class(self) -> FuelingClass {
        match self {
            Self::Ice | Self::Hev | Self::Phev => FuelingClass::Ice,
            Self::Bev => FuelingClass::Bev,
        }
    }

    /// Whether the battery is charged from the grid (and so must be sized for range)
    pub fn is_plugin(self) -> bool {
        matches!(self, Self::Phev | Self::Bev)
    }

    /// Whether the powertrain has a combustion engine
    pub fn has_engine(self) -> bool {
        !matches!(self, Self::Bev)
    }
}

/// The fuel a vehicle's compliance is assessed against
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    DeserializeLabeledStringEnum,
    SerializeLabeledStringEnum,
)]
pub enum FuelingClass {
    /// Liquid-fuelled
    #[string = "ICE"]
    Ice,
    /// Grid electricity
    #[string = "BEV"]
    Bev,
}

/// Which wheels are driven
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    DeserializeLabeledStringEnum,
    SerializeLabeledStringEnum,
)]
pub enum DriveSystem {
    /// Front-wheel drive
    #[string = "FWD"]
    Fwd,
    /// Rear-wheel drive
    #[string = "RWD"]
    Rwd,
    /// All-wheel drive
    #[string = "AWD"]
    Awd,
}

/// The body style a package is designed for
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    DeserializeLabeledStringEnum,
    SerializeLabeledStringEnum,
)]
pub enum ApplicationClass {
    /// Sedans and wagons
    #[string = "sedan_wagon"]
    SedanWagon,
    /// Crossovers and SUVs
    #[string = "cuv_suv"]
    CuvSuv,
    /// Pickup trucks
    #[string = "pickup"]
    Pickup,
}

/// Engine technologies present in a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TechFlags {
    /// Turbocharged engine
    pub turbocharged: bool,
    /// Cooled exhaust gas recirculation
    pub cooled_egr: bool,
    /// Cylinder deactivation
    pub cylinder_deactivation: bool,
    /// Gasoline direct injection
    pub direct_injection: bool,
    /// Engine start-stop
    pub start_stop: bool,
}

/// Coefficients for the mass of a package's powertrain components
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackageMass {
    /// Powertrain mass which doesn't scale with power
    pub powertrain_fixed: Mass,
    /// Powertrain mass per unit of rated power
    pub powertrain_per_power: MassPerPower,
    /// Battery mass per kWh of capacity
    pub battery_per_energy: MassPerEnergy,
}

/// Coefficients for the cost of a package's powertrain components, in the cost base year
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackageCosts {
    /// Engine cost which doesn't scale with power
    pub engine_fixed: Money,
    /// Engine cost per unit of rated power
    pub engine_per_power: MoneyPerPower,
    /// Driveline (transmission, axles, etc.) cost
    pub driveline: Money,
    /// Electric machine cost per kW
    pub e_machine_per_kw: f64,
    /// Battery cost per kWh
    pub battery_per_energy: MoneyPerEnergy,
    /// Annual rate at which powertrain costs fall
    pub learning_rate: Dimensionless,
    /// The year the cost coefficients apply to
    pub base_year: u32,
}

/// The response surfaces for one drive cycle
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CycleSurfaces {
    /// Tailpipe CO2 (g/mi)
    pub co2: Option<Expression>,
    /// Battery energy consumption (kWh/mi)
    pub kwh: Option<Expression>,
}

/// The evaluated response surfaces for one drive cycle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CycleResult {
    /// Tailpipe CO2
    pub co2: Co2ePerDistance,
    /// Battery energy consumption
    pub kwh: EnergyPerDistance,
}

/// A technology package
#[derive(Debug, Clone, PartialEq)]
pub struct TechnologyPackage {
    /// Unique identifier for the package
    pub id: PackageID,
    /// Text description of the package
    pub description: String,
    /// Powertrain type
    pub powertrain_type: PowertrainType,
    /// Drive system
    pub drive_system: DriveSystem,
    /// Application class
    pub application_class: ApplicationClass,
    /// Engine technology flags
    pub flags: TechFlags,
    /// Engine displacement (litres)
    pub engine_displacement: f64,
    /// Nominal electric motor power
    pub nominal_motor_power: Power,
    /// Nominal battery capacity (used as-is for non-plug-in hybrids)
    pub nominal_battery: Energy,
    /// Mass coefficients
    pub mass: PackageMass,
    /// Cost coefficients
    pub costs: PackageCosts,
    /// Off-cycle CO2 credit
    pub offcycle_credit: Co2ePerDistance,
    /// Response surfaces, in the same order as the model's drive cycles
    pub surfaces: Vec<CycleSurfaces>,
}
define_id_getter! {TechnologyPackage, PackageID}

impl TechnologyPackage {
    /// Fueling class of the package's powertrain
    pub fn fueling_class(&self) -> FuelingClass {
        self.powertrain_type.fueling_class()
    }

    /// Whether this package can be fitted to a vehicle of the given classes
    pub fn is_compatible_with(
        &self,
        fueling_class: FuelingClass,
        drive_system: DriveSystem,
        application_class: ApplicationClass,
    ) -> bool {
        self.fueling_class() == fueling_class
            && self.drive_system == drive_system
            && self.application_class == application_class
    }

    /// Evaluate the response surfaces for every drive cycle.
    ///
    /// Negative rates are clamped to zero. Quantities without a surface are zero.
    pub fn evaluate_cycles(&self, inputs: &SurfaceInputs) -> Vec<CycleResult> {
        let eval = |expr: &Option<Expression>| {
            expr.as_ref()
                .map_or(0.0, |expr| expr.evaluate(inputs).max(0.0))
        };

        self.surfaces
            .iter()
            .map(|cycle| CycleResult {
                co2: Co2ePerDistance(eval(&cycle.co2)),
                kwh: EnergyPerDistance(eval(&cycle.kwh)),
            })
            .collect()
    }

    /// The factor by which powertrain costs have fallen by `year`
    pub fn learning_factor(&self, year: u32) -> Dimensionless {
        let years = i64::from(year) - i64::from(self.costs.base_year);
        let years = i32::try_from(years).unwrap_or(i32::MAX);
        (Dimensionless(1.0) - self.costs.learning_rate).powi(years)
    }
}

/// Weight per-cycle results into a single combined result
pub fn combine_cycles<'a, I>(results: &[CycleResult], weights: I) -> CycleResult
where
    I: IntoIterator<Item = &'a f64>,
{
    results
        .iter()
        .zip(weights)
        .fold(CycleResult::default(), |acc, (result, &weight)| {
            let weight = Dimensionless(weight);
            CycleResult {
                co2: acc.co2 + result.co2 * weight,
                kwh: acc.kwh + result.kwh * weight,
            }
        })
}
