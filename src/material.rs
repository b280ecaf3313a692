//! Body structure materials.
use crate::id::{define_id_getter, define_id_type};
use crate::units::{Area, Mass, MassPerArea, Money, MoneyPerMass};
use indexmap::IndexMap;
use serde::Deserialize;
use std::sync::Arc;

define_id_type! {StructureMaterialID}

/// A map of [`StructureMaterial`]s, keyed by material ID
pub type StructureMaterialMap = IndexMap<StructureMaterialID, Arc<StructureMaterial>>;

/// A material the vehicle body structure can be built from
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StructureMaterial {
    /// Unique identifier for the material (e.g. "steel")
    pub id: StructureMaterialID,
    /// Text description of the material
    pub description: String,
    /// Structure mass per unit of vehicle footprint
    pub mass_per_area: MassPerArea,
    /// Cost per unit of structure mass
    pub cost_per_mass: MoneyPerMass,
}
define_id_getter! {StructureMaterial, StructureMaterialID}

impl StructureMaterial {
    /// The mass of a body structure with the given footprint
    pub fn structure_mass(&self, footprint: Area) -> Mass {
        self.mass_per_area * footprint
    }

    /// The cost of a body structure of the given mass
    pub fn structure_cost(&self, mass: Mass) -> Money {
        self.cost_per_mass * mass
    }
}
