//! The attributes tracked for every vehicle, cloud point and composite frontier point.
use crate::frontier::FrontierPoint;
use serde::Serialize;
use std::ops::{Index, IndexMut};
use strum::{Display, EnumCount, EnumIter, IntoStaticStr};

/// An attribute which is carried through composition and decomposition
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumCount, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Attribute {
    /// Certification CO2e, including upstream emissions (g/mi)
    CertCo2eGramsPerMile,
    /// Certification tailpipe CO2e, net of off-cycle credits (g/mi)
    CertDirectCo2eGramsPerMile,
    /// Certification energy consumption (kWh/mi)
    CertDirectKwhPerMile,
    /// On-road tailpipe CO2e (g/mi)
    OnroadDirectCo2eGramsPerMile,
    /// On-road energy consumption (kWh/mi)
    OnroadDirectKwhPerMile,
    /// CO2e target (g/mi)
    TargetCo2eGramsPerMile,
    /// Lifetime certification CO2e for one vehicle (Mg)
    CertCo2eMegagrams,
    /// Lifetime target CO2e for one vehicle (Mg)
    TargetCo2eMegagrams,
    /// Manufacturer cost ($)
    NewVehicleMfrCost,
    /// Manufacturer cost plus consumer fuel costs ($)
    NewVehicleMfrGeneralizedCost,
    /// Curb weight (lbs)
    CurbWeight,
    /// Rated power (hp)
    RatedPower,
    /// Battery capacity (kWh)
    BatteryKwh,
    /// Footprint (sq ft)
    Footprint,
}

/// A value for every [`Attribute`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttributeValues([f64; Attribute::COUNT]);

impl Default for AttributeValues {
    fn default() -> Self {
        Self([0.0; Attribute::COUNT])
    }
}

impl Index<Attribute> for AttributeValues {
    type Output = f64;

    fn index(&self, attribute: Attribute) -> &f64 {
        &self.0[attribute as usize]
    }
}

impl IndexMut<Attribute> for AttributeValues {
    fn index_mut(&mut self, attribute: Attribute) -> &mut f64 {
        &mut self.0[attribute as usize]
    }
}

impl AttributeValues {
    /// Build from a function giving the value of each attribute
    pub fn from_fn<F: FnMut(Attribute) -> f64>(mut f: F) -> Self {
        let mut values = Self::default();
        for attribute in <Attribute as strum::IntoEnumIterator>::iter() {
            values[attribute] = f(attribute);
        }

        values
    }

    /// The raw values, in attribute order
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Weighted combination `(self * self_weight + other * other_weight) / total`
    pub fn weighted_average(&self, self_weight: f64, other: &Self, other_weight: f64) -> Self {
        let total = self_weight + other_weight;
        Self(std::array::from_fn(|i| {
            (self.0[i] * self_weight + other.0[i] * other_weight) / total
        }))
    }
}

/// Attribute values sit on the certification CO2e / generalized cost plane
impl FrontierPoint for AttributeValues {
    fn emissions(&self) -> f64 {
        self[Attribute::CertCo2eGramsPerMile]
    }

    fn cost(&self) -> f64 {
        self[Attribute::NewVehicleMfrGeneralizedCost]
    }
}
