//! This module defines the physical unit types used when sizing and costing vehicles.
//!
//! Values are held as `f64` in US customary units, which is what the response surfaces and cost
//! coefficients are fitted against: pounds, horsepower, kWh, miles, square feet, dollars and grams.
use float_cmp::{ApproxEq, F64Margin};
use serde::{Deserialize, Serialize};

/// Common methods for all unit types
pub trait UnitType: Copy + PartialOrd {
    /// Create from an `f64` value
    fn new(value: f64) -> Self;

    /// The underlying `f64` value
    fn value(&self) -> f64;

    /// Whether the value is finite
    fn is_finite(&self) -> bool {
        self.value().is_finite()
    }
}

macro_rules! unit_struct {
    ($name:ident) => {
        /// Represents a type of quantity.
        #[derive(
            Debug,
            Default,
            Clone,
            Copy,
            PartialEq,
            PartialOrd,
            Serialize,
            Deserialize,
            derive_more::Add,
            derive_more::Sub,
            derive_more::AddAssign,
            derive_more::SubAssign,
            derive_more::Display,
        )]
        #[serde(transparent)]
        pub struct $name(pub f64);

        impl UnitType for $name {
            fn new(value: f64) -> Self {
                Self(value)
            }

            fn value(&self) -> f64 {
                self.0
            }
        }

        impl $name {
            /// The larger of `self` and `other`
            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }

            /// The smaller of `self` and `other`
            pub fn min(self, other: Self) -> Self {
                Self(self.0.min(other.0))
            }
        }

        impl ApproxEq for $name {
            type Margin = F64Margin;

            fn approx_eq<T: Into<Self::Margin>>(self, other: Self, margin: T) -> bool {
                self.0.approx_eq(other.0, margin)
            }
        }

        impl std::ops::Mul<Dimensionless> for $name {
            type Output = $name;
            fn mul(self, rhs: Dimensionless) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl std::ops::Mul<$name> for Dimensionless {
            type Output = $name;
            fn mul(self, rhs: $name) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl std::ops::Div<Dimensionless> for $name {
            type Output = $name;
            fn div(self, rhs: Dimensionless) -> $name {
                $name(self.0 / rhs.0)
            }
        }

        impl std::ops::Div<$name> for $name {
            type Output = Dimensionless;
            fn div(self, rhs: $name) -> Dimensionless {
                Dimensionless(self.0 / rhs.0)
            }
        }

        impl std::iter::Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                iter.fold($name(0.0), |a, b| a + b)
            }
        }
    };
}

macro_rules! impl_mul {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Mul<$Rhs> for $Lhs {
            type Output = $Out;
            fn mul(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 * rhs.0)
            }
        }
        impl std::ops::Mul<$Lhs> for $Rhs {
            type Output = $Out;
            fn mul(self, lhs: $Lhs) -> $Out {
                <$Out>::new(self.0 * lhs.0)
            }
        }
    };
}

macro_rules! impl_div {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Div<$Rhs> for $Lhs {
            type Output = $Out;
            fn div(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 / rhs.0)
            }
        }
    };
}

/// Represents a dimensionless quantity.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    PartialOrd,
    Serialize,
    Deserialize,
    derive_more::Add,
    derive_more::Sub,
    derive_more::AddAssign,
    derive_more::Display,
)]
#[serde(transparent)]
pub struct Dimensionless(pub f64);

impl UnitType for Dimensionless {
    fn new(value: f64) -> Self {
        Self(value)
    }

    fn value(&self) -> f64 {
        self.0
    }
}

impl Dimensionless {
    /// Raise to an integer power
    pub fn powi(self, rhs: i32) -> Self {
        Self(self.0.powi(rhs))
    }
}

impl std::ops::Mul for Dimensionless {
    type Output = Dimensionless;

    fn mul(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 * rhs.0)
    }
}

impl std::ops::Div for Dimensionless {
    type Output = Dimensionless;

    fn div(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 / rhs.0)
    }
}

impl ApproxEq for Dimensionless {
    type Margin = F64Margin;

    fn approx_eq<T: Into<Self::Margin>>(self, other: Self, margin: T) -> bool {
        self.0.approx_eq(other.0, margin)
    }
}

// Base quantities
unit_struct!(Mass);
unit_struct!(Power);
unit_struct!(Energy);
unit_struct!(Distance);
unit_struct!(Area);
unit_struct!(Money);
unit_struct!(Co2eMass);

// Derived quantities
unit_struct!(MassPerPower);
unit_struct!(MassPerArea);
unit_struct!(MassPerEnergy);
unit_struct!(MoneyPerMass);
unit_struct!(MoneyPerPower);
unit_struct!(MoneyPerEnergy);
unit_struct!(MoneyPerDistance);
unit_struct!(EnergyPerDistance);
unit_struct!(Co2ePerDistance);
unit_struct!(Co2ePerEnergy);

// Division rules
impl_div!(Mass, MassPerPower, Power);
impl_div!(Energy, Distance, EnergyPerDistance);
impl_div!(Energy, EnergyPerDistance, Distance);
impl_div!(Mass, Area, MassPerArea);

// Multiplication rules
impl_mul!(MassPerPower, Power, Mass);
impl_mul!(MassPerArea, Area, Mass);
impl_mul!(MassPerEnergy, Energy, Mass);
impl_mul!(MoneyPerMass, Mass, Money);
impl_mul!(MoneyPerPower, Power, Money);
impl_mul!(MoneyPerEnergy, Energy, Money);
impl_mul!(MoneyPerDistance, Distance, Money);
impl_mul!(EnergyPerDistance, Distance, Energy);
impl_mul!(Co2ePerDistance, Distance, Co2eMass);
impl_mul!(Co2ePerEnergy, EnergyPerDistance, Co2ePerDistance);

/// Kilowatts per horsepower
const KW_PER_HP: f64 = 0.745_699_872;

/// Grams per megagram
const GRAMS_PER_MEGAGRAM: f64 = 1e6;

impl Power {
    /// The value in kilowatts
    pub fn to_kw(self) -> f64 {
        self.0 * KW_PER_HP
    }

    /// Create from a value in kilowatts
    pub fn from_kw(kw: f64) -> Self {
        Self(kw / KW_PER_HP)
    }
}

impl Co2eMass {
    /// The value in megagrams (metric tonnes)
    pub fn to_megagrams(self) -> f64 {
        self.0 / GRAMS_PER_MEGAGRAM
    }
}
