//! Regulatory classes and the adjustments which turn drive-cycle results into compliance values.
//!
//! These are deliberately simple coefficient models: off-cycle credits, upstream emissions from
//! grid electricity, fixed on-road gap factors and a linear footprint-based CO2e target.
use crate::id::{define_id_getter, define_id_type};
use crate::model::ModelParameters;
use crate::package::{CycleResult, TechnologyPackage};
use crate::units::{Area, Co2ePerDistance, Dimensionless, Distance, EnergyPerDistance, Mass};
use indexmap::IndexMap;
use serde::Deserialize;
use std::sync::Arc;

define_id_type! {RegClassID}

/// A map of [`RegulatoryClass`]es, keyed by ID
pub type RegClassMap = IndexMap<RegClassID, Arc<RegulatoryClass>>;

/// A regulatory class (e.g. car or truck) with its own test weight rules and target curve
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegulatoryClass {
    /// Unique identifier for the class
    pub id: RegClassID,
    /// Text description of the class
    pub description: String,
    /// Fixed ballast added to curb weight for testing
    pub ballast_mass: Mass,
    /// Ballast added for testing as a fraction of curb weight
    pub ballast_fraction: Dimensionless,
    /// Slope of the target curve (g/mi per square foot of footprint)
    pub target_slope: f64,
    /// Intercept of the target curve
    pub target_intercept: Co2ePerDistance,
    /// Lower bound of the target curve
    pub target_min: Co2ePerDistance,
    /// Upper bound of the target curve
    pub target_max: Co2ePerDistance,
    /// Lifetime distance travelled by a vehicle in this class
    pub lifetime_vmt: Distance,
}
define_id_getter! {RegulatoryClass, RegClassID}

impl RegulatoryClass {
    /// Equivalent test weight for a vehicle with the given curb weight
    pub fn equivalent_test_weight(&self, curb_weight: Mass) -> Mass {
        curb_weight + self.ballast_mass + curb_weight * self.ballast_fraction
    }

    /// The CO2e target for a vehicle with the given footprint
    pub fn target_co2e(&self, footprint: Area) -> Co2ePerDistance {
        let target = Co2ePerDistance(self.target_slope * footprint.0) + self.target_intercept;
        target.max(self.target_min).min(self.target_max)
    }

    /// Lifetime CO2e for one vehicle emitting at the given rate, in megagrams
    pub fn lifetime_megagrams(&self, rate: Co2ePerDistance) -> f64 {
        (rate * self.lifetime_vmt).to_megagrams()
    }
}

/// On-road energy consumption for the given certification value
pub fn onroad_kwh(parameters: &ModelParameters, cert_kwh: EnergyPerDistance) -> EnergyPerDistance {
    cert_kwh / Dimensionless(1.0 - parameters.onroad_kwh_gap)
}

/// On-road tailpipe emissions for the given certification value
pub fn onroad_co2e(parameters: &ModelParameters, cert_co2e: Co2ePerDistance) -> Co2ePerDistance {
    cert_co2e / Dimensionless(1.0 - parameters.onroad_co2_gap)
}

/// The compliance quantities for one sized vehicle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ComplianceValues {
    /// Cycle-weighted tailpipe CO2e, before credits
    pub cert_direct_oncycle_co2e: Co2ePerDistance,
    /// Tailpipe CO2e less off-cycle credits
    pub cert_direct_co2e: Co2ePerDistance,
    /// Cycle-weighted energy consumption
    pub cert_direct_kwh: EnergyPerDistance,
    /// Upstream emissions from electricity generation
    pub upstream_co2e: Co2ePerDistance,
    /// Certification CO2e (direct plus upstream)
    pub cert_co2e: Co2ePerDistance,
    /// On-road tailpipe CO2e
    pub onroad_direct_co2e: Co2ePerDistance,
    /// On-road energy consumption
    pub onroad_direct_kwh: EnergyPerDistance,
    /// CO2e target
    pub target_co2e: Co2ePerDistance,
    /// Lifetime certification CO2e for one vehicle (Mg)
    pub cert_co2e_megagrams: f64,
    /// Lifetime target CO2e for one vehicle (Mg)
    pub target_co2e_megagrams: f64,
}

impl ComplianceValues {
    /// Calculate compliance values from cycle-weighted results
    pub fn new(
        parameters: &ModelParameters,
        package: &TechnologyPackage,
        reg_class: &RegulatoryClass,
        combined: &CycleResult,
        footprint: Area,
    ) -> Self {
        let cert_direct_oncycle_co2e = combined.co2;
        let cert_direct_co2e =
            (cert_direct_oncycle_co2e - package.offcycle_credit).max(Co2ePerDistance(0.0));
        let cert_direct_kwh = combined.kwh;
        let upstream_co2e = parameters.upstream_co2e_per_kwh * cert_direct_kwh;
        let cert_co2e = cert_direct_co2e + upstream_co2e;
        let target_co2e = reg_class.target_co2e(footprint);

        Self {
            cert_direct_oncycle_co2e,
            cert_direct_co2e,
            cert_direct_kwh,
            upstream_co2e,
            cert_co2e,
            onroad_direct_co2e: onroad_co2e(parameters, cert_direct_oncycle_co2e),
            onroad_direct_kwh: onroad_kwh(parameters, cert_direct_kwh),
            target_co2e,
            cert_co2e_megagrams: reg_class.lifetime_megagrams(cert_co2e),
            target_co2e_megagrams: reg_class.lifetime_megagrams(target_co2e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{ice_package, model_parameters, reg_class};
    use crate::package::TechnologyPackage;
    use crate::units::Co2ePerEnergy;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_equivalent_test_weight(reg_class: RegulatoryClass) {
        assert_eq!(reg_class.equivalent_test_weight(Mass(3000.0)), Mass(3300.0));
    }

    #[rstest]
    #[case(30.0, 160.0)] // clamped to minimum
    #[case(50.0, 200.0)]
    #[case(70.0, 240.0)] // clamped to maximum
    fn test_target_co2e(reg_class: RegulatoryClass, #[case] footprint: f64, #[case] expected: f64) {
        assert_approx_eq!(
            Co2ePerDistance,
            reg_class.target_co2e(Area(footprint)),
            Co2ePerDistance(expected)
        );
    }

    #[rstest]
    fn test_compliance_values(
        mut model_parameters: ModelParameters,
        mut ice_package: TechnologyPackage,
        reg_class: RegulatoryClass,
    ) {
        model_parameters.upstream_co2e_per_kwh = Co2ePerEnergy(500.0);
        ice_package.offcycle_credit = Co2ePerDistance(10.0);
        let combined = CycleResult {
            co2: Co2ePerDistance(250.0),
            kwh: EnergyPerDistance(0.1),
        };
        let values = ComplianceValues::new(
            &model_parameters,
            &ice_package,
            &reg_class,
            &combined,
            Area(50.0),
        );

        assert_eq!(values.cert_direct_co2e, Co2ePerDistance(240.0));
        assert_approx_eq!(Co2ePerDistance, values.upstream_co2e, Co2ePerDistance(50.0));
        assert_approx_eq!(Co2ePerDistance, values.cert_co2e, Co2ePerDistance(290.0));
        assert_approx_eq!(
            Co2ePerDistance,
            values.onroad_direct_co2e,
            Co2ePerDistance(250.0 / 0.8)
        );
        assert_approx_eq!(f64, values.cert_co2e_megagrams, 290.0 * 0.15);
        assert_approx_eq!(f64, values.target_co2e_megagrams, 200.0 * 0.15);
    }

    #[rstest]
    fn test_offcycle_credit_cannot_go_negative(
        model_parameters: ModelParameters,
        mut ice_package: TechnologyPackage,
        reg_class: RegulatoryClass,
    ) {
        ice_package.offcycle_credit = Co2ePerDistance(300.0);
        let combined = CycleResult {
            co2: Co2ePerDistance(250.0),
            kwh: EnergyPerDistance(0.0),
        };
        let values = ComplianceValues::new(
            &model_parameters,
            &ice_package,
            &reg_class,
            &combined,
            Area(50.0),
        );
        assert_eq!(values.cert_direct_co2e, Co2ePerDistance(0.0));
    }
}
