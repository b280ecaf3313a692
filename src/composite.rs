//! Composite vehicles combine the frontiers of vehicles which are treated as one unit for
//! compliance.
//!
//! Members are added one at a time. Each addition pairs every point of the running composite
//! frontier with every point of the new member's frontier, takes the sales-weighted average of all
//! tracked attributes for each pairing and reduces the result back to a frontier before the next
//! member is added. Every composite point keeps the values of each member it was built from, so
//! that a chosen point can later be decomposed exactly.
use crate::attribute::{Attribute, AttributeValues};
use crate::frontier::{FrontierPoint, build_frontier, cost_at};
use crate::policy::RegClassID;
use crate::vehicle::{MarketClassID, Vehicle};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use itertools::{Itertools, iproduct};
use log::debug;

pub mod decompose;

/// A point on a composite frontier
#[derive(Debug, Clone, PartialEq)]
pub struct CompositePoint {
    /// Sales-weighted values over all members
    pub values: AttributeValues,
    /// Each member's own values, in member order
    pub members: Vec<AttributeValues>,
}

impl FrontierPoint for CompositePoint {
    fn emissions(&self) -> f64 {
        self.values.emissions()
    }

    fn cost(&self) -> f64 {
        self.values.cost()
    }
}

/// Compose the frontiers of several members into a single frontier.
///
/// # Arguments
///
/// * `frontiers` - Each member's frontier
/// * `weights` - Each member's weight, which need not sum to 1
/// * `affinity_factor` - How closely the simplified frontiers follow the combined points
pub fn compose(
    frontiers: &[Vec<AttributeValues>],
    weights: &[f64],
    affinity_factor: f64,
) -> Result<Vec<CompositePoint>> {
    ensure!(
        frontiers.len() == weights.len(),
        "Got {} frontiers but {} weights",
        frontiers.len(),
        weights.len()
    );
    let mut members = frontiers.iter().zip(weights);
    let (first, &first_weight) = members
        .next()
        .context("Cannot compose an empty set of frontiers")?;
    ensure!(!first.is_empty(), "Cannot compose an empty frontier");

    let mut composite = first
        .iter()
        .map(|values| CompositePoint {
            values: *values,
            members: vec![*values],
        })
        .collect_vec();
    let mut cumulative_weight = first_weight;

    for (index, (frontier, &weight)) in members.enumerate() {
        ensure!(!frontier.is_empty(), "Cannot compose an empty frontier");

        // While every member so far has zero weight, average them equally
        let (composite_weight, member_weight) = if cumulative_weight + weight > 0.0 {
            (cumulative_weight, weight)
        } else {
            ((index + 1) as f64, 1.0)
        };

        let points = iproduct!(&composite, frontier)
            .map(|(point, values)| {
                let mut members = Vec::with_capacity(point.members.len() + 1);
                members.extend_from_slice(&point.members);
                members.push(*values);

                CompositePoint {
                    values: point.values.weighted_average(
                        composite_weight,
                        values,
                        member_weight,
                    ),
                    members,
                }
            })
            .collect_vec();

        composite = build_frontier(points, affinity_factor)?;
        cumulative_weight += weight;
    }

    Ok(composite)
}

/// A sales-weighted group of vehicles sharing a market class and regulatory class
#[derive(Debug, Clone)]
pub struct CompositeVehicle {
    /// The market class shared by all members
    pub market_class_id: MarketClassID,
    /// The regulatory class shared by all members
    pub reg_class_id: RegClassID,
    vehicles: Vec<Vehicle>,
    /// Member shares of total sales, summing to 1
    shares: Vec<f64>,
    total_registered_count: f64,
    frontier: Vec<CompositePoint>,
}

impl CompositeVehicle {
    /// Build a composite vehicle and its frontier from vehicles with up-to-date frontiers.
    ///
    /// If no member has any sales, members are weighted equally when shaping the frontier.
    pub fn new(vehicles: Vec<Vehicle>, affinity_factor: f64) -> Result<Self> {
        let first = vehicles
            .first()
            .context("Cannot build a composite vehicle with no members")?;
        let market_class_id = first.market_class_id.clone();
        let reg_class_id = first.reg_class_id().clone();
        for vehicle in &vehicles {
            ensure!(
                vehicle.market_class_id == market_class_id
                    && *vehicle.reg_class_id() == reg_class_id,
                "Vehicle {} is not in market class {market_class_id} and regulatory class \
                {reg_class_id}",
                vehicle.id
            );
            ensure!(
                !vehicle.frontier.is_empty(),
                "Vehicle {} has no frontier",
                vehicle.id
            );
        }

        let total_registered_count: f64 = vehicles
            .iter()
            .map(|vehicle| vehicle.initial_registered_count)
            .sum();
        let shares = if total_registered_count > 0.0 {
            vehicles
                .iter()
                .map(|vehicle| vehicle.initial_registered_count / total_registered_count)
                .collect_vec()
        } else {
            vec![1.0 / vehicles.len() as f64; vehicles.len()]
        };

        let frontiers = vehicles
            .iter()
            .map(|vehicle| vehicle.frontier.iter().map(|point| *point.values()).collect_vec())
            .collect_vec();
        let frontier = compose(&frontiers, &shares, affinity_factor).with_context(|| {
            format!(
                "Failed to compose vehicles in market class {market_class_id} and regulatory \
                class {reg_class_id}"
            )
        })?;

        debug!(
            "Composite vehicle {market_class_id}/{reg_class_id}: {} members, {} frontier points",
            vehicles.len(),
            frontier.len()
        );

        Ok(Self {
            market_class_id,
            reg_class_id,
            vehicles,
            shares,
            total_registered_count,
            frontier,
        })
    }

    /// The composite frontier
    pub fn frontier(&self) -> &[CompositePoint] {
        &self.frontier
    }

    /// The member vehicles
    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    /// Release the member vehicles
    pub fn into_vehicles(self) -> Vec<Vehicle> {
        self.vehicles
    }

    /// Each member's share of sales (all zero if there are no sales)
    pub fn weights(&self) -> Vec<f64> {
        if self.total_registered_count > 0.0 {
            self.shares.clone()
        } else {
            vec![0.0; self.shares.len()]
        }
    }

    /// Total sales over all members
    pub fn total_registered_count(&self) -> f64 {
        self.total_registered_count
    }

    /// Change the total sales, which are divided between members on decomposition
    pub fn set_total_registered_count(&mut self, count: f64) -> Result<()> {
        ensure!(
            count.is_finite() && count >= 0.0,
            "Registered count must be a finite, non-negative number (got {count})"
        );
        self.total_registered_count = count;

        Ok(())
    }

    /// Sales-weighted average of an attribute over the members' current values
    pub fn weighted_attribute(&self, attribute: Attribute) -> f64 {
        self.vehicles
            .iter()
            .zip(self.weights())
            .map(|(vehicle, weight)| vehicle.values[attribute] * weight)
            .sum()
    }

    /// Generalized cost on the composite frontier at the given emissions level
    pub fn cost_at(&self, emissions: f64) -> Option<f64> {
        cost_at(&self.frontier, emissions)
    }
}

/// Group vehicles by market class and regulatory class, preserving input order
pub fn group_vehicles(
    vehicles: Vec<Vehicle>,
) -> IndexMap<(MarketClassID, RegClassID), Vec<Vehicle>> {
    let mut groups: IndexMap<_, Vec<Vehicle>> = IndexMap::new();
    for vehicle in vehicles {
        let key = (vehicle.market_class_id.clone(), vehicle.reg_class_id().clone());
        groups.entry(key).or_default().push(vehicle);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{
        assert_error, bev_vehicle, convex_frontier, ice_vehicle, model, with_frontier,
    };
    use crate::model::Model;
    use float_cmp::assert_approx_eq;
    use map_macro::hash_map;
    use rstest::rstest;
    use std::collections::HashMap;

    #[test]
    fn test_compose_single() {
        let frontier = convex_frontier(&[100.0, 150.0, 200.0]);
        let composite = compose(&[frontier.clone()], &[5.0], 10.0).unwrap();
        assert_eq!(composite.len(), 3);
        for (point, values) in composite.iter().zip(&frontier) {
            assert_eq!(point.values, *values);
            assert_eq!(point.members, [*values]);
        }
    }

    #[rstest]
    #[case(1.0, 40.0)]
    #[case(1000.0, 40.0)]
    #[case(1.0, 10.0)]
    #[case(1000.0, 10.0)]
    fn test_compose_identical_frontiers(#[case] weight: f64, #[case] affinity_factor: f64) {
        let frontier = convex_frontier(&[100.0, 150.0, 200.0, 250.0]);
        let composite = compose(
            &[frontier.clone(), frontier.clone()],
            &[weight, weight],
            affinity_factor,
        )
        .unwrap();

        for emissions in (0..=200).map(|i| 75.0 + f64::from(i)) {
            let expected = cost_at(&frontier, emissions).unwrap();
            assert_approx_eq!(
                f64,
                cost_at(&composite, emissions).unwrap(),
                expected,
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn test_compose_weighting() {
        let a = convex_frontier(&[100.0]);
        let b = convex_frontier(&[200.0]);
        let composite = compose(&[a.clone(), b.clone()], &[3.0, 1.0], 10.0).unwrap();

        assert_eq!(composite.len(), 1);
        let point = &composite[0];
        assert_approx_eq!(f64, point.emissions(), 125.0);
        assert_approx_eq!(f64, point.values[Attribute::CurbWeight], 3750.0);
        assert_eq!(point.members, [a[0], b[0]]);
    }

    #[rstest]
    #[case(&[0.0, 0.0, 0.0], 500.0 / 3.0)]
    #[case(&[0.0, 0.0, 1.0], 250.0)]
    #[case(&[0.0, 1.0, 1.0], 200.0)]
    fn test_compose_zero_weights(#[case] weights: &[f64], #[case] expected_emissions: f64) {
        let frontiers = [
            convex_frontier(&[100.0]),
            convex_frontier(&[150.0]),
            convex_frontier(&[250.0]),
        ];
        let composite = compose(&frontiers, weights, 10.0).unwrap();
        assert_eq!(composite[0].members.len(), 3);
        assert_approx_eq!(f64, composite[0].emissions(), expected_emissions);
    }

    #[test]
    fn test_compose_members_tracked() {
        let a = convex_frontier(&[100.0, 150.0, 200.0]);
        let b = convex_frontier(&[120.0, 180.0]);
        let composite = compose(&[a.clone(), b.clone()], &[1.0, 2.0], 10.0).unwrap();

        for point in &composite {
            assert!(a.contains(&point.members[0]));
            assert!(b.contains(&point.members[1]));
            let expected =
                (point.members[0].emissions() + 2.0 * point.members[1].emissions()) / 3.0;
            assert_approx_eq!(f64, point.emissions(), expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_compose_invalid() {
        assert_error!(
            compose(&[], &[], 10.0),
            "Cannot compose an empty set of frontiers"
        );
        assert_error!(
            compose(&[convex_frontier(&[100.0]), Vec::new()], &[1.0, 1.0], 10.0),
            "Cannot compose an empty frontier"
        );
        assert_error!(
            compose(&[convex_frontier(&[100.0])], &[1.0, 1.0], 10.0),
            "Got 1 frontiers but 2 weights"
        );
    }

    #[rstest]
    fn test_composite_vehicle(model: Model, ice_vehicle: Vehicle, bev_vehicle: Vehicle) {
        let ice_vehicle = with_frontier(&model, ice_vehicle);
        let bev_vehicle = with_frontier(&model, bev_vehicle);
        let composite =
            CompositeVehicle::new(vec![ice_vehicle.clone(), bev_vehicle.clone()], 10.0).unwrap();

        assert_eq!(composite.total_registered_count(), 1200.0);
        let weights = composite.weights();
        assert_approx_eq!(f64, weights.iter().sum::<f64>(), 1.0);
        assert_approx_eq!(f64, weights[0], 1000.0 / 1200.0);

        let frontier = composite.frontier();
        assert!(!frontier.is_empty());
        assert!(frontier.iter().all(|point| point.members.len() == 2));
        assert!(frontier.iter().tuple_windows().all(|(a, b)| a.emissions() < b.emissions()));

        let expected = (ice_vehicle.values[Attribute::CertCo2eGramsPerMile] * 1000.0
            + bev_vehicle.values[Attribute::CertCo2eGramsPerMile] * 200.0)
            / 1200.0;
        assert_approx_eq!(
            f64,
            composite.weighted_attribute(Attribute::CertCo2eGramsPerMile),
            expected
        );
    }

    #[rstest]
    fn test_composite_vehicle_no_sales(model: Model, mut ice_vehicle: Vehicle) {
        ice_vehicle.initial_registered_count = 0.0;
        let vehicle = with_frontier(&model, ice_vehicle);
        let mut other = vehicle.clone();
        other.id = "other".into();

        let mut composite = CompositeVehicle::new(vec![vehicle, other], 10.0).unwrap();
        assert_eq!(composite.weights(), [0.0, 0.0]);
        assert!(!composite.frontier().is_empty());

        composite.set_total_registered_count(100.0).unwrap();
        assert_eq!(composite.weights(), [0.5, 0.5]);
        assert!(composite.set_total_registered_count(-1.0).is_err());
    }

    #[rstest]
    fn test_composite_vehicle_mismatched(model: Model, ice_vehicle: Vehicle) {
        let vehicle = with_frontier(&model, ice_vehicle);
        let mut other = vehicle.clone();
        other.id = "truck".into();
        other.market_class_id = "pickup".into();

        assert_error!(
            CompositeVehicle::new(vec![vehicle, other], 10.0),
            "Vehicle truck is not in market class sedan and regulatory class car"
        );
        assert_error!(
            CompositeVehicle::new(Vec::new(), 10.0),
            "Cannot build a composite vehicle with no members"
        );
    }

    #[rstest]
    fn test_group_vehicles(ice_vehicle: Vehicle, bev_vehicle: Vehicle) {
        let mut truck = ice_vehicle.clone();
        truck.id = "truck".into();
        truck.market_class_id = "pickup".into();

        let groups = group_vehicles(vec![ice_vehicle, truck, bev_vehicle]);
        assert_eq!(groups.len(), 2);
        let (key, members) = groups.first().unwrap();
        assert_eq!(key.0, MarketClassID::new("sedan"));
        assert_eq!(
            members.iter().map(|vehicle| vehicle.id.to_string()).collect_vec(),
            ["sedan_ice", "sedan_bev"]
        );

        let sizes: HashMap<&str, usize> = groups
            .iter()
            .map(|((market_class_id, _), members)| (&*market_class_id.0, members.len()))
            .collect();
        assert_eq!(sizes, hash_map! {"sedan" => 2, "pickup" => 1});
    }
}
