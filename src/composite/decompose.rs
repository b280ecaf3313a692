//! Recovers per-member values from a chosen emissions level on a composite frontier.
use super::{CompositePoint, CompositeVehicle};
use crate::attribute::{Attribute, AttributeValues};
use crate::frontier::FrontierPoint;
use crate::interp::Interp1D;
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use strum::IntoEnumIterator;

/// Interpolate each member's values at `emissions` along a composite frontier.
///
/// Levels outside the frontier are clamped to its ends.
pub fn member_values_at(
    frontier: &[CompositePoint],
    emissions: f64,
) -> Result<Vec<AttributeValues>> {
    ensure!(
        emissions.is_finite(),
        "Emissions level must be finite (got {emissions})"
    );
    let first = frontier
        .first()
        .context("Cannot decompose an empty composite frontier")?;
    let x = frontier.iter().map(FrontierPoint::emissions).collect_vec();

    (0..first.members.len())
        .map(|member| {
            let mut values = AttributeValues::default();
            for attribute in Attribute::iter() {
                let f_x = frontier
                    .iter()
                    .map(|point| point.members[member][attribute])
                    .collect_vec();
                values[attribute] = Interp1D::new(x.clone(), f_x)?.interpolate(emissions);
            }

            Ok(values)
        })
        .try_collect()
}

impl CompositeVehicle {
    /// Assign each member the values it takes at `emissions` on the composite frontier.
    ///
    /// Members' sales are their share of the composite's total sales.
    pub fn decompose(&mut self, emissions: f64) -> Result<()> {
        let member_values =
            member_values_at(&self.frontier, emissions).with_context(|| {
                format!(
                    "Failed to decompose composite vehicle {}/{}",
                    self.market_class_id, self.reg_class_id
                )
            })?;

        let total = self.total_registered_count;
        for ((vehicle, share), values) in self
            .vehicles
            .iter_mut()
            .zip(&self.shares)
            .zip(member_values)
        {
            vehicle.apply_operating_point(values, total * share);
        }

        Ok(())
    }
}
