//! Code for reading regulatory classes from a CSV file.
use super::{check_non_negative, input_err_msg, read_csv_id_file};
use crate::policy::{RegClassID, RegClassMap, RegulatoryClass};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use itertools::Itertools;
use std::path::Path;
use std::sync::Arc;

const REGULATORY_CLASSES_FILE_NAME: &str = "regulatory_classes.csv";

/// Check that a regulatory class's coefficients make sense
fn validate_reg_class(reg_class: &RegulatoryClass) -> Result<()> {
    check_non_negative(&[
        ("ballast_mass", reg_class.ballast_mass.0),
        ("ballast_fraction", reg_class.ballast_fraction.0),
        ("target_min", reg_class.target_min.0),
        ("target_max", reg_class.target_max.0),
        ("lifetime_vmt", reg_class.lifetime_vmt.0),
    ])?;
    ensure!(
        reg_class.target_slope.is_finite() && reg_class.target_intercept.0.is_finite(),
        "target_slope and target_intercept must be finite"
    );
    ensure!(
        reg_class.target_min <= reg_class.target_max,
        "target_min cannot be greater than target_max"
    );

    Ok(())
}

/// Read regulatory classes from the model directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// A map of regulatory classes, keyed by ID
pub fn read_regulatory_classes(model_dir: &Path) -> Result<RegClassMap> {
    let file_path = model_dir.join(REGULATORY_CLASSES_FILE_NAME);
    let reg_classes: IndexMap<RegClassID, RegulatoryClass> = read_csv_id_file(&file_path)?;

    reg_classes
        .into_iter()
        .map(|(id, reg_class)| {
            validate_reg_class(&reg_class)
                .with_context(|| format!("Invalid regulatory class {id}"))
                .with_context(|| input_err_msg(&file_path))?;
            Ok((id, Arc::new(reg_class)))
        })
        .try_collect()
}
