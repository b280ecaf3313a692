//! Code for reading structure materials from a CSV file.
use super::{check_non_negative, input_err_msg, read_csv_id_file};
use crate::material::{StructureMaterial, StructureMaterialID, StructureMaterialMap};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use itertools::Itertools;
use std::path::Path;
use std::sync::Arc;

const STRUCTURE_MATERIALS_FILE_NAME: &str = "structure_materials.csv";

/// Read structure materials from the model directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// A map of materials, keyed by ID, in file order
pub fn read_structure_materials(model_dir: &Path) -> Result<StructureMaterialMap> {
    let file_path = model_dir.join(STRUCTURE_MATERIALS_FILE_NAME);
    let materials: IndexMap<StructureMaterialID, StructureMaterial> =
        read_csv_id_file(&file_path)?;

    materials
        .into_iter()
        .map(|(id, material)| {
            check_non_negative(&[
                ("mass_per_area", material.mass_per_area.0),
                ("cost_per_mass", material.cost_per_mass.0),
            ])
            .with_context(|| format!("Invalid structure material {id}"))
            .with_context(|| input_err_msg(&file_path))?;

            Ok((id, Arc::new(material)))
        })
        .try_collect()
}
