use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use crate::models::{Category, Snapshot};

/// Write one row per category state plus a trailing Ready to Assign row.
/// Returns the number of category rows written.
pub fn write_snapshot_csv<W: Write>(
    snapshot: &Snapshot,
    categories: &[Category],
    writer: W,
) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["period", "category", "assigned", "activity", "available"])?;

    let period = snapshot.period.to_string();
    for state in &snapshot.categories {
        let name = Category::find_by_id(categories, state.category_id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| format!("#{}", state.category_id));
        let assigned = state.assigned.to_string();
        let activity = state.activity.to_string();
        let available = state.available.to_string();
        wtr.write_record([
            period.as_str(),
            name.as_str(),
            assigned.as_str(),
            activity.as_str(),
            available.as_str(),
        ])?;
    }
    let rta = snapshot.ready_to_assign.to_string();
    wtr.write_record([period.as_str(), "Ready to Assign", "", "", rta.as_str()])?;
    wtr.flush()?;
    Ok(snapshot.categories.len())
}

pub fn export_snapshot(snapshot: &Snapshot, categories: &[Category], path: &Path) -> Result<usize> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_snapshot_csv(snapshot, categories, file)
}

#[cfg(test)]
mod tests;
