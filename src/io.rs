use anyhow::{bail, Context, Result};
use std::path::Path;

use color_interp::{InterpolationResult, Point, ResultMap};

/// Reads one calibration table: `dim` coordinate columns followed by the
/// measured values. The first row is a header.
pub fn read_calibration(path: &Path, dim: usize) -> Result<Vec<(Point, Vec<f64>)>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open calibration file: {}", path.display()))?;

    let columns = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .len();
    if columns <= dim {
        bail!(
            "{} has {} columns; expected {} coordinates and at least one value",
            path.display(),
            columns,
            dim
        );
    }

    let mut pairs = Vec::new();
    for (row, record) in reader.records().enumerate() {
        // Header is line 1.
        let line = row + 2;
        let record =
            record.with_context(|| format!("Failed to read line {} of {}", line, path.display()))?;
        let fields: Vec<f64> = record
            .iter()
            .enumerate()
            .map(|(col, field)| {
                field.parse::<f64>().with_context(|| {
                    format!(
                        "Invalid number '{}' at line {}, column {} of {}",
                        field,
                        line,
                        col + 1,
                        path.display()
                    )
                })
            })
            .collect::<Result<_>>()?;
        let point = Point::new(&fields[..dim])
            .with_context(|| format!("Invalid control point at line {} of {}", line, path.display()))?;
        pairs.push((point, fields[dim..].to_vec()));
    }
    Ok(pairs)
}

/// Channel name for a calibration file: its stem.
pub fn channel_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("channel")
        .to_string()
}

/// Writes `channel, x0.., status, v0..` rows in channel and query order.
pub fn write_results(path: &Path, results: &ResultMap, queries: &[Point], dim: usize) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;

    let value_len = results
        .values()
        .flat_map(|map| map.values())
        .filter_map(InterpolationResult::value)
        .map(|v| v.len())
        .max()
        .unwrap_or(0);

    let mut header = vec!["channel".to_string()];
    header.extend((0..dim).map(|i| format!("x{}", i)));
    header.push("status".to_string());
    header.extend((0..value_len).map(|i| format!("v{}", i)));
    writer.write_record(&header)?;

    for (name, map) in results {
        for query in queries {
            let result = match map.get(query) {
                Some(result) => result,
                None => continue,
            };
            let mut record = vec![name.clone()];
            record.extend(query.coords().iter().map(|c| c.to_string()));
            record.push(result.status().to_string());
            if let Some(values) = result.value() {
                record.extend(values.iter().map(|v| v.to_string()));
            }
            writer.write_record(&record)?;
        }
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write output file: {}", path.display()))?;
    Ok(())
}
