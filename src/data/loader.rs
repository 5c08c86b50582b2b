use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value as JsonValue;

use super::spectrum::Spectrum;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a binned mass spectrum from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.json` – `{ "shots": 1000, "mass": [...], "counts": [...] }`
/// * `.csv`  – header row with `mass` and `counts` columns, one bin per row
///
/// `shots` overrides whatever the file says; CSV files carry no shot count
/// and default to 1.
pub fn load_spectrum(path: &Path, shots: Option<u64>) -> Result<Spectrum> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let spectrum = match ext.as_str() {
        "json" => load_json(path)?,
        "csv" => load_csv(path)?,
        other => bail!("Unsupported spectrum file extension: .{other}"),
    };

    Ok(match shots {
        Some(n) => spectrum.with_shots(n),
        None => spectrum,
    })
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

fn load_json(path: &Path) -> Result<Spectrum> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let obj = root.as_object().context("Expected top-level JSON object")?;

    let mass = json_array_to_f64(obj.get("mass"), "mass")?;
    let counts = json_array_to_f64(obj.get("counts"), "counts")?;
    if mass.len() != counts.len() {
        bail!("mass has {} values but counts has {}", mass.len(), counts.len());
    }

    let shots = match obj.get("shots") {
        None | Some(JsonValue::Null) => 1,
        Some(v) => v.as_u64().context("'shots' is not a non-negative integer")?,
    };

    Ok(Spectrum::from_bins(mass.into_iter().zip(counts).collect(), shots))
}

fn json_array_to_f64(val: Option<&JsonValue>, col: &str) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("missing or invalid '{col}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| {
            v.as_f64()
                .filter(|x| x.is_finite())
                .with_context(|| format!("{col}[{j}]: not a finite number"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row naming a `mass` and a `counts` column; any other
/// columns are ignored.
fn load_csv(path: &Path) -> Result<Spectrum> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers = reader.headers().context("reading CSV headers")?.clone();

    let mass_idx = headers
        .iter()
        .position(|h| h.trim() == "mass")
        .context("CSV missing 'mass' column")?;
    let counts_idx = headers
        .iter()
        .position(|h| h.trim() == "counts")
        .context("CSV missing 'counts' column")?;

    let mut bins = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let mass = parse_cell(record.get(mass_idx), row_no, "mass")?;
        let counts = parse_cell(record.get(counts_idx), row_no, "counts")?;
        bins.push((mass, counts));
    }

    Ok(Spectrum::from_bins(bins, 1))
}

fn parse_cell(cell: Option<&str>, row: usize, col: &str) -> Result<f64> {
    let tok = cell.unwrap_or("").trim();
    let value = tok
        .parse::<f64>()
        .with_context(|| format!("Row {row}, {col}: '{tok}' is not a number"))?;
    if !value.is_finite() {
        bail!("Row {row}, {col}: '{tok}' is not finite");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::integral::SpectrumProvider;

    #[test]
    fn csv_and_json_load_the_same_bins() {
        let dir = tempfile::tempdir().unwrap();

        let csv_path = dir.path().join("s.csv");
        std::fs::write(&csv_path, "mass,counts\n2.0,5\n1.0,3\n").unwrap();
        let from_csv = load_spectrum(&csv_path, Some(50)).unwrap();

        let json_path = dir.path().join("s.json");
        std::fs::write(&json_path, r#"{"shots": 50, "mass": [1.0, 2.0], "counts": [3, 5]}"#).unwrap();
        let from_json = load_spectrum(&json_path, None).unwrap();

        assert_eq!(from_csv, from_json);
        assert_eq!(from_json.shots(), 50);
        assert_eq!(from_json.mass(), [1.0, 2.0]);
    }

    #[test]
    fn bad_inputs_are_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let bad_cell = dir.path().join("bad.csv");
        std::fs::write(&bad_cell, "mass,counts\n1.0,lots\n").unwrap();
        assert!(load_spectrum(&bad_cell, None).is_err());

        let no_col = dir.path().join("nocol.csv");
        std::fs::write(&no_col, "mass,intensity\n1.0,2\n").unwrap();
        assert!(load_spectrum(&no_col, None).is_err());

        let uneven = dir.path().join("uneven.json");
        std::fs::write(&uneven, r#"{"mass": [1.0], "counts": []}"#).unwrap();
        assert!(load_spectrum(&uneven, None).is_err());

        assert!(load_spectrum(Path::new("spectrum.crd"), None).is_err());
    }

    #[test]
    fn non_finite_cells_are_rejected() {
        let dir = tempfile::tempdir().unwrap();

        for (i, cell) in ["-nan", "nan", "inf", "-infinity"].iter().enumerate() {
            let path = dir.path().join(format!("nf{i}.csv"));
            std::fs::write(&path, format!("mass,counts\n{cell},5\n1,1\n2,1\n")).unwrap();
            let err = load_spectrum(&path, None).unwrap_err();
            assert!(err.to_string().contains("not finite"), "{cell}: {err}");
        }

        let path = dir.path().join("inf_counts.csv");
        std::fs::write(&path, "mass,counts\n1,inf\n").unwrap();
        assert!(load_spectrum(&path, None).is_err());
    }
}
