use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{
    AstecaCluster, Cell, CrossMatch, LiteratureRecord, LiteratureTable, Measurement, Photometry,
};
use crate::analysis::deproject::{parse_dms, parse_hms};
use crate::error::CatalogError;

/// Iterate over `(line_number, line)` pairs, skipping blank and `#` lines.
/// Line numbers start at 1.
pub fn skip_comments(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| {
            let t = l.trim();
            !t.is_empty() && !t.starts_with('#')
        })
}

// ---------------------------------------------------------------------------
// ASteCA output
// ---------------------------------------------------------------------------

/// Column layout of the ASteCA output file.
///
/// ```text
/// NAME RA DEC r_cl e_r n_memb CI prob int_col z e_z log_age e_age E_BV e_E dist_mod e_d mass e_mass
/// ```
pub mod asteca_cols {
    pub const NAME: usize = 0;
    pub const RA: usize = 1;
    pub const DEC: usize = 2;
    pub const R_CL: usize = 3;
    pub const E_R: usize = 4;
    pub const N_MEMB: usize = 5;
    pub const CI: usize = 6;
    pub const PROB: usize = 7;
    pub const INT_COL: usize = 8;
    pub const Z: usize = 9;
    pub const E_Z: usize = 10;
    pub const LOG_AGE: usize = 11;
    pub const E_AGE: usize = 12;
    pub const EBV: usize = 13;
    pub const E_EBV: usize = 14;
    pub const DIST_MOD: usize = 15;
    pub const E_DIST: usize = 16;
    pub const MASS: usize = 17;
    pub const E_MASS: usize = 18;
    pub const COUNT: usize = 19;
}

/// Read every cluster from the ASteCA output file. Any malformed row aborts
/// the load.
pub fn load_asteca_output(path: &Path) -> Result<Vec<AstecaCluster>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading ASteCA output {}", path.display()))?;
    parse_asteca_output(&text, path)
}

pub fn parse_asteca_output(text: &str, path: &Path) -> Result<Vec<AstecaCluster>> {
    use asteca_cols::*;

    let mut clusters = Vec::new();
    for (line_no, line) in skip_comments(text) {
        let tok: Vec<&str> = line.split_whitespace().collect();
        if tok.len() < COUNT {
            return Err(CatalogError::TooFewColumns {
                path: path.to_path_buf(),
                line: line_no,
                expected: COUNT,
                found: tok.len(),
            }
            .into());
        }

        let num = |idx: usize| parse_field(tok[idx], path, line_no);
        let meas = |v: usize, e: usize| -> Result<Measurement> { Ok(Measurement::new(num(v)?, num(e)?)) };
        let angle = |idx: usize, parse: fn(&str) -> Result<f64, crate::error::NumericError>| {
            parse(tok[idx]).map_err(|e| CatalogError::DataFormat {
                path: path.to_path_buf(),
                line: line_no,
                reason: e.to_string(),
            })
        };

        clusters.push(AstecaCluster {
            name: tok[NAME].to_string(),
            ra_deg: angle(RA, parse_hms)?,
            dec_deg: angle(DEC, parse_dms)?,
            radius_px: meas(R_CL, E_R)?,
            n_memb: num(N_MEMB)?,
            cont_ind: num(CI)?,
            kde_prob: num(PROB)?,
            int_color: num(INT_COL)?,
            feh: meas(Z, E_Z)?,
            log_age: meas(LOG_AGE, E_AGE)?,
            ebv: meas(EBV, E_EBV)?,
            dist_mod: meas(DIST_MOD, E_DIST)?,
            mass: meas(MASS, E_MASS)?,
        });
    }

    log::debug!("{} clusters read from {}", clusters.len(), path.display());
    Ok(clusters)
}

fn parse_field(tok: &str, path: &Path, line: usize) -> Result<f64> {
    tok.parse::<f64>().map_err(|_| {
        CatalogError::DataFormat {
            path: path.to_path_buf(),
            line,
            reason: format!("'{tok}' is not a number"),
        }
        .into()
    })
}

// ---------------------------------------------------------------------------
// Literature table
// ---------------------------------------------------------------------------

/// Load the literature table. Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row with column names (spreadsheet export)
/// * `.json`    – `[{ "Name": "NGC121", "feh": -1.46, ... }, ...]`
/// * `.parquet` – one column per field, any of string/int/float/bool
pub fn load_literature(path: &Path, name_column: &str) -> Result<LiteratureTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let records = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path)?,
        "json" => load_json(path)?,
        "csv" => load_csv(path, name_column)?,
        other => return Err(CatalogError::Unsupported(format!("file extension .{other}")).into()),
    };

    let table = LiteratureTable::from_records(records, name_column);
    if !table.has_column(name_column) {
        return Err(CatalogError::MissingColumn {
            path: path.to_path_buf(),
            column: name_column.to_string(),
        }
        .into());
    }
    Ok(table)
}

fn load_json(path: &Path) -> Result<Vec<LiteratureRecord>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let rows = root.as_array().context("Expected top-level JSON array")?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let obj = row
                .as_object()
                .with_context(|| format!("Row {i} is not a JSON object"))?;
            let cells = obj
                .iter()
                .map(|(key, val)| (key.clone(), json_to_cell(val)))
                .collect();
            Ok(LiteratureRecord { cells })
        })
        .collect()
}

fn json_to_cell(val: &JsonValue) -> Cell {
    match val {
        JsonValue::String(s) => Cell::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Cell::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Cell::Float(f)
            } else {
                Cell::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => Cell::Bool(*b),
        JsonValue::Null => Cell::Null,
        other => Cell::String(other.to_string()),
    }
}

/// Cell types are guessed from the text, except in the name column: a
/// name like `0121` stays a string.
fn load_csv(path: &Path, name_column: &str) -> Result<Vec<LiteratureRecord>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let row = result.with_context(|| format!("CSV row {row_no}"))?;
        if row.len() != headers.len() {
            bail!(
                "CSV row {row_no}: {} fields but the header has {}",
                row.len(),
                headers.len()
            );
        }
        let cells = headers
            .iter()
            .zip(row.iter())
            .map(|(col, value)| {
                let value = value.trim();
                let cell = if col == name_column && !value.is_empty() {
                    Cell::String(value.to_string())
                } else {
                    guess_cell_type(value)
                };
                (col.clone(), cell)
            })
            .collect();
        records.push(LiteratureRecord { cells });
    }
    Ok(records)
}

fn guess_cell_type(s: &str) -> Cell {
    if s.is_empty() {
        return Cell::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Cell::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Cell::Float(f);
    }
    if s == "true" || s == "false" {
        return Cell::Bool(s == "true");
    }
    Cell::String(s.to_string())
}

fn load_parquet(path: &Path) -> Result<Vec<LiteratureRecord>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut records = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        for row in 0..batch.num_rows() {
            let mut cells = BTreeMap::new();
            for (idx, field) in schema.fields().iter().enumerate() {
                cells.insert(field.name().clone(), extract_cell(batch.column(idx), row));
            }
            records.push(LiteratureRecord { cells });
        }
    }
    Ok(records)
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> Cell {
    if col.is_null(row) {
        return Cell::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map_or(Cell::Null, |a| Cell::String(a.value(row).to_string())),
        DataType::LargeUtf8 => Cell::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map_or(Cell::Null, |a| Cell::Integer(a.value(row) as i64)),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map_or(Cell::Null, |a| Cell::Integer(a.value(row))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map_or(Cell::Null, |a| Cell::Float(a.value(row) as f64)),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map_or(Cell::Null, |a| Cell::Float(a.value(row))),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map_or(Cell::Null, |a| Cell::Bool(a.value(row))),
        other => Cell::String(format!("{other:?}")),
    }
}

// ---------------------------------------------------------------------------
// Cross-match table
// ---------------------------------------------------------------------------

/// CSV with header `name,E_SF,E_MCEV,e_E_MCEV`; blank cells are missing values.
pub fn load_crossmatch(path: &Path) -> Result<Vec<CrossMatch>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening cross-match table {}", path.display()))?;
    reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| row.with_context(|| format!("{}: row {}", path.display(), i + 1)))
        .collect()
}

// ---------------------------------------------------------------------------
// Cluster photometry
// ---------------------------------------------------------------------------

/// Value assigned to tokens that are not numbers (`INDEF`, `nan`, ...).
pub const FILL_VALUE: f64 = 99.999;
/// Photometric values (or errors) outside this range mean bad photometry.
pub const PHOT_LIMITS: (f64, f64) = (-50.0, 50.0);
const PHOT_COLUMNS: usize = 7;

/// Load `id x y mag e_mag col e_col` rows from a cluster photometry file,
/// dropping stars with bad photometry.
pub fn load_photometry(path: &Path) -> Result<Photometry> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading photometry {}", path.display()))?;
    parse_photometry(&text, path)
}

pub fn parse_photometry(text: &str, path: &Path) -> Result<Photometry> {
    let mut raw = Photometry::default();
    let mut n_cols = None;

    for (line_no, line) in skip_comments(text) {
        let tok: Vec<&str> = line.split_whitespace().collect();
        if tok.len() < PHOT_COLUMNS {
            return Err(CatalogError::TooFewColumns {
                path: path.to_path_buf(),
                line: line_no,
                expected: PHOT_COLUMNS,
                found: tok.len(),
            }
            .into());
        }
        match n_cols {
            None => n_cols = Some(tok.len()),
            Some(n) if n != tok.len() => {
                return Err(CatalogError::DataFormat {
                    path: path.to_path_buf(),
                    line: line_no,
                    reason: format!("{} columns, previous rows have {n}", tok.len()),
                }
                .into());
            }
            Some(_) => {}
        }

        let v = |i: usize| {
            tok[i]
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .unwrap_or(FILL_VALUE)
        };
        raw.ids.push(tok[0].to_string());
        raw.x.push(v(1));
        raw.y.push(v(2));
        raw.mag.push(v(3));
        raw.e_mag.push(v(4));
        raw.color.push(v(5));
        raw.e_color.push(v(6));
    }

    let n_old = raw.len();
    let clean = remove_bad_stars(raw);
    if clean.is_empty() {
        return Err(CatalogError::NoStarsLeft { path: path.to_path_buf() }.into());
    }

    for (column, values) in [("x_coords", &clean.x), ("y_coords", &clean.y), ("magnitudes", &clean.mag), ("color", &clean.color)] {
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if lo == hi {
            return Err(CatalogError::ZeroRange {
                path: path.to_path_buf(),
                column: column.to_string(),
            }
            .into());
        }
    }

    let frac_reject = (n_old - clean.len()) as f64 / n_old as f64;
    if frac_reject > 0.05 {
        log::warn!(
            "{:.0}% of stars in {} were rejected",
            100.0 * frac_reject,
            path.display()
        );
    }
    Ok(clean)
}

/// Keep only stars whose magnitude, colour and their errors are all inside
/// [`PHOT_LIMITS`].
fn remove_bad_stars(raw: Photometry) -> Photometry {
    let (lo, hi) = PHOT_LIMITS;
    let ok = |v: f64| (lo..=hi).contains(&v);

    let mut clean = Photometry::default();
    for i in 0..raw.len() {
        if !(ok(raw.mag[i]) && ok(raw.e_mag[i]) && ok(raw.color[i]) && ok(raw.e_color[i])) {
            continue;
        }
        clean.ids.push(raw.ids[i].clone());
        clean.x.push(raw.x[i]);
        clean.y.push(raw.y[i]);
        clean.mag.push(raw.mag[i]);
        clean.e_mag.push(raw.e_mag[i]);
        clean.color.push(raw.color[i]);
        clean.e_color.push(raw.e_color[i]);
    }
    clean
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const ASTECA: &str = "\
# NAME RA DEC r_cl e_r n_memb CI prob int_col z e_z log_age e_age E_BV e_E dist_mod e_d mass e_mass
NGC121 00h26m49s -71d32m10s 150 10 420 0.35 0.91 1.12 -1.46 0.2 10.02 0.05 0.03 0.01 19.0 0.1 5000 800

SL579 81.2 -69.3 60 5 80 0.5 0.7 0.85 -0.4 0.1 9.1 0.1 0.08 0.02 18.5 0.1 1200 300
";

    fn write_temp(suffix: &str, body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn comments_and_blank_lines_are_skipped_with_line_numbers() {
        let lines: Vec<_> = skip_comments("# a\n\nx\n  # b\ny").collect();
        assert_eq!(lines, vec![(3, "x"), (5, "y")]);
    }

    #[test]
    fn reads_asteca_rows() {
        let clusters = parse_asteca_output(ASTECA, Path::new("out.dat")).unwrap();
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].name, "NGC121");
        assert_relative_eq!(clusters[0].ra_deg, 6.704167, epsilon = 1e-6);
        assert_relative_eq!(clusters[0].dec_deg, -71.536111, epsilon = 1e-6);
        assert_eq!(clusters[1].log_age, Measurement::new(9.1, 0.1));
        assert_eq!(clusters[1].mass, Measurement::new(1200.0, 300.0));
        assert_eq!(clusters[1].radius_px, Measurement::new(60.0, 5.0));
    }

    #[test]
    fn short_asteca_row_aborts() {
        let err = parse_asteca_output("NGC121 1 2 3\n", Path::new("out.dat")).unwrap_err();
        match err.downcast_ref::<CatalogError>() {
            Some(CatalogError::TooFewColumns { line, found, .. }) => {
                assert_eq!((*line, *found), (1, 4));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn non_numeric_asteca_value_aborts() {
        let bad = ASTECA.replace("0.91", "abc");
        let err = parse_asteca_output(&bad, Path::new("out.dat")).unwrap_err();
        assert!(err.to_string().contains("'abc' is not a number"), "{err}");
    }

    #[test]
    fn literature_csv_and_json_agree() {
        let csv = write_temp(
            ".csv",
            "Name,feh,e_feh,log_age\nNGC121,-1.46,0.1,10.0\nSL579,,-99,9.0\n",
        );
        let json = write_temp(
            ".json",
            r#"[{"Name":"NGC121","feh":-1.46,"e_feh":0.1,"log_age":10.0},
                {"Name":"SL579","feh":null,"e_feh":-99,"log_age":9.0}]"#,
        );

        let a = load_literature(csv.path(), "Name").unwrap();
        let b = load_literature(json.path(), "Name").unwrap();
        assert_eq!(a.column_names, b.column_names);
        for t in [&a, &b] {
            assert_eq!(t.len(), 2);
            assert_eq!(t.records[0].value("feh"), Some(-1.46));
            assert_eq!(t.records[1].value("feh"), None);
            assert_eq!(t.records[1].value("e_feh"), None);
            assert_eq!(t.records[1].value("log_age"), Some(9.0));
        }
    }

    #[test]
    fn literature_parquet_matches_csv() {
        let csv = write_temp(
            ".csv",
            "Name,feh,e_feh,log_age\nNGC121,-1.46,0.1,10.0\nSL579,,-99.9,9.5\n",
        );

        let schema = Arc::new(Schema::new(vec![
            Field::new("Name", DataType::Utf8, false),
            Field::new("feh", DataType::Float64, true),
            Field::new("e_feh", DataType::Float64, true),
            Field::new("log_age", DataType::Float64, true),
        ]));
        let columns: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(vec!["NGC121", "SL579"])),
            Arc::new(Float64Array::from(vec![Some(-1.46), None])),
            Arc::new(Float64Array::from(vec![Some(0.1), Some(-99.9)])),
            Arc::new(Float64Array::from(vec![Some(10.0), Some(9.5)])),
        ];
        let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();
        let pq = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut writer = ArrowWriter::try_new(pq.reopen().unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let a = load_literature(csv.path(), "Name").unwrap();
        let b = load_literature(pq.path(), "Name").unwrap();
        assert_eq!(a, b);
        assert_eq!(b.records[1].cells["feh"], Cell::Null);
        assert_eq!(b.records[1].cells["e_feh"], Cell::Float(-99.9));
        // The sentinel reads as a missing value.
        assert_eq!(b.records[1].value("e_feh"), None);
        assert_eq!(b.records[0].value("feh"), Some(-1.46));
        assert_eq!(b.name(1).as_deref(), Some("SL579"));
    }

    #[test]
    fn numeric_cluster_names_stay_text() {
        let csv = write_temp(".csv", "Name,feh\n0121,-1.4\n121,-0.9\n");
        let t = load_literature(csv.path(), "Name").unwrap();
        assert_eq!(t.records[0].cells["Name"], Cell::String("0121".into()));
        assert_eq!(t.name(0).as_deref(), Some("0121"));
        assert_eq!(crate::data::matching::find_row(&t, "0121"), Some(0));
        assert_eq!(crate::data::matching::find_row(&t, "121"), Some(1));
        assert_eq!(t.records[0].value("feh"), Some(-1.4));
    }

    #[test]
    fn literature_without_name_column_is_rejected() {
        let csv = write_temp(".csv", "cluster,feh\nNGC121,-1.4\n");
        let err = load_literature(csv.path(), "Name").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CatalogError>(),
            Some(CatalogError::MissingColumn { .. })
        ));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let f = write_temp(".ods", "");
        let err = load_literature(f.path(), "Name").unwrap_err();
        assert!(matches!(err.downcast_ref::<CatalogError>(), Some(CatalogError::Unsupported(_))));
    }

    #[test]
    fn crossmatch_blank_cells_are_none() {
        let f = write_temp(
            ".csv",
            "name,E_SF,E_MCEV,e_E_MCEV\nNGC121, 0.04 ,0.05,0.01\nSL579,0.07,,\n",
        );
        let rows = load_crossmatch(f.path()).unwrap();
        assert_eq!(
            rows,
            vec![
                CrossMatch {
                    name: "NGC121".into(),
                    ext_sf: Some(0.04),
                    ext_mcev: Some(0.05),
                    e_ext_mcev: Some(0.01),
                },
                CrossMatch {
                    name: "SL579".into(),
                    ext_sf: Some(0.07),
                    ext_mcev: None,
                    e_ext_mcev: None,
                },
            ]
        );
    }

    #[test]
    fn photometry_drops_bad_stars_and_keeps_string_ids() {
        let text = "\
190 10.0 20.0 18.2 0.02 1.1 0.03
191 11.0 21.0 INDEF 0.02 1.2 0.03
192 12.0 22.0 19.5 0.05 1.4 0.06
193 13.0 23.0 20.0 0.09 -75.0 0.1
";
        let phot = parse_photometry(text, Path::new("cl.dat")).unwrap();
        assert_eq!(phot.ids, vec!["190", "192"]);
        assert_eq!(phot.mag, vec![18.2, 19.5]);
    }

    #[test]
    fn photometry_errors() {
        let p = Path::new("cl.dat");

        let short = parse_photometry("1 2 3 4\n", p).unwrap_err();
        assert!(matches!(
            short.downcast_ref::<CatalogError>(),
            Some(CatalogError::TooFewColumns { .. })
        ));

        let unequal = parse_photometry("1 1 1 18 0.1 1 0.1\n2 2 2 19 0.1 2 0.1 7\n", p).unwrap_err();
        assert!(matches!(
            unequal.downcast_ref::<CatalogError>(),
            Some(CatalogError::DataFormat { line: 2, .. })
        ));

        let none_left = parse_photometry("1 1 1 99 0.1 1 0.1\n", p).unwrap_err();
        assert!(matches!(
            none_left.downcast_ref::<CatalogError>(),
            Some(CatalogError::NoStarsLeft { .. })
        ));

        let flat = parse_photometry("1 1 1 18 0.1 1 0.1\n2 2 2 19 0.1 1 0.1\n", p).unwrap_err();
        match flat.downcast_ref::<CatalogError>() {
            Some(CatalogError::ZeroRange { column, .. }) => assert_eq!(column, "color"),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
