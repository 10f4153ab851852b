use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Galaxy – which of the Clouds a cluster belongs to
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, clap::ValueEnum)]
pub enum Galaxy {
    Smc,
    Lmc,
}

impl Galaxy {
    pub const ALL: [Galaxy; 2] = [Galaxy::Smc, Galaxy::Lmc];

    pub fn name(self) -> &'static str {
        match self {
            Galaxy::Smc => "SMC",
            Galaxy::Lmc => "LMC",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Galaxy::Smc => 0,
            Galaxy::Lmc => 1,
        }
    }
}

impl fmt::Display for Galaxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

// ---------------------------------------------------------------------------
// AstecaCluster – one row of the fitting pipeline output
// ---------------------------------------------------------------------------

/// A value with its 1-sigma uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Measurement {
    pub value: f64,
    pub sigma: f64,
}

impl Measurement {
    pub fn new(value: f64, sigma: f64) -> Self {
        Self { value, sigma }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4} ± {:.4}", self.value, self.sigma)
    }
}

/// Parameters fitted by ASteCA for a single cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct AstecaCluster {
    pub name: String,
    pub ra_deg: f64,
    pub dec_deg: f64,
    /// Cluster radius in detector pixels.
    pub radius_px: Measurement,
    /// Approximate number of structural members.
    pub n_memb: f64,
    /// Contamination index of the cluster region.
    pub cont_ind: f64,
    /// KDE probability of the cluster being a real overdensity.
    pub kde_prob: f64,
    /// Integrated (C-T1)0 colour.
    pub int_color: f64,
    pub feh: Measurement,
    /// log10(age / yr).
    pub log_age: Measurement,
    /// E(B-V).
    pub ebv: Measurement,
    /// (m-M)0.
    pub dist_mod: Measurement,
    /// Mass in solar masses.
    pub mass: Measurement,
}

// ---------------------------------------------------------------------------
// Cell – a single value of the literature table
// ---------------------------------------------------------------------------

/// A dynamically-typed literature table cell.
/// Names go into a `BTreeSet` for duplicate detection, so `Cell` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Cell::*;
        fn discriminant(v: &Cell) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::String(s) => write!(f, "{s}"),
            Cell::Integer(i) => write!(f, "{i}"),
            Cell::Float(v) => write!(f, "{v:.4}"),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Null => write!(f, "<null>"),
        }
    }
}

/// Literature values at or below this mark "no value" in the spreadsheet.
pub const MISSING_SENTINEL: f64 = -99.0;

impl Cell {
    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Float(v) => Some(*v),
            Cell::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Numeric value, treating blanks, NaN and the `-99` sentinel as absent.
    pub fn literature_value(&self) -> Option<f64> {
        self.as_f64()
            .filter(|v| v.is_finite() && *v > MISSING_SENTINEL)
    }
}

// ---------------------------------------------------------------------------
// LiteratureTable – the spreadsheet of published values
// ---------------------------------------------------------------------------

/// One spreadsheet row: column name → cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiteratureRecord {
    pub cells: BTreeMap<String, Cell>,
}

impl LiteratureRecord {
    pub fn value(&self, column: &str) -> Option<f64> {
        self.cells.get(column).and_then(Cell::literature_value)
    }

    pub fn text(&self, column: &str) -> Option<String> {
        match self.cells.get(column)? {
            Cell::Null => None,
            cell => Some(cell.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiteratureTable {
    pub records: Vec<LiteratureRecord>,
    /// Ordered list of every column seen in any row.
    pub column_names: Vec<String>,
    /// Column holding the cluster names.
    pub name_column: String,
}

impl LiteratureTable {
    /// Build the column index from the loaded records. Duplicate cluster
    /// names are reported; lookups always return the first one.
    pub fn from_records(records: Vec<LiteratureRecord>, name_column: &str) -> Self {
        let mut column_names_set: BTreeSet<String> = BTreeSet::new();
        let mut names: BTreeSet<Cell> = BTreeSet::new();

        for rec in &records {
            column_names_set.extend(rec.cells.keys().cloned());
            if let Some(name) = rec.cells.get(name_column) {
                if !names.insert(name.clone()) {
                    log::warn!("cluster {name} appears more than once in the literature table");
                }
            }
        }
        LiteratureTable {
            records,
            column_names: column_names_set.into_iter().collect(),
            name_column: name_column.to_string(),
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }

    /// Cluster name of row `i`.
    pub fn name(&self, i: usize) -> Option<String> {
        self.records.get(i)?.text(&self.name_column)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Database cross-match and photometry
// ---------------------------------------------------------------------------

/// Extinction values found for a cluster in external databases.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CrossMatch {
    pub name: String,
    /// E(B-V) from the Schlafly & Finkbeiner maps.
    #[serde(rename = "E_SF")]
    pub ext_sf: Option<f64>,
    /// E(B-V) from the MCEV database.
    #[serde(rename = "E_MCEV")]
    pub ext_mcev: Option<f64>,
    #[serde(rename = "e_E_MCEV")]
    pub e_ext_mcev: Option<f64>,
}

/// Cleaned photometry of a single cluster field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Photometry {
    pub ids: Vec<String>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub mag: Vec<f64>,
    pub e_mag: Vec<f64>,
    pub color: Vec<f64>,
    pub e_color: Vec<f64>,
}

impl Photometry {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, Cell)]) -> LiteratureRecord {
        LiteratureRecord {
            cells: pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        }
    }

    #[test]
    fn sentinel_and_blank_values_are_absent() {
        assert_eq!(Cell::Float(-99.0).literature_value(), None);
        assert_eq!(Cell::Float(-99.9).literature_value(), None);
        assert_eq!(Cell::Null.literature_value(), None);
        assert_eq!(Cell::Float(f64::NAN).literature_value(), None);
        assert_eq!(Cell::Integer(3).literature_value(), Some(3.0));
        assert_eq!(Cell::Float(-1.2).literature_value(), Some(-1.2));
    }

    #[test]
    fn table_collects_columns_from_all_rows() {
        let table = LiteratureTable::from_records(
            vec![
                record(&[("Name", Cell::String("NGC121".into())), ("feh", Cell::Float(-1.5))]),
                record(&[("Name", Cell::String("L1".into())), ("ebv", Cell::Float(0.03))]),
            ],
            "Name",
        );
        assert_eq!(table.column_names, vec!["Name", "ebv", "feh"]);
        assert_eq!(table.name(1).as_deref(), Some("L1"));
        assert!(table.has_column("feh"));
        assert_eq!(table.records[0].value("ebv"), None);
    }

    #[test]
    fn cells_order_by_kind_then_value() {
        let mut v = vec![
            Cell::String("b".into()),
            Cell::Integer(2),
            Cell::Null,
            Cell::String("a".into()),
        ];
        v.sort();
        assert_eq!(
            v,
            vec![Cell::Null, Cell::Integer(2), Cell::String("a".into()), Cell::String("b".into())]
        );
    }

    #[test]
    fn galaxy_name_honours_width() {
        assert_eq!(format!("{:>4}|", Galaxy::Smc), " SMC|");
        assert_eq!(format!("{:<5}|", Galaxy::Lmc), "LMC  |");
        assert_eq!(Galaxy::Lmc.to_string(), "LMC");
    }
}
