use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

const OUT_DIR: &str = "sample";

/// Literature columns after `Name`, in file order.
const LIT_COLUMNS: [&str; 9] = [
    "log_age",
    "e_log_age",
    "feh",
    "e_feh",
    "ebv",
    "e_ebv",
    "dist_mod",
    "e_dist_mod",
    "rad_px",
];

/// Centre RA/Dec, mean E(B-V) and mean distance modulus of each Cloud.
struct Cloud {
    prefix: &'static str,
    ra: f64,
    dec: f64,
    ebv: f64,
    dist_mod: f64,
    count: usize,
}

const CLOUDS: [Cloud; 2] = [
    Cloud {
        prefix: "H86-",
        ra: 13.175,
        dec: -72.816_667,
        ebv: 0.05,
        dist_mod: 18.96,
        count: 60,
    },
    Cloud {
        prefix: "SL",
        ra: 80.195_833,
        dec: -69.478_056,
        ebv: 0.1,
        dist_mod: 18.49,
        count: 90,
    },
];

struct SampleCluster {
    name: String,
    ra: f64,
    dec: f64,
    /// Value and error pairs in ASteCA column order.
    r_cl: (f64, f64),
    n_memb: f64,
    ci: f64,
    prob: f64,
    int_col: f64,
    feh: (f64, f64),
    log_age: (f64, f64),
    ebv: (f64, f64),
    dist_mod: (f64, f64),
    mass: (f64, f64),
    /// One entry per [`LIT_COLUMNS`] name; `None` when the table has no value.
    lit: Option<[Option<f64>; 9]>,
    /// `E_SF`, `E_MCEV`, `e_E_MCEV`.
    xmatch: Option<[Option<f64>; 3]>,
}

fn normal(rng: &mut StdRng, mean: f64, sigma: f64) -> f64 {
    Normal::new(mean, sigma).map_or(mean, |d| d.sample(rng))
}

fn generate_cluster(rng: &mut StdRng, cloud: &Cloud, i: usize) -> SampleCluster {
    let dec = cloud.dec + normal(rng, 0.0, 1.5);
    let ra = cloud.ra + normal(rng, 0.0, 2.0) / dec.to_radians().cos();

    let log_age = rng.gen_range(6.6..10.0);
    let age_gyr = 10f64.powf(log_age - 9.0);
    let feh = (-0.3 - 0.12 * age_gyr + normal(rng, 0.0, 0.15)).clamp(-2.2, 0.1);
    let ebv = normal(rng, cloud.ebv, 0.4 * cloud.ebv).abs();
    let dist_mod = cloud.dist_mod + normal(rng, 0.0, 0.08);
    let r_cl = rng.gen_range(40.0..300.0);
    let mass = rng.gen_range(300.0..8000.0);

    let c = SampleCluster {
        name: format!("{}{}", cloud.prefix, i + 1),
        ra,
        dec,
        r_cl: (r_cl, r_cl * rng.gen_range(0.03..0.1)),
        n_memb: rng.gen_range(30..400) as f64,
        ci: rng.gen_range(0.0..1.0),
        prob: rng.gen_range(0.3..1.0),
        int_col: rng.gen_range(0.2..2.0),
        feh: (feh, rng.gen_range(0.05..0.4)),
        log_age: (log_age, rng.gen_range(0.1..0.3)),
        ebv: (ebv, rng.gen_range(0.01..0.03)),
        dist_mod: (dist_mod, rng.gen_range(0.05..0.15)),
        mass: (mass, mass * rng.gen_range(0.1..0.2)),
        lit: None,
        xmatch: None,
    };
    let lit = rng.gen_bool(0.7).then(|| literature_values(rng, &c));
    let xmatch = rng.gen_bool(0.6).then(|| {
        let mcev = (c.ebv.0 + normal(rng, 0.0, 0.03)).max(0.0);
        [
            rng.gen_bool(0.8).then(|| (c.ebv.0 + normal(rng, 0.02, 0.02)).max(0.0)),
            Some(mcev),
            Some(rng.gen_range(0.005..0.03)),
        ]
    });
    SampleCluster { lit, xmatch, ..c }
}

/// Published values scattered around the fitted ones, with gaps. Missing
/// [Fe/H] errors use the -99.9 sentinel of the published tables.
fn literature_values(rng: &mut StdRng, c: &SampleCluster) -> [Option<f64>; 9] {
    // A few ages far from the fit, for the difference report.
    let age_offset = if rng.gen_bool(0.1) { 0.8 } else { normal(rng, 0.0, 0.15) };
    let has_feh = rng.gen_bool(0.6);
    let e_feh = if rng.gen_bool(0.15) { -99.9 } else { rng.gen_range(0.02..0.3) };
    [
        Some(c.log_age.0 + age_offset),
        rng.gen_bool(0.8).then(|| rng.gen_range(0.05..0.3)),
        has_feh.then(|| (c.feh.0 + normal(rng, 0.0, 0.2)).clamp(-2.3, 0.3)),
        has_feh.then_some(e_feh),
        rng.gen_bool(0.7).then(|| (c.ebv.0 + normal(rng, 0.0, 0.03)).max(0.0)),
        rng.gen_bool(0.5).then(|| rng.gen_range(0.01..0.05)),
        rng.gen_bool(0.4).then(|| c.dist_mod.0 + normal(rng, 0.0, 0.1)),
        rng.gen_bool(0.4).then(|| rng.gen_range(0.05..0.2)),
        rng.gen_bool(0.5).then(|| c.r_cl.0 * rng.gen_range(0.7..1.3)),
    ]
}

fn hms(ra_deg: f64) -> String {
    let h = ra_deg.rem_euclid(360.0) / 15.0;
    let m = h.fract() * 60.0;
    format!("{:02}h{:02}m{:04.1}s", h.trunc() as u32, m.trunc() as u32, m.fract() * 60.0)
}

fn dms(dec_deg: f64) -> String {
    let sign = if dec_deg < 0.0 { "-" } else { "+" };
    let d = dec_deg.abs();
    let m = d.fract() * 60.0;
    format!("{sign}{:02}d{:02}m{:04.1}s", d.trunc() as u32, m.trunc() as u32, m.fract() * 60.0)
}

fn write_asteca_output(path: &Path, clusters: &[SampleCluster]) -> Result<()> {
    let mut text = String::from(
        "# NAME RA DEC r_cl e_r n_memb CI prob int_col z e_z log_age e_age E_BV e_E dist_mod e_d mass e_mass\n",
    );
    for c in clusters {
        writeln!(
            text,
            "{} {} {} {:.1} {:.1} {} {:.2} {:.2} {:.3} {:.4} {:.4} {:.3} {:.3} {:.3} {:.3} {:.3} {:.3} {:.0} {:.0}",
            c.name,
            hms(c.ra),
            dms(c.dec),
            c.r_cl.0,
            c.r_cl.1,
            c.n_memb,
            c.ci,
            c.prob,
            c.int_col,
            c.feh.0,
            c.feh.1,
            c.log_age.0,
            c.log_age.1,
            c.ebv.0,
            c.ebv.1,
            c.dist_mod.0,
            c.dist_mod.1,
            c.mass.0,
            c.mass.1,
        )?;
    }
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.4}")).unwrap_or_default()
}

fn write_literature_csv(path: &Path, clusters: &[SampleCluster]) -> Result<()> {
    let mut w = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    w.write_record(std::iter::once("Name").chain(LIT_COLUMNS))?;
    for c in clusters {
        let Some(lit) = &c.lit else { continue };
        let mut row = vec![c.name.clone()];
        row.extend(lit.iter().map(|&v| fmt_opt(v)));
        w.write_record(&row)?;
    }
    w.flush()?;
    Ok(())
}

fn write_literature_parquet(path: &Path, clusters: &[SampleCluster]) -> Result<()> {
    let rows: Vec<(&str, &[Option<f64>; 9])> = clusters
        .iter()
        .filter_map(|c| c.lit.as_ref().map(|l| (c.name.as_str(), l)))
        .collect();

    let mut fields = vec![Field::new("Name", DataType::Utf8, false)];
    let mut columns: Vec<ArrayRef> = vec![Arc::new(StringArray::from(
        rows.iter().map(|(n, _)| *n).collect::<Vec<_>>(),
    ))];
    for (k, name) in LIT_COLUMNS.iter().enumerate() {
        fields.push(Field::new(*name, DataType::Float64, true));
        columns.push(Arc::new(Float64Array::from(
            rows.iter().map(|(_, l)| l[k]).collect::<Vec<_>>(),
        )));
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;

    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn write_crossmatch(path: &Path, clusters: &[SampleCluster]) -> Result<()> {
    let mut w = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    w.write_record(["name", "E_SF", "E_MCEV", "e_E_MCEV"])?;
    for c in clusters {
        let Some(x) = &c.xmatch else { continue };
        w.write_record([c.name.clone(), fmt_opt(x[0]), fmt_opt(x[1]), fmt_opt(x[2])])?;
    }
    w.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(42);

    let clusters: Vec<SampleCluster> = CLOUDS
        .iter()
        .flat_map(|cloud| (0..cloud.count).map(move |i| (cloud, i)))
        .map(|(cloud, i)| generate_cluster(&mut rng, cloud, i))
        .collect();

    let dir = Path::new(OUT_DIR);
    std::fs::create_dir_all(dir).with_context(|| format!("creating {OUT_DIR}"))?;
    write_asteca_output(&dir.join("asteca_output.dat"), &clusters)?;
    write_literature_csv(&dir.join("literature.csv"), &clusters)?;
    write_literature_parquet(&dir.join("literature.parquet"), &clusters)?;
    write_crossmatch(&dir.join("crossmatch.csv"), &clusters)?;

    let with_lit = clusters.iter().filter(|c| c.lit.is_some()).count();
    println!(
        "Wrote {} clusters ({with_lit} with literature values) to {OUT_DIR}/",
        clusters.len()
    );
    Ok(())
}
