mod analysis;
mod color;
mod config;
mod data;
mod error;
mod params;
mod plot;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;

use analysis::amr::get_amr;
use analysis::deproject::{SkyCoord, deproj_dist, deproj_dist_deg};
use analysis::diffs::check_diffs;
use analysis::integrate::mc_mean_metallicity;
use analysis::runs::{DEFAULT_RUNS, cluster_across_runs};
use config::Config;
use data::filter::Source;
use data::loader;
use data::matching::match_clusters;
use data::model::Galaxy;
use params::{InParams, build_params, classify};

#[derive(Parser)]
#[command(name = "mc-cat")]
#[command(about = "Magellanic Cloud star cluster catalog analysis", long_about = None)]
struct Cli {
    /// JSON configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// ASteCA output file (overrides the config).
    #[arg(long, global = true)]
    asteca: Option<PathBuf>,

    /// Literature table (.csv, .json or .parquet).
    #[arg(long, global = true)]
    literature: Option<PathBuf>,

    /// Database cross-match table (.csv).
    #[arg(long, global = true)]
    crossmatch: Option<PathBuf>,

    /// Output directory for the PNG figures (overrides the config).
    #[arg(long, global = true)]
    figures_dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match ASteCA and literature values and report the differences.
    Analyze {
        /// Also render every figure.
        #[arg(long)]
        plots: bool,
    },
    /// Full pipeline, figures included.
    Plots,
    /// Age-metallicity relation of both Clouds.
    Amr {
        #[arg(long, value_enum, default_value_t = Source::Asteca)]
        source: Source,
    },
    /// Deprojected galactocentric distances.
    Deproject {
        /// Right ascension (degrees or 05h20m47s).
        #[arg(long, allow_hyphen_values = true, required_unless_present = "catalog")]
        ra: Option<String>,

        /// Declination (degrees or -69d28m41s).
        #[arg(long, allow_hyphen_values = true, required_unless_present = "catalog")]
        dec: Option<String>,

        /// Galaxy the position belongs to; the nearest one by default.
        #[arg(long, value_enum)]
        galaxy: Option<Galaxy>,

        /// Every matched cluster of the catalog instead of one position.
        #[arg(long, conflicts_with_all = ["ra", "dec"])]
        catalog: bool,
    },
    /// One cluster's values across repeated ASteCA runs.
    Runs {
        #[arg(long)]
        root: PathBuf,

        #[arg(long)]
        cluster: String,

        #[arg(long, value_delimiter = ',')]
        runs: Vec<String>,
    },
    /// Load and clean a cluster photometry file.
    Photometry { file: PathBuf },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let cfg = load_config(&cli)?;

    match cli.cmd {
        Commands::Analyze { plots } => {
            let params = load_params(&cfg)?;
            print!("{}", check_diffs(&params, &cfg.diffs));
            if plots {
                render_figures(&params, &cfg)?;
            }
            println!("\nEnd.");
        }
        Commands::Plots => {
            let params = load_params(&cfg)?;
            print!("{}", check_diffs(&params, &cfg.diffs));
            render_figures(&params, &cfg)?;
            println!("\nEnd.");
        }
        Commands::Amr { source } => {
            let params = load_params(&cfg)?;
            print_amr(&params, source, &cfg)?;
        }
        Commands::Deproject {
            ra,
            dec,
            galaxy,
            catalog,
        } => {
            if catalog {
                let params = load_params(&cfg)?;
                println!("{:<12} {:>4} {:>10} {:>10}", "name", "gal", "d (kpc)", "d (deg)");
                for s in params.iter() {
                    for (i, name) in s.names.iter().enumerate() {
                        let coord = SkyCoord::new(s.ra[i], s.dec[i]);
                        let deg = deproj_dist_deg(cfg.galaxy(s.galaxy), coord);
                        println!("{name:<12} {:>4} {:>10.3} {deg:>10.3}", s.galaxy, s.dep_dist_kpc[i]);
                    }
                }
            } else {
                let (Some(ra), Some(dec)) = (ra, dec) else {
                    bail!("--ra and --dec are both needed without --catalog");
                };
                let coord = SkyCoord::parse(&ra, &dec)
                    .with_context(|| format!("parsing position {ra} {dec}"))?;
                let g = galaxy.unwrap_or_else(|| classify(coord, &cfg));
                let geometry = cfg.galaxy(g);
                println!(
                    "{g}: {:.3} kpc, {:.3} deg",
                    deproj_dist(geometry, coord),
                    deproj_dist_deg(geometry, coord)
                );
            }
        }
        Commands::Runs {
            root,
            cluster,
            runs,
        } => {
            let runs: Vec<String> = if runs.is_empty() {
                DEFAULT_RUNS.iter().map(|r| r.to_string()).collect()
            } else {
                runs
            };
            let values = cluster_across_runs(&root, &runs, &cluster)?;
            if values.is_empty() {
                log::warn!("{cluster} not found in any run");
            }
            for v in &values {
                println!("{v}");
            }
        }
        Commands::Photometry { file } => {
            let phot = loader::load_photometry(&file)?;
            let range = |v: &[f64]| {
                v.iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)))
            };
            let (m0, m1) = range(&phot.mag);
            let (c0, c1) = range(&phot.color);
            println!("{}: {} stars", file.display(), phot.len());
            println!("  magnitude {m0:.3} .. {m1:.3}");
            println!("  color     {c0:.3} .. {c1:.3}");
        }
    }

    Ok(())
}

/// Config file first, then the command line paths on top.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut cfg = Config::load(cli.config.as_deref())?;
    if let Some(p) = &cli.asteca {
        cfg.inputs.asteca_output = p.clone();
    }
    if let Some(p) = &cli.literature {
        cfg.inputs.literature = p.clone();
    }
    if let Some(p) = &cli.crossmatch {
        cfg.inputs.crossmatch = Some(p.clone());
    }
    if let Some(p) = &cli.figures_dir {
        cfg.figures_dir.0 = p.clone();
    }
    Ok(cfg)
}

fn load_params(cfg: &Config) -> Result<InParams> {
    let clusters = loader::load_asteca_output(&cfg.inputs.asteca_output)?;
    log::info!("ASteCA data read from {}", cfg.inputs.asteca_output.display());

    let table = loader::load_literature(&cfg.inputs.literature, &cfg.columns.name)?;
    log::info!("literature data read from {}", cfg.inputs.literature.display());

    let crossmatch = match &cfg.inputs.crossmatch {
        Some(path) => loader::load_crossmatch(path)?,
        None => Vec::new(),
    };

    let matches = match_clusters(&clusters, &table);
    log::info!("cluster parameters matched ({} of {})", matches.len(), clusters.len());

    let params = build_params(&matches, &table, &crossmatch, cfg)?;
    log::info!("parameter arrays built");
    Ok(params)
}

fn make_rng(cfg: &Config) -> StdRng {
    match cfg.monte_carlo.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn render_figures(params: &InParams, cfg: &Config) -> Result<()> {
    let mut rng = make_rng(cfg);
    let amrs = get_amr(params, Source::Asteca, &cfg.amr);
    let written = plot::make_plots(params, &amrs, cfg, &mut rng)?;
    log::info!("{} figures written to {}", written.len(), cfg.figures_dir.0.display());
    Ok(())
}

fn print_amr(params: &InParams, source: Source, cfg: &Config) -> Result<()> {
    let mut rng = make_rng(cfg);
    let amrs = get_amr(params, source, &cfg.amr);
    if amrs.is_empty() {
        bail!("no galaxy has enough clusters for an AMR");
    }

    for amr in &amrs {
        println!("\n{} ({} clusters)", amr.galaxy, amr.clusters.len());
        println!("{:>10} {:>9} {:>8}", "age (Gyr)", "[Fe/H]", "err");
        for ((a, f), e) in amr.binned.age.iter().zip(&amr.binned.feh).zip(&amr.binned.e_feh) {
            println!("{a:>10.3} {f:>9.3} {e:>8.3}");
        }

        if amr.binned.len() < 3 {
            log::warn!("{}: {} AMR points, mean metallicity skipped", amr.galaxy, amr.binned.len());
            continue;
        }
        let mean = mc_mean_metallicity(&amr.binned, cfg.monte_carlo.runs, &mut rng)?;
        println!("mean [Fe/H] = {:.3} ± {:.3}", mean.value, mean.sigma);
    }
    Ok(())
}
