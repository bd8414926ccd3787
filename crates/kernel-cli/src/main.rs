//! `simulate` command: run a cohort against a world manifest and write the
//! patient array, a stdout summary, and aggregate metrics.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use contracts::catalog::{AttributeCatalog, ValueLimits};
use contracts::error::{SimError, SimResult};
use contracts::manifest::WorldManifest;
use contracts::CohortConfig;
use kernel_core::module_runtime::ModuleSet;
use kernel_core::{library, report, run_cohort};

fn print_usage() {
    println!("kernel-cli <command>");
    println!("commands:");
    println!("  simulate [--world PATH] [--n N] [--out PATH] [--horizonYears Y]");
    println!("           [--seed N] [--explain]");
    println!("    runs a cohort; without --world the built-in module library is used");
    println!("  (build-world is produced by the world-builder toolchain, not this binary)");
}

#[derive(Debug, Default)]
struct SimulateOpts {
    world: Option<PathBuf>,
    n: Option<u32>,
    out: Option<PathBuf>,
    horizon_years: Option<f64>,
    seed: Option<u32>,
    explain: bool,
}

fn parse_simulate_args(args: &[String]) -> SimResult<SimulateOpts> {
    let mut opts = SimulateOpts::default();
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--world" => opts.world = Some(PathBuf::from(required(&mut iter, "--world")?)),
            "--n" => opts.n = Some(parse_number(required(&mut iter, "--n")?, "--n")?),
            "--out" => opts.out = Some(PathBuf::from(required(&mut iter, "--out")?)),
            "--horizonYears" => {
                let raw = required(&mut iter, "--horizonYears")?;
                let value: f64 = raw
                    .parse()
                    .map_err(|_| SimError::InvalidArgument(format!("invalid --horizonYears: {raw}")))?;
                if !value.is_finite() || value <= 0.0 {
                    return Err(SimError::InvalidArgument(format!(
                        "--horizonYears must be positive, got {raw}"
                    )));
                }
                opts.horizon_years = Some(value);
            }
            "--seed" => opts.seed = Some(parse_number(required(&mut iter, "--seed")?, "--seed")?),
            "--explain" => opts.explain = true,
            other => {
                return Err(SimError::InvalidArgument(format!("unknown flag: {other}")));
            }
        }
    }
    Ok(opts)
}

fn required<'a>(iter: &mut std::slice::Iter<'a, String>, flag: &str) -> SimResult<&'a String> {
    iter.next()
        .ok_or_else(|| SimError::InvalidArgument(format!("missing value for {flag}")))
}

fn parse_number(raw: &str, flag: &str) -> SimResult<u32> {
    raw.parse::<u32>()
        .map_err(|_| SimError::InvalidArgument(format!("invalid {flag}: {raw}")))
}

fn load_world(path: &Path) -> SimResult<WorldManifest> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|err| SimError::Manifest(err.to_string()))
}

fn load_catalog_limits(
    manifest: &WorldManifest,
    manifest_path: &Path,
) -> SimResult<Option<std::collections::BTreeMap<String, ValueLimits>>> {
    let Some(relative) = manifest.attribute_catalog_path.as_deref() else {
        return Ok(None);
    };
    let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let raw = fs::read_to_string(base.join(relative))?;
    let catalog: AttributeCatalog =
        serde_json::from_str(&raw).map_err(|err| SimError::Manifest(err.to_string()))?;
    Ok(Some(catalog.limits_by_key()))
}

fn run_simulate(opts: SimulateOpts) -> SimResult<()> {
    let mut config = CohortConfig::default();
    let mut modules: ModuleSet = library::default_module_set();
    let mut limits = library::default_limits();

    if let Some(path) = &opts.world {
        let manifest = load_world(path)?;
        config.seed = manifest.seed;
        modules = library::resolve(&manifest);
        if let Some(loaded) = load_catalog_limits(&manifest, path)? {
            limits = loaded;
        }
        if modules.is_empty() {
            return Err(SimError::EmptyWorld);
        }
    }
    if let Some(seed) = opts.seed {
        config.seed = seed;
    }
    if let Some(n) = opts.n {
        config.patients = n;
    }
    if let Some(horizon_years) = opts.horizon_years {
        config.horizon_years = horizon_years;
    }
    config.explain = opts.explain;

    for failure in modules.self_test(config.seed) {
        tracing::warn!(error = %failure, "module self-test failed");
    }

    tracing::info!(
        seed = config.seed,
        patients = config.patients,
        horizon_years = config.horizon_years,
        attribute_modules = modules.attributes.len(),
        disease_modules = modules.diseases.len(),
        "starting cohort run"
    );
    let patients = run_cohort(&config, &modules, &limits);
    let summary = report::summarize(&patients);

    if let Some(out) = &opts.out {
        if let Some(parent) = out.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let records: Vec<_> = patients.iter().map(|patient| patient.to_record()).collect();
        let body = serde_json::to_string_pretty(&records)
            .map_err(|err| SimError::Io(err.to_string()))?;
        fs::write(out, body)?;
    }

    let summary_root = opts
        .out
        .as_deref()
        .and_then(Path::parent)
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("out"));
    let summary_dir = summary_root.join("sim");
    fs::create_dir_all(&summary_dir)?;
    let summary_body =
        serde_json::to_string_pretty(&summary).map_err(|err| SimError::Io(err.to_string()))?;
    fs::write(summary_dir.join("summary.json"), &summary_body)?;

    println!("{summary_body}");
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("simulate") => {
            let opts = match parse_simulate_args(&args[2..]) {
                Ok(opts) => opts,
                Err(err) => {
                    eprintln!("error: {err}");
                    print_usage();
                    process::exit(1);
                }
            };
            if let Err(err) = run_simulate(opts) {
                eprintln!("error: {err}");
                process::exit(1);
            }
        }
        _ => {
            print_usage();
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn parses_the_full_flag_set() {
        let opts = parse_simulate_args(&strings(&[
            "--world",
            "world.json",
            "--n",
            "25",
            "--out",
            "out/patients.json",
            "--horizonYears",
            "20",
            "--seed",
            "99",
            "--explain",
        ]))
        .expect("parse");

        assert_eq!(opts.world, Some(PathBuf::from("world.json")));
        assert_eq!(opts.n, Some(25));
        assert_eq!(opts.seed, Some(99));
        assert_eq!(opts.horizon_years, Some(20.0));
        assert!(opts.explain);
    }

    #[test]
    fn rejects_unknown_flags_and_bad_numbers() {
        assert!(parse_simulate_args(&strings(&["--bogus"])).is_err());
        assert!(parse_simulate_args(&strings(&["--n", "many"])).is_err());
        assert!(parse_simulate_args(&strings(&["--horizonYears", "-3"])).is_err());
        assert!(parse_simulate_args(&strings(&["--world"])).is_err());
    }
}
