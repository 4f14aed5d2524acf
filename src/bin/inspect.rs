use std::env;
use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use strum::IntoEnumIterator;

// Import from the library
use flux_secm::export::to_json;
use flux_secm::grid::CurrentMap;
use flux_secm::normalize::normalize;
use flux_secm::options::ProcessingOptions;
use flux_secm::parsers::{self, Experiment, FileFormat, FormatHint, Vendor};
use flux_secm::trace::Trace;

fn usage() -> String {
    let names = |items: Vec<String>| items.join(", ");
    format!(
        "usage: inspect [--vendor NAME] [--experiment NAME] [--options FILE] [--json] FILE...\n\
         vendors:     auto, {}\n\
         experiments: {}\n\
         formats:     {}",
        names(Vendor::iter().map(|v| v.to_string()).collect()),
        names(Experiment::iter().map(|e| e.to_string()).collect()),
        names(FileFormat::iter().map(|f| format!(".{}", f)).collect()),
    )
}

struct Args {
    hint: FormatHint,
    experiment: Experiment,
    options: ProcessingOptions,
    json: bool,
    files: Vec<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        hint: FormatHint::Auto,
        experiment: Experiment::default(),
        options: ProcessingOptions::default(),
        json: false,
        files: Vec::new(),
    };

    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--vendor" => {
                let name = iter.next().context("--vendor needs a name")?;
                args.hint = FormatHint::from_str(&name)?;
            }
            "--experiment" => {
                let name = iter.next().context("--experiment needs a name")?;
                args.experiment = Experiment::from_str(&name)
                    .with_context(|| format!("unknown experiment '{}'", name))?;
            }
            "--options" => {
                let path = iter.next().context("--options needs a file")?;
                args.options = ProcessingOptions::load(&path)?;
            }
            "--json" => args.json = true,
            "-h" | "--help" => {
                println!("{}", usage());
                process::exit(0);
            }
            flag if flag.starts_with("--") => bail!("unknown flag '{}'\n{}", flag, usage()),
            _ => args.files.push(PathBuf::from(arg)),
        }
    }

    if args.files.is_empty() {
        bail!("no input files\n{}", usage());
    }
    Ok(args)
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum Data {
    Trace(Trace),
    Map(CurrentMap),
}

#[derive(Serialize)]
struct Report {
    file: String,
    vendor: String,
    format: String,
    metadata: Vec<(String, String)>,
    warnings: Vec<String>,
    data: Data,
}

fn inspect(path: &PathBuf, args: &Args) -> Result<Report> {
    let (record, warnings) = parsers::read(path, args.hint, args.experiment)
        .with_context(|| format!("reading {}", path.display()))?
        .into_parts();
    let mut warnings: Vec<String> = warnings.iter().map(ToString::to_string).collect();

    let data = match args.experiment {
        Experiment::Image => Data::Map(CurrentMap::from_record(&record)?),
        experiment => {
            let (trace, more) =
                normalize(std::slice::from_ref(&record), &args.options, experiment)?.into_parts();
            warnings.extend(more.iter().map(ToString::to_string));
            Data::Trace(trace)
        }
    };

    Ok(Report {
        file: path.display().to_string(),
        vendor: record.vendor().to_string(),
        format: record.format().to_string(),
        metadata: record
            .metadata()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        warnings,
        data,
    })
}

fn range(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

fn print_summary(report: &Report) {
    println!("\n=== {} ===", report.file);
    println!("Vendor: {} (.{})", report.vendor, report.format);

    match &report.data {
        Data::Trace(trace) => {
            let (x_lo, x_hi) = range(trace.x().values());
            let (y_lo, y_hi) = range(trace.y().values());
            println!("Samples: {}", trace.len());
            println!("{}: {:.4} to {:.4}", trace.x().title(), x_lo, x_hi);
            println!("{}: {:.4} to {:.4}", trace.y().title(), y_lo, y_hi);
            for &idx in trace.features() {
                println!(
                    "Feature at sample {}: {} = {:.4}",
                    idx,
                    trace.x().label(),
                    trace.x().values()[idx]
                );
            }
        }
        Data::Map(map) => {
            println!("Grid: {} x {} ({})", map.nx(), map.ny(), map.position_unit());
            let matrix = map.matrix();
            println!(
                "Current ({}): {:.4} to {:.4}",
                map.current_unit(),
                matrix.min(),
                matrix.max()
            );
        }
    }

    for (key, value) in report.metadata.iter().take(10) {
        println!("  {}: {}", key, value);
    }
    if report.metadata.len() > 10 {
        println!("  ... and {} more metadata entries", report.metadata.len() - 10);
    }
    for warning in &report.warnings {
        println!("warning: {}", warning);
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;

    let results: Vec<(&PathBuf, Result<Report>)> = args
        .files
        .par_iter()
        .map(|path| (path, inspect(path, &args)))
        .collect();

    let mut failed = 0;
    let mut reports = Vec::new();
    for (path, result) in results {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => {
                eprintln!("{}: {:#}", path.display(), e);
                failed += 1;
            }
        }
    }

    if args.json {
        println!("{}", to_json(&reports)?);
    } else {
        reports.iter().for_each(print_summary);
    }

    if failed > 0 {
        process::exit(1);
    }
    Ok(())
}
