use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rayon::prelude::*;
use std::path::PathBuf;
use turpe_calculator::{
    compare_with_current, global_optimum, optima_by_formula, read_load_curve_file, CostEngine,
    CostResult, CurrentConfiguration, Formula, IntervalClassifier, LoadCurveAggregator,
    LoadCurveDataset, MeterProfile, Quadrant, ScenarioCandidate, ScenarioGenerator,
    SimulationError, StaticRateProvider, SubscribedPower, TariffParameters, ValidityPeriod,
};

#[derive(Parser)]
#[command(name = "turpe_calculator")]
#[command(about = "Simulate annual TURPE costs and find the cheapest subscription")]
struct Args {
    /// Load curve CSV export (semicolon-delimited, one row per measurement)
    #[arg(short, long)]
    input: PathBuf,

    /// Off-peak windows, e.g. "22h00-06h00;12h00-14h00" (empty = peak hours only)
    #[arg(long, default_value = "")]
    hc_windows: String,

    /// Lowest subscribed power to test in kVA
    #[arg(long, default_value = "3")]
    power_min: u16,

    /// Highest subscribed power to test in kVA
    #[arg(long, default_value = "250")]
    power_max: u16,

    /// Apparent-power margin applied to averaged active power
    #[arg(long, default_value = "1.12")]
    margin: f64,

    /// JSON file overriding the built-in tariff parameters
    #[arg(long)]
    params: Option<PathBuf>,

    /// Currently subscribed formula, e.g. BTSUPCU (enables the savings report)
    #[arg(long)]
    current_formula: Option<Formula>,

    /// Currently subscribed power: one value, or four as HPH/HCH/HPB/HCB
    #[arg(long)]
    current_power: Option<SubscribedPower>,

    /// Simulated delivery year start (YYYY-MM-DD)
    #[arg(long)]
    period_start: Option<String>,

    /// Simulated delivery year end (YYYY-MM-DD)
    #[arg(long)]
    period_end: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "summary")]
    output: OutputFormat,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
    Summary,
}

fn main() -> Result<()> {
    env_logger::init();

    // Use all available cores for candidate pricing
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_cpus::get())
        .build_global()
        .unwrap_or_else(|_| {});

    let args = Args::parse();

    if args.power_min < 1 || args.power_min > args.power_max {
        anyhow::bail!(
            "invalid power range {}..{} kVA",
            args.power_min,
            args.power_max
        );
    }
    if !(1.0..=2.0).contains(&args.margin) {
        anyhow::bail!("margin {} outside the supported 1.0-2.0 range", args.margin);
    }

    // Tariff parameters
    let params = match &args.params {
        Some(path) => {
            info!("Loading tariff parameters from {}", path.display());
            TariffParameters::from_json_file(path)?
        }
        None => TariffParameters::default(),
    };
    let provider = StaticRateProvider::new(params)?;

    // Delivery period to simulate
    let period = match (&args.period_start, &args.period_end) {
        (Some(start), Some(end)) => {
            let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")?;
            let end = NaiveDate::parse_from_str(end, "%Y-%m-%d")?;
            if start >= end {
                anyhow::bail!("period start {} is not before period end {}", start, end);
            }
            ValidityPeriod::new(start, end)
        }
        (None, None) => ValidityPeriod::default(),
        _ => anyhow::bail!("provide both --period-start and --period-end, or neither"),
    };

    // Current subscription, when the caller wants a savings comparison
    let current = match (args.current_formula, args.current_power) {
        (Some(formula), Some(power)) => Some(CurrentConfiguration::new(formula, power)),
        (None, None) => None,
        _ => anyhow::bail!("provide both --current-formula and --current-power, or neither"),
    };

    let dataset = read_load_curve_file(&args.input)?;

    let classifier = IntervalClassifier::from_spec(&args.hc_windows)?;
    let aggregator = LoadCurveAggregator::new(classifier, args.margin);
    let profiles = aggregator.aggregate(&dataset.readings)?;

    // Candidate configurations per meter
    let generator = ScenarioGenerator::new(args.power_min, args.power_max);
    let mut per_meter: Vec<(MeterProfile, Vec<ScenarioCandidate>)> = Vec::new();
    for profile in profiles {
        let candidates = generator.generate(&profile, current.as_ref())?;
        info!(
            "{}: {} candidate configurations",
            profile.meter_id,
            candidates.len()
        );
        per_meter.push((profile, candidates));
    }

    let all_candidates: Vec<ScenarioCandidate> = per_meter
        .iter()
        .flat_map(|(_, candidates)| candidates.iter().cloned())
        .collect();
    if all_candidates.is_empty() {
        anyhow::bail!("no candidate configurations to price; widen --power-min/--power-max");
    }
    let engine = CostEngine::for_candidates(&provider, period, &all_candidates)?;

    // Price every candidate
    let pb = ProgressBar::new(all_candidates.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} - {msg}")
            .unwrap(),
    );
    pb.set_message("Pricing candidates");

    let mut all_results: Vec<CostResult> = Vec::with_capacity(all_candidates.len());
    for (profile, candidates) in &per_meter {
        let results: Result<Vec<CostResult>, SimulationError> = candidates
            .par_iter()
            .map(|candidate| {
                let result = engine.evaluate(candidate, profile);
                pb.inc(1);
                result
            })
            .collect();
        all_results.extend(results?);
    }
    pb.finish_with_message("Pricing complete");

    // Output results
    match args.output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&all_results)?;
            println!("{}", json);
        }
        OutputFormat::Csv => {
            println!("MeterId,Formula,PowerKva,FixedEur,VariableEur,OverrunEur,TotalEur,IsCurrent");
            for result in &all_results {
                println!(
                    "{},{},{},{:.2},{:.2},{:.2},{:.2},{}",
                    result.candidate.meter_id,
                    result.candidate.formula,
                    result.candidate.power,
                    result.fixed_cost,
                    result.variable_cost,
                    result.overrun_cost,
                    result.total_cost,
                    result.candidate.is_current
                );
            }
        }
        OutputFormat::Summary => print_summary(&dataset, &per_meter, &all_results, period),
    }

    Ok(())
}

fn print_summary(
    dataset: &LoadCurveDataset,
    per_meter: &[(MeterProfile, Vec<ScenarioCandidate>)],
    results: &[CostResult],
    period: ValidityPeriod,
) {
    let summary = &dataset.summary;

    println!("TURPE Simulation Summary");
    println!("========================");
    println!(
        "History: {} measurements from {} to {} ({} days)",
        summary.measurement_count,
        summary.first_timestamp,
        summary.last_timestamp,
        summary.span_days
    );
    println!(
        "Max drawn power: {:.1} kW at step {}",
        summary.max_power_kw, summary.dominant_step_code
    );
    println!("Simulated delivery year: {} to {}", period.start, period.end);

    if !dataset.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &dataset.warnings {
            println!("  - {}", warning);
        }
    }

    for (profile, candidates) in per_meter {
        println!();
        println!(
            "Meter {} ({} candidates priced):",
            profile.meter_id,
            candidates.len()
        );
        for quadrant in Quadrant::ALL {
            let aggregate = profile.quadrant(quadrant);
            println!(
                "  {}: {:.0} kWh, p_max {:.1} kVA",
                quadrant, aggregate.energy_kwh, aggregate.pmax_kva
            );
        }
    }

    let by_formula = optima_by_formula(results);
    if !by_formula.is_empty() {
        println!();
        println!("Best candidate per formula:");
        for result in &by_formula {
            println!(
                "  {} at {} kVA: {:.2} EUR/year",
                result.candidate.formula, result.candidate.power, result.total_cost
            );
        }
    }

    if let Some(best) = global_optimum(results) {
        println!();
        println!("Recommended subscription:");
        println!("  Meter: {}", best.candidate.meter_id);
        println!("  Formula: {}", best.candidate.formula);
        println!("  Power: {} kVA", best.candidate.power);
        println!(
            "  Annual cost: {:.2} EUR ({:.2} fixed + {:.2} energy + {:.2} overruns)",
            best.total_cost, best.fixed_cost, best.variable_cost, best.overrun_cost
        );
    }

    if let Some(comparison) = compare_with_current(results) {
        println!();
        println!("Against the current subscription:");
        println!("  Current cost: {:.2} EUR/year", comparison.current_cost_eur);
        println!("  Optimal cost: {:.2} EUR/year", comparison.optimal_cost_eur);
        println!(
            "  Savings: {:.2} EUR/year ({:.1}%)",
            comparison.savings_eur, comparison.savings_pct
        );
    }
}
