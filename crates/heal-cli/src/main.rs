use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use heal_cli::{logging, predict_file, run_simulator, SimulatorConfig};
use heal_core::HealerConfig;
use heal_knowledge::InMemoryKnowledgeStore;
use std::path::PathBuf;
use std::sync::Arc;

fn cli() -> Command {
    Command::new("heal")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Self-healing repair loop: learn fixes, predict trouble, escalate the rest")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML config file (defaults apply to anything it omits)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines on stderr"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Feed a seeded error stream through the healer")
                .arg(
                    Arg::new("errors")
                        .long("errors")
                        .default_value("200")
                        .value_parser(value_parser!(u64))
                        .help("Number of errors to simulate"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("db-success")
                        .long("db-success")
                        .default_value("0.8")
                        .value_parser(value_parser!(f64))
                        .help("Probability the database remedy works"),
                )
                .arg(
                    Arg::new("service-success")
                        .long("service-success")
                        .default_value("0.6")
                        .value_parser(value_parser!(f64))
                        .help("Probability the service restart works"),
                )
                .arg(
                    Arg::new("snapshot")
                        .long("snapshot")
                        .value_parser(value_parser!(PathBuf))
                        .help("Knowledge snapshot to resume from and save back to"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("predict")
                .about("Analyze a log file and print the trend prediction")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Log file, one message per line"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(Command::new("config").about("Print the effective configuration as TOML"))
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<HealerConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => HealerConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(HealerConfig::default()),
    }
}

async fn simulate(args: &ArgMatches, config: HealerConfig) -> anyhow::Result<()> {
    let sim = SimulatorConfig {
        seed: *args.get_one::<u64>("seed").unwrap_or(&42),
        errors: *args.get_one::<u64>("errors").unwrap_or(&200),
        db_success_rate: *args.get_one::<f64>("db-success").unwrap_or(&0.8),
        service_success_rate: *args.get_one::<f64>("service-success").unwrap_or(&0.6),
        ..SimulatorConfig::default()
    };
    let snapshot = args.get_one::<PathBuf>("snapshot");

    let store = match snapshot {
        Some(path) if path.exists() => Arc::new(
            InMemoryKnowledgeStore::load_snapshot(path)
                .await
                .with_context(|| format!("resuming from {}", path.display()))?,
        ),
        _ => Arc::new(InMemoryKnowledgeStore::new()),
    };

    let report = run_simulator(&sim, config, Arc::clone(&store)).await?;

    if let Some(path) = snapshot {
        store.save_snapshot(path).await?;
        tracing::info!(path = %path.display(), records = store.len(), "knowledge saved");
    }

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.generate_text());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    logging::init(matches.get_flag("json-logs"))?;
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("simulate", args)) => simulate(args, config).await?,
        Some(("predict", args)) => {
            let file = args
                .get_one::<PathBuf>("file")
                .context("log file argument is required")?;
            let report = predict_file(file, &config).await?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{report}");
            }
        }
        Some(("config", _)) => print!("{}", config.to_toml_string()?),
        _ => unreachable!("subcommand_required is set"),
    }
    Ok(())
}
