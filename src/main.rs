mod aggregate;
mod cli;
mod config;
mod dataset;
mod error;
mod filter;
mod output;
mod records;

use std::time::Instant;

use clap::Parser;
use sysinfo::{ProcessExt, System, SystemExt};
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use aggregate::{summarize, summarize_with, Metric, Palette, Selection, Summary};
use cli::{Args, Command};
use config::Config;
use error::CaseError;
use filter::{CaseFilter, FilterOptions};
use records::age_group_label;

/// Resident memory of this process in bytes, if the platform reports it.
fn monitor_memory() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut system = System::new();
    system.refresh_process(pid);
    system.process(pid).map(|process| process.memory())
}

fn init_logging(args: &Args) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(args.log_level()).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already set");
    }
}

fn select(metric: Metric, filter: CaseFilter) -> Selection {
    debug!("selection {:?} {:?}", metric, filter);
    Selection { filter, metric }
}

fn title(selection: &Selection) -> String {
    match selection.filter.age_group {
        Some(group) if selection.metric != Metric::Scatter => {
            format!("{} (Age Group: {})", selection.metric, age_group_label(group))
        }
        _ => selection.metric.to_string(),
    }
}

async fn casestats(args: Args) -> Result<(), CaseError> {
    let config = Config::load(args.config.as_deref())?;
    let data_path = args.data.clone().unwrap_or_else(|| config.data.path.clone());
    let output = args.output().clone();
    let format = output.format.unwrap_or(config.output.format);

    // an unreadable dataset is summarized as empty: zero counts and N/A means
    let records = match dataset::read_cases(&data_path).await {
        Ok(records) => records,
        Err(e) => {
            error!("cannot load cases: {}", e);
            Vec::new()
        }
    };
    if records.is_empty() {
        warn!("{} holds no cases", data_path.display());
    }

    let selection = match &args.command {
        Command::Options { .. } => {
            let options = FilterOptions::from_records(&records);
            return output::write_options(&options, format, output.output.as_deref()).await;
        }
        Command::Overview { filter, .. } => select(Metric::Overview, filter.to_filter(None)?),
        Command::Breakdown {
            metric,
            age,
            filter,
            ..
        } => select((*metric).into(), filter.to_filter(Some(*age))?),
        Command::Histogram { age, filter, .. } => select(Metric::Count, filter.to_filter(*age)?),
        Command::Scatter { age, filter, .. } => select(Metric::Scatter, filter.to_filter(*age)?),
    };

    let summary = if config.palette == Palette::default() {
        summarize(&records, &selection)
    } else {
        summarize_with(&records, &selection, &config.palette)
    };
    if let Summary::Categories(categories) = &summary {
        debug!("{} categories", categories.len());
    }

    output::write_summary(&summary, &title(&selection), format, output.output.as_deref()).await
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&args);
    debug!("Arguments {:#?}", args);

    let start_time = Instant::now();
    let start_memory = monitor_memory();

    if let Err(e) = casestats(args).await {
        error!("{}", e);
        std::process::exit(1);
    }

    let duration = start_time.elapsed();
    info!("done in {:?}", duration);
    if let (Some(start), Some(end)) = (start_memory, monitor_memory()) {
        debug!("memory used: {} bytes", end.saturating_sub(start));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_names_age_group() {
        let with_age = Selection {
            filter: CaseFilter {
                age_group: Some(30),
                ..Default::default()
            },
            metric: Metric::AneType,
        };
        assert_eq!(title(&with_age), "Anesthesia Type (Age Group: 30-39)");

        let overview = Selection {
            filter: CaseFilter::default(),
            metric: Metric::Overview,
        };
        assert_eq!(title(&overview), "Overview");
    }

    #[test]
    fn test_title_with_extreme_age_group() {
        let selection = Selection {
            filter: CaseFilter::from_choices(Some(1e12), "all", "all", "all").unwrap(),
            metric: Metric::Count,
        };
        assert_eq!(
            title(&selection),
            format!("Count (Age Group: {0}-{0})", u32::MAX)
        );
    }

    const CASES: &str = "\
subjectid,age,opstart,opend,icu_days,asa,intraop_ebl,death_inhosp,department,optype,ane_type,opname
5955,77,0,7200,0,2,,0,General surgery,Colorectal,General,Low anterior resection
2487,54,0,3600,2,2,100,0,General surgery,Stomach,General,Subtotal gastrectomy
2861,62,0,3600,0,1,,0,Gynecology,Others,Spinal,Hysteroscopy
1903,74,0,7200,4,3,200,1,Thoracic surgery,Lung,General,Lobectomy
";

    struct Workspace {
        dir: tempfile::TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            Workspace {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn file(&self, name: &str, contents: &str) -> String {
            let path = self.dir.path().join(name);
            std::fs::write(&path, contents).unwrap();
            path.to_string_lossy().into_owned()
        }

        fn path(&self, name: &str) -> String {
            self.dir.path().join(name).to_string_lossy().into_owned()
        }
    }

    async fn run(argv: &[&str]) -> Result<(), CaseError> {
        let mut full = vec!["casestats"];
        full.extend_from_slice(argv);
        casestats(Args::try_parse_from(full).unwrap()).await
    }

    fn read_json(path: &str) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_flags_override_config() {
        let ws = Workspace::new();
        let first_case: Vec<&str> = CASES.lines().take(2).collect();
        let config_cases = ws.file("config_cases.csv", &first_case.join("\n"));
        let flag_cases = ws.file("cases.csv", CASES);
        let config = ws.file(
            "casestats.toml",
            &format!(
                "[data]\npath = '{}'\n\n[output]\nformat = \"table\"\n",
                config_cases
            ),
        );
        let out = ws.path("overview.json");

        run(&[
            "--config",
            &config,
            "--data",
            &flag_cases,
            "overview",
            "--format",
            "json",
            "--output",
            &out,
        ])
        .await
        .unwrap();

        let json = read_json(&out);
        assert_eq!(json["count"], 4);
        assert_eq!(json["mortality_rate"], 25.0);
    }

    #[tokio::test]
    async fn test_config_supplies_defaults() {
        let ws = Workspace::new();
        let cases = ws.file("cases.csv", CASES);
        let config = ws.file(
            "casestats.toml",
            &format!(
                "[data]\npath = '{}'\n\n[output]\nformat = \"json\"\n",
                cases
            ),
        );
        let out = ws.path("mortality.json");

        run(&["--config", &config, "breakdown", "--age", "70", "--output", &out])
            .await
            .unwrap();

        let json = read_json(&out);
        assert_eq!(json[0]["label"], "No Mortality");
        assert_eq!(json[0]["value"], 1);
        assert_eq!(json[1]["value"], 1);
    }

    #[tokio::test]
    async fn test_options_written_to_file() {
        let ws = Workspace::new();
        let cases = ws.file("cases.csv", CASES);
        let config = ws.file("casestats.toml", "");
        let out = ws.path("options.txt");

        run(&["--config", &config, "--data", &cases, "options", "--output", &out])
            .await
            .unwrap();

        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.contains("Departments: General surgery, Gynecology, Thoracic surgery\n"));
        assert!(written.contains("Age groups: 50-59, 60-69, 70-79\n"));
    }

    #[tokio::test]
    async fn test_unreadable_data_is_summarized_as_empty() {
        let ws = Workspace::new();
        let config = ws.file("casestats.toml", "");
        let missing = ws.path("missing.csv");
        let out = ws.path("overview.txt");

        run(&["--config", &config, "--data", &missing, "overview", "--output", &out])
            .await
            .unwrap();

        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.contains("Patients: 0"));
        assert!(written.contains("Avg ICU Stay: N/A days"));
    }

    #[tokio::test]
    async fn test_invalid_filter_still_fails() {
        let ws = Workspace::new();
        let cases = ws.file("cases.csv", CASES);
        let config = ws.file("casestats.toml", "");

        let err = run(&["--config", &config, "--data", &cases, "overview", "--asa", "high"])
            .await
            .unwrap_err();
        assert!(matches!(err, CaseError::FilterValue { .. }));
    }

    #[test]
    fn test_monitor_memory_reports_something() {
        // not every sandbox exposes process stats
        if let Some(bytes) = monitor_memory() {
            assert!(bytes > 0);
        }
    }
}
