//! plviz - PrairieLearn grade aggregation and charts
//!
//! A CLI tool that fetches rosters, assessments and scores for one or
//! more course instances and prints statistics or writes Vega-Lite charts.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, API failure, no data, etc.)

use anyhow::{bail, Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use plviz::aggregator::{self, AggregatedData, StudentMatch};
use plviz::chart::{ChartRenderer, ChartSpec, JsonFileRenderer};
use plviz::cli::{Args, Command};
use plviz::config::{Config, CONFIG_FILE_NAME};
use plviz::course::Course;
use plviz::ids::Credential;
use plviz::report;
use plviz::student::GradeFilter;
use plviz::transport::{HttpTransport, Transport};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("plviz v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("plviz failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .plviz.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to list your course instances and lookup domain.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `RUST_LOG` takes precedence over the -v/-q flags when set.
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level().to_string().to_lowercase()));

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .try_init();

    if let Err(e) = result {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// Fetch every configured course, then run the requested command.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let Some(command) = args.command.clone() else {
        bail!("No command given; see --help");
    };

    let credential = match args.token.as_deref() {
        Some(token) if !token.is_empty() => Credential::new(token),
        _ => bail!("An API token is required: pass --token or set PL_TOKEN"),
    };

    if config.courses.is_empty() {
        bail!(
            "No course instances configured: pass --instance CODE=ID or add [[courses]] to {}",
            CONFIG_FILE_NAME
        );
    }

    let transport = HttpTransport::new(&config.api.base_url, config.api.timeout_seconds)
        .context("Failed to create API client")?;
    info!("Using PrairieLearn API at {}", transport.base_url());

    let mut data = fetch_with_progress(&transport, &config, &credential, args.quiet).await?;
    let renderer = JsonFileRenderer::new(&config.charts.output_dir);

    match command {
        Command::Summary { course } => {
            let codes: Vec<String> = match course {
                Some(code) => vec![code],
                None => config.courses.iter().map(|c| c.code.clone()).collect(),
            };
            for code in codes {
                let course = course_mut(&mut data, &code)?;
                let summaries = course.get_assessment_summary_statistics(&transport).await?;
                println!(
                    "\n{}",
                    report::assessment_statistics(&code, &summaries, Utc::now())
                );
            }
        }
        Command::Roster { course } => {
            let course = course_mut(&mut data, &course)?;
            println!("\n{}", course.show_student_list(&transport).await?);
        }
        Command::Boxplot { course, labels } => {
            let course = course_mut(&mut data, &course)?;
            let chart = course.render_boxplot(&transport, labels.as_deref()).await?;
            let name = course.chart_name("boxplot");
            save_chart(&renderer, &config, &name, chart)?;
        }
        Command::Histogram {
            course,
            labels,
            bins,
        } => {
            let bins = bins.unwrap_or(config.charts.histogram_bins);
            let course = course_mut(&mut data, &course)?;
            let chart = course
                .render_histogram(&transport, labels.as_deref(), bins)
                .await?;
            let name = course.chart_name("histogram");
            save_chart(&renderer, &config, &name, chart)?;
        }
        Command::Assessment { course, label } => {
            let course = course_mut(&mut data, &course)?;
            let Some(assessment) = course
                .assessments()
                .iter()
                .find(|a| a.label() == label)
                .cloned()
            else {
                bail!(
                    "No assessment labelled {} in {}",
                    label,
                    course.course_code()
                );
            };
            let chart = assessment.render_score_histogram(&transport).await?;
            let name = course.chart_name(&format!("{} scores", label));
            save_chart(&renderer, &config, &name, chart)?;
        }
        Command::Student {
            names,
            cwls,
            filter_courses,
            filter_labels,
        } => {
            let results = aggregator::find_students(
                &data.students,
                Some(names.as_slice()),
                Some(cwls.as_slice()),
                &config.lookup.login_domain,
            )?;
            let filter = GradeFilter {
                course_codes: filter_courses,
                assessment_labels: filter_labels,
            };

            for (key, found) in &results {
                print!("\n{}", report::lookup_result(key, found));
                if let StudentMatch::One(student) = found {
                    print!("{}", student.list_courses());
                    match student.render_grades(&transport, &filter).await {
                        Ok(chart) => {
                            let name = student.chart_name();
                            save_chart(&renderer, &config, &name, chart)?;
                        }
                        Err(e) => warn!("No grade chart for {}: {}", key, e),
                    }
                }
            }
        }
    }

    Ok(())
}

/// Runs the aggregation pass behind a spinner.
async fn fetch_with_progress(
    transport: &dyn Transport,
    config: &Config,
    credential: &Credential,
    quiet: bool,
) -> Result<AggregatedData> {
    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(format!(
        "Fetching {} course instance(s)...",
        config.courses.len()
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = aggregator::fetch_data(transport, &config.courses, credential).await;
    spinner.finish_and_clear();

    let data = result.context("Failed to fetch course data")?;
    println!(
        "📚 Fetched {} course(s), {} students, {} assessments",
        data.courses.len(),
        data.students.len(),
        data.assessments.len()
    );
    Ok(data)
}

fn course_mut<'a>(data: &'a mut AggregatedData, code: &str) -> Result<&'a mut Course> {
    data.course_mut(code)
        .with_context(|| format!("Course {} was not fetched; add it with --instance", code))
}

fn save_chart(
    renderer: &dyn ChartRenderer,
    config: &Config,
    name: &str,
    chart: ChartSpec,
) -> Result<()> {
    let chart = chart.sized(config.charts.width, config.charts.height);
    let path = renderer.render(name, &chart)?;
    println!("📈 Chart saved to: {}", path.display());
    Ok(())
}
