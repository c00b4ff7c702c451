use clap::{Parser, Subcommand};
use pilot::{
    CheckManager, CoverageTracker, Debouncer, DiagnosticsSink, EditorContext, HostSurfaces,
    MemoryDiagnostics, MemoryHost, MemoryOutputFactory, MemoryStatus, PilotConfig, PinCoordinator,
    StatusIndicator, ViewRegistry,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use toolchain::{
    workspace_symbols, GoToolchain, RunRequest, SourceScanLocator, TestEntity, TestFlavor,
    TestLocator, TestRunner,
};
use tracing::error;

#[derive(Parser)]
#[command(name = "autopin")]
#[command(about = "Pin, auto-run, and track Go tests from the terminal")]
struct Cli {
    /// Path to an autopin.toml configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run tests in a package once and report per-test outcomes
    Test {
        /// Package directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        /// Restrict the run to these test names
        #[arg(short, long)]
        run: Vec<String>,
        /// Run benchmarks instead of tests
        #[arg(short, long)]
        bench: bool,
        /// Write and report a coverage profile
        #[arg(long)]
        cover: bool,
        /// Print the raw outcome as JSON instead of the table
        #[arg(long)]
        json: bool,
    },
    /// Pin one test and re-run it whenever the package changes
    Watch {
        /// Test file containing the function to pin
        file: PathBuf,
        /// Function to pin (defaults to the first test in the file)
        #[arg(short, long)]
        func: Option<String>,
    },
    /// Type-check a package and print compiler diagnostics
    Check {
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
    /// Vet a package and print warnings
    Vet {
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
    /// Parse a coverage profile and print a per-file summary
    Cover {
        profile: PathBuf,
    },
    /// Query workspace symbols through the external symbol tool
    Symbols {
        query: String,
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Test {
            dir,
            run,
            bench,
            cover,
            json,
        } => run_once(&config, &dir, &run, bench, cover, json).await?,
        Commands::Watch { file, func } => watch(&config, &file, func.as_deref()).await?,
        Commands::Check { dir } => check(&config, &dir).await?,
        Commands::Vet { dir } => vet(&config, &dir).await?,
        Commands::Cover { profile } => cover_summary(&profile).await?,
        Commands::Symbols { query, dir } => symbols(&config, &dir, &query).await?,
    }

    Ok(())
}

async fn load_config(path: Option<&Path>) -> Result<PilotConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(PilotConfig::load(path).await?),
        None => {
            let default_path = Path::new("autopin.toml");
            if default_path.exists() {
                Ok(PilotConfig::load(default_path).await?)
            } else {
                Ok(PilotConfig::default())
            }
        }
    }
}

async fn collect_entities(
    dir: &Path,
    flavor: TestFlavor,
) -> Result<Vec<TestEntity>, Box<dyn std::error::Error>> {
    let locator = SourceScanLocator;
    let pattern = dir.join("*_test.go");
    let mut entities = Vec::new();
    for entry in glob::glob(&pattern.to_string_lossy())? {
        let path = entry?;
        entities.extend(
            locator
                .test_entities(&path, flavor, &CancellationToken::new())
                .await?,
        );
    }
    Ok(entities)
}

async fn run_once(
    config: &PilotConfig,
    dir: &Path,
    names: &[String],
    bench: bool,
    cover: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let flavor = if bench {
        TestFlavor::Benchmark
    } else {
        TestFlavor::Test
    };
    let mut entities = collect_entities(dir, flavor).await?;
    if !names.is_empty() {
        entities.retain(|e| names.iter().any(|n| n == &e.name));
    }
    if entities.is_empty() {
        println!("No tests found in {}", dir.display());
        return Ok(());
    }

    let toolchain = GoToolchain::new(config.go.clone())?;
    let mut request = RunRequest::new(dir)
        .with_entities(entities.clone())
        .with_flavor(flavor);
    let profile = dir.join("autopin-cover.out");
    if cover {
        request = request.with_coverage_profile(&profile);
    }

    let outcome = toolchain.run(&request).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    if outcome.build_failed {
        println!("BUILD FAILED");
    }
    for entity in &entities {
        match outcome.passed(&entity.name) {
            Some(true) => println!("ok      {}", entity.name),
            Some(false) => println!("FAIL    {}", entity.name),
            None => println!("unknown {}", entity.name),
        }
    }
    if cover && !outcome.build_failed {
        cover_summary(&profile).await?;
    }

    Ok(())
}

async fn watch(
    config: &PilotConfig,
    file: &Path,
    func: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let runner: Arc<dyn TestRunner> = Arc::new(GoToolchain::new(config.go.clone())?);
    let locator: Arc<dyn TestLocator> = Arc::new(SourceScanLocator);
    let views = ViewRegistry::new();
    let coverage = Arc::new(CoverageTracker::new(views));

    let pin_diagnostics = MemoryDiagnostics::new();
    let status = MemoryStatus::new();
    let surfaces = HostSurfaces {
        editor: MemoryHost::new(),
        outputs: MemoryOutputFactory::new(),
        status: status.clone(),
        pin_diagnostics: pin_diagnostics.clone(),
        file_diagnostics: MemoryDiagnostics::new(),
    };

    let coordinator = PinCoordinator::new(
        runner,
        locator.clone(),
        coverage,
        surfaces,
        config.clone(),
    );

    // Resolve the requested function up front so a typo fails fast.
    let entities = locator
        .test_entities(file, TestFlavor::Test, &CancellationToken::new())
        .await?;
    let hint = match func {
        Some(name) => Some(
            entities
                .iter()
                .find(|e| e.name == name)
                .cloned()
                .ok_or_else(|| format!("no test named {name} in {}", file.display()))?,
        ),
        None => entities.first().cloned(),
    };
    let cursor = hint
        .as_ref()
        .map(|e| e.range.start)
        .unwrap_or(toolchain::Position::new(0, 0));

    let pinned = coordinator
        .pin_at_cursor(&EditorContext::new(file, cursor), TestFlavor::Test, hint)
        .await?;
    println!("pinned {}, watching {}", pinned.name, file.display());

    // Re-render listener: mirror status and diagnostics to the terminal.
    let mut signal = coordinator.notifier().subscribe();
    {
        let status = status.clone();
        let pin_diagnostics = pin_diagnostics.clone();
        tokio::spawn(async move {
            loop {
                signal.changed().await;
                if let Some(state) = status.current() {
                    println!("status: {}", state.text);
                }
                for file in pin_diagnostics.files() {
                    for diagnostic in pin_diagnostics.get(&file) {
                        println!("  {}: {}", file.display(), diagnostic.message);
                    }
                }
            }
        });
    }

    let debouncer = {
        let coordinator = coordinator.clone();
        Debouncer::new(config.debounce_window(), move || {
            let coordinator = coordinator.clone();
            async move {
                coordinator.autorun_on_change().await;
            }
        })
    };

    // Poll package mtimes; the debouncer coalesces noisy save bursts.
    let package = file.parent().unwrap_or(Path::new(".")).to_path_buf();
    let mut seen = scan_mtimes(&package);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                coordinator.clear_pinned();
                println!("\nstopped");
                return Ok(());
            }
            _ = tokio::time::sleep(std::time::Duration::from_millis(300)) => {
                let now = scan_mtimes(&package);
                if now != seen {
                    seen = now;
                    debouncer.call();
                }
            }
        }
    }
}

fn scan_mtimes(dir: &Path) -> HashMap<PathBuf, SystemTime> {
    let mut mtimes = HashMap::new();
    let pattern = dir.join("*.go");
    let Ok(paths) = glob::glob(&pattern.to_string_lossy()) else {
        return mtimes;
    };
    for path in paths.flatten() {
        if let Ok(metadata) = std::fs::metadata(&path) {
            if let Ok(modified) = metadata.modified() {
                mtimes.insert(path, modified);
            }
        }
    }
    mtimes
}

async fn check(config: &PilotConfig, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let toolchain = Arc::new(GoToolchain::new(config.go.clone())?);
    let diagnostics = MemoryDiagnostics::new();
    let status = MemoryStatus::new();
    let manager = CheckManager::new(toolchain, diagnostics.clone(), status);

    let has_tests = !collect_entities(dir, TestFlavor::Test).await?.is_empty();
    let count = manager.run_build(dir, has_tests).await?;
    if count == 0 {
        println!("✓ build check passed");
    } else {
        print_diagnostics(&diagnostics);
    }
    Ok(())
}

async fn vet(config: &PilotConfig, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let toolchain = Arc::new(GoToolchain::new(config.go.clone())?);
    let diagnostics = MemoryDiagnostics::new();
    let status = MemoryStatus::new();
    let manager = CheckManager::new(toolchain, diagnostics.clone(), status);

    let count = manager.run_vet(dir).await?;
    if count == 0 {
        println!("✓ vet passed");
    } else {
        print_diagnostics(&diagnostics);
    }
    Ok(())
}

fn print_diagnostics(diagnostics: &MemoryDiagnostics) {
    for file in diagnostics.files() {
        for diagnostic in diagnostics.get(&file) {
            println!(
                "{}:{}: {}",
                file.display(),
                diagnostic.range.start.line + 1,
                diagnostic.message
            );
        }
    }
}

async fn cover_summary(profile: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let tracker = CoverageTracker::new(ViewRegistry::new());
    tracker.set_profile_path(profile);
    tracker.reanalyze().await?;

    let files = tracker.tracked_files();
    if files.is_empty() {
        println!("No coverage records in {}", profile.display());
        return Ok(());
    }
    for file in files {
        if let Some(coverage) = tracker.coverage_for(&file) {
            let covered = coverage.covered.len();
            let total = covered + coverage.uncovered.len();
            println!("{file}: {covered}/{total} ranges covered");
        }
    }
    Ok(())
}

async fn symbols(
    config: &PilotConfig,
    dir: &Path,
    query: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match workspace_symbols(&config.go, dir, query, &CancellationToken::new()).await {
        Ok(declarations) => {
            for declaration in declarations {
                println!(
                    "{:8} {:32} {}:{}",
                    declaration.kind,
                    declaration.name,
                    declaration.path.display(),
                    declaration.line
                );
            }
            Ok(())
        }
        Err(err) => {
            error!("workspace symbol query failed: {err}");
            Err(err.into())
        }
    }
}
