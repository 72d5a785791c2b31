use std::path::PathBuf;

use clap::{Parser, Subcommand};
use workflow_cli::commands::App;
use workflow_cli::config::Config;
use workflow_cli::envelope::Envelope;
use workflow_cli::telemetry::{init_telemetry, log_config_validation, log_startup_info};
use workflow_core::models::{Priority, WorkflowState};

#[derive(Parser)]
#[command(name = "ai-workflow")]
#[command(about = "Local, file-backed workflow state engine for a single developer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Project root directory (defaults to the current directory)
    #[arg(long, global = true, env = "PROJECT_ROOT")]
    project_root: Option<PathBuf>,

    /// Emit the JSON envelope instead of plain debug output
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential log output
    #[arg(long, global = true)]
    silent: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Task queue operations
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Advance the active task's workflow state
    Sync {
        #[arg(long = "state")]
        state: WorkflowState,
    },
    /// Verify the active task's state against its mandatory patterns
    Validate {
        /// Persist the result for `--use-cache`
        #[arg(long)]
        save: bool,
        /// Reuse a fresh cached result instead of re-verifying
        #[arg(long = "use-cache")]
        use_cache: bool,
        #[command(subcommand)]
        verify: Option<ValidateAction>,
    },
    /// Review checklist operations for a task in REVIEWING
    Review {
        #[command(subcommand)]
        action: ReviewAction,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    /// Create a new task, activating it immediately if none is active
    Create {
        goal: String,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        tags: Vec<String>,
        #[arg(long)]
        estimate: Option<String>,
        #[arg(long)]
        satisfies: Vec<String>,
        #[arg(long)]
        force: bool,
    },
    /// Show the active task
    Status {
        /// Print only the current workflow state
        #[arg(long = "state-only")]
        state_only: bool,
    },
    /// Complete the active task (must be in READY_TO_COMMIT)
    Complete {
        #[arg(long = "auto-activate-next", conflicts_with = "no_auto_activate_next")]
        auto_activate_next: bool,
        #[arg(long = "no-auto-activate-next")]
        no_auto_activate_next: bool,
    },
}

#[derive(Subcommand)]
enum ValidateAction {
    /// Verify a single pattern by id
    Verify {
        pattern_id: String,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand)]
enum ReviewAction {
    /// Show the active task's review checklist
    Status,
    /// Run an automated review item's command
    Execute { item_id: String },
    /// Manually mark a review item complete
    Check {
        item_id: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List the review checklist's items
    List,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let project_root = cli
        .project_root
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let config = match Config::load(&project_root) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    if !cli.silent {
        if let Err(err) = init_telemetry(&config.logging) {
            eprintln!("failed to initialize telemetry: {err}");
        }
        log_config_validation(&config);
        log_startup_info(&config);
    }

    let app = App::new(project_root);
    let envelope = run(&app, cli.command).await;
    render(&envelope, cli.json, cli.silent);
    std::process::exit(envelope.exit_code());
}

async fn run(app: &App, command: Commands) -> Envelope {
    match command {
        Commands::Task { action } => match action {
            TaskAction::Create {
                goal,
                priority,
                tags,
                estimate,
                satisfies,
                force,
            } => app.task_create(goal, priority, tags, estimate, satisfies, force).await,
            TaskAction::Status { state_only } => app.task_status(state_only).await,
            TaskAction::Complete {
                auto_activate_next,
                no_auto_activate_next,
            } => {
                let auto = if auto_activate_next {
                    Some(true)
                } else if no_auto_activate_next {
                    Some(false)
                } else {
                    None
                };
                app.task_complete(auto).await
            }
        },
        Commands::Sync { state } => app.sync_state(state).await,
        Commands::Validate { save, use_cache, verify } => match verify {
            Some(ValidateAction::Verify { pattern_id, notes }) => {
                app.validate_verify(pattern_id, notes).await
            }
            None => app.validate(save, use_cache).await,
        },
        Commands::Review { action } => match action {
            ReviewAction::Status => app.review_status().await,
            ReviewAction::Execute { item_id } => app.review_execute(item_id).await,
            ReviewAction::Check { item_id, notes } => app.review_check(item_id, notes).await,
            ReviewAction::List => app.review_list().await,
        },
    }
}

/// `--silent` requests the compact rendering of spec §6.2; otherwise JSON
/// output is pretty-printed for a human reading it directly.
fn render(envelope: &Envelope, as_json: bool, silent: bool) {
    if as_json {
        let rendered = if silent {
            serde_json::to_string(envelope)
        } else {
            serde_json::to_string_pretty(envelope)
        };
        match rendered {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => eprintln!("failed to render envelope as JSON: {err}"),
        }
    } else {
        println!("{envelope:#?}");
    }
}
