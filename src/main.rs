use increbak::cli::{self, Command};
use increbak::observability;
use increbak::orchestrator::{self, RunOutcome};
use increbak::traversal::TraversalFatal;
use tracing::{error, info};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let code = match cli::parse(&args) {
        Ok(Command::Help) => {
            cli::print_help();
            cli::EXIT_SUCCESS
        }
        Ok(Command::Backup(invocation)) => run_backup_command(invocation),
        Err(e) => {
            eprintln!("error: {e}");
            cli::EXIT_INVALID_ARGS
        }
    };

    std::process::exit(code);
}

fn run_backup_command(invocation: cli::Invocation) -> i32 {
    let runtime = match tokio::runtime::Builder::new_multi_thread().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to start async runtime: {e}");
            return cli::EXIT_RUNTIME_ERROR;
        }
    };

    runtime.block_on(run_backup(invocation))
}

async fn run_backup(invocation: cli::Invocation) -> i32 {
    let _guard = match observability::init_logging(&invocation.log_level, invocation.log_dir.as_deref())
    {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: failed to initialize logging: {e}");
            return cli::EXIT_RUNTIME_ERROR;
        }
    };

    info!(
        source = %invocation.source.display(),
        target = %invocation.target.display(),
        "increbak starting",
    );

    let mut rng = rand::thread_rng();
    match orchestrator::run_backup(&invocation.source, &invocation.target, &invocation.excludes, &mut rng)
        .await
    {
        Ok(report) => {
            info!(backup = %report.backup_name, outcome = ?report.outcome, "increbak finished");
            match report.outcome {
                RunOutcome::Success => cli::EXIT_SUCCESS,
                RunOutcome::Warning => cli::EXIT_WARNING,
            }
        }
        Err(e) => {
            error!(error = %e, "backup failed");
            if is_invariant_violation(&e) {
                cli::EXIT_PROGRAMMER_ERROR
            } else {
                cli::EXIT_RUNTIME_ERROR
            }
        }
    }
}

/// `anyhow::Error` erases the concrete type, so the one distinction that
/// changes the exit code (programmer error vs. runtime error) is recovered
/// by downcasting through the error chain.
fn is_invariant_violation(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| matches!(cause.downcast_ref::<TraversalFatal>(), Some(TraversalFatal::InvariantViolation)))
}
