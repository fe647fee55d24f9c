use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use uibind::config::Config;
use uibind::dispatch::Dispatcher;
use uibind::logging::init_tracing;
use uibind::shutdown::ShutdownHandle;
use uibind::signin::{AcceptListAuthenticator, SignInForm, SignInStatus, SignInView};

/// Run the Sign-In walkthrough headlessly and print what the form shows.
#[derive(Debug, Parser)]
#[command(name = "uibind", version)]
struct Cli {
    /// Config file (defaults to the user config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// User id typed into the form.
    #[arg(long, default_value = "admin")]
    user: String,

    /// Password typed into the form.
    #[arg(long, default_value = "secret")]
    password: String,

    /// Override the simulated verification latency.
    #[arg(long)]
    latency_ms: Option<u64>,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(latency_ms) = cli.latency_ms {
        config.signin.latency_ms = latency_ms;
    }
    init_tracing(&config.logging.filter);

    let dispatcher = Dispatcher::with_config(&config.dispatcher);
    let ui = dispatcher.handle();

    let authenticator = Arc::new(AcceptListAuthenticator::from_config(&config.signin));
    let form = SignInForm::new(&ui, authenticator);
    let view = SignInView::new(&ui);
    form.attach(&view)?;

    let shutdown = ShutdownHandle::new();
    let stop = shutdown.clone();
    let _settled = form.status().subscribe(move |_, status| {
        if status.is_settled() {
            stop.signal();
        }
    });

    view.user_field.type_text(&cli.user)?;
    view.password_field.type_text(&cli.password)?;
    let worker = form.submit()?;

    let watchdog = config.signin.latency() + Duration::from_secs(5);
    let guard = dispatcher.handle().spawn_named_worker("signin-watchdog", {
        let stop = shutdown.clone();
        move |cancel| {
            let deadline = std::time::Instant::now() + watchdog;
            while std::time::Instant::now() < deadline {
                if cancel.is_cancelled() {
                    return Ok(());
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            tracing::warn!("Sign-in did not settle in time");
            stop.signal();
            Ok(())
        }
    })?;

    dispatcher.run(&shutdown)?;
    guard.cancel();

    let accepted = match worker.join() {
        Ok(accepted) => accepted,
        Err(failure) => {
            eprintln!("sign-in failed: {failure}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let shown = view.error_label.displayed();
    match form.status().get() {
        SignInStatus::SignedIn { user_id } => println!("Signed in as {user_id}"),
        other => println!("Status: {other:?}"),
    }
    if !shown.is_empty() {
        println!("Label: {shown}");
    }

    Ok(if accepted {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
