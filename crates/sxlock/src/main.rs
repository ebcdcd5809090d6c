//! sxlock - locks the X display until the user's password is entered

use anyhow::{Context, Result};
use clap::Parser;
use sxlock::Cli;
use sxlock_core::{
    CredentialBuffer, LockConfig, LockError, LockLoop, PasswordMask, Session, SessionOutcome,
    SignalGuard, PROGNAME,
};
use sxlock_pam::PamAuthenticator;
use sxlock_x11::X11Display;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sxlock=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(&cli) {
        Ok(outcome) => std::process::exit(outcome.exit_code()),
        Err(e) => {
            eprintln!("{PROGNAME}: {e:#}");
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<SessionOutcome> {
    let identity = std::env::var("USER")
        .ok()
        .filter(|user| !user.is_empty())
        .ok_or(LockError::MissingIdentity("USER"))?;

    let mut config = LockConfig::load_or_default(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    let signals = SignalGuard::install()?;
    let credential = CredentialBuffer::new()?;

    let display = X11Display::open(&config.font)?;
    let provider = PamAuthenticator::start(&config.pam_service, &identity)
        .map_err(LockError::auth_setup)
        .context("cannot start authentication")?;

    let username = config.username.clone().unwrap_or_else(|| identity.clone());
    let mask = PasswordMask::new(&config.passchars, config.hide_length);
    let lock = LockLoop::new(credential, mask, username, false);

    info!(version = env!("CARGO_PKG_VERSION"), "locking screen");
    let mut session = Session::new(display, provider, lock, &config);
    let outcome = session.run(&signals)?;
    Ok(outcome)
}
