use console::Term;
use forgekit::CancelToken;

/// Cancel `token` on the first Ctrl+C; exit on the second.
///
/// In-flight requests observe the token and fail with `Cancelled`, so the
/// reconcile command still prints what it finished.
pub(crate) fn cancel_on_ctrl_c(token: CancelToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            return;
        }

        let is_tty = Term::stdout().is_term();
        if is_tty {
            eprintln!("\n\nShutdown requested, cancelling outstanding requests...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Shutdown requested, cancelling outstanding requests");
        }

        token.cancel();

        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        if is_tty {
            eprintln!("Force quit!");
        }
        std::process::exit(130);
    });
}
