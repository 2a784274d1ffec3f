//! Command-line front end.

pub mod commands;
pub mod context;
pub mod output;
pub mod types;

pub use context::AppContext;
pub use types::{Cli, Commands};

use crate::domain::errors::DomainError;

/// Exit status for an operation the workflow refused (illegal transition,
/// missing workflow, exhausted fix loops); 1 is left for everything else.
const EXIT_REFUSED: i32 = 2;

/// Report a failed command and exit.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let refused = err.downcast_ref::<DomainError>().is_some_and(|e| {
        matches!(
            e,
            DomainError::InvalidTransition { .. }
                | DomainError::AlreadyActive { .. }
                | DomainError::NoActiveWorkflow(_)
                | DomainError::MaxIterationsExceeded { .. }
                | DomainError::NoReachablePhase(_)
                | DomainError::AlreadyDecided { .. }
        )
    });

    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(if refused { EXIT_REFUSED } else { 1 });
}
