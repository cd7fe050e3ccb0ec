use std::{env, env::VarError};

/// There's no real CLI for the worker, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // STL_ADDRESS_SECRET is deliberately left off this list
    const DISPLAY_ENVS: [&str; 13] = [
        "RUST_LOG",
        "STL_DATABASE_URL",
        "STL_MAX_CONNECTIONS",
        "STL_SWEEP_INTERVAL",
        "STL_INVOICE_TTL",
        "STL_UNDERPAYMENT_TOLERANCE",
        "STL_OVERPAYMENT_THRESHOLD",
        "STL_OVERPAYMENT_ACTION",
        "STL_EVENT_BUFFER_SIZE",
        "STL_EXCHANGE_RATES",
        "STL_RATE_TTL",
        "STL_ADDRESS_TTL",
        "STL_LOG_EVENTS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    for name in DISPLAY_ENVS {
        println!("  {name:<35} {:<15}", describe_env(env::var(name)));
    }
}

fn describe_env(value: Result<String, VarError>) -> String {
    match value {
        Ok(s) if s.is_empty() => "(empty)".into(),
        Ok(s) => s,
        Err(VarError::NotPresent) => "Not set".into(),
        Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
    }
}
