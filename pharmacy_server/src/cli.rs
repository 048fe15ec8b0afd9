use std::{env, env::VarError};

/// The server takes no arguments. Any argument at all prints the help text and the current configuration.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
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
    // Only variables that never hold secrets are listed here
    const DISPLAY_ENVS: [&str; 10] = [
        "RUST_LOG",
        "RX_HOST",
        "RX_PORT",
        "RX_DATABASE_URL",
        "RX_CURRENCY",
        "RX_LIVE_UPDATE_BUFFER",
        "RX_STRIPE_API_URL",
        "RX_STRIPE_WEBHOOK_TOLERANCE",
        "RX_EMAIL_RELAY_URL",
        "RX_SMS_RELAY_URL",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
