use std::{env, env::VarError};

/// Prints the help text and the current configuration if the server was started with any argument at all.
///
/// Returns true if it did, in which case the caller should exit.
pub fn handle_command_line_args() -> bool {
    let wants_help = env::args().nth(1).is_some();
    if wants_help {
        display_readme();
        display_envs();
    }
    wants_help
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 18] = [
        "RUST_LOG",
        "MKT_HOST",
        "MKT_PORT",
        "MKT_DATABASE_URL",
        "MKT_CURRENCY",
        "MKT_TAX_RATE_BPS",
        "MKT_SHIPPING_FLAT",
        "MKT_FREE_SHIPPING_THRESHOLD",
        "MKT_REFUND_RESTOCK",
        "MKT_IDEMPOTENCY_TTL_HOURS",
        "MKT_UNPAID_ORDER_TIMEOUT",
        "MKT_GATEWAY_URL",
        "MKT_GATEWAY_HMAC_HEADER",
        "MKT_GATEWAY_HMAC_CHECKS",
        "MKT_GATEWAY_TIMEOUT_SECS",
        "MKT_GATEWAY_IP_WHITELIST",
        "MKT_USE_X_FORWARDED_FOR",
        "MKT_USE_FORWARDED",
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
