//! Colorful console output.

use owo_colors::OwoColorize;

/// ASCII art banner for server startup.
pub fn print_banner() {
    let banner = r#"
   ____                  ____       _              _       _ _
  / ___|__ _ _ __ ___   / ___|  ___| |__   ___  __| |_   _| (_)_ __   __ _
 | |   / _` | '__/ _ \  \___ \ / __| '_ \ / _ \/ _` | | | | | | '_ \ / _` |
 | |__| (_| | | |  __/   ___) | (__| | | |  __/ (_| | |_| | | | | | | (_| |
  \____\__,_|_|  \___|  |____/ \___|_| |_|\___|\__,_|\__,_|_|_|_| |_|\__, |
                                                                     |___/
"#;
    println!("{}", banner.cyan().bold());
    println!(
        "  {} {}\n",
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black(),
        "Domiciliary Care Scheduling".bright_cyan()
    );
}
