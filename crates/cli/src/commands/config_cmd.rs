//! `guardian config` — print the default configuration.

use guardian_config::AppConfig;

pub fn print_default() {
    println!("# {}", AppConfig::config_dir().join("config.toml").display());
    print!("{}", AppConfig::default_toml());
}
