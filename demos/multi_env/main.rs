//! # multi_env
//!
//! Picks a settings profile per deployment environment and keeps it fresh
//! while running.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example multi_env -- --config-dirs=demos/multi_env/configs --config=qa
//! cargo run --example multi_env -- --config-dirs=demos/multi_env/configs --config=dev --host=my.local.host
//! PORT=7000 cargo run --example multi_env -- --config-dirs=demos/multi_env/configs --config=prod
//! RUST_LOG=flagfig=debug cargo run --example multi_env -- --config-dirs=demos/multi_env/configs --config=dev
//! ```
//!
//! While it runs, edit the selected file under `demos/multi_env/configs/`: the
//! next tick reloads and prints the new settings. Ctrl-C to stop.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use flagfig::{Flagfig, FlagfigError, Loader};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct ServerSettings {
    host: String,
    port: u16,
    #[serde(rename = "apis.search")]
    search_api: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 6000,
            search_api: "https://google.es".into(),
        }
    }
}

fn load() -> Result<Loader<ServerSettings>, FlagfigError> {
    Flagfig::builder(ServerSettings::default())
        .describe("host", "Server host")
        .describe("port", "Server port")
        .describe("apis.search", "Search API endpoint")
        .build()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flagfig=info")),
        )
        .init();

    let mut settings = match load() {
        Ok(settings) => settings,
        Err(FlagfigError::Flags(e)) => e.exit(),
        Err(e) => {
            eprintln!("Failed to load settings:\n{e}");
            std::process::exit(1);
        }
    };

    match settings.profile() {
        Some(profile) => println!("profile {profile} from {:?}", settings.config_file()),
        None => println!("no profile selected"),
    }
    println!("serving at {:?}", *settings);

    loop {
        std::thread::sleep(Duration::from_secs(1));
        if !settings.is_stale() {
            continue;
        }
        let before = settings.settings().clone();
        match settings.reload() {
            Ok(()) if *settings != before => println!("now serving at {:?}", *settings),
            Ok(()) => {}
            Err(e) => eprintln!("Reload failed, keeping previous settings:\n{e}"),
        }
    }
}
