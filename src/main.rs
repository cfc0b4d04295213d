//! Auctions service binary: parses configuration, wires the in-memory
//! repositories, notification sink, and session manager into an
//! `AuctionService`, and serves the JSON HTTP surface (spec §6.2) on top of
//! it.
//!
//! CLI shape copied from the teacher's `farm-rpc/src/main.rs`: a `clap`
//! `App`/`Arg` builder (not the `derive` macros), a config file loaded from
//! an explicit `--config-file` or else the `lazy_static` default path, with
//! command-line flags overriding whatever was loaded.

use std::sync::Arc;

use clap::{crate_description, crate_name, crate_version, App, Arg};
use log::{debug, info};

use auctions_service::clock::SystemClock;
use auctions_service::config::{Config, CONFIG_FILE};
use auctions_service::http;
use auctions_service::notifications::LoggingNotificationSink;
use auctions_service::repository::{InMemoryAuctionRepository, InMemoryBidRepository};
use auctions_service::service::AuctionService;
use auctions_service::session::{AuctionSessionManager, SessionManagerConfig};

#[rocket::main]
async fn main() {
    let matches = App::new(crate_name!())
        .about(crate_description!())
        .version(crate_version!())
        .arg(
            Arg::with_name("config_file")
                .short("C")
                .long("config-file")
                .value_name("PATH")
                .takes_value(true)
                .help("Configuration file to use"),
        )
        .arg(
            Arg::with_name("save_config")
                .short("S")
                .long("save-config")
                .value_name("PATH")
                .takes_value(true)
                .help("Write current config to a file"),
        )
        .arg(
            Arg::with_name("log_level")
                .short("L")
                .long("log-level")
                .takes_value(true)
                .help("Log verbosity level (trace, debug, info, warn, error)")
                .validator(|p| {
                    let allowed = ["trace", "debug", "info", "warn", "error"];
                    if allowed.contains(&p.as_str()) {
                        Ok(())
                    } else {
                        Err(String::from("Must be one of: trace, debug, info, warn, error"))
                    }
                }),
        )
        .arg(
            Arg::with_name("http_addr")
                .long("http-addr")
                .value_name("ADDR")
                .takes_value(true)
                .help("Address to bind the HTTP surface to"),
        )
        .arg(
            Arg::with_name("http_port")
                .long("http-port")
                .value_name("PORT")
                .takes_value(true)
                .validator(|p| p.parse::<u16>().map(|_| ()).map_err(|_| "Must be a u16".to_string()))
                .help("Port to bind the HTTP surface to"),
        )
        .arg(
            Arg::with_name("alert_cycle_secs")
                .long("alert-cycle-secs")
                .value_name("SECS")
                .takes_value(true)
                .help("Seconds between lifecycle-alert passes"),
        )
        .arg(
            Arg::with_name("finalize_cycle_secs")
                .long("finalize-cycle-secs")
                .value_name("SECS")
                .takes_value(true)
                .help("Seconds between finalization passes"),
        )
        .arg(
            Arg::with_name("load_cycle_secs")
                .long("load-cycle-secs")
                .value_name("SECS")
                .takes_value(true)
                .help("Seconds between cache-load passes"),
        )
        .arg(
            Arg::with_name("finalize_delay_secs")
                .long("finalize-delay-secs")
                .value_name("SECS")
                .takes_value(true)
                .help("Grace window after an auction's end before it is finalized"),
        )
        .get_matches();

    let mut log_level = String::from("info");
    if let Some(level) = matches.value_of("log_level") {
        log_level = level.to_string();
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    info!("Loading configuration...");

    let mut config = Config::default();
    if let Some(config_file) = matches.value_of("config_file") {
        config.load(config_file).expect("failed to load config file");
    } else if let Some(ref config_file) = *CONFIG_FILE {
        let _ = config.load(config_file);
    }

    if let Some(http_addr) = matches.value_of("http_addr") {
        config.http_addr = http_addr.to_string();
    }
    if let Some(http_port) = matches.value_of("http_port") {
        config.http_port = http_port.parse().expect("validated by clap");
    }
    if let Some(secs) = matches.value_of("alert_cycle_secs") {
        config.alert_cycle_secs = secs.parse().expect("must be an integer");
    }
    if let Some(secs) = matches.value_of("finalize_cycle_secs") {
        config.finalize_cycle_secs = secs.parse().expect("must be an integer");
    }
    if let Some(secs) = matches.value_of("load_cycle_secs") {
        config.load_cycle_secs = secs.parse().expect("must be an integer");
    }
    if let Some(secs) = matches.value_of("finalize_delay_secs") {
        config.finalize_delay_secs = secs.parse().expect("must be an integer");
    }

    if let Some(config_file) = matches.value_of("save_config") {
        config.save(config_file).expect("failed to save config file");
        info!("Configuration saved to: {}", config_file);
    }

    debug!("resolved config: {:?}", config);

    let bid_repo = Arc::new(InMemoryBidRepository::new("bid"));
    let service = Arc::new(AuctionService::new(
        bid_repo.clone(),
        Arc::new(InMemoryAuctionRepository::new(bid_repo)),
        Arc::new(SystemClock),
        Arc::new(LoggingNotificationSink),
    ));

    let session_manager = Arc::new(AuctionSessionManager::new(
        service.clone(),
        Arc::new(SystemClock),
        SessionManagerConfig::from(&config),
    ));
    session_manager.turn_on();

    info!("Starting HTTP surface on {}:{}", config.http_addr, config.http_port);
    let figment = rocket::Config::figment()
        .merge(("address", config.http_addr.as_str()))
        .merge(("port", config.http_port));

    let rocket = http::mount(rocket::custom(figment), service);
    let launched = rocket.launch();
    let _ = launched.await;

    info!("Shutting down...");
    session_manager.turn_off();
}
