//! Standalone game server binary
//!
//! Usage: cargo run -p gemstone-web --bin gemstone-server -- [--host HOST] [--port PORT]
//!
//! Settings come from defaults, the TOML file named by `GEMSTONE_CONFIG`,
//! `GEMSTONE_*` variables and finally these flags.

use gemstone_web::{AppSettings, WebServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = AppSettings::load()?;

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--host" | "-h" => {
                settings.host = flag_value(&args, i, "--host")?.to_string();
                i += 2;
            }
            "--port" | "-p" => {
                settings.port = flag_value(&args, i, "--port")?
                    .parse()
                    .map_err(|_| "invalid port number")?;
                i += 2;
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            other => {
                print_help();
                return Err(format!("unknown argument: {other}").into());
            }
        }
    }
    settings.validate()?;

    gemstone_web::init_logging(settings.log_format)?;

    tracing::info!(
        host = %settings.host,
        port = settings.port,
        storage_timeout_ms = settings.storage_timeout_ms,
        outbound_queue_capacity = settings.outbound_queue_capacity,
        "starting gemstone server"
    );

    let server = WebServer::new(&settings)?;
    let handle = server.start().await?;
    tracing::info!(address = %handle.address(), "server running, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;

    tracing::info!("shutting down server");
    handle.shutdown().await?;
    tracing::info!("server stopped cleanly");

    Ok(())
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, String> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn print_help() {
    println!("Gemstone game server");
    println!();
    println!("Usage: gemstone-server [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --host, -h <HOST>    Host to bind to (default: 127.0.0.1)");
    println!("  --port, -p <PORT>    Port to bind to (default: 8080)");
    println!("  --help               Show this help message");
    println!();
    println!("Environment:");
    println!("  GEMSTONE_CONFIG      TOML settings file");
    println!("  GEMSTONE_<FIELD>     Override one setting, e.g. GEMSTONE_PORT=9000");
    println!("  RUST_LOG             Log filter (default: info,gemstone_web=debug)");
}
