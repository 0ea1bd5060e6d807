//! Replay SIP requests through the routing engine against a scripted host
//!
//! ```text
//! route-replay --messages calls.json --host host.json --config router.json
//! ```
//!
//! `calls.json` is a list of requests:
//!
//! ```json
//! [
//!   { "method": "INVITE", "uri": "sip:bob@example.com",
//!     "headers": [["From", "<sip:alice@example.com>;tag=1"], ["To", "<sip:bob@example.com>"]] },
//!   { "method": "BYE", "uri": "sip:bob@10.0.0.2", "route": "WITHINDLG" }
//! ]
//! ```
//!
//! Each entry runs through the main request route, or only through `route`
//! when given. The disposition and the host calls it caused are printed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::info;

use rvoip_routing_core::facade::ScriptedHostConfig;
use rvoip_routing_core::logging::{parse_log_level, setup_logging, LoggingConfig};
use rvoip_routing_core::{Message, RouterConfig, RoutingEngine, ScriptedHost};

#[derive(Parser, Debug)]
#[command(name = "route-replay", about = "Replay SIP requests through the routing engine")]
struct Args {
    /// JSON list of requests to route
    #[arg(short, long)]
    messages: PathBuf,

    /// Scripted host description (local domains, answer overrides)
    #[arg(long)]
    host: Option<PathBuf>,

    /// Routing configuration; defaults apply when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    /// Include source file and line in log lines
    #[arg(long)]
    file_info: bool,

    /// Log span enter and exit events
    #[arg(long)]
    log_spans: bool,

    /// Print every host call, not only the disposition
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct ReplayRequest {
    method: String,
    uri: String,
    #[serde(default)]
    headers: Vec<(String, String)>,
    /// Run only this named route
    #[serde(default)]
    route: Option<String>,
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &PathBuf) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut logging = LoggingConfig::new(parse_log_level(&args.log_level)?, "route-replay");
    if args.json {
        logging = logging.with_json();
    }
    if args.file_info {
        logging = logging.with_file_info();
    }
    if args.log_spans {
        logging = logging.with_spans();
    }
    setup_logging(logging)?;

    let config = match &args.config {
        Some(path) => RouterConfig::from_json_file(path)?,
        None => RouterConfig::default(),
    };
    let host_config: ScriptedHostConfig = match &args.host {
        Some(path) => read_json(path)?,
        None => ScriptedHostConfig::default(),
    };
    let requests: Vec<ReplayRequest> = read_json(&args.messages)?;

    let host = Arc::new(ScriptedHost::from_config(host_config));
    let engine = RoutingEngine::try_new(host.clone(), config)?;
    info!("Replaying {} requests", requests.len());

    for request in requests {
        let mut builder = Message::request(request.method.as_str(), request.uri.as_str());
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }
        let mut msg = builder.build();

        host.clear();
        let disposition = match &request.route {
            Some(route) => engine.run_named(route, &mut msg)?,
            None => engine.route(&mut msg),
        };

        println!("{} {} {} -> {}", msg.id(), request.method, request.uri, disposition);
        if args.verbose {
            for call in host.calls() {
                match call.arg {
                    Some(arg) => println!("    {}({})", call.op, arg),
                    None => println!("    {}", call.op),
                }
            }
        }
    }

    Ok(())
}
