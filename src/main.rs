//! modsniff CLI entry point.

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use modsniff::optimize::ScreenParams;
use modsniff::session::{Event, MonitorParams, SessionHandle};
use modsniff::{check_capture_backend, default_interface, list_interfaces, TargetCategory};

/// Observe game traffic and rank module combinations.
#[derive(Parser, Debug)]
#[command(name = "modsniff")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// List capture-capable interfaces and exit
    #[arg(long = "list-interfaces")]
    list_interfaces: bool,

    /// List the module attribute names and exit
    #[arg(long = "list-attributes")]
    list_attributes: bool,

    /// Interface to capture on (defaults to the first wired adapter)
    #[arg(short = 'i', long = "interface", value_name = "NAME")]
    interface: Option<String>,

    /// Target category: attack, guard, support, or all
    #[arg(short = 'c', long = "category", default_value = "all")]
    category: String,

    /// Restrict screening to these attribute names
    #[arg(long = "attrs", value_name = "NAME", value_delimiter = ',')]
    attrs: Vec<String>,

    /// Prioritize these attributes (up to 6, order matters)
    #[arg(short = 'p', long = "prioritize", value_name = "NAME", value_delimiter = ',')]
    prioritize: Vec<String>,

    /// Rank by priority-attribute levels instead of combat power
    #[arg(long = "priority-order")]
    priority_order: bool,

    /// Number of solutions to report
    #[arg(long = "top", default_value = "20")]
    top: usize,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    if args.list_attributes {
        for name in modsniff::list_attributes() {
            println!("{name}");
        }
        return Ok(());
    }

    if args.list_interfaces {
        print_interfaces();
        return Ok(());
    }

    let backend = check_capture_backend();
    if !backend.available {
        bail!("capture backend unavailable; install libpcap/Npcap and grant capture rights");
    }

    let interfaces = list_interfaces();
    let interface = match args.interface.clone() {
        Some(name) => name,
        None => default_interface(&interfaces)
            .context("no capture-capable interface found")?
            .name
            .clone(),
    };

    let category: TargetCategory = args
        .category
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let screen = ScreenParams {
        category,
        attributes: args.attrs.clone(),
        prioritized_attrs: args.prioritize.clone(),
        priority_order_mode: args.priority_order,
        top_n: args.top,
    };

    let session = SessionHandle::spawn();
    session
        .start_monitoring(MonitorParams {
            interface: interface.clone(),
            screen,
        })
        .with_context(|| format!("failed to start monitoring on {interface}"))?;

    eprintln!("monitoring {interface}; waiting for game traffic (Ctrl-C to abort)");

    for event in session.events().iter() {
        match event {
            Event::Progress(message) => eprintln!("{message}"),
            Event::DataCaptured => eprintln!("module data captured"),
            Event::MonitoringStopped => eprintln!("capture stopped"),
            Event::ResultsReady(solutions) => {
                for solution in &solutions {
                    println!("{}", serde_json::to_string(solution)?);
                }
                eprintln!("{} solutions reported", solutions.len());
                return Ok(());
            }
        }
    }
    Ok(())
}

fn print_interfaces() {
    let interfaces = list_interfaces();
    if interfaces.is_empty() {
        eprintln!("no capture-capable interfaces (backend missing or no permissions)");
        return;
    }
    let default_name = default_interface(&interfaces).map(|i| i.name.clone());
    for iface in &interfaces {
        let marker = if Some(&iface.name) == default_name.as_ref() {
            "*"
        } else {
            " "
        };
        let addrs: Vec<String> = iface.addrs.iter().map(|a| a.addr.to_string()).collect();
        println!(
            "{} {:<24} {:<10} {:<8} {}  {}",
            marker,
            iface.name,
            iface.friendly.as_str(),
            if iface.virtual_adapter { "virtual" } else { "" },
            addrs.join(","),
            iface.description
        );
    }
}
