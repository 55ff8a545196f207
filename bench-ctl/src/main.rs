//  MAIN.rs
//    by Lut99
//
//  Created:
//    24 Feb 2023, 13:18:32
//  Last edited:
//    28 Feb 2023, 11:40:27
//  Auto updated?
//    Yes
//
//  Description:
//!   Entrypoint to the `benchctl` executable.
//

#[macro_use]
extern crate human_panic;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use console::style;
use dotenvy::dotenv;
use log::{info, LevelFilter};

use bench_cfg::layout::ClientInstance;
use bench_exe::spec::ExecutionOutcome;

use bench_ctl::lifetime;


/***** ARGUMENTS *****/
/// Defines the toplevel arguments for the `benchctl` tool.
#[derive(Debug, Parser)]
#[clap(name = "benchctl", version = env!("CARGO_PKG_VERSION"), about = "Runs the roles of a client/server benchmark on the local agent.")]
struct Arguments {
    /// If given, prints `debug` prints.
    #[clap(long, global = true, help = "If given, prints additional information during execution.", env = "DEBUG")]
    debug        : bool,
    /// The path to the agent config file to use.
    #[clap(short, long, default_value = "./agent.yml", help = "The 'agent.yml' file that describes the local agent (i.e., its identity, where its API listens and where to find the layout).", env = "AGENT_CONFIG_PATH")]
    agent_config : PathBuf,

    /// The subcommand that can be run.
    #[clap(subcommand)]
    subcommand : CtlSubcommand,
}

/// Defines subcommands for the `benchctl` tool.
#[derive(Debug, Subcommand)]
enum CtlSubcommand {
    #[clap(name = "serve", about = "Serves the coordination API of the local agent until Ctrl+C is pressed.")]
    Serve,

    #[clap(name = "run", about = "Runs the role(s) of the given workload that fall to the local agent.")]
    Run {
        /// The workload to run.
        #[clap(short, long, help = "The profile of the workload to run.", env = "PROFILE_PATH")]
        profile : PathBuf,
    },

    #[clap(name = "layout", about = "Shows which instance of the layout the local agent is, and so which role it plays.")]
    Layout,
}





/***** ENTRYPOINT *****/
#[tokio::main]
async fn main() {
    // Parse the CLI arguments
    dotenv().ok();
    let args: Arguments = Arguments::parse();

    // Prepare the logger
    let mut logger = env_logger::builder();
    logger.format_module_path(false);
    if args.debug {
        logger.filter_level(LevelFilter::Debug).init();
    } else {
        logger.filter_level(LevelFilter::Info).init();

        setup_panic!(Metadata {
            name: "benchctl".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            authors: env!("CARGO_PKG_AUTHORS").replace(':', ", ").into(),
            homepage: "".into(),
        });
    }
    info!("Initializing benchctl v{}...", env!("CARGO_PKG_VERSION"));

    // Run the subcommand given
    match args.subcommand {
        CtlSubcommand::Serve => {
            if let Err(err) = lifetime::serve(&args.agent_config).await { eprintln!("{}: {}", style("error").bold().red(), err); process::exit(1); }
        },

        CtlSubcommand::Run{ profile } => {
            match lifetime::run(&args.agent_config, &profile).await {
                Ok(ExecutionOutcome::Completed(results)) => {
                    for result in results {
                        println!("{} {} '{}' ({} metric{})", style("Finished").bold().green(), result.role, result.command_line, result.metrics.len(), if result.metrics.len() == 1 { "" } else { "s" });
                        for metric in result.metrics { println!("  - {}", metric); }
                    }
                },
                Ok(ExecutionOutcome::Cancelled) => { println!("{}", style("Cancelled").bold().yellow()); },
                Err(err) => {
                    if let Some(reason) = err.reason() { eprintln!("{}: [{}] {}", style("error").bold().red(), reason, err); } else { eprintln!("{}: {}", style("error").bold().red(), err); }
                    process::exit(1);
                },
            }
        },

        CtlSubcommand::Layout => {
            let me: ClientInstance = match lifetime::layout(&args.agent_config) {
                Ok(me)   => me,
                Err(err) => { eprintln!("{}: {}", style("error").bold().red(), err); process::exit(1); },
            };
            println!("Agent is instance {} ({}) with role {}", style(&me.name).bold().cyan(), me.ip_address, style(&me.role).bold());
        },
    }
}
