// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use synclock::commands::hold::HoldCommand;
use synclock::commands::release::ReleaseCommand;
use synclock::commands::status::StatusCommand;
use synclock::config::new_synclock_config;
use synclock::error::{
    Result, SyncLockError, format_error_chain, format_error_with_color, get_exit_code,
};
use synclock::logging;

#[derive(Parser)]
#[command(name = "synclock")]
#[command(author, version, about = "Cross-machine ownership of files in a synced folder", long_about = None)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the lock record of every managed resource
    #[command(visible_alias = "st")]
    Status {
        /// Folder holding the managed resources
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Become the owner and keep the heartbeat alive until interrupted
    Hold {
        /// Folder holding the managed resources
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Ask the current owner to hand the store over
        #[arg(long)]
        takeover: bool,

        /// Seconds to wait for the owner to release
        #[arg(long, value_name = "SECONDS", requires = "takeover")]
        timeout: Option<u64>,
    },

    /// Remove lock files left behind by a crashed process
    Release {
        /// Folder holding the managed resources
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Identity (`machine:pid`) whose locks to remove; defaults to this machine
        #[arg(long, value_name = "ID")]
        identity: Option<String>,
    },
}

fn exit_with(error: &SyncLockError) -> ! {
    if std::io::stderr().is_terminal() {
        eprint!("{}", format_error_with_color(error, true));
    } else {
        eprintln!("{}", format_error_chain(error));
    }
    std::process::exit(get_exit_code(error));
}

fn main() {
    let cli = Cli::parse();

    logging::setup_logger(cli.verbose);

    let config = match new_synclock_config() {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };

    let result: Result<()> = (|| match cli.command {
        Commands::Status { dir, json } => {
            let command = StatusCommand::new(&config)?;
            command.execute(dir.as_deref(), json)
        }
        Commands::Hold {
            dir,
            takeover,
            timeout,
        } => {
            let command = HoldCommand::new(&config)?;
            command.execute(dir.as_deref(), takeover, timeout)
        }
        Commands::Release { dir, identity } => {
            let command = ReleaseCommand::new(&config)?;
            command.execute(dir.as_deref(), identity.as_deref())
        }
    })();

    if let Err(e) = result {
        exit_with(&e);
    }
}
