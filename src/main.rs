//! Snapshot-based manager for reproducible experiment runs.
//!
//! Each `em run` freezes the tracked source files onto a branch named after
//! the experiment, checks it out into an isolated worktree under
//! `experiments/`, and supervises the job there.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use em::run::RunOptions;
use em::{clean, ctl, exit_codes, list, logging, rename, reset, run, show};

#[derive(Parser)]
#[command(name = "em", version, about = "Manage reproducible experiment runs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the project layout (experiments/, data/, registry, config).
    Init {
        /// Project destination (default: current directory).
        dest: Option<PathBuf>,
    },
    /// Run an experiment in an isolated sandbox.
    Run {
        /// The name of the experiment.
        name: String,
        /// CSV ids of gpus to use. none = all.
        #[arg(long, short)]
        gpu: Option<String>,
        /// Run the experiment in the background.
        #[arg(long)]
        bg: bool,
        /// A short description of any source changes.
        #[arg(long)]
        desc: Option<String>,
        /// Extra arguments appended to the job program.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prog_args: Vec<String>,
    },
    /// Resume a stopped experiment in its existing sandbox.
    Resume {
        /// The name of the experiment.
        name: String,
        /// The epoch from which to resume.
        #[arg(long)]
        epoch: Option<String>,
        /// CSV ids of gpus to use. none = all.
        #[arg(long, short)]
        gpu: Option<String>,
        /// Resume the experiment into the background.
        #[arg(long)]
        bg: bool,
    },
    /// List experiments.
    #[command(alias = "ls")]
    List {
        /// Filter experiments by <field>=<value>.
        #[arg(long, short)]
        filter: Option<String>,
    },
    /// Show details about an experiment.
    Show {
        /// The name of the experiment.
        name: String,
        /// Also print the job's serialized run options.
        #[arg(long)]
        opts: bool,
    },
    /// Send a command to a running experiment.
    Ctl {
        /// The name of the experiment.
        name: String,
        /// The control command to send ("stop" interrupts the job).
        #[arg(required = true)]
        cmd: Vec<String>,
    },
    /// Clean up an experiment.
    Clean {
        /// The name of the experiment.
        name: String,
        /// Remove it even while running.
        #[arg(long, short)]
        force: bool,
    },
    /// Clear the live state of a glitched experiment record.
    Reset {
        /// The name of the experiment.
        name: String,
    },
    /// Rename an experiment.
    #[command(alias = "mv")]
    Rename {
        /// The name of the experiment.
        name: String,
        /// The new name of the experiment.
        newname: String,
    },
}

fn main() {
    logging::init();
    if let Err(err) = dispatch() {
        eprintln!("error: {err:#}");
        std::process::exit(exit_codes::ERROR);
    }
}

fn dispatch() -> Result<()> {
    let cli = Cli::parse();
    let root = Path::new(".");

    match cli.command {
        Command::Init { dest } => {
            let dest = dest.unwrap_or_else(|| root.to_path_buf());
            em::io::layout::init_project(&dest)?;
            Ok(())
        }
        Command::Run {
            name,
            gpu,
            bg,
            desc,
            prog_args,
        } => {
            let options = RunOptions {
                gpu,
                background: bg,
                description: desc,
                prog_args,
            };
            // The job's own exit status is recorded in the registry, not
            // surfaced as a tool failure.
            run::run_experiment(root, &name, &options)?;
            Ok(())
        }
        Command::Resume {
            name,
            epoch,
            gpu,
            bg,
        } => {
            let options = RunOptions {
                gpu,
                background: bg,
                ..RunOptions::default()
            };
            run::resume_experiment(root, &name, epoch.as_deref(), &options)?;
            Ok(())
        }
        Command::List { filter } => {
            for name in list::list_experiments(root, filter.as_deref())? {
                println!("{name}");
            }
            Ok(())
        }
        Command::Show { name, opts } => {
            print!("{}", show::show_experiment(root, &name, opts)?);
            Ok(())
        }
        Command::Ctl { name, cmd } => ctl::control_experiment(root, &name, &cmd),
        Command::Clean { name, force } => clean::clean_experiment(root, &name, force),
        Command::Reset { name } => reset::reset_experiment(root, &name),
        Command::Rename { name, newname } => rename::rename_experiment(root, &name, &newname),
    }
}
