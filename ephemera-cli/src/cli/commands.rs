use clap::{Args, Parser, Subcommand};
use ephemera_core::{ArtifactDescriptor, ExtractionPolicy};
use std::path::PathBuf;

/// Run Sysinternals-style tools from throwaway workspaces
#[derive(Parser, Debug)]
#[command(
    name = "ephemera",
    about = "Run downloaded tools from throwaway workspaces",
    version,
    author,
    long_about = "ephemera downloads a tool into a fresh temporary workspace, runs it, \
                  waits for it to close and deletes the workspace again. Without a \
                  subcommand it opens an interactive menu."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(
        short = 'c',
        long,
        global = true,
        value_name = "FILE",
        help = "JSON configuration file"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,

    #[arg(
        long,
        global = true,
        help = "Wait for Enter before launching a tool and before deleting its workspace"
    )]
    pub pause: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "List the tool catalog")]
    List,

    #[command(
        about = "Run one catalog tool",
        long_about = "Downloads the tool for this machine's architecture, runs it and \
                      removes its workspace once it exits.\n\n\
                      Examples:\n  \
                      ephemera run procexp\n  \
                      ephemera run tcpview --pause"
    )]
    Run(RunArgs),

    #[command(about = "Run every catalog tool, one after another")]
    RunAll,

    #[command(
        about = "Run a tool from an arbitrary URL",
        long_about = "Runs an ad-hoc tool that is not in the catalog.\n\n\
                      Examples:\n  \
                      ephemera fetch --url https://live.sysinternals.com/RAMMap64.exe --exe RAMMap64.exe\n  \
                      ephemera fetch --url https://download.sysinternals.com/files/TCPView.zip \
                      --exe tcpview64.exe --archive --subfolder TCPView"
    )]
    Fetch(FetchArgs),

    #[command(
        about = "Delete workspaces left behind by earlier runs",
        long_about = "Scans the temp root for workspace-named directories and deletes the \
                      ones that contain no protected files and no binaries in use."
    )]
    Sweep,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(value_name = "TOOL", help = "Catalog id (see `ephemera list`)")]
    pub tool: String,
}

#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    #[arg(long, value_name = "URL", help = "Download URL")]
    pub url: String,

    #[arg(long = "exe", value_name = "NAME", help = "File name of the executable to run")]
    pub executable: String,

    #[arg(long, help = "The URL serves an archive (zip, tar.gz, tar.xz)")]
    pub archive: bool,

    #[arg(
        long,
        value_name = "DIR",
        requires = "archive",
        help = "Expand the archive into this folder inside the workspace"
    )]
    pub subfolder: Option<String>,

    #[arg(long, value_name = "NAME", help = "Display name (defaults to the executable name)")]
    pub name: Option<String>,
}

impl FetchArgs {
    pub fn descriptor(&self) -> ArtifactDescriptor {
        let name = self.name.clone().unwrap_or_else(|| self.executable.clone());
        if self.archive {
            let policy = match &self.subfolder {
                Some(dir) => ExtractionPolicy::Subfolder(dir.clone()),
                None => ExtractionPolicy::Direct,
            };
            ArtifactDescriptor::archive(name, &self.url, &self.executable, policy)
        } else {
            ArtifactDescriptor::executable(name, &self.url, &self.executable)
        }
    }
}
