use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "gitask",
    version,
    about = "Ask questions about a git repository, answered by a local model"
)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Clone a repository and replace the index with its chunks.
    Ingest {
        /// Repository URL (https, http, ssh, git@ or file).
        url: String,
    },

    /// Index a local directory instead of cloning.
    #[command(name = "ingest-dir")]
    IngestDir {
        /// Directory to walk.
        path: PathBuf,
    },

    /// Answer a question from the indexed repository.
    Ask {
        /// The question.
        question: String,
        /// Plain documentation answer instead of a code example.
        #[arg(long)]
        chat: bool,
        /// Number of chunks to retrieve (defaults to `index.top_k`).
        #[arg(short, long)]
        k: Option<usize>,
        /// Also print every retrieved chunk.
        #[arg(long)]
        chunks: bool,
    },

    /// Show the chunks nearest to some text, without generation.
    Search {
        text: String,
        #[arg(short, long, default_value_t = 5)]
        k: usize,
    },

    /// Show the document count of the configured collection.
    Stats,

    /// Empty the configured collection.
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ask_with_flags() {
        let cli = Cli::parse_from(["gitask", "ask", "how?", "--chat", "-k", "3", "--chunks"]);
        match cli.command {
            Command::Ask {
                question,
                chat,
                k,
                chunks,
            } => {
                assert_eq!(question, "how?");
                assert!(chat);
                assert_eq!(k, Some(3));
                assert!(chunks);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::parse_from(["gitask", "stats", "--config", "custom.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(cli.command, Command::Stats));
    }

    #[test]
    fn ingest_dir_name() {
        let cli = Cli::parse_from(["gitask", "ingest-dir", "./repo"]);
        assert!(matches!(cli.command, Command::IngestDir { path } if path == PathBuf::from("./repo")));
    }

    #[test]
    fn search_default_k() {
        let cli = Cli::parse_from(["gitask", "search", "config loading"]);
        assert!(matches!(cli.command, Command::Search { k: 5, .. }));
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
