use clap::{Parser, Subcommand};
use shelfwise::config::{self, Config};
use shelfwise::embedding::{CommandEmbedder, Embedder};
use shelfwise::extract::ExtractorRegistry;
use shelfwise::known_names::{KnownNamesStore, NameKind};
use shelfwise::normalizer::NameNormalizer;
use shelfwise::organize::{self, Organizer};
use shelfwise::output;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Flags shared by commands that read configuration.
#[derive(clap::Args, Clone)]
struct ConfigArgs {
    /// Config file to use instead of <ROOT>/shelfwise.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding authors.json and series.json
    #[arg(long)]
    assets_dir: Option<PathBuf>,
}

#[derive(Parser)]
#[command(name = "shelfwise")]
#[command(about = "Sorts e-book files into an Author/Series/NN. Title tree")]
#[command(long_about = "\
Sorts e-book files into an Author/Series/NN. Title tree

Metadata is read from the books themselves (FB2, zipped FB2, EPUB). Author
and series spellings are canonicalized against lists of names seen before,
so \"Tolkien\" and \"J.R.R. Tolkien\" end up in one folder.

Result layout:

  library/
  ├── shelfwise.toml                   # Optional config
  ├── organized_books/                 # One copy per author
  │   ├── Frank Herbert/
  │   │   └── Dune/
  │   │       ├── 01. Dune.fb2
  │   │       └── 02. Dune Messiah.fb2
  │   └── Stanislaw Lem/
  │       └── No series/
  │           └── Solaris.epub
  └── not_organized/                   # Everything else, moved here
      └── scans/notes.pdf

Source books are copied, never modified. Unsupported files are moved.

Run 'shelfwise gen-config' to generate a documented shelfwise.toml.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Organize every book under ROOT
    Organize {
        /// Library folder to organize
        root: PathBuf,
        /// Descend into subfolders
        #[arg(long, short)]
        recursive: bool,
        /// Canonicalize names by fuzzy matching only
        #[arg(long)]
        no_embeddings: bool,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Show what organize would pick up, without touching anything
    Check {
        root: PathBuf,
        #[arg(long, short)]
        recursive: bool,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// List known canonical names
    Names {
        #[arg(value_enum)]
        kind: NamesKind,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print a stock shelfwise.toml with all options documented
    GenConfig,
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum NamesKind {
    Authors,
    Series,
}

impl From<NamesKind> for NameKind {
    fn from(kind: NamesKind) -> Self {
        match kind {
            NamesKind::Authors => NameKind::Author,
            NamesKind::Series => NameKind::Series,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Default: warn for dependencies, info for run summaries.
    // RUST_LOG=shelfwise=debug shows per-file decisions.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,shelfwise=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Organize {
            root,
            recursive,
            no_embeddings,
            config: config_args,
        } => {
            let config = resolve_config(&root, &config_args)?;
            let store = KnownNamesStore::open(assets_dir(&config, &config_args))?;
            let embedder: Option<Box<dyn Embedder>> =
                if config.embedding.is_enabled() && !no_embeddings {
                    Some(Box::new(CommandEmbedder::new(
                        &config.embedding.command,
                        config.embedding.dimension,
                    )?))
                } else {
                    None
                };
            let normalizer = NameNormalizer::new(store, embedder, config.names.thresholds());

            let (tx, rx) = std::sync::mpsc::channel();
            let mut organizer = Organizer::new(
                ExtractorRegistry::with_defaults(),
                normalizer,
                config.layout.clone(),
            )
            .with_events(tx);

            let printer_root = root.clone();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_event(&event, &printer_root) {
                        println!("{}", line);
                    }
                }
            });
            let result = organizer.organize(&root, recursive);
            drop(organizer);
            printer
                .join()
                .map_err(|_| "output thread panicked".to_string())?;
            output::print_session(&result?);
        }
        Command::Check {
            root,
            recursive,
            config: config_args,
        } => {
            let config = resolve_config(&root, &config_args)?;
            println!("==> Checking {}", root.display());
            let survey = organize::survey(
                &ExtractorRegistry::with_defaults(),
                &config.layout,
                &root,
                recursive,
            )?;
            output::print_survey(&survey);
        }
        Command::Names {
            kind,
            config: config_args,
        } => {
            let config = match &config_args.config {
                Some(path) => config::load_config_file(path)?,
                None => Config::default(),
            };
            let store = KnownNamesStore::open(assets_dir(&config, &config_args))?;
            let kind = NameKind::from(kind);
            output::print_names(kind, &store.load(kind)?);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// `--config` when given, else `<root>/shelfwise.toml` over stock defaults.
fn resolve_config(root: &Path, args: &ConfigArgs) -> Result<Config, config::ConfigError> {
    match &args.config {
        Some(path) => config::load_config_file(path),
        None => config::load_config(root),
    }
}

/// `--assets-dir` beats the config file, which beats the platform default.
fn assets_dir(config: &Config, args: &ConfigArgs) -> PathBuf {
    args.assets_dir
        .clone()
        .unwrap_or_else(|| config.names.effective_assets_dir())
}
