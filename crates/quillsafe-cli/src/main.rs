use anyhow::{Context, Result, bail};
use quillsafe_config::Config;
use quillsafe_engine::editing::{Alignment, DEFAULT_SIZE};
use quillsafe_engine::{
    BackupSet, EditorSession, IdentityRegistry, RenameReport, TickOutcome, codec,
};
use std::{
    env,
    path::{Path, PathBuf},
    process, thread,
    time::Duration,
};

/// Storage root used when no config file exists
const FALLBACK_STORAGE_ROOT: &str = "./quillsafe-data";

const USAGE: &str = "\
Usage:
  quillsafe init <storage-root>
  quillsafe show <file>
  quillsafe names
  quillsafe backup <file>
  quillsafe rename-backups <old-name> <new-name>
  quillsafe watch <file>";

#[derive(Debug, PartialEq)]
enum Command {
    Init(PathBuf),
    Show(PathBuf),
    Names,
    Backup(PathBuf),
    RenameBackups { old: String, new: String },
    Watch(PathBuf),
}

impl Command {
    fn parse(args: &[String]) -> Option<Self> {
        match args {
            [cmd, root] if cmd == "init" => Some(Self::Init(PathBuf::from(root))),
            [cmd, file] if cmd == "show" => Some(Self::Show(PathBuf::from(file))),
            [cmd] if cmd == "names" => Some(Self::Names),
            [cmd, file] if cmd == "backup" => Some(Self::Backup(PathBuf::from(file))),
            [cmd, old, new] if cmd == "rename-backups" => Some(Self::RenameBackups {
                old: old.clone(),
                new: new.clone(),
            }),
            [cmd, file] if cmd == "watch" => Some(Self::Watch(PathBuf::from(file))),
            _ => None,
        }
    }
}

fn load_config() -> Result<Config> {
    let config_path = Config::config_path();
    log::info!("Config path: {}", config_path.display());
    match Config::load()? {
        Some(config) => {
            log::info!("Storage root from config: {}", config.storage_root.display());
            Ok(config)
        }
        None => {
            log::info!("No config file found, using {FALLBACK_STORAGE_ROOT}");
            Ok(Config::with_storage_root(FALLBACK_STORAGE_ROOT))
        }
    }
}

/// Write a config file pointing at `storage_root`, keeping other settings
fn init(storage_root: &Path) -> Result<()> {
    let config_path = Config::config_path();
    let mut config = Config::load()?.unwrap_or_else(|| Config::with_storage_root(storage_root));
    config.storage_root = storage_root.to_path_buf();
    config
        .save_to_path(&config_path)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!("Wrote {}", config_path.display());
    Ok(())
}

fn show(file: &Path) -> Result<()> {
    let decoded = codec::decode(file)?;
    let buffer = &decoded.buffer;
    match &decoded.identity {
        Some(identity) => println!("identity: {identity}"),
        None => println!("identity: (none)"),
    }
    println!("backup interval: {} min", decoded.backup_interval);

    let text = buffer.text();
    let spans: Vec<_> = buffer.run_spans().collect();
    for (range, alignment) in buffer.paragraph_ranges().into_iter().zip(buffer.alignments()) {
        let mut line = String::new();
        for (span, attrs) in &spans {
            let start = span.start.max(range.start);
            let end = span.end.min(range.end);
            if start >= end {
                continue;
            }
            let mut markup = text[start..end].to_string();
            if attrs.bold {
                markup = format!("*{markup}*");
            }
            if attrs.italic {
                markup = format!("_{markup}_");
            }
            if attrs.underline {
                markup = format!("~{markup}~");
            }
            if attrs.size != DEFAULT_SIZE {
                markup = format!("{markup}@{}", attrs.size);
            }
            line.push_str(&markup);
        }
        let marker = match alignment {
            Alignment::Left => "<",
            Alignment::Center => "|",
            Alignment::Right => ">",
        };
        println!("{marker} {line}");
    }
    Ok(())
}

fn names(config: &Config) -> Result<()> {
    let registry = IdentityRegistry::open(config.index_path());
    let entries = registry.entries();
    if entries.is_empty() {
        println!("No documents registered in {}", registry.path().display());
    }
    for (identity, name) in entries {
        println!("{identity}  {name}");
    }
    Ok(())
}

fn print_report(report: &RenameReport) {
    println!(
        "{} renamed, {} left alone, {} failed",
        report.renamed,
        report.skipped,
        report.failures.len()
    );
    for failure in &report.failures {
        println!("  {}: {}", failure.path.display(), failure.source);
    }
}

fn load_session(config: &Config, file: &Path) -> Result<EditorSession> {
    let mut session = EditorSession::new(config);
    let rename = session
        .load(file)
        .with_context(|| format!("Failed to open {}", file.display()))?;
    if let Some(report) = rename.filter(|report| !report.is_clean()) {
        eprintln!("Backups for {:?} were only partly renamed:", session.name());
        print_report(&report);
    }
    Ok(session)
}

fn backup(config: &Config, file: &Path) -> Result<()> {
    let mut session = load_session(config, file)?;
    match session.backup_now(chrono_now()) {
        TickOutcome::Written(path) => println!("Wrote {}", path.display()),
        TickOutcome::SkippedBlank => println!("Nothing to back up: document is blank"),
        TickOutcome::Failed(e) => bail!("Backup failed: {e}"),
        other => println!("{other:?}"),
    }
    Ok(())
}

fn rename_backups(config: &Config, old: &str, new: &str) -> Result<()> {
    let store = BackupSet::new(config.backups_dir(), &config.snapshot_extension);
    let report = store.rename_sync(old, new);
    print_report(&report);
    if !report.is_clean() {
        bail!("Some backups could not be renamed");
    }
    Ok(())
}

fn watch(config: &Config, file: &Path) -> Result<()> {
    let mut session = load_session(config, file)?;
    println!(
        "Watching {} as {:?}, backups every {} min (Ctrl-C to stop)",
        file.display(),
        session.name(),
        session.backup_interval()
    );
    loop {
        thread::sleep(Duration::from_secs(1));
        match session.tick() {
            TickOutcome::Counting(_) | TickOutcome::Idle => {}
            TickOutcome::Written(path) => println!("Backup written: {}", path.display()),
            TickOutcome::SkippedBlank => println!("Backup skipped: blank document"),
            TickOutcome::SkippedUnchanged => println!("Backup skipped: no changes"),
            TickOutcome::Failed(e) => eprintln!("Backup failed: {e}"),
        }
    }
}

fn chrono_now() -> chrono::NaiveDateTime {
    chrono::Local::now().naive_local()
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = Command::parse(&args) else {
        eprintln!("{USAGE}");
        process::exit(1);
    };

    match command {
        Command::Init(root) => init(&root),
        Command::Show(file) => show(&file),
        Command::Names => names(&load_config()?),
        Command::Backup(file) => backup(&load_config()?, &file),
        Command::RenameBackups { old, new } => rename_backups(&load_config()?, &old, &new),
        Command::Watch(file) => watch(&load_config()?, &file),
    }
}
