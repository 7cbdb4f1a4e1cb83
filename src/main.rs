// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Collection Helper: catalogue content files by identifier and version
//!
//! Without a subcommand the interactive view opens; every other subcommand
//! runs once and exits, for scripting.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use collection_helper::backup::BackupManager;
use collection_helper::config::AppConfig;
use collection_helper::db::{Database, NewRecord, RecordQuery, RecordUpdate};
use collection_helper::filename::{format_version, ContentId, Version};
use collection_helper::logging::{self, Verbosity};
use collection_helper::scanner;
use collection_helper::tui::{self, App};
use collection_helper::view::{SortColumn, SortDirection, TableRow, ViewState};
use collection_helper::{CollectionError, Result};

/// Collection Helper CLI
#[derive(Parser, Debug)]
#[command(name = "collection-helper")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Catalogue content files by identifier and version", long_about = None)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open the interactive view (default)
    Ui,

    /// Scan the content folder and update the database
    Scan {
        /// Folder to scan (overrides config for this run)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// List entries
    List {
        /// Only IDs containing this text
        #[arg(short, long)]
        search: Option<String>,

        /// Sort column
        #[arg(long, default_value = "id", value_parser = ["id", "version", "tested", "present"])]
        sort: String,

        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,

        /// Only entries whose file was not found by the last scan
        #[arg(short, long)]
        missing: bool,

        /// Only tested (yes) or untested (no) entries
        #[arg(long, value_parser = ["yes", "no"])]
        tested: Option<String>,
    },

    /// Add an entry by hand
    Add {
        /// Identifier, e.g. RJ01234567
        id: String,

        /// Version, e.g. 1.2
        #[arg(long)]
        version: Option<String>,

        /// Mark as tested
        #[arg(long)]
        tested: bool,
    },

    /// Edit an entry
    Edit {
        /// Row id as shown by `list`
        rowid: i64,

        /// New identifier
        #[arg(long)]
        id: Option<String>,

        /// New version (`-` clears it)
        #[arg(long)]
        version: Option<String>,

        /// Tested flag
        #[arg(long, value_parser = ["yes", "no"])]
        tested: Option<String>,
    },

    /// Remove an entry
    Remove {
        /// Row id as shown by `list`
        rowid: i64,

        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },

    /// Set the tested flag of an entry
    Tested {
        /// Row id as shown by `list`
        rowid: i64,

        #[arg(value_parser = ["yes", "no"])]
        value: String,
    },

    /// Backup operations
    Backup {
        #[command(subcommand)]
        action: BackupCommands,
    },

    /// Show database statistics
    Stats,

    /// Export all entries to JSON
    Export {
        /// Output file
        output: PathBuf,
    },

    /// Vacuum database (reclaim space)
    Vacuum,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum BackupCommands {
    /// Back up the database now
    Create,

    /// List backups, newest first
    List,

    /// Replace the database with a backup
    Restore {
        /// Backup file
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set one configuration value and save
    Set {
        /// Key, e.g. folder_path or database.backup_keep
        key: String,

        value: String,
    },

    /// Print the configuration file path
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;

    let verbosity = Verbosity {
        verbose: cli.verbose,
        trace: cli.trace,
        quiet: cli.quiet,
        debug_enabled: config.debug_enabled,
    };

    match cli.command {
        None | Some(Commands::Ui) => {
            let _guard = logging::init_file(Path::new(&config.log_dir), verbosity)?;
            run_ui(config, cli.config)
        }
        Some(command) => {
            logging::init_stderr(verbosity);
            run_command(command, config, &cli.config, &cli.format)
        }
    }
}

fn backups(config: &AppConfig) -> BackupManager {
    BackupManager::new(&config.database.backup_dir, config.database.backup_keep)
}

/// Back up, then open the database for writing. A failed backup is only
/// logged.
fn open_for_write(config: &AppConfig) -> Result<Database> {
    let db_path = config.db_path();
    if let Err(e) = backups(config).create(&db_path) {
        warn!("Startup backup failed: {}", e);
    }
    let db = Database::open(&db_path)?;
    debug!("Database opened: {}", db_path.display());
    Ok(db)
}

/// Open the database without writing to it. A file that still needs a
/// schema upgrade takes the write path, backup included.
fn open_for_read(config: &AppConfig) -> Result<Database> {
    let db_path = config.db_path();
    match Database::open_read_only(&db_path)? {
        Some(db) => {
            debug!("Database opened read-only: {}", db_path.display());
            Ok(db)
        }
        None => {
            info!("Upgrading database layout of {}", db_path.display());
            open_for_write(config)
        }
    }
}

fn parse_yes_no(value: &str) -> bool {
    value == "yes"
}

fn run_ui(config: AppConfig, config_path: PathBuf) -> Result<()> {
    info!("Collection Helper v{} starting", env!("CARGO_PKG_VERSION"));
    let db = open_for_write(&config)?;
    let scan_on_start = config.folder().is_some();
    let mut app = App::new(db, config, config_path);
    if scan_on_start {
        app.rescan();
    }
    tui::run(app)
}

fn run_command(command: Commands, config: AppConfig, config_path: &Path, format: &str) -> Result<()> {
    let json = format == "json";

    match command {
        Commands::Ui => return run_ui(config, config_path.to_path_buf()),
        Commands::Scan { dir } => {
            let folder = dir.or_else(|| config.folder()).ok_or_else(|| {
                CollectionError::Config(
                    "No folder configured. Pass --dir or run `config set folder_path <dir>`".to_string(),
                )
            })?;
            let db = open_for_write(&config)?;
            let report = scanner::scan_folder(&db, &folder)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Scanned {}", folder.display());
                println!("  Files:     {} ({} without an ID)", report.files_seen, report.skipped);
                println!("  IDs:       {}", report.matched);
                println!("  New:       {}", report.inserted);
                println!("  Updated:   {}", report.updated);
                println!("  Unchanged: {}", report.unchanged);
                println!("  Missing:   {}", report.missing);
            }
        }
        Commands::List { search, sort, asc, missing, tested } => {
            let db = open_for_read(&config)?;
            let view = ViewState {
                search: search.unwrap_or_default(),
                sort_column: match sort.as_str() {
                    "version" => SortColumn::Version,
                    "tested" => SortColumn::Tested,
                    "present" => SortColumn::Present,
                    _ => SortColumn::Id,
                },
                sort_direction: if asc { SortDirection::Ascending } else { SortDirection::Descending },
                only_missing: missing,
            };
            let query = RecordQuery { tested: tested.as_deref().map(parse_yes_no), ..view.query() };
            let records = view.apply(db.list(&query)?);

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                println!("{:>6}  {:<16} {:<7} {}", "ROW", "ID", "TESTED", "VERSION");
                for record in &records {
                    let row = TableRow::from(record);
                    println!("{:>6}  {:<16} {:<7} {}", row.rowid, row.display_id(), row.tested, row.version);
                }
                println!("\n{} entries", records.len());
            }
        }
        Commands::Add { id, version, tested } => {
            let record = NewRecord {
                content_id: ContentId::parse(&id)?,
                version: Version::parse(version.as_deref().unwrap_or_default())?,
                tested,
            };
            let db = open_for_write(&config)?;
            let rowid = db.insert(&record)?;
            info!("Added {} as row {}", record.content_id, rowid);
            println!("Added {} {} (row {})", record.content_id, format_version(record.version.as_ref()), rowid);
        }
        Commands::Edit { rowid, id, version, tested } => {
            let db = open_for_write(&config)?;
            let current = db.get(rowid)?.ok_or(CollectionError::NotFound(rowid))?;
            let update = RecordUpdate {
                content_id: match id {
                    Some(id) => ContentId::parse(&id)?,
                    None => current.content_id,
                },
                version: match version {
                    Some(v) => Version::parse(&v)?,
                    None => current.version,
                },
                tested: tested.as_deref().map(parse_yes_no).unwrap_or(current.tested),
            };
            db.update(rowid, &update)?;
            println!(
                "Updated row {}: {} {} tested={}",
                rowid,
                update.content_id,
                format_version(update.version.as_ref()),
                if update.tested { "yes" } else { "no" }
            );
        }
        Commands::Remove { rowid, force } => {
            if !force {
                eprintln!("Use --force to confirm removing row {}", rowid);
                return Ok(());
            }
            let db = open_for_write(&config)?;
            let record = db.get(rowid)?.ok_or(CollectionError::NotFound(rowid))?;
            db.delete(rowid)?;
            println!("Removed {}", record.content_id);
        }
        Commands::Tested { rowid, value } => {
            let db = open_for_write(&config)?;
            db.set_tested(rowid, parse_yes_no(&value))?;
            println!("Row {} tested={}", rowid, value);
        }
        Commands::Backup { action } => run_backup_command(&config, action, json)?,
        Commands::Stats => {
            let db = open_for_read(&config)?;
            let stats = db.stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Database Statistics ({}):", config.database.path);
                println!("  Entries: {}", stats.total);
                println!("  Tested: {}", stats.tested);
                println!("  Present: {}", stats.present);
                println!("  Missing: {}", stats.total - stats.present);
                println!("  With version: {}", stats.with_version);
            }
        }
        Commands::Export { output } => {
            let db = open_for_read(&config)?;
            let records = db.all()?;
            let json = serde_json::to_string_pretty(&records)?;
            std::fs::write(&output, json)?;
            println!("Exported {} entries to {:?}", records.len(), output);
        }
        Commands::Vacuum => {
            let db = open_for_write(&config)?;
            db.vacuum()?;
            println!("Database vacuumed successfully");
        }
        Commands::Config { action } => run_config_command(config, action, config_path)?,
    }

    Ok(())
}

fn run_backup_command(config: &AppConfig, action: BackupCommands, json: bool) -> Result<()> {
    let manager = backups(config);
    let db_path = config.db_path();

    match action {
        BackupCommands::Create => match manager.create(&db_path)? {
            Some(path) => println!("Backup created: {}", path.display()),
            None => println!("No database at {} yet, nothing to back up", db_path.display()),
        },
        BackupCommands::List => {
            let list = manager.list_for(&db_path)?;
            if json {
                let paths: Vec<String> = list.iter().map(|b| b.path.to_string_lossy().into_owned()).collect();
                println!("{}", serde_json::to_string_pretty(&paths)?);
            } else {
                println!("Backups in {} (keeping {}):", manager.dir().display(), manager.keep());
                for backup in list {
                    println!("  {}  {}", backup.stamp, backup.path.display());
                }
            }
        }
        BackupCommands::Restore { file } => {
            let safety = manager.restore(&file, &db_path)?;
            println!("Restored {} from {}", db_path.display(), file.display());
            if let Some(path) = safety {
                println!("Previous database saved as {}", path.display());
            }
        }
    }

    Ok(())
}

fn run_config_command(mut config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Set { key, value } => {
            config.set(&key, &value)?;
            config.save(config_path)?;
            println!("Set {} in {:?}", key, config_path);
        }
        ConfigCommands::Path => println!("{}", config_path.display()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::time::Duration;
    use tempfile::TempDir;

    fn temp_config(tmp: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.database.path = tmp.path().join("collection.db").to_string_lossy().into_owned();
        config.database.backup_dir = tmp.path().join("db-backup").to_string_lossy().into_owned();
        config
    }

    fn seed(config: &AppConfig) -> i64 {
        let db = Database::open(config.db_path()).unwrap();
        db.insert(&NewRecord { content_id: ContentId::parse("RJ1").unwrap(), version: None, tested: false })
            .unwrap()
    }

    fn backup_count(config: &AppConfig) -> usize {
        backups(config).list_for(&config.db_path()).unwrap().len()
    }

    fn run(config: &AppConfig, command: Commands) -> Result<()> {
        run_command(command, config.clone(), Path::new("config.json"), "text")
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_add_with_version() {
        let cli = Cli::try_parse_from(["collection-helper", "add", "RJ1", "--version", "1.2", "--tested"]).unwrap();
        match cli.command {
            Some(Commands::Add { id, version, tested }) => {
                assert_eq!(id, "RJ1");
                assert_eq!(version.as_deref(), Some("1.2"));
                assert!(tested);
            }
            _ => panic!("Expected Add command"),
        }
    }

    #[test]
    fn test_write_commands_take_backup() {
        let tmp = TempDir::new().unwrap();
        let config = temp_config(&tmp);
        let rowid = seed(&config);

        run(&config, Commands::Tested { rowid, value: "yes".to_string() }).unwrap();
        assert_eq!(backup_count(&config), 1);

        std::thread::sleep(Duration::from_millis(5));
        run(&config, Commands::Vacuum).unwrap();
        assert_eq!(backup_count(&config), 2);

        let db = Database::open(config.db_path()).unwrap();
        assert!(db.get(rowid).unwrap().unwrap().tested);
    }

    #[test]
    fn test_read_commands_take_no_backup() {
        let tmp = TempDir::new().unwrap();
        let config = temp_config(&tmp);
        seed(&config);

        let list = Commands::List { search: None, sort: "id".to_string(), asc: false, missing: false, tested: None };
        run(&config, list).unwrap();
        run(&config, Commands::Stats).unwrap();
        run(&config, Commands::Export { output: tmp.path().join("out.json") }).unwrap();
        assert_eq!(backup_count(&config), 0);
    }

    #[test]
    fn test_read_command_on_missing_database() {
        let tmp = TempDir::new().unwrap();
        let config = temp_config(&tmp);
        let err = run(&config, Commands::Stats).unwrap_err();
        assert!(matches!(err, CollectionError::MissingDatabase(_)));
        assert!(!config.db_path().exists());
    }

    #[test]
    fn test_read_command_upgrades_old_file_after_backup() {
        let tmp = TempDir::new().unwrap();
        let config = temp_config(&tmp);
        {
            let conn = rusqlite::Connection::open(config.db_path()).unwrap();
            conn.execute_batch(
                "CREATE TABLE dlsite_ids (dlsite_id TEXT NOT NULL, tested TEXT, version TEXT);
                 INSERT INTO dlsite_ids VALUES ('RJ3', 'Yes', '2');",
            )
            .unwrap();
        }

        run(&config, Commands::Stats).unwrap();
        assert_eq!(backup_count(&config), 1);
        assert!(Database::open_read_only(config.db_path()).unwrap().is_some());
    }

    #[test]
    fn test_failed_backup_only_warns() {
        let tmp = TempDir::new().unwrap();
        let mut config = temp_config(&tmp);
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        config.database.backup_dir = blocker.to_string_lossy().into_owned();
        let rowid = seed(&config);

        run(&config, Commands::Tested { rowid, value: "yes".to_string() }).unwrap();
        let db = Database::open(config.db_path()).unwrap();
        assert!(db.get(rowid).unwrap().unwrap().tested);
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["collection-helper"]).unwrap();
        assert!(!cli.verbose);
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("config.json"));
    }

    #[test]
    fn test_cli_scan_command() {
        let cli = Cli::try_parse_from(["collection-helper", "scan", "--dir", "/tmp/works"]).unwrap();
        match cli.command {
            Some(Commands::Scan { dir }) => assert_eq!(dir, Some(PathBuf::from("/tmp/works"))),
            _ => panic!("Expected Scan command"),
        }
    }

    #[test]
    fn test_cli_list_command() {
        let cli = Cli::try_parse_from([
            "collection-helper", "list", "--sort", "version", "--asc", "--tested", "no", "--format", "json",
        ])
        .unwrap();
        assert_eq!(cli.format, "json");
        match cli.command {
            Some(Commands::List { sort, asc, tested, missing, .. }) => {
                assert_eq!(sort, "version");
                assert!(asc);
                assert!(!missing);
                assert_eq!(tested.as_deref(), Some("no"));
            }
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_values() {
        assert!(Cli::try_parse_from(["collection-helper", "list", "--sort", "size"]).is_err());
        assert!(Cli::try_parse_from(["collection-helper", "tested", "3", "maybe"]).is_err());
    }

    #[test]
    fn test_cli_edit_command() {
        let cli = Cli::try_parse_from([
            "collection-helper", "edit", "7", "--version", "-", "--tested", "yes",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Edit { rowid, id, version, tested }) => {
                assert_eq!(rowid, 7);
                assert!(id.is_none());
                assert_eq!(version.as_deref(), Some("-"));
                assert_eq!(tested.as_deref(), Some("yes"));
            }
            _ => panic!("Expected Edit command"),
        }
    }

    #[test]
    fn test_cli_backup_restore() {
        let cli = Cli::try_parse_from(["collection-helper", "backup", "restore", "old.db"]).unwrap();
        match cli.command {
            Some(Commands::Backup { action: BackupCommands::Restore { file } }) => {
                assert_eq!(file, PathBuf::from("old.db"))
            }
            _ => panic!("Expected Backup Restore command"),
        }
    }

    #[test]
    fn test_scan_without_folder_is_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.database.path = tmp.path().join("c.db").to_string_lossy().into_owned();
        let err = run_command(Commands::Scan { dir: None }, config, &tmp.path().join("config.json"), "text")
            .unwrap_err();
        assert!(matches!(err, CollectionError::Config(_)));
    }

    #[test]
    fn test_config_set_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        run_config_command(
            AppConfig::default(),
            ConfigCommands::Set { key: "theme".to_string(), value: "dark".to_string() },
            &path,
        )
        .unwrap();
        let saved = AppConfig::load(&path).unwrap();
        assert_eq!(saved.theme, collection_helper::config::Theme::Dark);
    }
}
