use anyhow::Context;
use callguard::backup::{self, RestoreMode};
use callguard::call_engine::{CallDecisionEngine, ScreeningPrefs};
use callguard::config::{BlockedWordsDocument, RuleConfig, RuleDocument};
use callguard::country::Country;
use callguard::error::{Result as ScreenResult, ScreenError};
use callguard::lists::{ContactsLookup, ListBackend, ListStore};
use callguard::number;
use callguard::rules::{self, RuleStore};
use callguard::scorer::MessageRiskScorer;
use clap::{Arg, Command};
use log::LevelFilter;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

fn main() {
    let matches = Command::new("callguard")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Call and SMS screening engine against telemarketing and scams")
        .arg(
            Arg::new("config-dir")
                .short('c')
                .long("config-dir")
                .value_name("DIR")
                .help("Directory holding rule documents and block lists")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("country")
                .long("country")
                .value_name("CODE")
                .help("Country rule set to use (FR or BE)")
                .default_value("FR"),
        )
        .arg(
            Arg::new("test-number")
                .long("test-number")
                .value_name("NUMBER")
                .help("Screen a phone number and print the decision")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-message")
                .long("test-message")
                .value_name("TEXT")
                .help("Score a message body ('-' reads stdin)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("sender")
                .long("sender")
                .value_name("ADDRESS")
                .help("Sender address for --test-message")
                .default_value(""),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Validate the rule documents in the config directory")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Write the built-in rule document for --country")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("backup")
                .long("backup")
                .value_name("FILE")
                .help("Export the blacklist to a backup file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("restore")
                .long("restore")
                .value_name("FILE")
                .help("Import a backup file into the blacklist")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("merge")
                .long("merge")
                .help("Merge the restored backup instead of replacing the blacklist")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    let country = match Country::from_code(matches.get_one::<String>("country").map(String::as_str).unwrap_or("FR")) {
        Some(c) => c,
        None => {
            eprintln!("Unknown country code (expected FR or BE)");
            process::exit(1);
        }
    };
    let config_dir = matches.get_one::<String>("config-dir").map(PathBuf::from);

    let outcome = run(&matches, country, config_dir);
    if let Err(e) = outcome {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(
    matches: &clap::ArgMatches,
    country: Country,
    config_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(path) = matches.get_one::<String>("generate-config") {
        return generate_config(path, country);
    }

    if matches.get_flag("test-config") {
        let dir = config_dir
            .as_deref()
            .context("--test-config requires --config-dir")?;
        return test_config(dir);
    }

    let rules = Arc::new(RuleStore::new(config_dir.clone()));

    if let Some(raw) = matches.get_one::<String>("test-number") {
        return test_number(raw, country, &rules, config_dir.as_deref());
    }

    if let Some(text) = matches.get_one::<String>("test-message") {
        let sender = matches
            .get_one::<String>("sender")
            .map(String::as_str)
            .unwrap_or("");
        return test_message(sender, text, country, &rules);
    }

    if let Some(path) = matches.get_one::<String>("backup") {
        let lists = load_lists(country, config_dir.as_deref())?;
        let json = backup::create_backup(&lists, chrono::Local::now())?;
        std::fs::write(path, &json).with_context(|| format!("writing {path}"))?;
        println!("✅ {} blocked numbers exported to {path}", lists.blacklist().count());
        return Ok(());
    }

    if let Some(path) = matches.get_one::<String>("restore") {
        let dir = config_dir
            .as_deref()
            .context("--restore requires --config-dir to persist the lists")?;
        let json = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
        let backend = FileListBackend::new(dir);
        let mut lists = ListStore::load(country, &backend)?;
        let mode = if matches.get_flag("merge") {
            RestoreMode::Merge
        } else {
            RestoreMode::Replace
        };
        let imported = backup::restore_backup(&json, mode, &mut lists, &backend)?;
        println!("✅ {imported} blocked numbers imported ({mode:?})");
        return Ok(());
    }

    println!("Nothing to do. See --help for available commands.");
    Ok(())
}

fn generate_config(path: &str, country: Country) -> anyhow::Result<()> {
    let config = RuleConfig::builtin(country);
    let json = serde_json::to_string_pretty(&config)?;
    std::fs::write(path, json).with_context(|| format!("writing {path}"))?;
    println!("✅ Built-in {country} rule document written to {path}");
    Ok(())
}

fn test_config(dir: &Path) -> anyhow::Result<()> {
    println!("🔍 Validating rule documents in {}", dir.display());
    let mut problems = 0;
    for country in [Country::Fr, Country::Be] {
        for (file, kind) in [
            (rules::rule_file_name(country), "rules"),
            (rules::words_file_name(country), "words"),
        ] {
            let path = dir.join(&file);
            if !path.exists() {
                println!("  {file}: absent (built-in {kind} used)");
                continue;
            }
            let data = std::fs::read_to_string(&path)?;
            let parsed = match kind {
                "rules" => serde_json::from_str::<RuleDocument>(&data).map(|_| ()),
                _ => serde_json::from_str::<BlockedWordsDocument>(&data).map(|_| ()),
            };
            match parsed {
                Ok(()) => println!("  {file}: ✅"),
                Err(e) => {
                    println!("  {file}: ❌ {e}");
                    problems += 1;
                }
            }
        }
    }
    if problems > 0 {
        anyhow::bail!("{problems} invalid document(s)");
    }
    println!("✅ Configuration validated");
    Ok(())
}

fn test_number(
    raw: &str,
    country: Country,
    rules: &Arc<RuleStore>,
    config_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let lists = load_lists(country, config_dir)?;
    let engine = CallDecisionEngine::new(Arc::clone(rules));
    let decision = engine.screen_call(
        raw,
        false,
        ScreeningPrefs::default(),
        &lists,
        &NoContacts,
        None,
    );

    println!("📞 {}", number::national_display(raw, country));
    println!("  Country:   {country}");
    println!("  Canonical: {}", number::canonicalize(raw, country));
    println!(
        "  Decision:  {}",
        if decision.block { "🚫 BLOCKED" } else { "✅ ALLOWED" }
    );
    println!("  Reason:    {}", decision.reason);
    for item in &decision.evidence {
        println!("             {item}");
    }
    if decision.ask_user {
        println!("  Note:      user confirmation recommended");
    }
    if decision.risk_score > 0 {
        println!("  Risk:      {}", decision.risk_score);
    }
    Ok(())
}

fn test_message(
    sender: &str,
    text: &str,
    country: Country,
    rules: &Arc<RuleStore>,
) -> anyhow::Result<()> {
    let body = if text == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading message from stdin")?;
        buf
    } else {
        text.to_string()
    };

    let rule_set = rules.rule_set(country);
    let scorer = MessageRiskScorer::from_rules(&rule_set);
    let result = scorer.score(sender, &body);

    println!("✉️  Score: {}/100 ({})", result.score, result.band.label());
    println!("  {}", result.explanation);
    if !result.words.is_empty() {
        println!("  Words:    {}", result.words.join(", "));
    }
    if !result.patterns.is_empty() {
        println!("  Patterns: {}", result.patterns.join(", "));
    }
    Ok(())
}

fn load_lists(country: Country, config_dir: Option<&Path>) -> ScreenResult<ListStore> {
    match config_dir {
        Some(dir) => ListStore::load(country, &FileListBackend::new(dir)),
        None => Ok(ListStore::new(country)),
    }
}

/// The CLI has no address book.
struct NoContacts;

impl ContactsLookup for NoContacts {
    fn has_contact(&self, _number: &str) -> ScreenResult<bool> {
        Ok(false)
    }
}

/// Plain-file list persistence under the config directory.
struct FileListBackend {
    whitelist: PathBuf,
    blacklist: PathBuf,
}

impl FileListBackend {
    fn new(dir: &Path) -> Self {
        FileListBackend {
            whitelist: dir.join("whitelist.txt"),
            blacklist: dir.join("blacklist.txt"),
        }
    }

    fn read_optional(path: &Path) -> ScreenResult<String> {
        match std::fs::read_to_string(path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(ScreenError::Persistence(format!(
                "reading {}: {e}",
                path.display()
            ))),
        }
    }
}

impl ListBackend for FileListBackend {
    fn read_whitelist(&self) -> ScreenResult<String> {
        Self::read_optional(&self.whitelist)
    }

    fn write_whitelist(&self, serialized: &str) -> ScreenResult<()> {
        std::fs::write(&self.whitelist, serialized)
            .map_err(|e| ScreenError::Persistence(format!("writing whitelist: {e}")))
    }

    fn read_blacklist(&self) -> ScreenResult<Vec<String>> {
        Ok(Self::read_optional(&self.blacklist)?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn write_blacklist(&self, entries: &[String]) -> ScreenResult<()> {
        std::fs::write(&self.blacklist, entries.join("\n"))
            .map_err(|e| ScreenError::Persistence(format!("writing blacklist: {e}")))
    }
}
