use std::fmt;
use std::io::{BufRead, Write};
use std::sync::Arc;

use quiz_core::model::{AnswerChoice, Category, Question, User, UserId};
use quiz_core::scoring::progress_toward_next_level;
use services::{
    AppServices, Clock, Credentials, DashboardStats, IdentityClaims, LocalIdentity,
    QuestionCatalog, SyncConfig,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_DB_FILE: &str = "quiz.sqlite3";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidCount { raw: String },
    MissingUser,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidCount { raw } => write!(f, "invalid --count value: {raw}"),
            ArgsError::MissingUser => write!(f, "--email (or QUIZ_USER_EMAIL) is required"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  quiz play   [--db <sqlite_url>] [--corpus <path>] [--user <id>] [--email <email>]");
    eprintln!("              [--name <display name>] [--category <tag>] [--count <n>]");
    eprintln!("  quiz stats  [--db <sqlite_url>] [--corpus <path>] [--user <id>] [--email <email>]");
    eprintln!("  quiz corpus [--corpus <path>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {DEFAULT_DB_FILE} (in the current directory)");
    eprintln!("  --category react");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_CORPUS, QUIZ_USER_ID, QUIZ_USER_EMAIL, QUIZ_USER_NAME");
    eprintln!("  QUIZ_RETRY_ATTEMPTS, QUIZ_RETRY_DELAY_MS, QUIZ_RECENT_SESSIONS, QUIZ_QUESTION_COUNT");
    eprintln!("  RUST_LOG (e.g. RUST_LOG=services=debug)");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Play,
    Stats,
    Corpus,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "play" => Some(Self::Play),
            "stats" => Some(Self::Stats),
            "corpus" => Some(Self::Corpus),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    corpus: Option<String>,
    user_id: Option<String>,
    email: Option<String>,
    name: Option<String>,
    category: Category,
    count: Option<usize>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        let mut parsed = Self {
            db_url: normalize_sqlite_url(
                env("QUIZ_DB_URL").unwrap_or_else(|| DEFAULT_DB_FILE.to_owned()),
            ),
            corpus: env("QUIZ_CORPUS"),
            user_id: env("QUIZ_USER_ID"),
            email: env("QUIZ_USER_EMAIL"),
            name: env("QUIZ_USER_NAME"),
            category: Category::React,
            count: None,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--corpus" => parsed.corpus = Some(require_value(args, "--corpus")?),
                "--user" => parsed.user_id = Some(require_value(args, "--user")?),
                "--email" => parsed.email = Some(require_value(args, "--email")?),
                "--name" => parsed.name = Some(require_value(args, "--name")?),
                "--category" => {
                    parsed.category = Category::parse(require_value(args, "--category")?.trim());
                }
                "--count" => {
                    let value = require_value(args, "--count")?;
                    let count = value
                        .parse::<usize>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or(ArgsError::InvalidCount { raw: value })?;
                    parsed.count = Some(count);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    /// Claims for the local identity provider. The id defaults to the email.
    fn claims(&self) -> Result<IdentityClaims, ArgsError> {
        let email = self.email.clone().ok_or(ArgsError::MissingUser)?;
        Ok(IdentityClaims {
            id: self.user_id.clone().unwrap_or_else(|| email.clone()),
            email,
            display_name: self.name.clone(),
            photo_url: None,
        })
    }

    fn catalog(&self) -> Result<QuestionCatalog, services::CatalogError> {
        match &self.corpus {
            Some(path) => QuestionCatalog::from_path(path),
            None => QuestionCatalog::builtin(),
        }
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

async fn open_services(args: &Args) -> Result<(AppServices, User), Box<dyn std::error::Error>> {
    let claims = args.claims()?;
    let mut config = SyncConfig::from_env()?;
    if let Some(count) = args.count {
        config.question_count = count;
    }
    let catalog = args.catalog()?;

    prepare_sqlite_file(&args.db_url)?;
    let identity = LocalIdentity::new().with_federated(claims);
    let app = AppServices::new_sqlite(
        &args.db_url,
        Clock::default_clock(),
        config,
        catalog,
        Arc::new(identity),
    )
    .await?;

    let signed_in = app
        .auth()
        .sign_in(Credentials::Federated)
        .await?
        .ok_or("sign-in was cancelled")?;
    let status = signed_in.enrichment.await?;
    debug!(?status, "profile enrichment settled");
    let user = app.users().user().unwrap_or(signed_in.user);
    Ok((app, user))
}

// ─── play ──────────────────────────────────────────────────────────────────

fn prompt_choice(question: &Question) -> Result<Option<AnswerChoice>, std::io::Error> {
    let multi = matches!(question.correct_answer(), AnswerChoice::Multiple(_));
    loop {
        let mut stdout = std::io::stdout().lock();
        if multi {
            write!(stdout, "answer (comma-separated numbers): ")?;
        } else {
            write!(stdout, "answer: ")?;
        }
        stdout.flush()?;
        drop(stdout);

        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let picked: Vec<usize> = line
            .split(',')
            .filter_map(|part| part.trim().parse::<usize>().ok())
            .filter_map(|n| n.checked_sub(1))
            .collect();
        match picked.as_slice() {
            [] => println!("pick an option between 1 and {}", question.options().len()),
            _ if multi => return Ok(Some(AnswerChoice::Multiple(picked))),
            [first, ..] => return Ok(Some(AnswerChoice::Single(*first))),
        }
    }
}

async fn play(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let (app, user) = open_services(args).await?;
    let quiz = app.quiz();
    let state = quiz.start(user.id(), args.category.clone())?;
    println!(
        "{} quiz: {} questions. Good luck, {}!",
        args.category.label(),
        state.questions.len(),
        user.display_name()
    );

    let mut number = 0;
    while let Some(question) = quiz.current_question() {
        number += 1;
        println!();
        println!("Q{number} [{:?}, weight {}]", question.difficulty(), question.weight());
        println!("{}", question.question());
        if let Some(code) = question.code() {
            println!("{code}");
        }
        for (i, option) in question.options().iter().enumerate() {
            println!("  {}. {option}", i + 1);
        }

        let started = std::time::Instant::now();
        let asked = question.clone();
        let Some(choice) = tokio::task::spawn_blocking(move || prompt_choice(&asked)).await??
        else {
            println!("input closed, abandoning quiz");
            return Ok(());
        };
        let state = quiz.answer(question.id(), choice, started.elapsed().as_secs_f64());
        if let Some(err) = state.error {
            println!("{err}");
            quiz.clear_error();
            continue;
        }
        let last = state
            .session
            .as_ref()
            .and_then(|s| s.answers().last())
            .is_some_and(|a| a.is_correct());
        println!("{}", if last { "correct" } else { "wrong" });
        println!("{}", question.explanation());
    }

    let scope = app.view_scope();
    let Some(report) = quiz.finish(&scope).await else {
        return Err("quiz could not be finished".into());
    };
    let _ = report.session_write.await?;
    if let Some(write) = report.profile_write {
        let status = write.await?;
        debug!(?status, "profile write settled");
    }

    let session = &report.session;
    println!();
    println!(
        "score {}/{} ({}%), accuracy {}%, {}s",
        session.total_score(),
        session.max_score(),
        session.score_percentage(),
        session.accuracy(),
        session.duration_secs(app.clock().now())
    );
    if let Some(progression) = &report.progression {
        let user = &progression.user;
        println!(
            "+{} XP -> {} XP, level {} ({}), {}% to next level",
            progression.reward,
            user.xp(),
            user.level(),
            user.rank().label(),
            progress_toward_next_level(user.xp(), user.level())
        );
        if progression.leveled_up() {
            println!("level up!");
        }
    }
    info!(session_id = %session.id(), "quiz recorded");
    Ok(())
}

// ─── stats ─────────────────────────────────────────────────────────────────

fn print_stats(user: &User, stats: &DashboardStats) {
    println!(
        "{} - level {} {} ({} XP)",
        user.display_name(),
        user.level(),
        user.rank(),
        user.xp()
    );
    println!(
        "sessions {}, accuracy {}%, correct {}, wrong {}",
        stats.sessions, stats.accuracy, stats.correct, stats.wrong
    );
    println!();
    println!("skills:");
    for skill in &stats.skill_matrix {
        println!(
            "  {:<24} {:>3}%  ({}/{})",
            skill.group.label(),
            skill.score,
            skill.correct,
            skill.total
        );
    }
    println!();
    println!("last 7 days:");
    for day in &stats.activity {
        println!("  {} {:>5}", day.label(), day.score);
    }
    let weekly = &stats.weekly_challenge;
    println!();
    println!(
        "weekly challenge: {}/{} {} quizzes ({}%), bonus {} XP{}",
        weekly.completed,
        weekly.target,
        weekly.category.label(),
        weekly.progress_percent(),
        weekly.bonus_xp,
        if weekly.is_complete() { " - complete" } else { "" }
    );
}

async fn stats(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let (app, user) = open_services(args).await?;
    let user_id: &UserId = user.id();
    let scope = app.view_scope();
    match app.stats().load(user_id, &scope).await? {
        Some(stats) => print_stats(&user, &stats),
        None => debug!("stats view closed before load finished"),
    }
    Ok(())
}

// ─── corpus ────────────────────────────────────────────────────────────────

fn corpus(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = args.catalog()?;
    println!("{} questions", catalog.len());
    for category in catalog.categories() {
        let count = catalog.by_category(category, None).len();
        println!("  {:<16} {count:>3}", category.as_str());
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Play,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Play,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    match cmd {
        Command::Play => play(&parsed).await,
        Command::Stats => stats(&parsed).await,
        Command::Corpus => corpus(&parsed),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_database_is_a_file_in_the_working_directory() {
        let url = normalize_sqlite_url(DEFAULT_DB_FILE.to_owned());
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(url, format!("sqlite://{}", cwd.join(DEFAULT_DB_FILE).display()));
    }

    #[test]
    fn explicit_urls_pass_through() {
        assert_eq!(
            normalize_sqlite_url("sqlite::memory:".to_owned()),
            "sqlite::memory:"
        );
        assert_eq!(
            normalize_sqlite_url("sqlite:///tmp/q.db".to_owned()),
            "sqlite:///tmp/q.db"
        );
        assert_eq!(normalize_sqlite_url("sqlite:/tmp/q.db".to_owned()), "sqlite:///tmp/q.db");
    }

    #[test]
    fn flags_override_defaults() {
        let mut args = ["--category", "css", "--count", "4", "--email", "a@b.io"]
            .into_iter()
            .map(String::from);
        let parsed = Args::parse(&mut args).unwrap();
        assert_eq!(parsed.category, Category::Css);
        assert_eq!(parsed.count, Some(4));
        assert_eq!(parsed.claims().unwrap().id, "a@b.io");

        let mut bad = ["--count", "0"].into_iter().map(String::from);
        assert!(matches!(
            Args::parse(&mut bad),
            Err(ArgsError::InvalidCount { .. })
        ));
    }
}
