use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use timetable::logging::{LogConfig, LogFormat, init_logging};
use timetable::{
    ClassEntry, Clock, Day, EntryDraft, EntryId, EntryPatch, MemoryTimetableStore, Period,
    Recurrence, RepeatUntil, TimetableConfig, TimetableService, TimetableStore, WeekView,
    load_snapshot_from_json, save_entries_to_csv, save_snapshot_to_json,
};

#[derive(Parser)]
#[command(name = "timetable", version, about = "Weekly class timetable editor")]
struct Cli {
    /// SQLite database file. Overrides TIMETABLE_DB_PATH; without either the
    /// timetable lives in memory.
    #[arg(long = "db", value_name = "PATH")]
    db: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace). Overrides TIMETABLE_LOG.
    #[arg(long = "log-level", value_name = "LEVEL")]
    log_level: Option<String>,

    #[arg(long = "log-format", value_enum, default_value = "pretty")]
    log_format: LogFormatArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Compact,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
        }
    }
}

fn render_text_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (ci, cell) in row.iter().enumerate() {
            widths[ci] = widths[ci].max(cell.chars().count());
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let render_row = |cells: &[String]| {
        let mut line = String::from("|");
        for (ci, cell) in cells.iter().enumerate() {
            let pad = widths[ci].saturating_sub(cell.chars().count());
            line.push(' ');
            line.push_str(cell);
            line.push_str(&" ".repeat(pad));
            line.push_str(" |");
        }
        line
    };

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&render_row(headers));
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    for row in rows {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    out.push_str(&sep);
    out.push('\n');
    out
}

fn render_week(view: &WeekView) -> String {
    let mut out = format!("Week of {}\n", view.week_start);
    if view.is_empty() {
        out.push_str("(no classes this week)\n");
        return out;
    }

    let mut headers = vec!["period".to_string()];
    headers.extend(Day::ALL.iter().map(|day| day.label().to_string()));
    let rows: Vec<Vec<String>> = view
        .periods()
        .into_iter()
        .map(|period| {
            let mut row = vec![period.to_string()];
            for day in Day::ALL {
                let cell = match view.get(day, period) {
                    Some(display) if display.room.is_empty() => {
                        format!("{} #{}", display.name, display.id)
                    }
                    Some(display) => format!("{} ({}) #{}", display.name, display.room, display.id),
                    None => String::new(),
                };
                row.push(cell);
            }
            row
        })
        .collect();
    out.push_str(&render_text_table(&headers, &rows));
    out
}

fn render_entries(entries: &[ClassEntry]) -> String {
    if entries.is_empty() {
        return "(no entries)\n".to_string();
    }
    let headers: Vec<String> = ["id", "cell", "name", "room", "teacher", "repeat", "created_at"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|entry| {
            vec![
                entry.id.to_string(),
                format!("{}-{}", entry.day.label(), entry.period),
                entry.name.clone(),
                entry.room.clone(),
                entry.teacher.clone(),
                describe_recurrence(entry.recurrence()),
                entry.created_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect();
    render_text_table(&headers, &rows)
}

fn describe_recurrence(recurrence: Recurrence) -> String {
    match recurrence {
        Recurrence::Once => "once".to_string(),
        Recurrence::Weekly(RepeatUntil::Never) => "weekly".to_string(),
        Recurrence::Weekly(RepeatUntil::Date(date)) => format!("weekly until {date}"),
        Recurrence::Weekly(RepeatUntil::Count(count)) => format!("weekly x{count}"),
    }
}

fn print_entry(entry: &ClassEntry) {
    println!("Id         : {}", entry.id);
    println!("Name       : {}", entry.name);
    println!("Cell       : {}-{}", entry.day.label(), entry.period);
    println!("Room       : {}", entry.room);
    println!("Teacher    : {}", entry.teacher);
    println!("Color      : {}", entry.color);
    println!("Note       : {}", entry.note);
    println!("Repeat     : {}", describe_recurrence(entry.recurrence()));
    println!("Created at : {}", entry.created_at);
    println!("Updated at : {}", entry.updated_at);
}

const HELP: &[&str] = &[
    "Commands:",
    "  help                               Show this help",
    "  week [YYYY-MM-DD]                  Show the week containing the date (default: this week)",
    "  list                               List stored entries",
    "  show <id>                          Show one entry",
    "  add <day> <period> <name...> [--room R] [--teacher T] [--color C] [--note N]",
    "      [--weekly] [--until YYYY-MM-DD] [--count N] [--week YYYY-MM-DD]",
    "                                     Place an entry, replacing the cell's occupant",
    "  set <id> <field> <value...>        Update one field; fields are",
    "                                     name room teacher color note day period",
    "                                     repeat end until count",
    "  delete <id>                        Delete an entry",
    "  cleanup                            Remove duplicate entries sharing a cell",
    "  setting get <key>                  Show a setting",
    "  setting set <key> <value...>       Store a setting (JSON or plain text)",
    "  export <path>                      Write a JSON snapshot",
    "  import <path>                      Replace all data with a JSON snapshot",
    "  csv <path>                         Write entries as CSV",
    "  quit|exit                          Exit",
];

fn print_help() {
    for line in HELP {
        println!("{line}");
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| "Invalid date (YYYY-MM-DD)".to_string())
}

fn parse_id(s: Option<&str>) -> Result<EntryId, String> {
    s.ok_or_else(|| "Missing id".to_string())?
        .parse::<EntryId>()
        .map_err(|_| "Invalid id".to_string())
}

fn parse_add<'a, I>(mut parts: I) -> Result<(EntryDraft, Option<NaiveDate>), String>
where
    I: Iterator<Item = &'a str>,
{
    let usage = "Usage: add <day> <period> <name...> [--flags]";
    let day: Day = parts.next().ok_or(usage)?.parse()?;
    let period: Period = parts.next().ok_or(usage)?.parse()?;

    let mut name_words = Vec::new();
    let mut draft = EntryDraft::new("", day, period);
    let mut week = None;
    let mut weekly = false;
    let mut until = None;
    let mut count = None;

    while let Some(token) = parts.next() {
        let Some(flag) = token.strip_prefix("--") else {
            name_words.push(token);
            continue;
        };
        if flag == "weekly" {
            weekly = true;
            continue;
        }
        let value = parts
            .next()
            .ok_or_else(|| format!("--{flag} needs a value"))?;
        match flag {
            "room" => draft.room = value.to_string(),
            "teacher" => draft.teacher = value.to_string(),
            "color" => draft.color = value.to_string(),
            "note" => draft.note = value.to_string(),
            "week" => week = Some(parse_date(value)?),
            "until" => until = Some(parse_date(value)?),
            "count" => {
                count = Some(
                    value
                        .parse::<u32>()
                        .map_err(|_| "Invalid count".to_string())?,
                )
            }
            other => return Err(format!("Unknown flag --{other}")),
        }
    }

    if name_words.is_empty() {
        return Err(usage.to_string());
    }
    draft.name = name_words.join(" ");

    let recurrence = match (weekly || until.is_some() || count.is_some(), until, count) {
        (false, _, _) => Recurrence::Once,
        (true, Some(date), _) => Recurrence::Weekly(RepeatUntil::Date(date)),
        (true, None, Some(n)) => Recurrence::Weekly(RepeatUntil::Count(n)),
        (true, None, None) => Recurrence::Weekly(RepeatUntil::Never),
    };
    Ok((draft.with_recurrence(recurrence), week))
}

fn parse_set<'a, I>(mut parts: I) -> Result<(EntryId, EntryPatch), String>
where
    I: Iterator<Item = &'a str>,
{
    let id = parse_id(parts.next())?;
    let field = parts
        .next()
        .ok_or("Usage: set <id> <field> <value...>")?;
    let value = parts.collect::<Vec<_>>().join(" ");
    if value.is_empty() {
        return Err(format!("Missing value for {field}"));
    }

    let mut patch = EntryPatch::default();
    match field {
        "name" => patch.name = Some(value),
        "room" => patch.room = Some(value),
        "teacher" => patch.teacher = Some(value),
        "color" => patch.color = Some(value),
        "note" => patch.note = Some(value),
        "day" => patch.day = Some(value.parse()?),
        "period" => patch.period = Some(value.parse()?),
        "repeat" => patch.repeat = Some(value.parse()?),
        "end" => patch.repeat_end_type = Some(value.parse()?),
        "until" => patch.repeat_end_date = Some(parse_date(&value)?),
        "count" => {
            patch.repeat_count = Some(value.parse().map_err(|_| "Invalid count".to_string())?)
        }
        other => return Err(format!("Unknown field '{other}'")),
    }
    Ok((id, patch))
}

fn run<S: TimetableStore, C: Clock>(service: TimetableService<S, C>) {
    println!("Timetable (CLI) - type 'help' for commands\n");
    match service.week_view(None) {
        Ok(view) => print!("{}", render_week(&view)),
        Err(e) => println!("Error: {e}"),
    }

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "week" => {
                let target = match parts.next().map(parse_date).transpose() {
                    Ok(target) => target,
                    Err(e) => {
                        println!("{e}");
                        continue;
                    }
                };
                match service.week_view(target) {
                    Ok(view) => print!("{}", render_week(&view)),
                    Err(e) => println!("Error: {e}"),
                }
            }
            "list" => match service.list_all() {
                Ok(entries) => print!("{}", render_entries(&entries)),
                Err(e) => println!("Error: {e}"),
            },
            "show" => match parse_id(parts.next()) {
                Ok(id) => match service.get_entry(id) {
                    Ok(Some(entry)) => print_entry(&entry),
                    Ok(None) => println!("Entry {id} not found."),
                    Err(e) => println!("Error: {e}"),
                },
                Err(e) => println!("{e}"),
            },
            "add" => match parse_add(parts) {
                Ok((draft, week)) => match service.add_entry(draft, week) {
                    Ok(id) => println!("Added entry {id}."),
                    Err(e) => println!("Error adding entry: {e}"),
                },
                Err(e) => println!("{e}"),
            },
            "set" => match parse_set(parts) {
                Ok((id, patch)) => match service.update_entry(id, &patch) {
                    Ok(0) => println!("Entry {id} not found."),
                    Ok(_) => println!("Updated entry {id}."),
                    Err(e) => println!("Error: {e}"),
                },
                Err(e) => println!("{e}"),
            },
            "delete" => match parse_id(parts.next()) {
                Ok(id) => match service.delete_entry(id) {
                    Ok(()) => println!("Deleted entry {id}."),
                    Err(e) => println!("Error deleting entry: {e}"),
                },
                Err(e) => println!("{e}"),
            },
            "cleanup" => match service.cleanup_duplicates() {
                Ok(removed) => println!("Removed {removed} duplicate entries."),
                Err(e) => println!("Cleanup error: {e}"),
            },
            "setting" => {
                let sub = parts.next();
                let key = parts.next();
                match (sub, key) {
                    (Some("get"), Some(key)) => match service.setting(key) {
                        Ok(Some(setting)) => println!("{} = {}", setting.key, setting.value),
                        Ok(None) => println!("Setting '{key}' not set."),
                        Err(e) => println!("Error: {e}"),
                    },
                    (Some("set"), Some(key)) => {
                        let raw = parts.collect::<Vec<_>>().join(" ");
                        let value = serde_json::from_str(&raw)
                            .unwrap_or(serde_json::Value::String(raw));
                        match service.put_setting(key, value) {
                            Ok(()) => println!("Setting '{key}' saved."),
                            Err(e) => println!("Error: {e}"),
                        }
                    }
                    _ => println!("Usage: setting get <key> | setting set <key> <value...>"),
                }
            }
            "export" | "import" | "csv" => {
                let Some(path) = parts.next() else {
                    println!("Usage: {cmd} <path>");
                    continue;
                };
                match cmd {
                    "export" => {
                        let result = service
                            .export_snapshot()
                            .and_then(|snapshot| save_snapshot_to_json(&snapshot, path));
                        match result {
                            Ok(()) => println!("Snapshot written to {path}."),
                            Err(e) => println!("Export error: {e}"),
                        }
                    }
                    "import" => match load_snapshot_from_json(path) {
                        Ok(snapshot) => {
                            if service.import_snapshot(snapshot) {
                                println!("Snapshot imported from {path}.");
                            } else {
                                println!("Import failed; see log for details.");
                            }
                        }
                        Err(e) => println!("Import error: {e}"),
                    },
                    _ => {
                        let result = service
                            .list_all()
                            .and_then(|entries| save_entries_to_csv(&entries, path));
                        match result {
                            Ok(()) => println!("Entries written to {path}."),
                            Err(e) => println!("CSV error: {e}"),
                        }
                    }
                }
            }
            _ => println!("Unknown command '{cmd}'. Type 'help'."),
        }
    }
}

#[cfg(feature = "sqlite")]
fn open_and_run(config: &TimetableConfig) -> ExitCode {
    match config.open_sqlite() {
        Ok(Some(store)) => run(TimetableService::new(store)),
        Ok(None) => run(TimetableService::new(MemoryTimetableStore::new())),
        Err(e) => {
            eprintln!("Could not open database: {e}");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

#[cfg(not(feature = "sqlite"))]
fn open_and_run(config: &TimetableConfig) -> ExitCode {
    if config.database_path.is_some() {
        tracing::warn!("built without the `sqlite` feature; using an in-memory timetable");
    }
    run(TimetableService::new(MemoryTimetableStore::new()));
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match TimetableConfig::from_env() {
        Ok(config) => config.with_overrides(cli.db, cli.log_level),
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(
        &LogConfig::from_level_name(&config.log_level)
            .with_format(cli.log_format.into())
            .with_ansi(io::stderr().is_terminal()),
    );
    tracing::debug!(?config, "starting timetable cli");
    open_and_run(&config)
}
