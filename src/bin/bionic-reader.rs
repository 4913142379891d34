use std::env;
use std::fs;
use std::process::ExitCode;

use bionic_reader::{
    annotate_document, format_text, parse_markup, strip_document, to_markup, BookPosition,
    JsonFileBackend, MarkupNode, PositionStore, ProgressSnapshot, ReaderError, ReadingPreferences,
    RestoreOutcome, ScrollMetrics,
};
use serde_json::{json, Value};

const DEFAULT_STORE_PATH: &str = "reading-positions.json";

fn main() -> ExitCode {
    match run(env::args().collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("error: {}", msg);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    let mut rest = args.into_iter().skip(1).collect::<Vec<_>>();
    let pretty = pop_flag(&mut rest, "--pretty");

    if rest.is_empty() || rest[0] == "--help" || rest[0] == "-h" {
        print_help();
        return Ok(());
    }

    let cmd = rest.remove(0);
    match cmd.as_str() {
        "annotate" => {
            let mut args = rest;
            let percentage = pop_percentage(&mut args)?;
            let path = first_arg(&args, "annotate requires <markup_path>")?;
            let doc = read_document(&path)?;
            print!("{}", to_markup(&annotate_document(&doc, percentage)));
        }
        "strip" => {
            let path = first_arg(&rest, "strip requires <markup_path>")?;
            let doc = read_document(&path)?;
            print!("{}", to_markup(&strip_document(&doc)));
        }
        "words" => {
            let mut args = rest;
            let percentage = pop_percentage(&mut args)?;
            if args.is_empty() {
                return Err("words requires <text>".to_string());
            }
            let text = args.join(" ");
            let spans = format_text(&text, percentage);
            emit(&json!({ "percentage": percentage, "spans": spans }), pretty)?;
        }
        "progress" => {
            let offset = parse_u64(rest.first(), "scroll_offset")?;
            let content = parse_u64(rest.get(1), "content_extent")?;
            let viewport = parse_u64(rest.get(2), "viewport_extent")?;
            let snap = ProgressSnapshot::compute(ScrollMetrics::new(offset, content, viewport));
            emit(&snapshot_json(&snap), pretty)?;
        }
        "position" => run_position(rest, pretty)?,
        other => return Err(format!("unknown command '{}' (see --help)", other)),
    }
    Ok(())
}

fn run_position(mut args: Vec<String>, pretty: bool) -> Result<(), String> {
    let store_path = pop_option(&mut args, "--store")?.unwrap_or_else(|| DEFAULT_STORE_PATH.into());
    let mut store = PositionStore::new(JsonFileBackend::new(&store_path));
    if args.is_empty() {
        return Err("position requires a subcommand (see --help)".to_string());
    }
    let sub = args.remove(0);
    match sub.as_str() {
        "save" => {
            let [title, author, offset, length] = positional::<4>(&args, "save")?;
            let offset = parse_u64(Some(&offset), "scroll_offset")?;
            let length = parse_u64(Some(&length), "content_length")?;
            store.save(&title, &author, offset, length);
            emit(&json!({ "saved": store.get(&title, &author) }), pretty)?;
        }
        "load" => {
            let [title, author, length] = positional::<3>(&args, "load")?;
            let length = parse_u64(Some(&length), "content_length")?;
            let output = match store.restore(&title, &author, length) {
                RestoreOutcome::Restored(offset) => json!({ "status": "restored", "offset": offset }),
                RestoreOutcome::NotFound => json!({ "status": "not_found", "offset": 0 }),
                RestoreOutcome::Stale { relative_diff } => json!({
                    "status": "stale",
                    "offset": 0,
                    "relative_diff": relative_diff,
                }),
            };
            emit(&output, pretty)?;
        }
        "clear" => {
            let [title, author] = positional::<2>(&args, "clear")?;
            store.clear(&title, &author);
        }
        "clear-all" => store.clear_all(),
        "recents" => {
            let limit = match args.first() {
                Some(value) => value
                    .parse::<usize>()
                    .map_err(|_| format!("invalid limit '{}'", value))?,
                None => 10,
            };
            let recents: Vec<BookPosition> = store.list_recents(limit);
            emit(&json!({ "count": recents.len(), "recents": recents }), pretty)?;
        }
        other => return Err(format!("unknown position subcommand '{}'", other)),
    }
    Ok(())
}

fn read_document(path: &str) -> Result<Vec<MarkupNode>, String> {
    let html = fs::read_to_string(path).map_err(|e| display_err(e.into()))?;
    parse_markup(&html).map_err(|e| display_err(e.into()))
}

fn snapshot_json(snap: &ProgressSnapshot) -> Value {
    json!({
        "scroll_offset": snap.scroll_offset,
        "max_scroll": snap.max_scroll,
        "viewport_extent": snap.viewport_extent,
        "percent": snap.percent,
        "current_page": snap.current_page,
        "total_pages": snap.total_pages,
    })
}

fn emit(value: &Value, pretty: bool) -> Result<(), String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    println!("{}", rendered.map_err(|e| display_err(e.into()))?);
    Ok(())
}

fn pop_percentage(args: &mut Vec<String>) -> Result<f64, String> {
    let prefs = match pop_option(args, "--percentage")? {
        Some(value) => {
            let percentage = value
                .parse::<f64>()
                .map_err(|_| format!("invalid --percentage value '{}'", value))?;
            ReadingPreferences::default().with_bold_percentage(percentage)
        }
        None => ReadingPreferences::default(),
    };
    Ok(prefs.effective_percentage())
}

fn positional<const N: usize>(args: &[String], command: &str) -> Result<[String; N], String> {
    <[String; N]>::try_from(args.to_vec()).map_err(|_| {
        format!(
            "position {} expects {} arguments, got {}",
            command,
            N,
            args.len()
        )
    })
}

fn parse_u64(value: Option<&String>, name: &str) -> Result<u64, String> {
    let value = value.ok_or_else(|| format!("missing <{}>", name))?;
    value
        .parse::<u64>()
        .map_err(|_| format!("invalid <{}> value '{}'", name, value))
}

fn first_arg(args: &[String], msg: &str) -> Result<String, String> {
    args.first().cloned().ok_or_else(|| msg.to_string())
}

fn pop_flag(args: &mut Vec<String>, flag: &str) -> bool {
    if let Some(pos) = args.iter().position(|a| a == flag) {
        args.remove(pos);
        true
    } else {
        false
    }
}

fn pop_option(args: &mut Vec<String>, name: &str) -> Result<Option<String>, String> {
    let Some(pos) = args.iter().position(|a| a == name) else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        return Err(format!("{} requires a value", name));
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Ok(Some(value))
}

fn display_err(err: ReaderError) -> String {
    err.to_string()
}

fn print_help() {
    let help = r#"bionic-reader - bionic reading markup and reading positions

USAGE:
  bionic-reader [--pretty] <command> [args...]

COMMANDS:
  annotate <markup_path> [--percentage <p>]
  strip <markup_path>
  words <text...> [--percentage <p>]
  progress <scroll_offset> <content_extent> <viewport_extent>
  position [--store <path>] save <title> <author> <scroll_offset> <content_length>
  position [--store <path>] load <title> <author> <content_length>
  position [--store <path>] clear <title> <author>
  position [--store <path>] clear-all
  position [--store <path>] recents [limit]

NOTES:
  - `annotate` and `strip` print markup; other commands print JSON.
  - Percentages are clamped to 0.3-0.7 (default 0.5).
  - The position store defaults to ./reading-positions.json.
"#;
    println!("{}", help);
}
