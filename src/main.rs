//! Purpose: `vodata` CLI entry point for inspecting verbose-OData payloads.
//! Role: Binary crate root; parses args, runs one command, emits JSON on stdout.
//! Invariants: Commands read a file argument or stdin and never mutate their input.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::error::Error as StdError;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;
use verbose_odata::api::{
    ApiConnection, ConnectionConfig, DynValue, DynamicJsonView, Error, ErrorKind, Key,
    StaticToken, extract_continuation_token, legacy_date, to_exit_code,
    unwrap_array, unwrap_object, wrap_dynamic, wrap_dynamic_list,
};

#[derive(Parser)]
#[command(
    name = "vodata",
    version,
    about = "Inspect and convert OData verbose JSON payloads",
    long_about = None,
    after_help = r#"EXAMPLES
  $ vodata unwrap response.json
  $ curl -s "$URL" | vodata unwrap --array
  $ vodata next-token page1.json
  $ vodata get Lines.0.Amount order.json
  $ vodata date decode '/Date(1614834367089)/'
  $ vodata fetch --base-url https://host/api/v1/42/ crm/Accounts --list"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        default_value = "warn",
        help = "Log filter used when RUST_LOG is unset (e.g. warn, debug, verbose_odata=trace)"
    )]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Strip the {\"d\": ...} envelope and flatten nested results")]
    Unwrap {
        #[arg(long, help = "Expect a collection payload instead of a single entity")]
        array: bool,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        input: InputArgs,
    },
    #[command(about = "Print the $skiptoken of the __next link, or null")]
    NextToken {
        #[command(flatten)]
        input: InputArgs,
    },
    #[command(about = "Read one value from an enveloped payload by dotted path")]
    Get {
        #[arg(help = "Dotted path of member names and indices, e.g. Lines.0.Amount")]
        path: String,
        #[arg(long, help = "Treat the payload as a collection; the path starts at an index")]
        array: bool,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        input: InputArgs,
    },
    #[command(subcommand, about = "Convert between legacy date tokens and ISO-8601")]
    Date(DateCommand),
    #[command(about = "GET a resource and print it without the envelope")]
    Fetch(FetchArgs),
}

#[derive(Subcommand)]
enum DateCommand {
    #[command(about = "Encode an ISO-8601 timestamp for the wire")]
    Encode {
        value: String,
        #[arg(long, help = "Emit /Date(<ms>)/ instead of the minute-precision write form")]
        legacy: bool,
    },
    #[command(about = "Decode a legacy token or ISO-8601 timestamp")]
    Decode { value: String },
}

#[derive(Args)]
struct OutputArgs {
    #[arg(long, help = "Pretty-print JSON output")]
    pretty: bool,
}

#[derive(Args)]
struct InputArgs {
    #[arg(
        value_hint = ValueHint::FilePath,
        help = "Input file (default: stdin; '-' also means stdin)"
    )]
    file: Option<PathBuf>,
}

#[derive(Args)]
struct FetchArgs {
    #[arg(long, help = "Service base url, e.g. https://host/api/v1/42/")]
    base_url: String,
    #[arg(help = "Resource path relative to the base url, query allowed")]
    path: String,
    #[arg(long, help = "Bearer token sent with the request")]
    token: Option<String>,
    #[arg(long, help = "Read a collection, following every $skiptoken page")]
    list: bool,
    #[arg(long, default_value_t = 30, help = "Request timeout in seconds")]
    timeout_secs: u64,
    #[command(flatten)]
    output: OutputArgs,
}

fn main() {
    let exit_code = match run() {
        Ok(code) => code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<i32, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(code);
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `vodata --help`."));
            }
        },
    };

    init_tracing(&cli.log_level);
    dispatch(cli.command)?;
    Ok(0)
}

fn init_tracing(default_filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn dispatch(command: Command) -> Result<(), Error> {
    match command {
        Command::Unwrap {
            array,
            output,
            input,
        } => {
            let body = read_input(&input)?;
            let text = if array {
                unwrap_array(&body)?
            } else {
                unwrap_object(&body)?
            };
            emit_text(&text, output.pretty)
        }
        Command::NextToken { input } => {
            let body = read_input(&input)?;
            let token = extract_continuation_token(&body)?;
            emit_json(&json!({ "token": token }), false);
            Ok(())
        }
        Command::Get {
            path,
            array,
            output,
            input,
        } => {
            let body = read_input(&input)?;
            let root = if array {
                wrap_dynamic(&unwrap_array(&body)?)?
            } else {
                wrap_dynamic(&unwrap_object(&body)?)?
            };
            let value = root.get_path(parse_path(&path));
            emit_json(&dyn_value_json(&value), output.pretty);
            Ok(())
        }
        Command::Date(DateCommand::Encode { value, legacy }) => {
            let parsed = legacy_date::decode(&value)?;
            let encoded = if legacy {
                legacy_date::encode_legacy(parsed)
            } else {
                legacy_date::encode_edm_minutes(parsed)
            };
            emit_json(&json!({ "value": encoded }), false);
            Ok(())
        }
        Command::Date(DateCommand::Decode { value }) => {
            let parsed = legacy_date::decode(&value)?;
            emit_json(
                &json!({
                    "iso": legacy_date::encode_iso(parsed),
                    "unix_ms": legacy_date::to_unix_millis(parsed),
                }),
                false,
            );
            Ok(())
        }
        Command::Fetch(args) => fetch(args),
    }
}

fn fetch(args: FetchArgs) -> Result<(), Error> {
    let config = ConnectionConfig::new(&args.base_url)?
        .with_timeout(Duration::from_secs(args.timeout_secs));
    let tokens = match args.token {
        Some(token) => StaticToken::new(token),
        None => StaticToken::anonymous(),
    };
    let connection = ApiConnection::connect(config, tokens);
    let value = if args.list {
        let views = connection.get_dynamic_list(&args.path)?;
        Value::Array(views.iter().map(DynamicJsonView::to_value).collect())
    } else {
        connection.get_dynamic(&args.path)?.to_value()
    };
    emit_json(&value, args.output.pretty);
    Ok(())
}

fn read_input(input: &InputArgs) -> Result<String, Error> {
    match input.file.as_deref() {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path).map_err(|err| {
            let kind = match err.kind() {
                io::ErrorKind::NotFound => ErrorKind::NotFound,
                io::ErrorKind::PermissionDenied => ErrorKind::Permission,
                _ => ErrorKind::Io,
            };
            Error::new(kind)
                .with_message(format!("failed to read {}", path.display()))
                .with_source(err)
        }),
        _ => {
            let mut body = String::new();
            io::stdin().read_to_string(&mut body).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to read stdin")
                    .with_source(err)
            })?;
            Ok(body)
        }
    }
}

fn parse_path(path: &str) -> Vec<Key> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.parse::<usize>() {
            Ok(index) => Key::Index(index),
            Err(_) => Key::Name(segment.to_string()),
        })
        .collect()
}

fn dyn_value_json(value: &DynValue) -> Value {
    match value {
        DynValue::Null => Value::Null,
        DynValue::Bool(flag) => Value::Bool(*flag),
        DynValue::Integer(number) => json!(number),
        DynValue::Float(number) => json!(number),
        DynValue::Text(text) => Value::String(text.clone()),
        DynValue::View(view) => view.to_value(),
    }
}

// Re-renders already-unwrapped JSON text, preserving member order.
fn emit_text(text: &str, pretty: bool) -> Result<(), Error> {
    if !pretty {
        println!("{text}");
        return Ok(());
    }
    let value = if text.trim_start().starts_with('[') {
        let items = wrap_dynamic_list(text)?;
        Value::Array(items.iter().map(DynamicJsonView::to_value).collect())
    } else {
        wrap_dynamic(text)?.to_value()
    };
    emit_json(&value, true);
    Ok(())
}

fn emit_json(value: &Value, pretty: bool) {
    let encoded = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    println!(
        "{}",
        encoded.unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    );
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }
    let encoded = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{encoded}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::MalformedEnvelope => "malformed envelope".to_string(),
        ErrorKind::Conversion => "conversion failed".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(field) = err.field() {
        inner.insert("field".to_string(), json!(field));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }
    json!({ "error": inner })
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(status) = err.status() {
        lines.push(format!("status: {status}"));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
