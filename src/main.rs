use std::path::PathBuf;
use std::process::ExitCode;

use descry::analyze::InspectReport;
use descry::config::InspectorConfig;
use descry::pipeline::{Inspector, OutputFormat};
use descry::query::NodeQueryTester;
use descry::rdf::{NQuadsWriter, TripleSink, TurtleWriter};

const EXIT_PARTIAL: u8 = 1;
const EXIT_IO: u8 = 2;
const EXIT_CONFIG: u8 = 3;

struct CliArgs {
    paths: Vec<PathBuf>,
    output: Option<PathBuf>,
    format: OutputFormat,
    query: Option<PathBuf>,
    extract_dir: Option<PathBuf>,
    max_depth: Option<u8>,
    threads: Option<usize>,
    verbose: bool,
}

fn usage(exe: &str) -> String {
    format!(
        "usage: {exe} [options] <paths...>\n\
         \n\
         options:\n\
         \x20 --output <file>       write RDF here instead of stdout\n\
         \x20 --format <nq|turtle>  output syntax (default: nq)\n\
         \x20 --query <file.rq>     ASK filter selecting entities to extract\n\
         \x20 --extract-dir <dir>   directory for extracted entities (with --query)\n\
         \x20 --max-depth <n>       container nesting limit\n\
         \x20 --threads <n>         worker threads for independent roots\n\
         \x20 --verbose             per-entity progress on stderr\n\
         \x20 --help                this text\n"
    )
}

fn parse_args() -> Result<CliArgs, String> {
    let mut args = std::env::args_os();
    let exe = args
        .next()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "descry".to_string());

    let mut parsed = CliArgs {
        paths: Vec::new(),
        output: None,
        format: OutputFormat::NQuads,
        query: None,
        extract_dir: None,
        max_depth: None,
        threads: None,
        verbose: false,
    };

    let take_value = |flag: &str, args: &mut std::env::ArgsOs| {
        args.next()
            .map(|v| PathBuf::from(&v))
            .ok_or_else(|| format!("{flag} requires a value"))
    };

    while let Some(arg) = args.next() {
        let Some(flag) = arg.to_str() else {
            parsed.paths.push(PathBuf::from(arg));
            continue;
        };
        match flag {
            "--help" | "-h" => {
                print!("{}", usage(&exe));
                std::process::exit(0);
            }
            "--verbose" | "-v" => parsed.verbose = true,
            "--output" | "-o" => parsed.output = Some(take_value(flag, &mut args)?),
            "--query" => parsed.query = Some(take_value(flag, &mut args)?),
            "--extract-dir" => parsed.extract_dir = Some(take_value(flag, &mut args)?),
            "--format" => {
                let value = take_value(flag, &mut args)?;
                parsed.format = value
                    .to_string_lossy()
                    .parse()
                    .map_err(|e: String| e)?;
            }
            "--max-depth" => {
                let value = take_value(flag, &mut args)?;
                parsed.max_depth = Some(
                    value
                        .to_string_lossy()
                        .parse()
                        .map_err(|_| "--max-depth requires a small integer".to_string())?,
                );
            }
            "--threads" => {
                let value = take_value(flag, &mut args)?;
                parsed.threads = Some(
                    value
                        .to_string_lossy()
                        .parse()
                        .map_err(|_| "--threads requires an integer".to_string())?,
                );
            }
            other if other.starts_with('-') => {
                return Err(format!("unknown option: {other}\n\n{}", usage(&exe)))
            }
            _ => parsed.paths.push(PathBuf::from(flag)),
        }
    }

    if parsed.paths.is_empty() {
        return Err(usage(&exe));
    }
    if parsed.query.is_some() != parsed.extract_dir.is_some() {
        return Err("--query and --extract-dir must be used together".to_string());
    }
    Ok(parsed)
}

fn init_tracing(verbose: bool) {
    // Without an installed subscriber, `RUST_LOG=...` has no effect. Default
    // to "off" so output only changes when the user opts in via the flag or
    // an `EnvFilter`-compatible env var.
    let fallback = if verbose { "descry=info" } else { "off" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| fallback.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_sink(args: &CliArgs) -> std::io::Result<Box<dyn TripleSink>> {
    let writer: Box<dyn std::io::Write + Send> = match &args.output {
        Some(path) => Box::new(std::io::BufWriter::new(std::fs::File::create(path)?)),
        None => Box::new(std::io::BufWriter::new(std::io::stdout())),
    };
    Ok(match args.format {
        OutputFormat::NQuads => Box::new(NQuadsWriter::new(writer)),
        OutputFormat::Turtle => Box::new(TurtleWriter::new(writer)),
    })
}

fn run() -> Result<InspectReport, u8> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            return Err(EXIT_CONFIG);
        }
    };
    init_tracing(args.verbose);

    let mut config = InspectorConfig::default();
    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }

    let sink = match build_sink(&args) {
        Ok(sink) => sink,
        Err(err) => {
            eprintln!("descry: cannot open output: {err}");
            return Err(EXIT_IO);
        }
    };

    let mut inspector = match Inspector::new(config, sink) {
        Ok(inspector) => inspector,
        Err(err) => {
            eprintln!("descry: configuration error: {err}");
            return Err(EXIT_CONFIG);
        }
    };

    if let (Some(query_path), Some(extract_dir)) = (&args.query, &args.extract_dir) {
        let text = match std::fs::read_to_string(query_path) {
            Ok(text) => text,
            Err(err) => {
                eprintln!("descry: cannot read query {}: {err}", query_path.display());
                return Err(EXIT_IO);
            }
        };
        let tester = match NodeQueryTester::parse(&text) {
            Ok(tester) => tester,
            Err(err) => {
                eprintln!("descry: invalid query: {err}");
                return Err(EXIT_CONFIG);
            }
        };
        inspector = inspector.with_query(tester, extract_dir.clone());
    }

    match inspector.inspect_paths(&args.paths) {
        Ok(report) => Ok(report),
        Err(err) => {
            eprintln!("descry: {err}");
            Err(EXIT_IO)
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(report) => {
            eprintln!("descry: {report}");
            if report.has_failures() {
                ExitCode::from(EXIT_PARTIAL)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(code) => ExitCode::from(code),
    }
}
