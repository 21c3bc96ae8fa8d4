use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use csvchunk::{ColumnKey, Cursor, Emit, HeaderOption, ScanConfig};
use glob::glob;
use rayon::prelude::*;
use std::{
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(author, version, about = "Chunked CSV reader with row filters")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every accepted record as one JSON value per line.
    Scan(ScanArgs),
    /// Count accepted records per file.
    Count(ScanArgs),
}

#[derive(Args)]
struct ScanArgs {
    /// Files or glob patterns.
    #[arg(required = true)]
    inputs: Vec<String>,
    /// YAML (or .json) reader options plus a `filters` map.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    chunk_size: Option<usize>,
    /// Take column names from the first line.
    #[arg(long, conflicts_with = "columns")]
    header: bool,
    /// Explicit column names; the first line is data.
    #[arg(long, value_delimiter = ',')]
    columns: Option<Vec<String>>,
    #[arg(long)]
    delimiter: Option<char>,
    #[arg(long)]
    quote: Option<char>,
    /// `column=expr`, repeatable. `a|b` matches either expression.
    #[arg(long = "where", value_name = "COLUMN=EXPR")]
    filters: Vec<String>,
    /// Read ahead on a background thread, holding up to N chunks.
    #[arg(long)]
    prefetch: Option<usize>,
    /// Fail on values that cannot be compared instead of skipping the row.
    #[arg(long)]
    strict: bool,
}

impl ScanArgs {
    fn scan_config(&self) -> Result<ScanConfig> {
        let mut config = match &self.config {
            Some(path) => ScanConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => ScanConfig::default(),
        };

        let reader = &mut config.reader;
        if let Some(n) = self.chunk_size {
            reader.chunk_size = n;
        }
        if self.header {
            reader.header = HeaderOption::Detect(true);
        }
        if let Some(columns) = &self.columns {
            reader.header = HeaderOption::Columns(columns.clone());
        }
        if let Some(c) = self.delimiter {
            reader.parse_options.column_separator = c;
        }
        if let Some(c) = self.quote {
            reader.parse_options.quote_char = c;
        }
        if self.prefetch.is_some() {
            reader.prefetch = self.prefetch;
        }
        if self.strict {
            reader.strict_types = true;
        }
        reader.validate().context("invalid reader options")?;
        Ok(config)
    }

    fn paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for pattern in &self.inputs {
            let before = paths.len();
            for entry in glob(pattern).with_context(|| format!("bad glob pattern: {}", pattern))? {
                match entry {
                    Ok(p) if p.is_file() => paths.push(p),
                    Ok(_) => {}
                    Err(e) => warn!("skipping unreadable path: {}", e),
                }
            }
            if paths.len() == before {
                warn!(pattern = %pattern, "no files matched");
            }
        }
        if paths.is_empty() {
            bail!("no input files matched {:?}", self.inputs);
        }
        Ok(paths)
    }
}

fn open_filtered(path: &Path, config: &ScanConfig, filters: &[String]) -> Result<Cursor> {
    let mut cursor = Cursor::open(path, config.reader.clone())
        .with_context(|| format!("opening {}", path.display()))?;
    cursor
        .apply_filters(&config.filters)
        .with_context(|| format!("config filters for {}", path.display()))?;

    for raw in filters {
        let Some((column, expr)) = raw.split_once('=') else {
            bail!("--where expects COLUMN=EXPR, got {:?}", raw);
        };
        let key = match column.parse::<usize>() {
            Ok(i) => ColumnKey::Index(i),
            Err(_) => ColumnKey::from(column),
        };
        let applied = if expr.contains('|') {
            cursor.filter_any(key, expr.split('|'))
        } else {
            cursor.filter_expr(key, expr)
        };
        applied.with_context(|| format!("--where {}", raw))?;
    }
    Ok(cursor)
}

fn scan(args: &ScanArgs) -> Result<()> {
    let config = args.scan_config()?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    for path in args.paths()? {
        let start = Instant::now();
        let mut cursor = open_filtered(&path, &config, &args.filters)?;
        let mut rows = 0u64;
        while cursor.advance().with_context(|| format!("reading {}", path.display()))? {
            if let Some(value) = cursor.current_json() {
                serde_json::to_writer(&mut out, &value)?;
                out.write_all(b"\n")?;
                rows += 1;
            }
        }
        info!(file = %path.display(), rows, elapsed = ?start.elapsed(), "scanned");
    }
    out.flush()?;
    Ok(())
}

fn count(args: &ScanArgs) -> Result<()> {
    let mut config = args.scan_config()?;
    config.reader.emit_batches_only = true;
    let paths = args.paths()?;

    let counts: Vec<(PathBuf, Result<u64>)> = paths
        .into_par_iter()
        .map(|path| {
            let counted = open_filtered(&path, &config, &args.filters).and_then(|mut cursor| {
                let mut n = 0u64;
                cursor.each(|emit| -> Result<()> {
                    if let Emit::Batch(batch) = emit {
                        n += batch.len() as u64;
                    }
                    Ok(())
                })?;
                Ok(n)
            });
            (path, counted)
        })
        .collect();

    let mut total = 0u64;
    let mut failed = 0usize;
    for (path, counted) in counts {
        match counted {
            Ok(n) => {
                println!("{}\t{}", n, path.display());
                total += n;
            }
            Err(e) => {
                warn!(file = %path.display(), "count failed: {:#}", e);
                failed += 1;
            }
        }
    }
    println!("{}\ttotal", total);
    if failed > 0 {
        bail!("{} file(s) failed", failed);
    }
    Ok(())
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Command::Scan(args) => scan(args),
        Command::Count(args) => count(args),
    }
}
