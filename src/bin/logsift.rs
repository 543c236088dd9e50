use anyhow::{bail, Context};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Args, Parser, Subcommand};
use logsift::cluster::ClusterBackend;
use logsift::config::AnalysisConfig;
use logsift::report::{self, AnalysisReport, ParseSummary, RarityReport, ResultFilter, SortOrder, SpikeReport};
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Once;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("logsift=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn init_parallelism(threads: Option<usize>) {
    static START: Once = Once::new();
    START.call_once(|| {
        let n = threads.unwrap_or_else(num_cpus::get).max(1);
        let _ = rayon::ThreadPoolBuilder::new().num_threads(n).build_global();
    });
}

#[derive(Parser, Debug)]
#[command(name = "logsift", version, about = "Rare pattern and spike detection for plain-text logs")]
struct Cli {
    /// TOML configuration file (falls back to $LOGSIFT_CONFIG)
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Output format: auto | json | table (auto picks table on a terminal)
    #[arg(long = "format", global = true, default_value = "auto")]
    format: String,

    /// Worker threads for running the analyses side by side
    #[arg(long = "threads", global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse summary: level counts and a sample of parsed lines
    Parse {
        /// Input file (`-` for stdin)
        input: String,
        #[arg(long = "sample-size")]
        sample_size: Option<usize>,
    },
    /// Rarest patterns in the file
    Rare {
        input: String,
        #[arg(long = "top-k")]
        top_k: Option<usize>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Windows where a pattern's rate spikes above its own baseline
    Spikes {
        input: String,
        #[arg(long = "top-k")]
        top_k: Option<usize>,
        #[command(flatten)]
        spike: SpikeArgs,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Rarity and spike reports together
    Analyze {
        input: String,
        /// Applies to both the rare and the spike lists
        #[arg(long = "top-k")]
        top_k: Option<usize>,
        #[command(flatten)]
        spike: SpikeArgs,
        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(Args, Debug)]
struct SpikeArgs {
    /// Window length in seconds
    #[arg(long = "window-size")]
    window_size: Option<u64>,
    /// Spike when count > mean + k * stdev
    #[arg(long = "threshold-mult")]
    threshold_mult: Option<f64>,
    /// Clustering backend for spike examples: none | drain
    #[arg(long = "cluster")]
    cluster: Option<String>,
}

impl SpikeArgs {
    fn apply(&self, config: &mut AnalysisConfig) -> anyhow::Result<()> {
        if let Some(w) = self.window_size { config.spikes.window_size = w; }
        if let Some(t) = self.threshold_mult { config.spikes.threshold_mult = t; }
        if let Some(c) = &self.cluster {
            config.clustering.backend = c.parse::<ClusterBackend>().map_err(anyhow::Error::msg)?;
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Keep patterns whose key starts with this level
    #[arg(long = "level")]
    level: Option<String>,
    /// Keep patterns whose key names this logger
    #[arg(long = "logger")]
    logger: Option<String>,
    /// Earliest spike window start (epoch seconds or RFC3339)
    #[arg(long = "from")]
    from: Option<String>,
    /// Latest spike window start (epoch seconds or RFC3339)
    #[arg(long = "to")]
    to: Option<String>,
    /// Reorder results: score (highest first) | count (lowest first)
    #[arg(long = "sort")]
    sort: Option<SortOrder>,
}

impl FilterArgs {
    fn to_filter(&self) -> anyhow::Result<ResultFilter> {
        Ok(ResultFilter {
            level: self.level.clone(),
            logger: self.logger.clone(),
            from: self.from.as_deref().map(parse_bound).transpose()?,
            to: self.to.as_deref().map(parse_bound).transpose()?,
            sort: self.sort,
        })
    }
}

fn parse_bound(s: &str) -> anyhow::Result<i64> {
    if let Ok(secs) = s.parse::<i64>() {
        return Ok(secs);
    }
    let dt = DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid time bound '{s}' (expected epoch seconds or RFC3339)"))?;
    Ok(dt.timestamp())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Table,
}

fn resolve_format(s: &str) -> anyhow::Result<OutputFormat> {
    match s {
        "json" => Ok(OutputFormat::Json),
        "table" => Ok(OutputFormat::Table),
        "auto" => Ok(if atty::is(atty::Stream::Stdout) { OutputFormat::Table } else { OutputFormat::Json }),
        other => bail!("unknown format '{other}' (expected auto, json or table)"),
    }
}

fn read_input(path: &str) -> anyhow::Result<String> {
    let bytes = if path == "-" {
        let mut buf = Vec::new();
        io::stdin().lock().read_to_end(&mut buf).context("failed to read stdin")?;
        buf
    } else {
        std::fs::read(path).with_context(|| format!("failed to read {path}"))?
    };
    Ok(report::decode_input(&bytes).into_owned())
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    init_parallelism(cli.threads);
    let format = resolve_format(&cli.format)?;

    let mut config = AnalysisConfig::load(cli.config.as_deref())?;
    let input = match &cli.command {
        Command::Parse { input, sample_size } => {
            if let Some(n) = sample_size {
                config.parse.sample_size = *n;
            }
            input
        }
        Command::Rare { input, top_k, .. } => {
            if let Some(k) = top_k {
                config.rarity.top_k = *k;
            }
            input
        }
        Command::Spikes { input, top_k, spike, .. } | Command::Analyze { input, top_k, spike, .. } => {
            if let Some(k) = top_k {
                config.rarity.top_k = *k;
                config.spikes.top_k = *k;
            }
            spike.apply(&mut config)?;
            input
        }
    };
    config.validate()?;
    debug!(?config, "effective configuration");
    let result_filter = match &cli.command {
        Command::Parse { .. } => ResultFilter::default(),
        Command::Rare { filter, .. } | Command::Spikes { filter, .. } | Command::Analyze { filter, .. } => {
            filter.to_filter()?
        }
    };

    let text = read_input(input)?;
    let lines = logsift::parser::split_lines(&text);
    info!(lines = lines.len(), source = %input, "read input");

    match &cli.command {
        Command::Parse { .. } => {
            let out = report::parse_summary(&lines, config.parse.sample_size);
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&out)?),
                OutputFormat::Table => print_parse_table(&out),
            }
        }
        Command::Rare { .. } => {
            let out = result_filter.apply_rarity(report::rarity_report(&lines, config.rarity.top_k));
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&out)?),
                OutputFormat::Table => print_rare_table(&out),
            }
        }
        Command::Spikes { .. } => {
            let clusterer = config.clustering.build();
            let out = result_filter.apply_spikes(report::spike_report(&lines, &config.spikes, clusterer.as_ref()));
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&out)?),
                OutputFormat::Table => print_spike_table(&out),
            }
        }
        Command::Analyze { .. } => {
            let out = result_filter.apply(report::analyze(&lines, &config));
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&out)?),
                OutputFormat::Table => print_analysis_tables(&out),
            }
        }
    }
    Ok(())
}

fn print_parse_table(out: &ParseSummary) {
    println!("Total lines: {}", out.total_lines);
    println!("Parsed lines: {}", out.parsed);
    let mut levels: Vec<(&String, &usize)> = out.level_counts.iter().collect();
    levels.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (level, count) in levels {
        println!("  {:<10} {}", level, count);
    }
    println!();
    println!("{:<8} {:<24} {:<8} {:<20} {}", "Line", "Timestamp", "Level", "Logger", "Message");
    for l in &out.sample {
        println!("{:<8} {:<24} {:<8} {:<20} {}",
            l.line_number,
            l.timestamp_raw.as_deref().unwrap_or(""),
            l.level.as_deref().unwrap_or(""),
            l.logger.as_deref().unwrap_or(""),
            l.message);
    }
}

fn print_rare_table(out: &RarityReport) {
    println!("Total lines: {}", out.total_lines);
    println!("Unique patterns: {}", out.unique_patterns);
    println!("{:<6} {:<8} {}", "Count", "Score", "Key");
    for item in &out.rare_patterns {
        println!("{:<6} {:<8.3} {}", item.count, item.score, item.key);
        println!("{:<15} e.g. {}", "", item.example_message);
    }
}

fn print_spike_table(out: &SpikeReport) {
    println!("Total lines: {}", out.total_lines);
    println!("Unique patterns: {}", out.unique_patterns);
    println!("{:<6} {:<8} {:<22} {:<8} {}", "Count", "Score", "Window", "Cluster", "Key");
    for item in &out.spike_patterns {
        let window = DateTime::<Utc>::from_timestamp(item.window_start, 0)
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| item.window_start.to_string());
        println!("{:<6} {:<8.3} {:<22} {:<8} {}", item.count, item.score, window, item.cluster_id, item.key);
        println!("{:<15} e.g. {}", "", item.example_message);
    }
    if !out.clusters.is_empty() {
        println!();
        println!("{:<8} {:<6} {}", "Cluster", "Size", "Template");
        for c in &out.clusters {
            println!("{:<8} {:<6} {}", c.cluster_id, c.size, c.template);
        }
    }
}

fn print_analysis_tables(out: &AnalysisReport) {
    println!("# Rare patterns");
    print_rare_table(&out.rarity);
    println!();
    println!("# Spikes");
    print_spike_table(&out.spikes);
}
