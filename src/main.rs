use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use aiodns::config::{
    DEFAULT_BOOTSTRAP, DEFAULT_FALLBACKS, DEFAULT_LISTEN, DEFAULT_SPECIAL_UPSTREAMS,
    DEFAULT_UPSTREAMS, EngineFlags, ListenAddr, PipelineConfig,
};
use aiodns::pipeline;

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[derive(Parser)]
#[command(name = "aiodns")]
#[command(about = "All In One Clean DNS Solution.", long_about = None)]
struct Args {
    /// Listening address
    #[arg(short, long, default_value = DEFAULT_LISTEN)]
    listen: ListenAddr,

    /// An upstream to be default used (can be specified multiple times)
    #[arg(short, long, default_values_t = owned(DEFAULT_UPSTREAMS))]
    upstream: Vec<String>,

    /// An upstream to be special used (can be specified multiple times)
    #[arg(short = 'U', long, default_values_t = owned(DEFAULT_SPECIAL_UPSTREAMS))]
    special_upstream: Vec<String>,

    /// Fallback resolvers to use when regular ones are unavailable (can be specified multiple times)
    #[arg(short, long, default_values_t = owned(DEFAULT_FALLBACKS))]
    fallback: Vec<String>,

    /// Bootstrap DNS for DoH, DoT and list downloads (can be specified multiple times)
    #[arg(short, long, default_values_t = owned(DEFAULT_BOOTSTRAP))]
    bootstrap: Vec<String>,

    /// List of domains using special-upstream (can be specified multiple times)
    #[arg(short = 'L', long)]
    special_list: Vec<String>,

    /// List of domains bypassing special-upstream (can be specified multiple times)
    #[arg(short = 'B', long)]
    bypass_list: Vec<String>,

    /// Send EDNS client address to default upstreams
    #[arg(short, long)]
    edns: Option<String>,

    /// Enable the DNS cache
    #[arg(short = 'C', long)]
    cache: bool,

    /// Disable TLS certificate checks (for systems without ca-certificates)
    #[arg(short = 'I', long)]
    insecure: bool,

    /// Answer all AAAA requests with NoError and an empty answer
    #[arg(short = 'R', long)]
    ipv6_disabled: bool,

    /// Refuse ANY requests
    #[arg(short = 'A', long)]
    refuse_any: bool,

    /// Respond to A or AAAA requests only with the fastest IP address
    #[arg(short = 'F', long)]
    fastest_addr: bool,

    /// Verbose output
    #[arg(short = 'V', long)]
    verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(short = 'O', long)]
    output: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> PipelineConfig {
        PipelineConfig {
            listen: self.listen,
            upstreams: self.upstream,
            special_upstreams: self.special_upstream,
            fallbacks: self.fallback,
            bootstrap: self.bootstrap,
            special_lists: self.special_list,
            bypass_lists: self.bypass_list,
            flags: EngineFlags {
                edns_addr: self.edns,
                cache: self.cache,
                insecure: self.insecure,
                ipv6_disabled: self.ipv6_disabled,
                refuse_any: self.refuse_any,
                fastest_addr: self.fastest_addr,
                verbose: self.verbose,
                log_output: self.output,
            },
        }
    }
}

fn init_logging(verbose: bool, output: Option<&Path>) -> anyhow::Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.output.as_deref())?;

    let config = args.into_config();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let build = rt.block_on(pipeline::build(&config))?;

    let rendered = if config.flags.verbose {
        serde_json::to_string_pretty(&build.engine)?
    } else {
        serde_json::to_string(&build.engine)?
    };
    println!("{rendered}");
    Ok(())
}
