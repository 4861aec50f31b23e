//! Check a jail configuration file
//!
//! Loads the file through the same sandboxed parser the jail manager uses
//! and prints the resulting record.
//!
//! Usage:
//!   check-jail-config [--loader-config <toml>] [--json] <config>

use clap::Parser;
use std::path::PathBuf;

use sandblast_config::utils::{init_logging, report_fatal};
use sandblast_config::{ConfigError, ConfigLoader, DocumentFormat, JailConf, LoaderConfig};

#[derive(Parser, Debug)]
#[command(name = "check-jail-config", version, about = "Validate a jail configuration file")]
struct Args {
    /// Jail configuration file (TOML or JSON)
    config: PathBuf,

    /// Loader settings file (TOML)
    #[arg(long)]
    loader_config: Option<PathBuf>,

    /// Keep effective privileges while opening the file
    #[arg(long)]
    no_drop_privilege: bool,

    /// Parser CPU ceiling in seconds
    #[arg(long, value_name = "SECS")]
    cpu_limit: Option<u64>,

    /// Document syntax (default: by file extension)
    #[arg(long, value_parser = parse_format)]
    format: Option<DocumentFormat>,

    /// Print the record as JSON
    #[arg(long)]
    json: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON (needs the `json-logging` feature)
    #[arg(long)]
    log_json: bool,
}

fn parse_format(s: &str) -> Result<DocumentFormat, String> {
    s.parse()
}

fn main() {
    let args = Args::parse();

    let mut loader_config = match args.loader_config.as_deref() {
        Some(path) => match LoaderConfig::from_toml_file(path) {
            Ok(config) => config,
            Err(err) => {
                init_logging(None);
                report_fatal(&format!("{}: {:#}", path.display(), err));
                let code = err
                    .downcast_ref::<ConfigError>()
                    .map(ConfigError::exit_code)
                    .unwrap_or(1);
                std::process::exit(code);
            }
        },
        None => LoaderConfig::default(),
    };

    let filter = if args.verbose {
        Some("debug")
    } else {
        loader_config.log_filter.as_deref()
    };
    init_tool_logging(filter, args.log_json);

    if args.no_drop_privilege {
        loader_config.drop_privilege = false;
    }
    if let Some(secs) = args.cpu_limit {
        loader_config.cpu_limit_secs = Some(secs);
    }
    if let Some(format) = args.format {
        loader_config.format = Some(format);
    }

    let conf = ConfigLoader::new(loader_config).load_or_exit(&args.config);

    if args.json {
        match serde_json::to_string_pretty(&conf) {
            Ok(json) => println!("{}", json),
            Err(err) => {
                report_fatal(&err);
                std::process::exit(1);
            }
        }
    } else {
        print_plain(&conf);
    }
}

fn init_tool_logging(filter: Option<&str>, json: bool) {
    #[cfg(feature = "json-logging")]
    if json {
        sandblast_config::utils::init_json_logging(filter);
        return;
    }
    if json {
        eprintln!("JSON logs need the json-logging feature; using plain logs");
    }
    init_logging(filter);
}

fn print_plain(conf: &JailConf) {
    let show = |v: Option<&str>| v.unwrap_or("-").to_string();
    println!("hostname: {}", show(conf.hostname()));
    println!("jailname: {}", show(conf.jailname()));
    println!("script:   {}", conf.script());
    println!("ipv4:     {}", show(conf.ipv4()));
    println!("ipv6:     {}", show(conf.ipv6()));
    let limits = conf.limits();
    if limits.is_empty() {
        println!("limits:   -");
    } else {
        println!("limits:");
        for rule in limits {
            println!("  {}", rule);
        }
    }
}
