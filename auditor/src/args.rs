use clap::{Arg, ArgAction, Command, arg};
use lineage_content::{
    config::{ContentConfig, DEFAULT_CACHE_SIZE, DEFAULT_MAX_CHAIN_LEN},
    pipeline::synthetic::SyntheticLayout,
};
use serde::Deserialize;
use std::{ffi::OsString, fs, path::PathBuf};
use toml::from_str;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Args {
    // NOTE: property names match config file fields
    pub image: Vec<String>,
    pub records: Option<String>,
    pub out_dir: String,
    pub db_dir: Option<String>,
    pub logdir: Option<String>,
    pub seed: u64,
    pub parallel: bool,
    pub threads: usize,
    pub max_chain_len: usize,
    pub cache_size: usize,
    #[serde(rename = "loglevel")]
    pub log_level: String,
    pub verify_only: bool,
    /// Shape of the synthetic image, config file only
    pub layout: SyntheticLayout,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            image: vec![],
            records: None,
            out_dir: ".".to_string(),
            db_dir: None,
            logdir: None,
            seed: 0,
            parallel: false,
            threads: 0,
            max_chain_len: DEFAULT_MAX_CHAIN_LEN,
            cache_size: DEFAULT_CACHE_SIZE,
            log_level: "info".to_string(),
            verify_only: false,
            layout: SyntheticLayout::default(),
        }
    }
}

impl Args {
    /// Base name of the output files, taken from the first image path
    pub fn stem(&self) -> String {
        self.image
            .first()
            .and_then(|p| PathBuf::from(p).file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "image".to_string())
    }

    pub fn records_path(&self) -> PathBuf {
        match &self.records {
            Some(records) => PathBuf::from(records),
            None => PathBuf::from(&self.out_dir).join(format!("{}_leaves.txt", self.stem())),
        }
    }

    pub fn exceptions_path(&self) -> PathBuf {
        PathBuf::from(&self.out_dir).join(format!("{}_exceptions.txt", self.stem()))
    }

    pub fn layout(&self) -> SyntheticLayout {
        SyntheticLayout { seed: self.seed, ..self.layout.clone() }
    }

    pub fn content_config(&self) -> ContentConfig {
        ContentConfig { cache_size: self.cache_size, ..Default::default() }.with_max_chain_len(self.max_chain_len)
    }

    pub fn thread_count(&self) -> usize {
        if self.threads == 0 { num_cpus::get() } else { self.threads }
    }
}

pub fn cli() -> Command {
    let defaults: Args = Default::default();

    Command::new("lineage-auditor")
        .about(format!("{} v{}", env!("CARGO_PKG_DESCRIPTION"), env!("CARGO_PKG_VERSION")))
        .version(env!("CARGO_PKG_VERSION"))
        .arg(arg!(-C --config <CONFIG_FILE> "Path of a TOML config file."))
        .arg(
            Arg::new("image")
                .short('i')
                .long("image")
                .value_name("PATH")
                .num_args(1..)
                .action(ArgAction::Append)
                .help("Image file(s). Split images are given in segment order."),
        )
        .arg(arg!(--records <FILE> "Leaf record file (default: <out-dir>/<image stem>_leaves.txt)."))
        .arg(arg!(-o --"out-dir" <DIR> "Directory for the record and exceptions files."))
        .arg(arg!(--"db-dir" <DIR> "Persistent database directory (default: a temporary one)."))
        .arg(arg!(--logdir <LOG_DIR> "Directory to write log files to."))
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("SEED")
                .value_parser(clap::value_parser!(u64))
                .help(format!("Seed of the synthetic image layout (default: {}).", defaults.seed)),
        )
        .arg(arg!(--parallel "Expand sibling subtrees in parallel."))
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_name("THREADS")
                .value_parser(clap::value_parser!(usize))
                .help("Worker threads for building and verification (default: number of cores)."),
        )
        .arg(
            Arg::new("max-chain-len")
                .long("max-chain-len")
                .value_name("LEN")
                .value_parser(clap::value_parser!(usize))
                .help(format!("Ancestor chains longer than this are reported as cycles (default: {}).", defaults.max_chain_len)),
        )
        .arg(
            Arg::new("cache-size")
                .long("cache-size")
                .value_name("NODES")
                .value_parser(clap::value_parser!(usize))
                .help(format!("Content nodes kept in the store cache (default: {}).", defaults.cache_size)),
        )
        .arg(
            Arg::new("loglevel")
                .short('d')
                .long("loglevel")
                .env("LINEAGE_LOG_LEVEL")
                .value_name("LEVEL")
                .default_value("info")
                .help(concat!(
                    "Logging level {off, error, warn, info, debug, trace}\n",
                    "-- You may also specify <module>=<level>,<module2>=<level>,..."
                )),
        )
        .arg(arg!(--"verify-only" "Only verify an existing record file against an existing database."))
}

impl Args {
    pub fn parse<I, T>(itr: I) -> Result<Args, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let m: clap::ArgMatches = cli().try_get_matches_from(itr)?;
        let mut defaults: Args = Default::default();

        if let Some(config_file) = m.get_one::<String>("config") {
            let config_str = fs::read_to_string(config_file)?;
            defaults = from_str(&config_str).map_err(|toml_error| {
                clap::Error::raw(
                    clap::error::ErrorKind::ValueValidation,
                    format!("failed parsing config file, reason: {}", toml_error.message()),
                )
            })?;
        }

        Ok(Args {
            image: arg_match_many_unwrap_or::<String>(&m, "image", defaults.image),
            records: m.get_one::<String>("records").cloned().or(defaults.records),
            out_dir: arg_match_unwrap_or::<String>(&m, "out-dir", defaults.out_dir),
            db_dir: m.get_one::<String>("db-dir").cloned().or(defaults.db_dir),
            logdir: m.get_one::<String>("logdir").cloned().or(defaults.logdir),
            seed: arg_match_unwrap_or::<u64>(&m, "seed", defaults.seed),
            parallel: arg_match_flag_or(&m, "parallel", defaults.parallel),
            threads: arg_match_unwrap_or::<usize>(&m, "threads", defaults.threads),
            max_chain_len: arg_match_unwrap_or::<usize>(&m, "max-chain-len", defaults.max_chain_len),
            cache_size: arg_match_unwrap_or::<usize>(&m, "cache-size", defaults.cache_size),
            log_level: arg_match_unwrap_or::<String>(&m, "loglevel", defaults.log_level),
            verify_only: arg_match_flag_or(&m, "verify-only", defaults.verify_only),
            layout: defaults.layout,
        })
    }
}

use clap::parser::ValueSource::DefaultValue;
fn arg_match_unwrap_or<T: Clone + Send + Sync + 'static>(m: &clap::ArgMatches, arg_id: &str, default: T) -> T {
    m.get_one::<T>(arg_id).cloned().filter(|_| m.value_source(arg_id) != Some(DefaultValue)).unwrap_or(default)
}

fn arg_match_many_unwrap_or<T: Clone + Send + Sync + 'static>(m: &clap::ArgMatches, arg_id: &str, default: Vec<T>) -> Vec<T> {
    match m.get_many::<T>(arg_id) {
        Some(val_ref) => val_ref.cloned().collect(),
        None => default,
    }
}

/// Flags are always present with a default of `false`, so only an explicit flag overrides the config file
fn arg_match_flag_or(m: &clap::ArgMatches, arg_id: &str, default: bool) -> bool {
    m.get_flag(arg_id) || default
}
