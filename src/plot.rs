use super::chart::{PlotConfig, MAX_IMAGE_SIDE};
use super::{MIN_SAMPLES, VERSION};
use clap::{App, Arg, ArgMatches};
use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;

/// Everything the plotting run needs from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotArgs {
    pub csvin: PathBuf,
    pub prefix: PathBuf,
    pub config: PlotConfig,
    pub verbose: bool,
}

/// Takes the CLI arguments that control the plotting of the capture.
pub fn parse_cli() -> Result<PlotArgs, clap::Error> {
    parse_cli_from(std::env::args_os())
}

pub fn parse_cli_from<I, T>(args: I) -> Result<PlotArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let default_min_samples = MIN_SAMPLES.to_string();
    let arg_csvin = Arg::with_name("csv_path")
        .help("csv exported by tshark with the frame.time_relative, tcp.seq, tcp.ack, tcp.len and tcp.analysis.bytes_in_flight fields")
        .required(true)
        .index(1);
    let arg_prefix = Arg::with_name("png_prefix")
        .help("prefix of the output files, <prefix>_timeseq.png and <prefix>_bytes_in_flight.png")
        .required(true)
        .index(2);
    let arg_rest = Arg::with_name("rest")
        .help("ignored")
        .multiple(true)
        .hidden(true)
        .index(3);
    let arg_min_samples = Arg::with_name("min_samples")
        .help("minimum number of valid rows to draw a graph")
        .short("n")
        .long("min_samples")
        .takes_value(true)
        .validator(is_positive)
        .default_value(&default_min_samples);
    let arg_width = Arg::with_name("width")
        .help("width of the png files, in pixels")
        .long("width")
        .takes_value(true)
        .validator(is_image_side)
        .default_value("1000");
    let arg_height = Arg::with_name("height")
        .help("height of the png files, in pixels")
        .long("height")
        .takes_value(true)
        .validator(is_image_side)
        .default_value("400");
    let arg_verbose = Arg::with_name("verbose")
        .help("print debug information")
        .short("v")
        .long("verbose")
        .takes_value(false)
        .required(false);
    let cli_args = App::new("plot_pcap")
        .version(VERSION.unwrap_or("unknown"))
        .about("cli app to plot the time-sequence and bytes-in-flight graphs of a tcp capture")
        .arg(arg_csvin)
        .arg(arg_prefix)
        .arg(arg_rest)
        .arg(arg_min_samples)
        .arg(arg_width)
        .arg(arg_height)
        .arg(arg_verbose)
        .get_matches_from_safe(args)?;

    let csvin = PathBuf::from(cli_args.value_of_os("csv_path").unwrap_or_default());
    let prefix = PathBuf::from(cli_args.value_of_os("png_prefix").unwrap_or_default());
    let config = PlotConfig {
        min_samples: parse_value(&cli_args, "min_samples")?,
        width: parse_value(&cli_args, "width")?,
        height: parse_value(&cli_args, "height")?,
    };
    let verbose = cli_args.is_present("verbose");
    Ok(PlotArgs {
        csvin,
        prefix,
        config,
        verbose,
    })
}

/// Sets up env_logger at info level, or debug for this crate when verbose;
/// RUST_LOG still takes precedence for other targets.
/// The skip and render diagnostics are at warn/info/error, so a RUST_LOG
/// stricter than info hides some of them.
pub fn init_logger(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_module("plot_pcap", log::LevelFilter::Debug);
    }
    builder.init();
}

fn is_positive(v: String) -> Result<(), String> {
    match v.parse::<u32>() {
        Ok(n) if n > 0 => Ok(()),
        _ => Err(format!("expected a positive integer, got {}", v)),
    }
}

fn is_image_side(v: String) -> Result<(), String> {
    match v.parse::<u32>() {
        Ok(n) if n > 0 && n <= MAX_IMAGE_SIDE => Ok(()),
        _ => Err(format!(
            "expected a size between 1 and {} pixels, got {}",
            MAX_IMAGE_SIDE, v
        )),
    }
}

fn parse_value<T: FromStr>(cli_args: &ArgMatches, name: &str) -> Result<T, clap::Error> {
    let raw = cli_args.value_of(name).unwrap_or_default();
    raw.parse::<T>().map_err(|_| {
        clap::Error::value_validation_auto(format!("invalid value {} for --{}", raw, name))
    })
}
