use log::{error, info};
use plot_pcap::chart::render_charts;
use plot_pcap::plot::{init_logger, parse_cli};
use plot_pcap::PacketTable;

fn main() {
    let args = match parse_cli() {
        Ok(args) => args,
        Err(e) => match e.kind {
            clap::ErrorKind::HelpDisplayed | clap::ErrorKind::VersionDisplayed => e.exit(),
            _ => {
                eprintln!("{}", e.message);
                std::process::exit(2);
            }
        },
    };
    init_logger(args.verbose);
    info!(
        "read packets from {} and plot to {}_*.png",
        args.csvin.display(),
        args.prefix.display()
    );
    let mut table = match PacketTable::from_csv(&args.csvin) {
        Ok(table) => table,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    table.normalize_columns();
    render_charts(&table, &args.prefix, &args.config);
}
