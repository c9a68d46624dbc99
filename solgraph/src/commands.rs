use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("solgraph")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("solgraph")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the solgraph database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location to store the solgraph database")
                        .default_value("~/.config/solgraph/"),
                )
                .arg(
                    arg!(-f - -"force")
                        .help(
                            "Forces the overwriting of any existing database at the specified \
                        location.",
                        )
                        .required(false),
                ),
        )
        .subcommand(
            command!("expand")
                .about(
                    "Expand the activity graph around a seed transaction signature or account \
                address, fetching from the configured endpoints.",
                )
                .arg(
                    arg!(<SEED>)
                        .required(true)
                        .help("The seed: a transaction signature or an account address"),
                )
                .arg(
                    arg!(-e --"endpoint" <URL>)
                        .required(false)
                        .help("RPC endpoint URL (repeatable)")
                        .value_parser(clap::value_parser!(Url))
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(-E --"endpoints-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of endpoint URLs")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-d --"depth" <HOPS>)
                        .required(false)
                        .help("Maximum hop count from the seed")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("3"),
                )
                .arg(
                    arg!(--"limit" <NUM>)
                        .required(false)
                        .help("Transaction rows fetched per account")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("20"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"no-store")
                        .required(false)
                        .help("Skip the local database entirely for this run")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("path")
                .about(
                    "Find a path of transactions linking two wallets, expanding the graph from \
                the source as needed.",
                )
                .arg(
                    arg!(--"from" <ADDRESS>)
                        .required(true)
                        .help("The source wallet address"),
                )
                .arg(
                    arg!(--"to" <ADDRESS>)
                        .required(true)
                        .help("The target wallet address"),
                )
                .arg(
                    arg!(-e --"endpoint" <URL>)
                        .required(false)
                        .help("RPC endpoint URL (repeatable)")
                        .value_parser(clap::value_parser!(Url))
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(-d --"depth" <HOPS>)
                        .required(false)
                        .help("Maximum hop count explored from the source")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("3"),
                ),
        )
}
