use clap::Parser;

/// Counts merged multi-member ridings with the single transferable vote, starting from the
/// first-preference results of their single-member districts.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON configuration of the contest. The data files it names are
    /// relative to its own location.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) A reference summary in JSON format. If provided, ridingstv will check that the
    /// tabulated output matches the reference.
    #[clap(long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) Where the JSON summary is written. Defaults to the standard
    /// output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) The CSV file with the results of every single-member district. Overrides the
    /// file named in the configuration.
    #[clap(long, value_parser)]
    pub results: Option<String>,

    /// (file path) The CSV file listing the ridings and the districts they merge. Overrides the
    /// file named in the configuration.
    #[clap(long, value_parser)]
    pub ridings: Option<String>,

    /// (0 to 9) Decimal places kept in the count. Overrides the configuration (default 4).
    #[clap(short, long, value_parser)]
    pub precision: Option<u32>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
