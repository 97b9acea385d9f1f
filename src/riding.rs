use log::{debug, error, info, log_enabled, warn, Level};

use snafu::{prelude::*, Snafu};
use wigm_stv::builder::Builder;
use wigm_stv::*;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::mpsc::channel;

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::riding::config_reader::*;
use crate::riding::io_csv::*;

pub mod config_reader;
pub mod io_csv;

pub const BALLOT_METHOD_PARTY_VOTE: &str = "party-vote";
pub const COUNT_METHOD_WIGM: &str = "wigm";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RidingError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error writing the summary"))]
    WritingJson { source: serde_json::Error },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading a line of CSV file {path}"))]
    CsvLineParse { source: csv::Error, path: String },
    #[snafu(display("{path}: missing column {column}"))]
    CsvMissingColumn { path: String, column: String },
    #[snafu(display("{path}: line {lineno} is too short"))]
    CsvLineTooShort { path: String, lineno: usize },
    #[snafu(display("{path}: line {lineno}: column {column}: {value:?} is not a valid number"))]
    CsvNumber {
        path: String,
        lineno: usize,
        column: String,
        value: String,
    },
    #[snafu(display("Invalid results for riding {riding}"))]
    RidingInput {
        source: VotingError,
        riding: String,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type RidingResult<T> = Result<T, RidingError>;

fn validate_rules(rules: &RidingRules, precision: Option<u32>) -> RidingResult<CountRules> {
    let res = CountRules {
        ballot_method: match rules.ballot_method.as_str() {
            BALLOT_METHOD_PARTY_VOTE => BallotMethod::PartyVote,
            x => {
                whatever!("Cannot use ballot method {:?}: currently not implemented", x)
            }
        },
        count_method: match rules.count_method.as_str() {
            COUNT_METHOD_WIGM => CountMethod::Wigm,
            x => {
                whatever!("Cannot use count method {:?}: currently not implemented", x)
            }
        },
        precision: match precision.or(rules.precision) {
            Some(p) if p <= MAX_PRECISION => p,
            Some(p) => {
                whatever!("Precision {} is not supported, it must be between 0 and {}", p, MAX_PRECISION)
            }
            None => CountRules::DEFAULT_RULES.precision,
        },
    };
    Ok(res)
}

/// Assembles every riding from the rows of its member districts.
fn build_ridings(
    config: &RidingConfig,
    results: &[ResultRow],
    ridings: &[RidingRow],
) -> RidingResult<Vec<StvDistrict>> {
    let mut by_district: HashMap<&str, Vec<&ResultRow>> = HashMap::new();
    for row in results.iter() {
        by_district
            .entry(row.district_id.as_str())
            .or_insert_with(Vec::new)
            .push(row);
    }

    let mut used: HashSet<&str> = HashSet::new();
    let mut res: Vec<StvDistrict> = Vec::new();
    for r in ridings.iter() {
        let mut builder = Builder::new(&r.riding);
        for district_id in r.districts.iter() {
            let rows = match by_district.get(district_id.as_str()) {
                Some(rows) => rows,
                None => {
                    whatever!("Riding {}: no results for district {}", r.riding, district_id)
                }
            };
            if !used.insert(district_id.as_str()) {
                warn!(
                    "build_ridings: district {} is part of more than one riding",
                    district_id
                );
            }
            let first = rows[0];
            if let Some(other) = rows.iter().find(|row| {
                row.total_ballots != first.total_ballots
                    || row.rejected_ballots != first.rejected_ballots
            }) {
                whatever!(
                    "District {}: inconsistent ballot totals ({}/{} and {}/{})",
                    district_id,
                    first.total_ballots,
                    first.rejected_ballots,
                    other.total_ballots,
                    other.rejected_ballots
                )
            }
            builder
                .add_district(
                    district_id,
                    &first.district_name,
                    first.total_ballots,
                    first.rejected_ballots,
                )
                .context(RidingInputSnafu {
                    riding: r.riding.as_str(),
                })?;
            for row in rows.iter() {
                let entry = CandidateEntry {
                    surname: row.surname.clone(),
                    given_name: row.given_name.clone(),
                    party: row.party.clone(),
                    votes: row.votes,
                    vote_pct: row.vote_pct,
                    color: config.party_color(&row.party),
                };
                builder
                    .add_candidate(district_id, entry)
                    .context(RidingInputSnafu {
                        riding: r.riding.as_str(),
                    })?;
            }
        }
        let district = builder.build().context(RidingInputSnafu {
            riding: r.riding.as_str(),
        })?;
        debug!(
            "build_ridings: {}: {} seats, {} candidates",
            district.name,
            district.seats,
            district.candidates().len()
        );
        res.push(district);
    }
    Ok(res)
}

/// What is known about a riding once its thread is done.
#[derive(Debug, Default)]
struct RidingOutcome {
    events: Vec<ReportEvent>,
    result: Option<Result<CountResult, VotingError>>,
}

fn count_ridings(
    districts: Vec<StvDistrict>,
    rules: &CountRules,
) -> RidingResult<HashMap<String, RidingOutcome>> {
    let mut outcomes: HashMap<String, RidingOutcome> = districts
        .iter()
        .map(|d| (d.name.clone(), RidingOutcome::default()))
        .collect();

    let (tx, rx) = channel();
    let handles = spawn_counts(districts, rules, tx);
    // Ends when every thread has dropped its sender.
    for msg in rx {
        match msg {
            DistrictMessage::Status { district, status } => {
                info!("{}: {}", district, status);
            }
            DistrictMessage::Report { district, event } => {
                // Every step of every count, with --verbose.
                if log_enabled!(Level::Debug) {
                    debug!("{}: event {:?} of round {}", district, event.kind, event.round);
                    LogSink.report(event.clone());
                }
                if let Some(o) = outcomes.get_mut(&district) {
                    o.events.push(event);
                }
            }
            DistrictMessage::Done { district, result } => {
                info!(
                    "{}: done after {} rounds, {} exhausted ballots",
                    district, result.rounds, result.exhausted
                );
                if let Some(o) = outcomes.get_mut(&district) {
                    o.result = Some(Ok(result));
                }
            }
            DistrictMessage::Failed { district, error } => {
                error!("{}: count failed: {}", district, error);
                if let Some(o) = outcomes.get_mut(&district) {
                    o.result = Some(Err(error));
                }
            }
        }
    }
    for h in handles {
        if h.join().is_err() {
            whatever!("A counting thread panicked")
        }
    }
    Ok(outcomes)
}

fn candidates_to_json(district: &StvDistrict) -> Vec<JSValue> {
    district
        .candidates()
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "name": c.display_name(),
                "party": c.party,
                "district": c.district_id,
                "votes": c.original_votes,
            })
        })
        .collect()
}

fn riding_to_json(
    district: &StvDistrict,
    outcome: &RidingOutcome,
    precision: usize,
) -> RidingResult<JSValue> {
    let rounds = serde_json::to_value(&outcome.events).context(WritingJsonSnafu {})?;
    let js = match &outcome.result {
        Some(Ok(res)) => {
            let winners = serde_json::to_value(&res.winners).context(WritingJsonSnafu {})?;
            let parties = serde_json::to_value(&res.groups).context(WritingJsonSnafu {})?;
            json!({
                "riding": district.name,
                "seats": res.seats,
                "quota": format!("{:.*}", precision, res.quota),
                "ballots": res.ballots,
                "exhausted": res.exhausted,
                "exhaustedWeight": format!("{:.*}", precision, res.exhausted_weight),
                "winners": winners,
                "parties": parties,
                "candidates": candidates_to_json(district),
                "rounds": rounds,
            })
        }
        Some(Err(e)) => json!({
            "riding": district.name,
            "seats": district.seats,
            "error": e.to_string(),
        }),
        None => json!({
            "riding": district.name,
            "seats": district.seats,
            "error": "the count did not report a result",
        }),
    };
    Ok(js)
}

fn build_summary_js(
    config: &RidingConfig,
    rules: &CountRules,
    districts: &[StvDistrict],
    outcomes: &HashMap<String, RidingOutcome>,
) -> RidingResult<JSValue> {
    let c = OutputConfig {
        contest: config.output_settings.contest_name.clone(),
        date: config.output_settings.contest_date.clone(),
        jurisdiction: config.output_settings.contest_jurisdiction.clone(),
        ballot_method: config.rules.ballot_method.clone(),
        count_method: config.rules.count_method.clone(),
        precision: rules.precision,
    };
    let empty = RidingOutcome::default();
    let mut results: Vec<JSValue> = Vec::new();
    for d in districts.iter() {
        let outcome = outcomes.get(&d.name).unwrap_or(&empty);
        results.push(riding_to_json(d, outcome, rules.precision as usize)?);
    }
    Ok(json!({ "config": c, "results": results }))
}

fn resolve(root: &Path, file: &str) -> String {
    root.join(file).display().to_string()
}

/// Loads the configuration and the data files, counts every riding and
/// writes the summary.
pub fn run_ridings(args: &Args) -> RidingResult<()> {
    let mut config = match &args.config {
        Some(config_path) => {
            let mut config = read_config(config_path)?;
            let root_p = Path::new(config_path.as_str())
                .parent()
                .unwrap_or_else(|| Path::new(""));
            config.results_file = config.results_file.map(|f| resolve(root_p, &f));
            config.ridings_file = config.ridings_file.map(|f| resolve(root_p, &f));
            config
        }
        None => match (&args.results, &args.ridings) {
            (Some(results), Some(ridings)) => RidingConfig::from_files(results, ridings),
            _ => {
                whatever!("Either a configuration file or both --results and --ridings are required")
            }
        },
    };
    if args.results.is_some() {
        config.results_file = args.results.clone();
    }
    if args.ridings.is_some() {
        config.ridings_file = args.ridings.clone();
    }
    info!("config: {:?}", config);

    // Validate the rules:
    let rules = validate_rules(&config.rules, args.precision)?;

    let results_path = match &config.results_file {
        Some(p) => p.clone(),
        None => {
            whatever!("No results file given")
        }
    };
    let ridings_path = match &config.ridings_file {
        Some(p) => p.clone(),
        None => {
            whatever!("No ridings file given")
        }
    };
    let results = read_results(&results_path)?;
    let ridings = read_ridings(&ridings_path)?;

    let districts = build_ridings(&config, &results, &ridings)?;
    let outcomes = count_ridings(districts.clone(), &rules)?;

    let summary_js = build_summary_js(&config, &rules, &districts, &outcomes)?;
    let pretty_js_stats = serde_json::to_string_pretty(&summary_js).context(WritingJsonSnafu {})?;

    match args.out.as_deref() {
        None | Some("stdout") | Some("") => println!("{}", pretty_js_stats),
        Some(out_path) => {
            info!("Writing summary to {}", out_path);
            fs::write(out_path, &pretty_js_stats).context(WritingFileSnafu { path: out_path })?;
        }
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &args.reference {
        let summary_ref = read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(WritingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    let failed = outcomes
        .values()
        .filter(|o| !matches!(o.result, Some(Ok(_))))
        .count();
    if failed > 0 {
        whatever!("{} ridings could not be counted", failed)
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    fn test_dir() -> PathBuf {
        [env!("CARGO_MANIFEST_DIR"), "tests", "data"].iter().collect()
    }

    // Tests run in parallel: each of them needs its own output file.
    fn args_for(test_name: &str, reference: Option<&str>, tag: &str) -> Args {
        let dir = test_dir().join(test_name);
        let mut out = std::env::temp_dir();
        out.push(format!("ridingstv-{}-{}-{}.json", std::process::id(), test_name, tag));
        Args {
            config: Some(dir.join("config.json").display().to_string()),
            reference: reference.map(|r| dir.join(r).display().to_string()),
            out: Some(out.display().to_string()),
            results: None,
            ridings: None,
            precision: None,
            verbose: false,
        }
    }

    // Same level as --verbose, so that every event also goes through the log.
    fn init() {
        let _ = env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::Debug)
            .try_init();
    }

    fn run_and_read(args: &Args) -> JSValue {
        run_ridings(args).unwrap();
        let out = args.out.clone().unwrap();
        serde_json::from_str(&fs::read_to_string(out).unwrap()).unwrap()
    }

    fn winners(js: &JSValue, idx: usize) -> Vec<String> {
        js["results"][idx]["winners"]
            .as_array()
            .unwrap()
            .iter()
            .map(|w| w["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn three_parties() {
        init();
        let js = run_and_read(&args_for("three_parties", None, "plain"));
        assert_eq!(js["config"]["contest"], "Three parties");
        assert_eq!(js["results"][0]["riding"], "North Shore");
        assert_eq!(js["results"][0]["quota"], "33.3334");
        assert_eq!(js["results"][0]["exhausted"], 60);
        assert_eq!(winners(&js, 0), vec!["Ann Adams", "Bea Brown"]);
        assert_eq!(js["results"][1]["riding"], "Valley");
        assert_eq!(winners(&js, 1), vec!["Dan Dupont"]);
    }

    #[test]
    fn three_parties_matches_reference() {
        init();
        run_ridings(&args_for("three_parties", Some("expected_summary.json"), "reference")).unwrap();
    }

    #[test]
    fn differences_with_the_reference_are_errors() {
        init();
        let res = run_ridings(&args_for("three_parties", Some("wrong_summary.json"), "wrong"));
        assert!(matches!(res, Err(RidingError::Whatever { .. })));
    }

    #[test]
    fn precision_override() {
        init();
        let mut args = args_for("three_parties", None, "precision");
        args.precision = Some(2);
        let js = run_and_read(&args);
        assert_eq!(js["config"]["precision"], 2);
        assert_eq!(js["results"][0]["quota"], "33.34");
    }

    #[test]
    fn data_files_without_config() {
        init();
        let dir = test_dir().join("three_parties");
        let mut args = args_for("three_parties", None, "no_config");
        args.config = None;
        args.results = Some(dir.join("results.csv").display().to_string());
        args.ridings = Some(dir.join("ridings.csv").display().to_string());
        let js = run_and_read(&args);
        assert_eq!(js["config"]["contest"], "ridings");
        assert_eq!(winners(&js, 0), vec!["Ann Adams", "Bea Brown"]);
    }

    #[test]
    fn unknown_district() {
        init();
        let results = vec![ResultRow {
            district_id: "1".to_string(),
            district_name: "One".to_string(),
            total_ballots: 10,
            rejected_ballots: 0,
            surname: "A".to_string(),
            given_name: "".to_string(),
            party: "P".to_string(),
            votes: 5,
            vote_pct: None,
        }];
        let ridings = vec![RidingRow {
            riding: "R".to_string(),
            districts: vec!["1".to_string(), "2".to_string()],
        }];
        let config = RidingConfig::from_files("results.csv", "ridings.csv");
        assert!(build_ridings(&config, &results, &ridings).is_err());
    }

    #[test]
    fn rules_are_validated() {
        let mut rules = RidingRules::default();
        assert_eq!(validate_rules(&rules, None).unwrap(), CountRules::DEFAULT_RULES);
        assert!(validate_rules(&rules, Some(10)).is_err());
        rules.count_method = "meek".to_string();
        assert!(validate_rules(&rules, None).is_err());
    }
}
