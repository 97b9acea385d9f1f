// Readers for the district results and the riding definitions.

use std::collections::HashMap;
use std::fs::File;

use csv::StringRecord;

use crate::riding::*;

/// One line of the results file: a candidate and the totals of its district.
#[derive(PartialEq, Debug, Clone)]
pub struct ResultRow {
    pub district_id: String,
    pub district_name: String,
    pub total_ballots: u64,
    pub rejected_ballots: u64,
    pub surname: String,
    pub given_name: String,
    pub party: String,
    pub votes: u64,
    pub vote_pct: Option<f64>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RidingRow {
    pub riding: String,
    pub districts: Vec<String>,
}

const RESULT_COLUMNS: [&str; 8] = [
    "district_id",
    "district_name",
    "total_ballots",
    "rejected_ballots",
    "surname",
    "given_name",
    "party",
    "votes",
];

const DISTRICT_SEPARATOR: char = '~';

struct Columns {
    path: String,
    indices: HashMap<String, usize>,
}

impl Columns {
    fn new(path: &str, header: &StringRecord, required: &[&str]) -> RidingResult<Columns> {
        let indices: HashMap<String, usize> = header
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.trim().to_string(), idx))
            .collect();
        for column in required {
            ensure!(
                indices.contains_key(*column),
                CsvMissingColumnSnafu {
                    path,
                    column: *column
                }
            );
        }
        Ok(Columns {
            path: path.to_string(),
            indices,
        })
    }

    fn get<'a>(&self, line: &'a StringRecord, column: &str, lineno: usize) -> RidingResult<&'a str> {
        let s = self
            .indices
            .get(column)
            .and_then(|idx| line.get(*idx))
            .context(CsvLineTooShortSnafu {
                path: self.path.as_str(),
                lineno,
            })?;
        Ok(s.trim())
    }

    fn get_opt<'a>(&self, line: &'a StringRecord, column: &str) -> Option<&'a str> {
        self.indices
            .get(column)
            .and_then(|idx| line.get(*idx))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    fn get_u64(&self, line: &StringRecord, column: &str, lineno: usize) -> RidingResult<u64> {
        let s = self.get(line, column, lineno)?;
        s.parse::<u64>().ok().context(CsvNumberSnafu {
            path: self.path.as_str(),
            lineno,
            column,
            value: s,
        })
    }
}

fn open(path: &str) -> RidingResult<(StringRecord, csv::StringRecordsIntoIter<File>)> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let header = rdr.headers().context(CsvLineParseSnafu { path })?.clone();
    Ok((header, rdr.into_records()))
}

pub fn read_results(path: &str) -> RidingResult<Vec<ResultRow>> {
    let (header, records) = open(path)?;
    let columns = Columns::new(path, &header, &RESULT_COLUMNS)?;
    let mut res: Vec<ResultRow> = Vec::new();
    for (idx, line_r) in records.enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { path })?;
        let vote_pct = match columns.get_opt(&line, "vote_pct") {
            Some(s) => Some(s.parse::<f64>().ok().context(CsvNumberSnafu {
                path,
                lineno,
                column: "vote_pct",
                value: s,
            })?),
            None => None,
        };
        let row = ResultRow {
            district_id: columns.get(&line, "district_id", lineno)?.to_string(),
            district_name: columns.get(&line, "district_name", lineno)?.to_string(),
            total_ballots: columns.get_u64(&line, "total_ballots", lineno)?,
            rejected_ballots: columns.get_u64(&line, "rejected_ballots", lineno)?,
            surname: columns.get(&line, "surname", lineno)?.to_string(),
            given_name: columns.get(&line, "given_name", lineno)?.to_string(),
            party: columns.get(&line, "party", lineno)?.to_string(),
            votes: columns.get_u64(&line, "votes", lineno)?,
            vote_pct,
        };
        debug!("read_results: {}: {:?}", lineno, row);
        res.push(row);
    }
    info!("read_results: {} candidates in {}", res.len(), path);
    Ok(res)
}

pub fn read_ridings(path: &str) -> RidingResult<Vec<RidingRow>> {
    let (header, records) = open(path)?;
    let columns = Columns::new(path, &header, &["riding", "districts"])?;
    let mut res: Vec<RidingRow> = Vec::new();
    for (idx, line_r) in records.enumerate() {
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { path })?;
        let riding = columns.get(&line, "riding", lineno)?;
        // Blank lines at the end of the file.
        if riding.is_empty() {
            continue;
        }
        let districts: Vec<String> = columns
            .get(&line, "districts", lineno)?
            .split(DISTRICT_SEPARATOR)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if res.iter().any(|r| r.riding == riding) {
            whatever!("{}: line {}: riding {} is defined twice", path, lineno, riding)
        }
        res.push(RidingRow {
            riding: riding.to_string(),
            districts,
        });
    }
    info!("read_ridings: {} ridings in {}", res.len(), path);
    Ok(res)
}
