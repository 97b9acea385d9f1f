use crate::riding::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "contestName")]
    pub contest_name: String,
    #[serde(rename = "contestDate")]
    pub contest_date: Option<String>,
    #[serde(rename = "contestJurisdiction")]
    pub contest_jurisdiction: Option<String>,
}

/// The `config` section of the summary.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub contest: String,
    pub date: Option<String>,
    pub jurisdiction: Option<String>,
    #[serde(rename = "ballotMethod")]
    pub ballot_method: String,
    #[serde(rename = "countMethod")]
    pub count_method: String,
    pub precision: u32,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RidingRules {
    #[serde(rename = "ballotMethod")]
    pub ballot_method: String,
    #[serde(rename = "countMethod")]
    pub count_method: String,
    pub precision: Option<u32>,
}

impl Default for RidingRules {
    fn default() -> Self {
        RidingRules {
            ballot_method: BALLOT_METHOD_PARTY_VOTE.to_string(),
            count_method: COUNT_METHOD_WIGM.to_string(),
            precision: None,
        }
    }
}

/// Display settings of a party. The party named `default` applies to all
/// the parties that are not listed.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PartyConfig {
    pub name: String,
    pub color: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RidingConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    #[serde(rename = "resultsFile")]
    pub results_file: Option<String>,
    #[serde(rename = "ridingsFile")]
    pub ridings_file: Option<String>,
    #[serde(default)]
    pub rules: RidingRules,
    pub parties: Option<Vec<PartyConfig>>,
}

impl RidingConfig {
    /// The configuration used when only data files are given.
    pub fn from_files(results_file: &str, ridings_file: &str) -> RidingConfig {
        RidingConfig {
            output_settings: OutputSettings {
                contest_name: simplify_file_name(ridings_file),
                contest_date: None,
                contest_jurisdiction: None,
            },
            results_file: Some(results_file.to_string()),
            ridings_file: Some(ridings_file.to_string()),
            rules: RidingRules::default(),
            parties: None,
        }
    }

    pub fn party_color(&self, party: &str) -> Option<String> {
        let parties = self.parties.as_ref()?;
        parties
            .iter()
            .find(|p| p.name == party)
            .or_else(|| parties.iter().find(|p| p.name == "default"))
            .and_then(|p| p.color.clone())
    }
}

pub fn read_config(path: &str) -> RidingResult<RidingConfig> {
    let config_str = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: RidingConfig =
        serde_json::from_str(&config_str).context(ParsingJsonSnafu { path })?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

pub fn read_summary(path: &str) -> RidingResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    debug!(
        "read_summary: {} ridings in reference",
        js["results"].as_array().map(|l| l.len()).unwrap_or(0)
    );
    Ok(js)
}

/// The name of a file, without its directories or extension.
pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config() {
        let js = r#"{
            "outputSettings": {"contestName": "Test"},
            "resultsFile": "results.csv",
            "ridingsFile": "ridings.csv"
        }"#;
        let config: RidingConfig = serde_json::from_str(js).unwrap();
        assert_eq!(config.rules, RidingRules::default());
        assert_eq!(config.party_color("Red"), None);
    }

    #[test]
    fn party_colors_fall_back_to_default() {
        let js = r##"{
            "outputSettings": {"contestName": "Test", "contestDate": "2021-09-20"},
            "rules": {"ballotMethod": "party-vote", "countMethod": "wigm", "precision": 6},
            "parties": [
                {"name": "Red", "color": "#d71920"},
                {"name": "default", "color": "#666666"}
            ]
        }"##;
        let config: RidingConfig = serde_json::from_str(js).unwrap();
        assert_eq!(config.rules.precision, Some(6));
        assert_eq!(config.party_color("Red"), Some("#d71920".to_string()));
        assert_eq!(config.party_color("Blue"), Some("#666666".to_string()));
    }

    #[test]
    fn file_names() {
        assert_eq!(simplify_file_name("data/ridings_2021.csv"), "ridings_2021");
    }
}
