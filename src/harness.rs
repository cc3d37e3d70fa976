//! JSON-driven correctness harness: reads `{ID, t1, t2, d?}` records,
//! computes the edit distance of each pair and checks it against the
//! expected value when one is present.

use crate::parsing::parse_tree;
use crate::ted::edit_distance;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
pub struct TedCase {
    #[serde(rename = "ID")]
    pub id: u32,
    pub t1: String,
    pub t2: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<f64>,
}

/// Runs every case of a test file, printing one line per pair. Returns
/// the number of cases whose distance did not match the expected value.
pub fn run(tests_path: &Path) -> Result<usize, anyhow::Error> {
    let file = File::open(tests_path)
        .with_context(|| format!("opening test file {}", tests_path.display()))?;
    let cases: Vec<TedCase> = serde_json::from_reader(BufReader::new(file))?;

    let mut failures = 0;
    for case in &cases {
        let cost = run_case(case)?;
        match case.d {
            Some(expected) => {
                let ok = cost == expected;
                println!(
                    "{:>3} {} && {}: {}",
                    case.id,
                    cost,
                    expected,
                    if ok { "✓" } else { "FAIL" }
                );
                if !ok {
                    failures += 1;
                }
            }
            None => println!(
                "ID: {:>3} :: the cost of editing t1 or t2 so that they become the same is: {}",
                case.id, cost
            ),
        }
    }

    Ok(failures)
}

pub fn run_case(case: &TedCase) -> Result<f64, anyhow::Error> {
    let t1 = parse_tree(&case.t1).with_context(|| format!("case {}: t1", case.id))?;
    let t2 = parse_tree(&case.t2).with_context(|| format!("case {}: t2", case.id))?;
    Ok(edit_distance(&t1, &t2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_deserialization() {
        let json = r#"[
            {"ID": 1, "t1": "{a}", "t2": "{b}", "d": 1},
            {"ID": 2, "t1": "{a}", "t2": "{a}"}
        ]"#;
        let cases: Vec<TedCase> = serde_json::from_str(json).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].d, Some(1.0));
        assert_eq!(cases[1].d, None);
    }

    #[test]
    fn test_run_case() {
        let case = TedCase {
            id: 1,
            t1: "{f{d{a}{c{b}}}{e}}".to_owned(),
            t2: "{f{c{d{a}{b}}}{e}}".to_owned(),
            d: Some(2.0),
        };
        assert_eq!(run_case(&case).unwrap(), 2.0);
    }

    #[test]
    fn test_run_case_rejects_malformed_tree() {
        let case = TedCase {
            id: 3,
            t1: "{a".to_owned(),
            t2: "{b}".to_owned(),
            d: None,
        };
        assert!(run_case(&case).is_err());
    }
}
