use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::cli::StatsArgs;
use crate::model::TestResult;
use crate::store::DeckStore;
use crate::util::read_file;

/// A submitted test, as saved by the study page.
#[derive(Debug, Default, Deserialize)]
struct TestSubmission {
    #[serde(default)]
    right: i64,
    #[serde(default)]
    wrong: i64,
    #[serde(default)]
    percent: Option<Value>,
    #[serde(default, rename = "setname")]
    set_name: Option<String>,
    #[serde(default, rename = "test")]
    questions: Option<Vec<Value>>,
}

pub fn run(args: StatsArgs) -> Result<()> {
    let store = DeckStore::new(&args.data_root);

    let stats = match test_result(&args)? {
        Some(result) => store.record_test(&args.user, result)?,
        None => store.load_stats(&args.user)?,
    };

    info!(user = %args.user, right = stats.right, wrong = stats.wrong, "stats loaded");

    let rendered = serde_json::to_string_pretty(&stats).context("failed to serialize stats")?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{rendered}").context("failed to write stats")?;
    Ok(())
}

/// Merges `--test-file` with the individual flags; flags win. Returns `None`
/// when nothing was submitted.
fn test_result(args: &StatsArgs) -> Result<Option<TestResult>> {
    let submitted = args.test_file.is_some()
        || args.right.is_some()
        || args.wrong.is_some()
        || args.percent.is_some()
        || args.set_name.is_some();
    if !submitted {
        return Ok(None);
    }

    let submission = match &args.test_file {
        Some(path) => {
            let path = args.data_root.join(path);
            let raw = read_file(&path)?;
            serde_json::from_slice::<TestSubmission>(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => TestSubmission::default(),
    };

    let percent = args
        .percent
        .clone()
        .map(Value::Number)
        .or(submission.percent)
        .filter(is_recorded_percent);
    let set_name = args.set_name.clone().or(submission.set_name);

    if percent.is_some() && set_name.is_none() {
        bail!("a percent needs a set name to be recorded under");
    }

    Ok(Some(TestResult {
        right: args.right.unwrap_or(submission.right),
        wrong: args.wrong.unwrap_or(submission.wrong),
        percent,
        set_name,
        questions: submission.questions,
    }))
}

/// Zero, empty and null scores are not recorded.
fn is_recorded_percent(percent: &Value) -> bool {
    match percent {
        Value::Null => false,
        Value::Number(number) => number.as_f64() != Some(0.0),
        Value::String(text) => !text.is_empty(),
        Value::Bool(flag) => *flag,
        Value::Array(values) => !values.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;

    use super::*;

    fn args(data_root: PathBuf) -> StatsArgs {
        StatsArgs {
            data_root,
            user: "u1".to_string(),
            right: None,
            wrong: None,
            percent: None,
            set_name: None,
            test_file: None,
        }
    }

    fn number(raw: &str) -> serde_json::Number {
        raw.parse().expect("json number")
    }

    #[test]
    fn percent_flag_keeps_integers_integral() {
        let mut args = args(PathBuf::from("."));
        args.set_name = Some("Bugs".to_string());

        args.percent = Some(number("75"));
        let result = test_result(&args).expect("result").expect("submitted");
        assert_eq!(result.percent, Some(json!(75)));
        assert_eq!(serde_json::to_string(&result.percent).expect("serialize"), "75");

        args.percent = Some(number("87.5"));
        let result = test_result(&args).expect("result").expect("submitted");
        assert_eq!(result.percent, Some(json!(87.5)));
    }

    #[test]
    fn no_values_means_read_only() {
        let result = test_result(&args(PathBuf::from("."))).expect("result");
        assert!(result.is_none());
    }

    #[test]
    fn flags_override_the_test_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("test.json"),
            r#"{"right": 3, "wrong": 1, "percent": 75, "setname": "Bugs", "test": [{"q": 1}]}"#,
        )
        .expect("write test file");

        let mut args = args(dir.path().to_path_buf());
        args.test_file = Some(PathBuf::from("test.json"));
        args.wrong = Some(2);

        let result = test_result(&args).expect("result").expect("submitted");
        assert_eq!(result.right, 3);
        assert_eq!(result.wrong, 2);
        assert_eq!(result.percent, Some(json!(75)));
        assert_eq!(result.set_name.as_deref(), Some("Bugs"));
        assert_eq!(result.questions, Some(vec![json!({"q": 1})]));
    }

    #[test]
    fn zero_percent_is_not_recorded_and_percent_needs_a_set() {
        let mut zero = args(PathBuf::from("."));
        zero.right = Some(1);
        zero.percent = Some(number("0"));
        let result = test_result(&zero).expect("result").expect("submitted");
        assert_eq!(result.percent, None);

        let mut orphan = args(PathBuf::from("."));
        orphan.percent = Some(number("50"));
        assert!(test_result(&orphan).is_err());
    }
}
