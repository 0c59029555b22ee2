//! Symptra: symptom-based diagnosis from the command line.
//!
//! Every command prints one JSON envelope (`{success, message, data}`) to
//! stdout and exits with status 1 on failure. Logs go to stderr or a file.

use std::error::Error as _;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use symptra::adapters::http::HttpPredictionClient;
use symptra::adapters::sanitize::SanitizingMakeWriter;
use symptra::adapters::sqlite::SqliteStorage;
use symptra::application::{ApiResponse, DiagnosisService, HistoryService, ProfileService};
use symptra::config::Config;
use symptra::domain::{NewHistoryRecord, UserProfile};
use symptra::{SymptraError, VocabularySet};

const USAGE: &str = "\
Usage:
  symptra diagnose [--ranked | --user <user_id>] <symptom>...
  symptra recommend <symptom>...
  symptra history <user_id>
  symptra record [--at <rfc3339>] <user_id> <diagnosis> <symptom>...
  symptra profile save|update <user_id> <email> <first_name> <last_name>
  symptra profile show <user_id>
  symptra vocab";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Diagnose {
        ranked: bool,
        user_id: Option<String>,
        symptoms: Vec<String>,
    },
    Recommend {
        symptoms: Vec<String>,
    },
    History {
        user_id: String,
    },
    Record {
        user_id: String,
        diagnosis: String,
        symptoms: Vec<String>,
        at: Option<DateTime<Utc>>,
    },
    SaveProfile(UserProfile),
    UpdateProfile(UserProfile),
    ShowProfile {
        user_id: String,
    },
    Vocab,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Diagnose { .. } => "diagnose",
            Self::Recommend { .. } => "recommend",
            Self::History { .. } => "history",
            Self::Record { .. } => "record",
            Self::SaveProfile(_) => "profile save",
            Self::UpdateProfile(_) => "profile update",
            Self::ShowProfile { .. } => "profile show",
            Self::Vocab => "vocab",
        }
    }
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let (command, rest) = args.split_first().ok_or("missing command")?;

    match command.as_str() {
        "diagnose" => {
            let mut ranked = false;
            let mut user_id = None;
            let mut symptoms = Vec::new();
            let mut iter = rest.iter();
            while let Some(arg) = iter.next() {
                match arg.as_str() {
                    "--ranked" => ranked = true,
                    "--user" => {
                        let id = iter.next().ok_or("--user needs a value")?;
                        user_id = Some(id.clone());
                    }
                    // Everything after `--` is a symptom, even if it starts with a dash.
                    "--" => symptoms.extend(iter.by_ref().cloned()),
                    flag if flag.starts_with("--") => {
                        return Err(format!("unknown option {flag}"));
                    }
                    _ => symptoms.push(arg.clone()),
                }
            }
            if ranked && user_id.is_some() {
                return Err("--ranked results are not recorded; drop --user or --ranked".to_string());
            }
            Ok(Command::Diagnose {
                ranked,
                user_id,
                symptoms,
            })
        }
        "recommend" => Ok(Command::Recommend {
            symptoms: rest.to_vec(),
        }),
        "history" => match rest {
            [user_id] => Ok(Command::History {
                user_id: user_id.clone(),
            }),
            _ => Err("history takes exactly one <user_id>".to_string()),
        },
        "record" => {
            let mut at = None;
            let mut positional = Vec::new();
            let mut iter = rest.iter();
            while let Some(arg) = iter.next() {
                if arg == "--at" {
                    let raw = iter.next().ok_or("--at needs an RFC 3339 timestamp")?;
                    let parsed = DateTime::parse_from_rfc3339(raw)
                        .map_err(|e| format!("invalid --at value {raw:?}: {e}"))?;
                    at = Some(parsed.with_timezone(&Utc));
                } else {
                    positional.push(arg.clone());
                }
            }
            match positional.as_slice() {
                [user_id, diagnosis, symptoms @ ..] => Ok(Command::Record {
                    user_id: user_id.clone(),
                    diagnosis: diagnosis.clone(),
                    symptoms: symptoms.to_vec(),
                    at,
                }),
                _ => Err("record needs <user_id> <diagnosis> <symptom>...".to_string()),
            }
        }
        "profile" => match rest {
            [action, user_id, email, first, last] if action == "save" || action == "update" => {
                let profile = UserProfile::new(user_id, email, first, last);
                if action == "save" {
                    Ok(Command::SaveProfile(profile))
                } else {
                    Ok(Command::UpdateProfile(profile))
                }
            }
            [action, user_id] if action == "show" => Ok(Command::ShowProfile {
                user_id: user_id.clone(),
            }),
            _ => Err("profile needs save|update <user_id> <email> <first> <last> or show <user_id>"
                .to_string()),
        },
        "vocab" => Ok(Command::Vocab),
        other => Err(format!("unknown command {other:?}")),
    }
}

/// Initialize logging. The returned guard must live until exit.
fn init_logging() -> Result<WorkerGuard> {
    // stdout carries the JSON envelope, so logs default to stderr.
    let log_mode = std::env::var("SYMPTRA_LOG_MODE").unwrap_or_else(|_| "stderr".to_string());

    let (writer, guard) = if log_mode == "file" {
        let log_file = std::env::var("SYMPTRA_LOG_FILE")
            .unwrap_or_else(|_| "data/symptra.log".to_string());

        if let Some(parent) = Path::new(&log_file).parent() {
            // Best-effort: opening the file below reports the real error.
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("opening log file {log_file}"))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stderr())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(SanitizingMakeWriter::new(writer)),
        )
        .init();

    Ok(guard)
}

/// Lazily opened collaborators; each command only touches what it needs.
struct Runtime {
    config: Config,
}

impl Runtime {
    fn storage(&self) -> Result<Arc<SqliteStorage>, SymptraError> {
        let path = &self.config.database_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Arc::new(SqliteStorage::new(path)?))
    }

    fn vocabulary(&self) -> Result<Arc<VocabularySet>, SymptraError> {
        Ok(Arc::new(VocabularySet::load(&self.config.vocabulary_path)?))
    }

    fn history(&self) -> Result<HistoryService<SqliteStorage>, SymptraError> {
        Ok(HistoryService::new(self.storage()?, self.config.display.clone()))
    }

    fn diagnosis(&self) -> Result<DiagnosisService<HttpPredictionClient, SqliteStorage>, SymptraError> {
        let prediction = self.config.require_prediction()?.clone();
        let predictor = Arc::new(HttpPredictionClient::new(prediction)?);
        Ok(
            DiagnosisService::new(predictor, self.storage()?, self.vocabulary()?)
                .with_prompt_template(self.config.recommend_prompt.clone()),
        )
    }
}

fn to_data<T: Serialize>(data: T) -> Result<Value, SymptraError> {
    Ok(serde_json::to_value(data)?)
}

async fn dispatch(runtime: &Runtime, command: Command) -> Result<(&'static str, Value), SymptraError> {
    match command {
        Command::Diagnose {
            ranked,
            user_id,
            symptoms,
        } => {
            let service = runtime.diagnosis()?;
            let data = match (ranked, user_id) {
                (true, None) => to_data(service.diagnose_ranked(&symptoms).await?)?,
                (false, Some(user_id)) => {
                    to_data(service.diagnose_and_record(&user_id, &symptoms, None).await?)?
                }
                (false, None) => to_data(service.diagnose(&symptoms).await?)?,
                (true, Some(_)) => {
                    return Err(SymptraError::Validation(
                        "ranked diagnoses cannot be recorded".to_string(),
                    ))
                }
            };
            Ok(("Diagnosis complete", data))
        }
        Command::Recommend { symptoms } => {
            let service = runtime.diagnosis()?;
            Ok(("Recommendation ready", to_data(service.recommend(&symptoms).await?)?))
        }
        Command::History { user_id } => {
            Ok(("History loaded", to_data(runtime.history()?.list_for_user(&user_id)?)?))
        }
        Command::Record {
            user_id,
            diagnosis,
            symptoms,
            at,
        } => {
            let mut record = NewHistoryRecord::new(user_id, serde_json::json!(symptoms), diagnosis);
            record.timestamp = at;
            let id = runtime.history()?.record(&record)?;
            Ok(("History saved", serde_json::json!({ "id": id })))
        }
        Command::SaveProfile(profile) => {
            ProfileService::new(runtime.storage()?).save(&profile)?;
            Ok(("Profile saved", to_data(&profile)?))
        }
        Command::UpdateProfile(profile) => {
            ProfileService::new(runtime.storage()?).update(&profile)?;
            Ok(("Profile updated", to_data(&profile)?))
        }
        Command::ShowProfile { user_id } => {
            match ProfileService::new(runtime.storage()?).get(&user_id)? {
                Some(profile) => Ok(("Profile loaded", to_data(profile)?)),
                None => Err(SymptraError::Storage(
                    symptra::adapters::StorageError::NotFound("user profile".to_string()),
                )),
            }
        }
        Command::Vocab => Ok(("Vocabulary loaded", to_data(runtime.vocabulary()?.as_ref())?)),
    }
}

/// `outer: cause: root cause` for the log line.
fn error_chain(err: &SymptraError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

async fn execute(command: Command) -> ApiResponse<Value> {
    let outcome = match Config::from_env() {
        Ok(config) => dispatch(&Runtime { config }, command).await,
        Err(err) => Err(err),
    };

    match outcome {
        Ok((message, data)) => ApiResponse::ok(message, data),
        Err(err) => {
            tracing::error!("Command failed at stage {:?}: {}", err.stage(), error_chain(&err));
            ApiResponse::failure(&err)
        }
    }
}

fn print_response(response: &ApiResponse<Value>) -> Result<()> {
    let json = serde_json::to_string_pretty(response).context("encoding response")?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(problem) => {
            eprintln!("error: {problem}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    let _guard = match init_logging() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: failed to initialize logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    tracing::debug!("Running command: {}", command.name());

    // Dropping the command future on Ctrl-C aborts any in-flight request.
    let response = tokio::select! {
        response = execute(command) => response,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted; outstanding request cancelled");
            ApiResponse {
                success: false,
                message: "Request cancelled".to_string(),
                data: None,
                stage: None,
            }
        }
    };

    if let Err(e) = print_response(&response) {
        tracing::error!("{e:#}");
        return ExitCode::FAILURE;
    }

    if response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_diagnose() {
        let command = parse_args(&args(&["diagnose", "gatal", "ruam kulit"])).expect("Should parse");
        assert_eq!(
            command,
            Command::Diagnose {
                ranked: false,
                user_id: None,
                symptoms: args(&["gatal", "ruam kulit"]),
            }
        );
    }

    #[test]
    fn test_parse_diagnose_options() {
        let command = parse_args(&args(&["diagnose", "--ranked", "demam", "--", "--odd"]))
            .expect("Should parse");
        assert_eq!(
            command,
            Command::Diagnose {
                ranked: true,
                user_id: None,
                symptoms: args(&["demam", "--odd"]),
            }
        );

        assert!(parse_args(&args(&["diagnose", "--user"])).is_err());
        assert!(parse_args(&args(&["diagnose", "--user", "u-1", "--ranked", "demam"])).is_err());
        assert!(parse_args(&args(&["diagnose", "--verbose"])).is_err());
    }

    #[test]
    fn test_parse_diagnose_without_symptoms() {
        let command = parse_args(&args(&["diagnose"])).expect("Should parse");
        assert!(matches!(command, Command::Diagnose { symptoms, .. } if symptoms.is_empty()));
    }

    #[test]
    fn test_parse_record_and_history() {
        let command = parse_args(&args(&["record", "u-1", "Tifus", "demam", "mual"])).expect("Should parse");
        assert_eq!(
            command,
            Command::Record {
                user_id: "u-1".to_string(),
                diagnosis: "Tifus".to_string(),
                symptoms: args(&["demam", "mual"]),
                at: None,
            }
        );

        assert_eq!(
            parse_args(&args(&["history", "u-1"])).expect("Should parse"),
            Command::History {
                user_id: "u-1".to_string()
            }
        );
        assert!(parse_args(&args(&["history"])).is_err());
        assert!(parse_args(&args(&["record", "u-1"])).is_err());
    }

    #[test]
    fn test_parse_record_timestamp() {
        let command = parse_args(&args(&[
            "record",
            "--at",
            "2024-03-01T09:00:00.123456789+07:00",
            "u-1",
            "Tifus",
            "demam",
        ]))
        .expect("Should parse");

        let expected = DateTime::parse_from_rfc3339("2024-03-01T02:00:00.123456789Z")
            .expect("Valid timestamp")
            .with_timezone(&Utc);
        assert!(matches!(command, Command::Record { at: Some(t), .. } if t == expected));

        assert!(parse_args(&args(&["record", "--at", "yesterday", "u-1", "Tifus"])).is_err());
        assert!(parse_args(&args(&["record", "u-1", "Tifus", "--at"])).is_err());
    }

    #[test]
    fn test_parse_profile() {
        let command = parse_args(&args(&["profile", "update", "u-1", "sari@example.com", "Sari", "Wulan"]))
            .expect("Should parse");
        assert_eq!(
            command,
            Command::UpdateProfile(UserProfile::new("u-1", "sari@example.com", "Sari", "Wulan"))
        );

        assert!(matches!(
            parse_args(&args(&["profile", "show", "u-1"])),
            Ok(Command::ShowProfile { .. })
        ));
        assert!(parse_args(&args(&["profile", "delete", "u-1"])).is_err());
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(parse_args(&[]).is_err());
        assert!(parse_args(&args(&["predict"])).is_err());
    }

    #[test]
    fn test_error_chain_includes_cause() {
        let err: SymptraError =
            symptra::ports::PredictionError::Timeout(std::time::Duration::from_millis(250)).into();
        let chain = error_chain(&err);
        assert!(chain.contains("unavailable"));
        assert!(chain.contains("250ms"));
    }

    fn history_only_config(dir: &tempfile::TempDir) -> Config {
        let db = dir.path().join("history.db").to_string_lossy().into_owned();
        let vocabulary = concat!(env!("CARGO_MANIFEST_DIR"), "/models/vocabulary.json");
        Config::from_lookup(move |key: &str| match key {
            symptra::config::DATABASE_ENV => Some(db.clone()),
            symptra::config::VOCABULARY_ENV => Some(vocabulary.to_string()),
            _ => None,
        })
        .expect("Should load without a prediction endpoint")
    }

    #[tokio::test]
    async fn test_record_and_history_without_prediction_config() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let runtime = Runtime {
            config: history_only_config(&dir),
        };
        let t = DateTime::parse_from_rfc3339("2024-03-01T09:00:00Z")
            .expect("Valid timestamp")
            .with_timezone(&Utc);

        let (_, saved) = dispatch(
            &runtime,
            Command::Record {
                user_id: "u-1".to_string(),
                diagnosis: "Tifus".to_string(),
                symptoms: args(&["demam", "mual"]),
                at: Some(t),
            },
        )
        .await
        .expect("Should record");

        let (_, history) = dispatch(
            &runtime,
            Command::History {
                user_id: "u-1".to_string(),
            },
        )
        .await
        .expect("Should list history");

        assert_eq!(history[0]["id"], saved["id"]);
        assert_eq!(history[0]["diagnosis"], "Tifus");
        assert_eq!(history[0]["displayed_at"], "2024-03-01 09:00:00");
    }

    #[tokio::test]
    async fn test_profile_and_vocab_without_prediction_config() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let runtime = Runtime {
            config: history_only_config(&dir),
        };

        let profile = UserProfile::new("u-1", "sari@example.com", "Sari", "Wulan");
        dispatch(&runtime, Command::SaveProfile(profile))
            .await
            .expect("Should save profile");
        let (_, shown) = dispatch(
            &runtime,
            Command::ShowProfile {
                user_id: "u-1".to_string(),
            },
        )
        .await
        .expect("Should show profile");
        assert_eq!(shown["last_name"], "Wulan");

        let (_, vocabulary) = dispatch(&runtime, Command::Vocab).await.expect("Should load vocabulary");
        assert!(vocabulary["symptoms"].as_array().is_some_and(|s| !s.is_empty()));
    }

    #[tokio::test]
    async fn test_diagnose_requires_prediction_config() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let runtime = Runtime {
            config: history_only_config(&dir),
        };

        let err = dispatch(
            &runtime,
            Command::Diagnose {
                ranked: false,
                user_id: None,
                symptoms: args(&["demam"]),
            },
        )
        .await
        .expect_err("Should fail");
        assert!(matches!(err, SymptraError::Config(msg) if msg.contains("SYMPTRA_PREDICT_URL")));
    }
}
