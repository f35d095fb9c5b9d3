//! Command execution.

use crate::config::Config;
use crate::Commands;
use colored::Colorize;
use placenet_core::{
    CallContext, ContextMap, CoreError, Definition, DefinitionDocument, Diagram, EventKind, Marking, Place,
    Registry,
};
use placenet_storage::{
    history_listener, FileHistory, FileStorage, HistoryStore, Manager, QueryOptions,
    StorageError, ACTOR_KEY, NOTES_KEY,
};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Returns the stable code of an engine or storage error, if it is one.
pub(crate) fn error_code(err: &(dyn std::error::Error + 'static)) -> Option<&'static str> {
    if let Some(e) = err.downcast_ref::<StorageError>() {
        return Some(e.error_code());
    }
    err.downcast_ref::<CoreError>().map(CoreError::error_code)
}

/// Process exit code: 2 when the engine rejected a transition, 1 otherwise.
pub(crate) fn exit_code(err: &(dyn std::error::Error + 'static)) -> i32 {
    let rejected = match err.downcast_ref::<StorageError>() {
        Some(e) => e.is_rejection(),
        None => err
            .downcast_ref::<CoreError>()
            .map(CoreError::is_rejection)
            .unwrap_or(false),
    };
    if rejected {
        2
    } else {
        1
    }
}

/// Executes a command and returns the formatted output.
pub(crate) fn execute(config: &Config, cmd: Commands) -> CliResult<String> {
    match cmd {
        Commands::Diagram { definition, id } => {
            let definition = load_definition(&definition)?;
            let (marking, initial) = match id {
                Some(id) => {
                    let manager = open_manager(config)?;
                    let wf = manager.load_workflow(&id, definition.clone())?;
                    let wf = wf.lock();
                    (wf.marking().clone(), wf.initial_place().clone())
                }
                None => {
                    let initial = default_initial(&definition)?;
                    (Marking::new(std::slice::from_ref(&initial)), initial)
                }
            };

            let marking = if config.diagram.highlight_current {
                marking
            } else {
                Marking::default()
            };
            let diagram = Diagram::new(&definition, &marking, &initial).to_string();
            Ok(diagram.trim_end().to_string())
        }

        Commands::Inspect { definition } => {
            let def = load_definition(&definition)?;
            let mut output = format!(
                "{}\n  Places: {}\n  Initial: {}\n  Checksum: {}\n  Transitions:",
                format!("Definition {}", definition.display()).bold(),
                join(def.places()),
                def.initial_place()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                def.checksum()
            );
            if def.transitions().is_empty() {
                output.push_str(" none");
            }
            for t in def.transitions() {
                output.push_str(&format!(
                    "\n    {}: {} -> {}",
                    t.name().cyan(),
                    join(t.from()),
                    join(t.to())
                ));
                if !t.metadata_map().is_empty() {
                    output.push_str(&format!(" {}", serde_json::to_string(t.metadata_map())?));
                }
            }
            Ok(output)
        }

        Commands::Create {
            definition,
            id,
            initial,
            ctx,
        } => {
            let definition = load_definition(&definition)?;
            let initial = match initial {
                Some(place) => Place::from(place),
                None => default_initial(&definition)?,
            };
            let context = ctx.map(|c| parse_json_object(&c)).transpose()?;

            let manager = open_manager(config)?;
            let wf = manager.create_workflow(&id, definition, initial)?;
            let mut wf = wf.lock();
            if let Some(context) = context {
                for (key, value) in context {
                    wf.set_context(key, value);
                }
                manager.save(&wf)?;
            }

            Ok(format!(
                "{} workflow {}\n  Places: {}",
                "Created".green(),
                id.cyan(),
                join(wf.marking().as_slice()).yellow()
            ))
        }

        Commands::Status { definition, id } => {
            let definition = load_definition(&definition)?;
            let manager = open_manager(config)?;
            let wf = manager.load_workflow(&id, definition)?;
            let wf = wf.lock();

            let enabled: Vec<String> = wf
                .enabled_transitions()
                .iter()
                .map(|t| format!("{} -> {}", t.name(), join(t.to())))
                .collect();
            Ok(format!(
                "{}\n  Places: {}\n  Context: {}\n  Enabled: {}",
                format!("Workflow {}", id.cyan()).bold(),
                join(wf.marking().as_slice()).yellow(),
                serde_json::to_string_pretty(wf.context_map())?,
                if enabled.is_empty() {
                    "none".to_string()
                } else {
                    enabled.join(", ")
                }
            ))
        }

        Commands::Apply {
            definition,
            id,
            to,
            actor,
            notes,
            ctx,
            dry_run,
        } => {
            let definition = load_definition(&definition)?;
            let to: Vec<Place> = to.into_iter().map(Place::from).collect();

            let mut call = CallContext::new();
            if let Some(ctx) = ctx {
                for (key, value) in parse_json_object(&ctx)? {
                    call.insert(key, value);
                }
            }
            if let Some(actor) = actor {
                call.insert(ACTOR_KEY, actor);
            }
            if let Some(notes) = notes {
                call.insert(NOTES_KEY, notes);
            }

            let manager = open_manager(config)?;
            let history: Arc<dyn HistoryStore> = Arc::new(open_history(config)?);
            manager.add_event_listener(EventKind::AfterTransition, history_listener(history));

            let wf = manager.load_workflow(&id, definition)?;
            let mut wf = wf.lock();
            if dry_run {
                wf.can_with_context(&call, &to)?;
                return Ok(format!(
                    "{} {} -> {}",
                    "Allowed".green(),
                    id.cyan(),
                    join(&to)
                ));
            }

            let from = wf.current_places();
            wf.apply_with_context(&call, &to)?;
            manager.save(&wf)?;

            Ok(format!(
                "{} workflow {}\n  From: {}\n  Places: {}",
                "Applied".green(),
                id.cyan(),
                join(&from),
                join(wf.marking().as_slice()).yellow()
            ))
        }

        Commands::History {
            id,
            limit,
            offset,
            actor,
            transition,
        } => {
            let history = open_history(config)?;
            let opts = QueryOptions {
                limit,
                offset,
                actor,
                transition,
                ..Default::default()
            };
            let records = history.list_history(&id, &opts)?;
            if records.is_empty() {
                return Ok(format!("No history for {}", id).yellow().to_string());
            }

            let mut output = format!("History of {}", id.cyan()).bold().to_string();
            for r in records {
                output.push_str(&format!(
                    "\n  {}  {}  {} -> {}",
                    r.created_at.format("%Y-%m-%d %H:%M:%S"),
                    r.transition.cyan(),
                    join(&r.from),
                    join(&r.to)
                ));
                if !r.actor.is_empty() {
                    output.push_str(&format!("  by {}", r.actor));
                }
                if !r.notes.is_empty() {
                    output.push_str(&format!("  ({})", r.notes.dimmed()));
                }
            }
            Ok(output)
        }

        Commands::Delete { id } => {
            let manager = open_manager(config)?;
            manager.delete_workflow(&id)?;
            open_history(config)?.purge(&id)?;
            Ok(format!("{} workflow {}", "Deleted".green(), id.cyan()))
        }
    }
}

/// Loads a definition document, as JSON for `.json` files and YAML otherwise.
fn load_definition(path: &Path) -> CliResult<Arc<Definition>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read definition '{}': {}", path.display(), e))?;
    let is_json = path.extension().map(|e| e == "json").unwrap_or(false);
    let doc: DefinitionDocument = if is_json {
        serde_json::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };
    let definition = Definition::from_document(doc)?;
    tracing::debug!(
        "Loaded definition {} (checksum {})",
        path.display(),
        definition.checksum()
    );
    Ok(Arc::new(definition))
}

fn default_initial(definition: &Definition) -> CliResult<Place> {
    definition
        .initial_place()
        .or_else(|| definition.places().first())
        .cloned()
        .ok_or_else(|| "definition declares no places".into())
}

fn open_manager(config: &Config) -> CliResult<Manager> {
    let storage = FileStorage::open(config.storage.states_dir())?;
    Ok(Manager::new(Arc::new(Registry::new()), Arc::new(storage)))
}

fn open_history(config: &Config) -> CliResult<FileHistory> {
    Ok(FileHistory::open(config.storage.history_dir())?)
}

/// Parses a JSON object argument (or @file.json to read from file).
fn parse_json_object(arg: &str) -> CliResult<ContextMap> {
    let value: Value = if let Some(path) = arg.strip_prefix('@') {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)?
    } else {
        serde_json::from_str(arg)?
    };
    match value {
        Value::Object(map) => Ok(map),
        other => Err(format!("expected a JSON object, got {}", other).into()),
    }
}

fn join(places: &[Place]) -> String {
    places
        .iter()
        .map(Place::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const REVIEW_YAML: &str = "\
places: [draft, legal, tech, approved]
initial: draft
transitions:
  - name: submit
    from: draft
    to: [legal, tech]
  - name: approve
    from: [legal, tech]
    to: approved
    metadata:
      label: Approve
";

    fn setup() -> (TempDir, Config, PathBuf) {
        colored::control::set_override(false);
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = dir.path().join("data");
        let def_path = dir.path().join("review.yaml");
        std::fs::write(&def_path, REVIEW_YAML).unwrap();
        (dir, config, def_path)
    }

    fn to(places: &[&str]) -> Vec<String> {
        places.iter().map(|p| p.to_string()).collect()
    }

    fn apply(config: &Config, def: &Path, places: &[&str], actor: Option<&str>) -> CliResult<String> {
        execute(
            config,
            Commands::Apply {
                definition: def.to_path_buf(),
                id: "doc-1".to_string(),
                to: to(places),
                actor: actor.map(String::from),
                notes: None,
                ctx: None,
                dry_run: false,
            },
        )
    }

    #[test]
    fn test_inspect_and_diagram() {
        let (_dir, config, def) = setup();

        let output = execute(&config, Commands::Inspect { definition: def.clone() }).unwrap();
        assert!(output.contains("Places: draft, legal, tech, approved"));
        assert!(output.contains("submit: draft -> legal, tech"));
        assert!(output.contains("\"label\":\"Approve\""));

        let output = execute(&config, Commands::Diagram { definition: def, id: None }).unwrap();
        assert!(output.starts_with("stateDiagram-v2\n"));
        assert!(output.contains("    state submit_fork <<fork>>"));
        assert!(output.contains("    class draft currentPlace"));
        assert!(output.ends_with("[*] --> draft"));
    }

    #[test]
    fn test_diagram_without_highlight() {
        let (_dir, mut config, def) = setup();
        config.diagram.highlight_current = false;

        let output = execute(&config, Commands::Diagram { definition: def, id: None }).unwrap();
        assert!(output.contains("classDef currentPlace"));
        assert!(!output.contains("%% Current places"));
    }

    #[test]
    fn test_workflow_lifecycle() {
        let (_dir, config, def) = setup();

        let output = execute(
            &config,
            Commands::Create {
                definition: def.clone(),
                id: "doc-1".to_string(),
                initial: None,
                ctx: Some(r#"{"owner": "alice"}"#.to_string()),
            },
        )
        .unwrap();
        assert!(output.contains("Created workflow doc-1"));

        apply(&config, &def, &["legal", "tech"], Some("alice")).unwrap();

        // Targets must match the declared order.
        assert!(apply(&config, &def, &["approved", "legal"], None).is_err());

        let output = execute(
            &config,
            Commands::Status {
                definition: def.clone(),
                id: "doc-1".to_string(),
            },
        )
        .unwrap();
        assert!(output.contains("Places: legal, tech"));
        assert!(output.contains("\"owner\": \"alice\""));
        assert!(output.contains("Enabled: approve -> approved"));

        apply(&config, &def, &["approved"], Some("bob")).unwrap();

        let output = execute(
            &config,
            Commands::History {
                id: "doc-1".to_string(),
                limit: None,
                offset: 0,
                actor: Some("bob".to_string()),
                transition: None,
            },
        )
        .unwrap();
        assert!(output.contains("approve"));
        assert!(!output.contains("submit"));

        let output = execute(
            &config,
            Commands::Diagram {
                definition: def.clone(),
                id: Some("doc-1".to_string()),
            },
        )
        .unwrap();
        assert!(output.contains("    class approved currentPlace"));

        execute(&config, Commands::Delete { id: "doc-1".to_string() }).unwrap();
        let result = execute(
            &config,
            Commands::Status {
                definition: def,
                id: "doc-1".to_string(),
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_dry_run_leaves_state() {
        let (_dir, config, def) = setup();
        execute(
            &config,
            Commands::Create {
                definition: def.clone(),
                id: "doc-1".to_string(),
                initial: None,
                ctx: None,
            },
        )
        .unwrap();

        let output = execute(
            &config,
            Commands::Apply {
                definition: def.clone(),
                id: "doc-1".to_string(),
                to: to(&["legal", "tech"]),
                actor: None,
                notes: None,
                ctx: None,
                dry_run: true,
            },
        )
        .unwrap();
        assert!(output.starts_with("Allowed"));

        let storage = FileStorage::open(config.storage.states_dir()).unwrap();
        let (places, _) = placenet_storage::Storage::load_state(&storage, "doc-1").unwrap();
        assert_eq!(places, placenet_core::places(["draft"]));
    }

    #[test]
    fn test_errors_carry_codes() {
        let (dir, config, def) = setup();
        execute(
            &config,
            Commands::Create {
                definition: def.clone(),
                id: "doc-1".to_string(),
                initial: None,
                ctx: None,
            },
        )
        .unwrap();

        let err = apply(&config, &def, &["approved"], None).unwrap_err();
        assert_eq!(error_code(err.as_ref()), Some("TRANSITION_NOT_ALLOWED"));
        assert_eq!(exit_code(err.as_ref()), 2);

        let err = apply(&config, &def, &["nowhere"], None).unwrap_err();
        assert_eq!(error_code(err.as_ref()), Some("INVALID_PLACE"));
        assert_eq!(exit_code(err.as_ref()), 1);

        let err = execute(
            &config,
            Commands::Status {
                definition: def,
                id: "missing".to_string(),
            },
        )
        .unwrap_err();
        assert_eq!(error_code(err.as_ref()), Some("STATE_NOT_FOUND"));
        assert_eq!(exit_code(err.as_ref()), 1);

        let err = load_definition(&dir.path().join("absent.yaml")).unwrap_err();
        assert_eq!(error_code(err.as_ref()), None);
        assert_eq!(exit_code(err.as_ref()), 1);
    }

    #[test]
    fn test_json_definition_and_bad_context() {
        let (dir, config, _) = setup();
        let path = dir.path().join("simple.json");
        std::fs::write(
            &path,
            r#"{"places": ["start", "end"], "transitions": [{"name": "finish", "from": "start", "to": "end"}]}"#,
        )
        .unwrap();

        let def = load_definition(&path).unwrap();
        assert_eq!(def.transitions().len(), 1);
        assert_eq!(default_initial(&def).unwrap(), Place::from("start"));

        assert!(parse_json_object("[1, 2]").is_err());
        assert!(parse_json_object(r#"{"a": 1}"#).is_ok());
    }
}
