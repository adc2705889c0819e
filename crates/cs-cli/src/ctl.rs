//! Drive the background coordinator from the command line
//!
//! State persists in a JSON file; the filter engine is the in-memory one,
//! rebuilt from the stored intent on every run like a browser startup.

use std::path::PathBuf;

use log::warn;
use serde_json::Value;

use cs_background::{spawn_coordinator, BackgroundSettings, ControlHandle, Coordinator, FileStore, MemoryEngine};
use cs_compiler::TemplateSet;

/// One control-plane session.
pub struct CtlOptions {
    pub store: PathBuf,
    pub install: bool,
    pub hits: Vec<i64>,
    pub shortcut: Option<String>,
    pub messages: Vec<String>,
    pub show_rules: bool,
}

pub fn run(settings: &BackgroundSettings, templates: TemplateSet, options: CtlOptions) -> Result<(), String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start runtime: {}", e))?;
    runtime.block_on(session(settings, templates, options))
}

async fn session(settings: &BackgroundSettings, templates: TemplateSet, options: CtlOptions) -> Result<(), String> {
    let messages = options
        .messages
        .iter()
        .map(|text| serde_json::from_str::<Value>(text).map_err(|e| format!("Invalid message '{}': {}", text, e)))
        .collect::<Result<Vec<_>, _>>()?;

    let engine = MemoryEngine::with_max_rules(settings.max_rules);
    let coordinator = Coordinator::new(settings, templates, FileStore::new(&options.store), engine.clone());
    let (handle, task) = spawn_coordinator(coordinator, 32);

    lifecycle(&handle, options.install).await?;

    for session_id in &options.hits {
        handle.rule_matched(Some(*session_id)).await.map_err(|e| e.to_string())?;
    }

    if let Some(name) = &options.shortcut {
        match handle.shortcut(name.as_str()).await.map_err(|e| e.to_string())? {
            Some(response) => print_json(&response.to_value())?,
            None => return Err(format!("Unknown shortcut '{}'", name)),
        }
    }

    for msg in messages {
        let response = handle.send_message(msg).await.map_err(|e| e.to_string())?;
        print_json(&response.to_value())?;
    }

    drop(handle);
    task.await.map_err(|e| format!("Coordinator task failed: {}", e))?;

    if options.show_rules {
        let rules = engine.active_rules();
        println!("Active rules: {}", rules.len());
        for rule in rules {
            println!("  [{}] {} ({})", rule.id, rule.pattern, rule.resource_types.names().join(","));
        }
    }

    Ok(())
}

async fn lifecycle(handle: &ControlHandle, install: bool) -> Result<(), String> {
    let result = if install {
        handle.installed().await
    } else {
        handle.startup().await
    };
    match result.map_err(|e| e.to_string())? {
        Ok(()) => Ok(()),
        // Rules could not be applied; the stored intent is still usable
        Err(e) => {
            warn!("{}", e);
            Ok(())
        }
    }
}

fn print_json(value: &Value) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| format!("Failed to render response: {}", e))?;
    println!("{}", text);
    Ok(())
}
