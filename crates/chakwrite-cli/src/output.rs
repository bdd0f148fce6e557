use serde_json::Value;

use crate::client::Reply;

pub fn print_completion(operation: &str, reply: &Reply) {
    let Reply::Json(v) = reply else {
        eprintln!("✗ {operation}: broker did not reply");
        return;
    };
    if v.get("success").and_then(Value::as_bool) == Some(true) {
        println!("{}", v.get("data").and_then(Value::as_str).unwrap_or(""));
    } else {
        eprintln!(
            "✗ {}",
            v.get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
        );
    }
}

pub fn print_state(reply: &Reply) {
    let Reply::Json(v) = reply else {
        eprintln!("✗ broker did not reply");
        return;
    };
    let Some(config) = v.get("config") else {
        eprintln!(
            "✗ {}",
            v.get("error").and_then(Value::as_str).unwrap_or("no config")
        );
        return;
    };

    let prefs = &config["userPreferences"];
    let access = &config["accessibility"];
    println!("\n=== ChakWrite Configuration ===");
    println!("\n[Preferences]");
    println!("  {:<22} {}", "Neuro feature", show(&prefs["neuroFeature"]));
    println!("  {:<22} {}", "Theme", show(&prefs["theme"]));
    println!("  {:<22} {}", "Realtime proofreader", show(&prefs["realtimeProofreader"]));
    println!("  {:<22} {}", "Autocomplete on Tab", show(&prefs["autocompleteOnTab"]));
    println!("\n[Accessibility]");
    println!("  {:<22} {}", "Font", show(&access["font"]));
    println!("  {:<22} {}", "Spacing", show(&access["spacing"]));
    println!("  {:<22} {}", "OCR", show(&access["enableOcr"]));
    if let Some(sel) = config["context"]["lastSelectedText"].as_str() {
        println!("\n[Last selection]");
        println!("  {sel}");
    }
    println!();
}

fn show(v: &Value) -> String {
    match v {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn print_ack(what: &str, reply: &Reply) {
    match reply {
        Reply::Accepted => println!("✓ {what}"),
        Reply::NotHandled => eprintln!("✗ {what}: not handled by the broker"),
        Reply::Json(v) => println!("{v}"),
    }
}
