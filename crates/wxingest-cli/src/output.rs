use chrono::{DateTime, Utc};
use serde::Serialize;
use wxingest_core::item::ProcessingItem;
use wxingest_core::state::OrchestratorState;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:w$}", cell)
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("{}", line(headers.to_vec()));
    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));
    for row in &rows {
        println!("{}", line(row.iter().map(String::as_str).collect()));
    }
}

/// Epoch seconds as an RFC 3339 UTC timestamp, or `-` when absent.
pub fn format_time(secs: Option<f64>) -> String {
    secs.and_then(|s| DateTime::<Utc>::from_timestamp_millis((s * 1000.0).round() as i64))
        .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        .unwrap_or_else(|| "-".to_string())
}

pub fn print_items(items: &[ProcessingItem]) {
    let rows = items
        .iter()
        .map(|item| {
            vec![
                item.step_name().to_string(),
                format_time(item.start_time()),
                format_time(item.end_time()),
                item.inputs().len().to_string(),
                item.outputs().len().to_string(),
                item.posts()
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(","),
            ]
        })
        .collect();
    print_table(&["STEP", "START", "END", "INPUTS", "OUTPUTS", "POSTS TO"], rows);
}

pub fn print_state(state: &OrchestratorState) {
    println!("Job:       {}", state.job_id);
    println!("Status:    {}", state.status);
    println!("Base:      {}", state.base);
    println!("Mode:      {}", state.mode);
    println!("Time:      {}", format_time(Some(state.execution_time)));
    if !state.posts.is_empty() {
        println!("Posts:");
        for (consumer, value) in &state.posts {
            println!("  {consumer}: {value}");
        }
    }
    if !state.state_processing_items.is_empty() {
        println!();
        print_items(&state.state_processing_items);
    }
}
