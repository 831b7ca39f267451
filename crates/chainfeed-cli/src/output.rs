//! Rendering of command payloads as a table or JSON.

use serde_json::Value;

use crate::cli::OutputFormat;
use crate::error::CliError;

pub fn render(payload: &Value, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let text = if pretty {
                serde_json::to_string_pretty(payload)?
            } else {
                serde_json::to_string(payload)?
            };
            println!("{text}");
        }
        OutputFormat::Table => render_table(payload),
    }
    Ok(())
}

fn render_table(payload: &Value) {
    match payload {
        Value::Array(rows) if rows.iter().all(Value::is_object) && !rows.is_empty() => {
            render_rows(rows);
        }
        Value::Object(object) => {
            let width = object.keys().map(String::len).max().unwrap_or(0);
            for (key, value) in object {
                println!("{key:width$} : {}", render_cell(value));
            }
        }
        other => println!("{}", render_cell(other)),
    }
}

fn render_rows(rows: &[Value]) {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        if let Value::Object(object) = row {
            for key in object.keys() {
                if !columns.iter().any(|existing| existing == key) {
                    columns.push(key.clone());
                }
            }
        }
    }

    let mut widths = columns.iter().map(String::len).collect::<Vec<_>>();
    let rendered = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .enumerate()
                .map(|(index, column)| {
                    let cell = row.get(column).map(render_cell).unwrap_or_default();
                    widths[index] = widths[index].max(cell.len());
                    cell
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let header = columns
        .iter()
        .enumerate()
        .map(|(index, column)| format!("{column:<width$}", width = widths[index]))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{header}");
    println!("{}", "-".repeat(header.len()));

    for row in rendered {
        let line = row
            .iter()
            .enumerate()
            .map(|(index, cell)| format!("{cell:<width$}", width = widths[index]))
            .collect::<Vec<_>>()
            .join("  ");
        println!("{line}");
    }
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::from("-"),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
