//! Minimal stdio MCP server with excel-mcp-server style tools.
//!
//! - create_workbook: writes a placeholder workbook at `filepath`
//! - write_data_to_excel: appends a sheet record to an existing workbook
//! - crash: exits without answering

use serde_json::{json, Value};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    for line in BufReader::new(stdin.lock()).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let request: Value = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("sheet-test-server: unparsable line: {e}");
                continue;
            }
        };

        // Notifications get no response.
        if request.get("id").is_none() {
            continue;
        }

        let response = handle_request(&request);
        writeln!(stdout, "{response}")?;
        stdout.flush()?;
    }

    Ok(())
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({ "type": "object", "properties": properties, "required": required })
}

fn text_result(text: String, is_error: bool) -> Value {
    json!({ "content": [{ "type": "text", "text": text }], "isError": is_error })
}

fn handle_request(request: &Value) -> Value {
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let method = request.get("method").and_then(Value::as_str).unwrap_or("");
    let params = request.get("params").cloned().unwrap_or_else(|| json!({}));

    let result = match method {
        "initialize" => {
            let version = params
                .get("protocolVersion")
                .cloned()
                .unwrap_or_else(|| json!("2024-11-05"));
            json!({
                "protocolVersion": version,
                "capabilities": { "tools": {} },
                "serverInfo": { "name": "sheet-test-server", "version": "0.1.0" }
            })
        }
        "ping" => json!({}),
        "tools/list" => json!({
            "tools": [
                {
                    "name": "create_workbook",
                    "description": "Create a new Excel workbook",
                    "inputSchema": object_schema(json!({ "filepath": { "type": "string" } }), &["filepath"])
                },
                {
                    "name": "write_data_to_excel",
                    "description": "Write rows to a worksheet",
                    "inputSchema": object_schema(
                        json!({
                            "filepath": { "type": "string" },
                            "sheet_name": { "type": "string" },
                            "data": { "type": "array" }
                        }),
                        &["filepath", "sheet_name", "data"]
                    )
                },
                {
                    "name": "crash",
                    "description": "Terminate the server",
                    "inputSchema": object_schema(json!({}), &[])
                }
            ]
        }),
        "tools/call" => {
            let name = params.get("name").and_then(Value::as_str).unwrap_or("");
            let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
            let filepath = arguments.get("filepath").and_then(Value::as_str).unwrap_or("");

            match name {
                "create_workbook" => match std::fs::write(filepath, b"PK\x03\x04 workbook\n") {
                    Ok(()) => text_result(format!("Created workbook at {filepath}"), false),
                    Err(e) => text_result(format!("Failed to create workbook: {e}"), true),
                },
                "write_data_to_excel" => {
                    let sheet = arguments.get("sheet_name").and_then(Value::as_str).unwrap_or("Sheet1");
                    let rows = arguments.get("data").and_then(Value::as_array).map_or(0, Vec::len);
                    let appended = OpenOptions::new()
                        .append(true)
                        .open(filepath)
                        .and_then(|mut f| writeln!(f, "sheet {sheet}: {rows} rows"));
                    match appended {
                        Ok(()) => text_result(format!("Wrote {rows} rows to '{sheet}'"), false),
                        Err(e) => text_result(format!("File not found: {filepath} ({e})"), true),
                    }
                }
                "crash" => std::process::exit(3),
                _ => {
                    return json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": { "code": -32601, "message": format!("Unknown tool: {name}") }
                    });
                }
            }
        }
        _ => {
            return json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("Method not found: {method}") }
            });
        }
    };

    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}
