//! CLI output utilities: a column-auto-sizing table and JSON/table mode
//! switching, mirroring the conventions the teacher's `am` CLI uses.

use serde::Serialize;
use std::io::IsTerminal;

#[must_use]
pub fn is_tty() -> bool {
    std::io::stdout().is_terminal()
}

pub struct CliTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CliTable {
    pub fn new(headers: Vec<&str>) -> Self {
        Self {
            headers: headers.into_iter().map(String::from).collect(),
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(String::len).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.len());
                }
            }
        }
        widths
    }

    fn format_row(&self, cells: &[String], widths: &[usize]) -> String {
        let ncols = widths.len();
        let mut parts = Vec::with_capacity(ncols);
        for (i, width) in widths.iter().enumerate() {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            if i == ncols - 1 {
                parts.push(cell.to_string());
            } else {
                parts.push(format!("{cell:<width$}"));
            }
        }
        parts.join("  ")
    }

    pub fn render(&self) {
        if self.rows.is_empty() {
            println!("(no rows)");
            return;
        }
        let widths = self.column_widths();
        let tty = is_tty();
        let header_line = self.format_row(&self.headers, &widths);
        if tty {
            println!("\x1b[1m{header_line}\x1b[0m");
            let sep: String = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  ");
            println!("{sep}");
        } else {
            println!("{header_line}");
        }
        for row in &self.rows {
            println!("{}", self.format_row(row, &widths));
        }
    }
}

/// Print `data` as pretty JSON when `json_mode`, otherwise run `render`.
pub fn json_or_table<T: Serialize, F: FnOnce()>(json_mode: bool, data: &T, render: F) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(data).unwrap_or_else(|_| "null".to_string()));
    } else {
        render();
    }
}

pub fn success(msg: &str) {
    if is_tty() {
        println!("\x1b[32m\u{2713}\x1b[0m {msg}");
    } else {
        println!("{msg}");
    }
}

pub fn error(msg: &str) {
    if is_tty() {
        eprintln!("\x1b[31merror:\x1b[0m {msg}");
    } else {
        eprintln!("error: {msg}");
    }
}

pub fn kv(key: &str, value: &str) {
    println!("  {key:<24} {value}");
}
