// src/utils/html_debug.rs
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::error::StorageError;

/// One card that failed or drifted, kept for offline inspection.
pub struct CardDump<'a> {
    pub index: usize,
    pub reason: &'a str,
    pub card_html: &'a str,
    pub raw_tokens: &'a [String],
    pub reconciled: Option<&'a [String]>,
}

/// Writes a standalone HTML page showing the raw card markup next to its
/// raw and reconciled token rows, position by position.
pub fn save_card_dump(dir: &Path, dump: &CardDump<'_>) -> Result<PathBuf, StorageError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("card_{:04}.html", dump.index));

    let mut page = String::from("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n");
    page.push_str("td, th { border: 1px solid #ccc; padding: 2px 6px; font-family: monospace; }\n");
    page.push_str(".sentinel { background-color: #FFFF00; }\n");
    page.push_str(".card { border: 2px dashed #FFA500; margin-top: 1em; }\n");
    page.push_str("</style>\n</head>\n<body>\n");
    page.push_str(&format!("<h2>Card {}: {}</h2>\n", dump.index, escape(dump.reason)));

    page.push_str("<table>\n<tr><th>#</th><th>raw</th><th>reconciled</th></tr>\n");
    let reconciled = dump.reconciled.unwrap_or(&[]);
    let rows = dump.raw_tokens.len().max(reconciled.len());
    for i in 0..rows {
        let raw = dump.raw_tokens.get(i).map(String::as_str).unwrap_or("");
        let rec = reconciled.get(i).map(String::as_str).unwrap_or("");
        let class = if rec == "-" || rec == "0h" { " class=\"sentinel\"" } else { "" };
        page.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td{}>{}</td></tr>\n",
            i,
            escape(raw),
            class,
            escape(rec)
        ));
    }
    page.push_str("</table>\n");

    page.push_str("<div class=\"card\">\n");
    page.push_str(dump.card_html);
    page.push_str("\n</div>\n</body>\n</html>");

    fs::write(&path, page)?;
    tracing::info!("Saved card debug dump to {}", path.display());
    Ok(path)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
