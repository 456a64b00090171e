use comfy_table::{Attribute, Cell, CellAlignment, ContentArrangement, Table};
use colored::*;
use ndarray::{Array2, Axis};

use crate::document_encoder::DocumentEncoder;
use crate::embedder::SearchResult;
use crate::hub::CacheEntry;
use crate::model::BertConfig;

fn header(labels: &[&str]) -> Vec<Cell> {
    labels.iter()
        .map(|l| Cell::new(l).fg(comfy_table::Color::Cyan).add_attribute(Attribute::Bold))
        .collect()
}

fn table(labels: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .set_header(header(labels))
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Word pieces next to their vocabulary ids
pub fn display_tokens(pieces: &[String], ids: &[u32]) {
    let mut t = table(&["#", "Id", "Piece"]);
    for (i, (id, piece)) in ids.iter().zip(pieces).enumerate() {
        t.add_row(vec![
            Cell::new(i).set_alignment(CellAlignment::Right),
            Cell::new(id).fg(comfy_table::Color::Yellow).set_alignment(CellAlignment::Right),
            Cell::new(piece).fg(comfy_table::Color::Green),
        ]);
    }
    println!("{t}");
    println!("{} {}", "Tokens:".bold(), ids.len());
}

pub fn display_config(model_id: &str, config: &BertConfig, head: &DocumentEncoder) {
    let mut t = table(&["Setting", "Value"]);
    let rows = [
        ("Model", model_id.to_string()),
        ("Vocabulary", config.vocab_size.to_string()),
        ("Hidden size", config.hidden_size.to_string()),
        ("Layers", config.num_hidden_layers.to_string()),
        ("Attention heads", config.num_attention_heads.to_string()),
        ("Intermediate size", config.intermediate_size.to_string()),
        ("Max positions", config.max_position_embeddings.to_string()),
        ("Activation", config.hidden_act.clone()),
        ("Head dimensions", format!("{:?}", head.dimensions)),
    ];
    for (name, value) in rows {
        t.add_row(vec![
            Cell::new(name).fg(comfy_table::Color::White),
            Cell::new(value).fg(comfy_table::Color::Green),
        ]);
    }
    println!("{t}");
}

pub fn display_cache(entries: &[CacheEntry]) {
    if entries.is_empty() {
        println!("{}", "Cache is empty".yellow());
        return;
    }

    let mut t = table(&["Model", "Revision", "File", "Size", "Fetched"]);
    for entry in entries {
        t.add_row(vec![
            Cell::new(&entry.model_id).fg(comfy_table::Color::Green),
            Cell::new(&entry.revision).set_alignment(CellAlignment::Center),
            Cell::new(&entry.filename).fg(comfy_table::Color::Yellow),
            Cell::new(format_size(entry.size_bytes)).fg(comfy_table::Color::Blue).set_alignment(CellAlignment::Right),
            Cell::new(entry.fetched_at.format("%Y-%m-%d %H:%M:%S")).fg(comfy_table::Color::DarkGrey),
        ]);
    }
    println!("{t}");
}

/// First `head` components of each embedding
pub fn display_embeddings(texts: &[String], vectors: &Array2<f32>, head: usize) {
    println!("{} {}", "Dimensions:".bold(), vectors.ncols());
    let mut t = table(&["Text", "Components"]);
    for (text, row) in texts.iter().zip(vectors.axis_iter(Axis(0))) {
        let shown: Vec<String> = row.iter().take(head).map(|v| format!("{:+.4}", v)).collect();
        let ellipsis = if row.len() > head { ", ..." } else { "" };
        t.add_row(vec![
            Cell::new(text).fg(comfy_table::Color::Green),
            Cell::new(format!("[{}{}]", shown.join(", "), ellipsis)),
        ]);
    }
    println!("{t}");
}

/// Ranked hits; result ids index into `documents`
pub fn display_results(results: &[SearchResult], documents: &[String]) {
    if results.is_empty() {
        println!("{}", "No results".yellow());
        return;
    }

    let mut t = table(&["Rank", "Score", "Document"]);
    for (rank, result) in results.iter().enumerate() {
        let text = result.id.parse::<usize>().ok()
            .and_then(|i| documents.get(i))
            .map(String::as_str)
            .unwrap_or(&result.id);
        t.add_row(vec![
            Cell::new(rank + 1).set_alignment(CellAlignment::Center),
            Cell::new(format!("{:.4}", result.score)).fg(comfy_table::Color::Yellow).set_alignment(CellAlignment::Right),
            Cell::new(text).fg(comfy_table::Color::Green),
        ]);
    }
    println!("{t}");
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
