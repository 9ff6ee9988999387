use std::fmt::Write;

use gitask_core::{Answer, IngestReport};
use gitask_index::{CollectionStats, QueryResult};
use gitask_loader::RepoStats;

pub fn file_types(stats: &RepoStats) -> String {
    stats
        .file_types
        .iter()
        .map(|(ext, count)| format!("{ext} ({count})"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn ingest_report(report: &IngestReport) -> String {
    let stats = &report.stats;
    let mut out = String::from("Repository processed successfully!\n");
    let _ = writeln!(out, "Total files processed: {}", stats.total_files);
    let _ = writeln!(out, "File types found: {}", file_types(stats));
    let _ = writeln!(out, "Total chunks indexed: {}", stats.total_chunks);
    let _ = writeln!(
        out,
        "Documents stored: {} ({} ms)",
        report.documents, report.elapsed_ms
    );
    out
}

fn chunks(out: &mut String, results: &QueryResult) {
    for (i, (doc, meta)) in results.documents.iter().zip(&results.metadatas).enumerate() {
        let _ = writeln!(out, "--- Chunk {} from {}", i + 1, meta.source);
        let _ = writeln!(out, "{doc}");
    }
}

pub fn answer(answer: &Answer, show_chunks: bool) -> String {
    let mut out = String::from("Answer\n");
    let _ = writeln!(out, "{}\n", answer.text.trim_end());
    out.push_str("Sources\n");
    if answer.sources.is_empty() {
        out.push_str("(no indexed documents)\n");
    } else {
        let _ = writeln!(out, "{}", answer.sources);
    }
    if show_chunks {
        out.push('\n');
        chunks(&mut out, &answer.results);
    }
    out
}

pub fn search(results: &QueryResult) -> String {
    if results.is_empty() {
        return "No matching documents.\n".to_owned();
    }
    let mut out = String::new();
    for (i, (meta, distance)) in results.metadatas.iter().zip(&results.distances).enumerate() {
        let _ = writeln!(
            out,
            "{}. {} [chunk {}] distance {distance:.4}",
            i + 1,
            meta.source,
            meta.chunk_index
        );
    }
    out.push('\n');
    chunks(&mut out, results);
    out
}

pub fn collection(stats: &CollectionStats) -> String {
    format!("Collection {}: {} documents\n", stats.name, stats.count)
}
