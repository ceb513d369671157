use crate::layout::{ensure_dir, remove_path, AudioLayout};
use crate::logok;
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::path::Path;
use tokio::fs;

fn cached_regex(cell: &'static OnceCell<Regex>, pattern: &str) -> Result<&'static Regex> {
    cell.get_or_try_init(|| {
        Regex::new(pattern).with_context(|| format!("failed to compile regex {pattern}"))
    })
}

fn title_regex() -> Result<&'static Regex> {
    static RE: OnceCell<Regex> = OnceCell::new();
    cached_regex(&RE, r"Title:")
}

fn block_regex() -> Result<&'static Regex> {
    static RE: OnceCell<Regex> = OnceCell::new();
    cached_regex(
        &RE,
        r#"(?s)^Title:[ \t]*"?([^"\n]+?)"?[ \t]*\r?\n\s*(?:Translated Text|TTS):\s*(.+?)\s*Description:\s*(.*?)\s*$"#,
    )
}

fn sentence_regex() -> Result<&'static Regex> {
    static RE: OnceCell<Regex> = OnceCell::new();
    cached_regex(&RE, r#"[^.!?]+[.!?]+["']?|[^.!?]+$"#)
}

fn empty_line_regex() -> Result<&'static Regex> {
    static RE: OnceCell<Regex> = OnceCell::new();
    cached_regex(&RE, r"(?m)^[ \t]*\r?\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub title: String,
    pub spoken_text: String,
    pub description: String,
}

pub fn parse_scenarios(text: &str) -> Result<Vec<Scenario>> {
    let block_re = block_regex()?;
    let starts: Vec<usize> = title_regex()?.find_iter(text).map(|m| m.start()).collect();
    let mut out = Vec::with_capacity(starts.len());

    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        let block = &text[start..end];
        if let Some(caps) = block_re.captures(block) {
            out.push(Scenario {
                title: caps[1].trim().to_string(),
                spoken_text: caps[2].trim().to_string(),
                description: caps[3].trim().to_string(),
            });
        }
    }

    Ok(out)
}

/// Packs whole sentences into chunks of at most `max_chars` characters.
/// A sentence longer than the limit is broken at whitespace, or mid-word
/// when it has none.
pub fn split_text_into_chunks(text: &str, max_chars: usize) -> Result<Vec<String>> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for m in sentence_regex()?.find_iter(text) {
        for piece in split_oversized(m.as_str(), max_chars) {
            let len = piece.chars().count();
            if current_len + len > max_chars && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push_str(&piece);
            current_len += len;
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks.retain(|c| !c.trim().is_empty());
    Ok(chunks)
}

fn split_oversized(sentence: &str, max_chars: usize) -> Vec<String> {
    if sentence.chars().count() <= max_chars {
        return vec![sentence.to_string()];
    }

    let mut pieces = Vec::new();
    let mut rest: Vec<char> = sentence.chars().collect();
    while rest.len() > max_chars {
        let cut = rest[..max_chars]
            .iter()
            .rposition(|c| c.is_whitespace())
            .filter(|&i| i > 0)
            .map(|i| i + 1)
            .unwrap_or(max_chars);
        pieces.push(rest.drain(..cut).collect());
    }
    if !rest.is_empty() {
        pieces.push(rest.into_iter().collect());
    }
    pieces
}

pub fn remove_empty_lines(text: &str) -> Result<String> {
    Ok(empty_line_regex()?.replace_all(text, "").into_owned())
}

pub fn has_more_than_words(text: &str, max_words: usize) -> bool {
    text.split_whitespace().count() > max_words
}

pub fn read_messages(text: &str, marker: &str) -> Vec<Vec<String>> {
    let mut messages = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut recording = false;

    for line in text.lines() {
        let line = line.trim();
        if line.starts_with(marker) {
            if !current.is_empty() {
                messages.push(std::mem::take(&mut current));
            }
            recording = true;
        } else if recording && !line.is_empty() {
            current.push(line.to_string());
        }
    }

    if !current.is_empty() {
        messages.push(current);
    }
    messages
}

pub async fn read_scenarios(path: &Path) -> Result<Vec<Scenario>> {
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read scenarios: {}", path.display()))?;
    parse_scenarios(&text)
}

pub async fn stage_tts_chunks(
    layout: &AudioLayout,
    scenarios: &[Scenario],
    max_chars: usize,
) -> Result<Vec<usize>> {
    let root = layout.tts_input_dir();
    remove_path(&root).await?;
    ensure_dir(&root).await?;

    let mut counts = Vec::with_capacity(scenarios.len());
    for (idx, scenario) in scenarios.iter().enumerate() {
        let dir = root.join((idx + 1).to_string());
        ensure_dir(&dir).await?;

        let chunks = split_text_into_chunks(&scenario.spoken_text, max_chars)?;
        for (k, chunk) in chunks.iter().enumerate() {
            let path = dir.join(format!("{}.txt", k + 1));
            fs::write(&path, chunk.trim())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        logok(format!(
            "Scenario {} '{}': {} chunk(s) staged",
            idx + 1,
            scenario.title,
            chunks.len()
        ));
        counts.push(chunks.len());
    }

    Ok(counts)
}
