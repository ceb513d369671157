use crate::api::chat::ChatClient;
use crate::config::Config;
use crate::scenario::{read_messages, remove_empty_lines};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBlock {
    pub theme: String,
    pub quote: String,
    pub key_points: Vec<String>,
}

pub fn parse_message_block(lines: &[String]) -> MessageBlock {
    let mut block = MessageBlock::default();
    let mut in_key_points = false;

    for line in lines {
        if let Some(rest) = line.strip_prefix("Theme:") {
            block.theme = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("Quote:") {
            block.quote = rest.trim().to_string();
        } else if line.starts_with("Key Points:") {
            in_key_points = true;
        } else if in_key_points {
            block.key_points.push(line.clone());
        }
    }

    block
}

pub fn system_prompt(template: &str, theme: &str) -> String {
    template.replace("{theme}", theme)
}

pub fn render_scenario(title: &str, spoken_text: &str, description: &str) -> String {
    format!(
        "Title: \"{}\"\n\nTranslated Text:\n{}\n\nDescription:\n{}\n\n",
        title.replace('"', "'"),
        spoken_text.trim(),
        description.trim()
    )
}

async fn spoken_text_for(chat: &ChatClient, cfg: &Config, block: &MessageBlock) -> Result<String> {
    let system = system_prompt(&cfg.ai_system_prompt, &block.theme);
    let mut parts = vec![block.quote.clone()];

    if block.key_points.is_empty() {
        let text = chat.send(&system, &block.quote).await?;
        parts.push(remove_empty_lines(&text)?);
    } else {
        for (i, point) in block.key_points.iter().enumerate() {
            logi(format!("  key point {}/{}", i + 1, block.key_points.len()));
            let text = chat.send(&system, point).await?;
            parts.push(remove_empty_lines(&text)?);
        }
    }

    let mut spoken = parts
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .map(|p| p.trim().to_string())
        .collect::<Vec<_>>()
        .join("\n");

    if cfg.min_words > 0 {
        spoken = chat.extend_text(&spoken, cfg.min_words, &system).await?;
    }
    Ok(spoken)
}

pub async fn generate_text_content(cfg: &Config, chat: &ChatClient) -> Result<usize> {
    let source = fs::read_to_string(&cfg.messages_path)
        .await
        .with_context(|| format!("Failed to read messages: {}", cfg.messages_path.display()))?;
    let messages = read_messages(&source, &cfg.message_marker);
    logi(format!(
        "Found {} message block(s) in {}",
        messages.len(),
        cfg.messages_path.display()
    ));

    let out_path: &Path = &cfg.text_output_path;
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let mut out = fs::File::create(out_path)
        .await
        .with_context(|| format!("Failed to create {}", out_path.display()))?;

    let mut written = 0usize;
    for (idx, lines) in messages.iter().enumerate() {
        let block = parse_message_block(lines);
        if block.theme.is_empty() {
            logw(format!("Message {} has no Theme:, skipping", idx + 1));
            continue;
        }
        logi(format!("Generating text for '{}'", block.theme));

        let spoken = match spoken_text_for(chat, cfg, &block).await {
            Ok(text) => text,
            Err(err) => {
                logw(format!("Message {} failed: {:#}", idx + 1, err));
                continue;
            }
        };

        out.write_all(render_scenario(&block.theme, &spoken, "").as_bytes())
            .await?;
        written += 1;
    }
    out.flush().await?;

    logok(format!(
        "Wrote {} scenario(s) to {}",
        written,
        out_path.display()
    ));
    Ok(written)
}
