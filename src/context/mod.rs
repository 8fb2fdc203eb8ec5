use std::path::Path;

use crate::agent::parse::truncate_chars;
use crate::config::ContextConfig;

/// Joins packed blocks inside the prompt.
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Project guidance file read from the repository root when present.
pub const GUIDANCE_FILE: &str = "AGENTS.md";

const INCLUDE_EXTENSIONS: &[&str] = &[
    ".md", ".txt", ".json", ".yml", ".yaml", ".js", ".mjs", ".cjs", ".ts", ".tsx", ".jsx",
    ".astro", ".css", ".html",
];

/// Generated output, dependencies and binary assets.
const EXCLUDED_PREFIXES: &[&str] = &["public/images/", "dist/", "node_modules/"];

#[derive(Debug, Clone, Default)]
pub struct RepositoryContext {
    /// Every allowlisted tracked path, whether or not it made the budget.
    pub files: Vec<String>,
    /// `FILE: <path>\n<snippet>` blocks that fit the budget.
    pub blocks: Vec<String>,
    /// Excerpt of the guidance file, empty when absent.
    pub guidance: String,
}

impl RepositoryContext {
    pub async fn build(root: &Path, tracked: Vec<String>, config: &ContextConfig) -> Self {
        let files: Vec<String> = tracked
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .filter(|p| include_file(p))
            .collect();

        let mut packer = BlockPacker::new(config.max_file_chars, config.max_context_chars);

        for file in &files {
            let content = read_text_file(&root.join(file), config.max_file_bytes).await;
            if content.is_empty() {
                continue;
            }
            if !packer.push(file, &content) {
                tracing::debug!(
                    file = %file,
                    remaining = packer.remaining(),
                    "Context budget exhausted"
                );
                break;
            }
        }

        let blocks = packer.finish();

        let guidance_path = root.join(GUIDANCE_FILE);
        let guidance = if guidance_path.is_file() {
            let text = read_text_file(&guidance_path, config.max_file_bytes).await;
            truncate_chars(&text, config.guidance_max_chars).to_string()
        } else {
            String::new()
        };

        tracing::info!(
            files = files.len(),
            packed = blocks.len(),
            guidance = !guidance.is_empty(),
            "Built repository context"
        );

        Self {
            files,
            blocks,
            guidance,
        }
    }

    pub fn joined_blocks(&self) -> String {
        self.blocks.join(BLOCK_SEPARATOR)
    }
}

/// Greedy packer over a shared character budget.
#[derive(Debug)]
pub struct BlockPacker {
    per_file_chars: usize,
    remaining: usize,
    blocks: Vec<String>,
}

impl BlockPacker {
    pub fn new(per_file_chars: usize, budget: usize) -> Self {
        Self {
            per_file_chars,
            remaining: budget,
            blocks: Vec::new(),
        }
    }

    /// Add a file's block. Returns `false` when the block does not fit; the
    /// block is dropped whole and the caller should stop packing.
    pub fn push(&mut self, path: &str, content: &str) -> bool {
        let snippet = truncate_chars(content, self.per_file_chars);
        let block = format!("FILE: {path}\n{snippet}");
        let len = block.chars().count();

        if len > self.remaining {
            return false;
        }

        self.remaining -= len;
        self.blocks.push(block);
        true
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn finish(self) -> Vec<String> {
        self.blocks
    }
}

pub fn include_file(path: &str) -> bool {
    if EXCLUDED_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return false;
    }
    let ext = extension_of(path);
    INCLUDE_EXTENSIONS.contains(&ext.as_str())
}

/// Lower-cased extension including the dot, from the last `.` in the path.
fn extension_of(path: &str) -> String {
    path.rfind('.')
        .map(|idx| path[idx..].to_lowercase())
        .unwrap_or_default()
}

/// Read a UTF-8 file, returning an empty string when it is missing,
/// oversized or not text.
pub async fn read_text_file(path: &Path, max_bytes: u64) -> String {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(_) => return String::new(),
    };

    if metadata.len() > max_bytes {
        tracing::debug!(path = %path.display(), size = metadata.len(), "Skipping large file");
        return String::new();
    }

    tokio::fs::read_to_string(path).await.unwrap_or_default()
}
