//! Integration tests for chunkwright

use std::process::Command;
use std::sync::Arc;

use chunkwright::chunker::{
    refine_overlap, Chunk, ChunkOverlap, Chunker, OverlapUnit, RecursiveChunker, RuleLevel,
    RuleSet, SentenceChunker, TokenChunker,
};
use chunkwright::tokenizer::{CharacterTokenizer, SharedTokenizer, TiktokenTokenizer, Tokenizer};

fn cargo_run(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "--quiet", "--"])
        .args(args)
        .output()
        .expect("Failed to run command")
}

fn cl100k() -> SharedTokenizer {
    Arc::new(TiktokenTokenizer::cl100k().unwrap())
}

fn sample_document() -> String {
    let mut doc = String::new();
    for p in 0..6 {
        doc.push_str(&format!("# Section {}\n\n", p));
        for s in 0..5 {
            doc.push_str(&format!(
                "Sentence {} of paragraph {} talks about chunking text for retrieval. ",
                s, p
            ));
        }
        doc.push_str("\n\n");
    }
    doc.push_str("A closing line without a trailing newline");
    doc
}

/// Reconstruction, contiguity and budget
fn assert_well_formed(text: &str, chunks: &[Chunk], chunk_size: usize) {
    let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(joined, text);

    assert_eq!(chunks.first().map(|c| c.start_index), Some(0));
    assert_eq!(chunks.last().map(|c| c.end_index), Some(text.chars().count()));
    for pair in chunks.windows(2) {
        assert_eq!(pair[0].end_index, pair[1].start_index);
    }
    for chunk in chunks {
        assert!(
            chunk.token_count <= chunk_size,
            "chunk of {} tokens over budget {}: {:?}",
            chunk.token_count,
            chunk_size,
            chunk.text
        );
        assert_eq!(chunk.end_index - chunk.start_index, chunk.text.chars().count());
    }
}

#[test]
fn test_recursive_properties_tiktoken() {
    let text = sample_document();
    for chunk_size in [16, 48, 128] {
        let chunker = RecursiveChunker::new(cl100k(), chunk_size).unwrap();
        let chunks = chunker.chunk(&text).unwrap();
        assert!(chunks.len() > 1);
        assert_well_formed(&text, &chunks, chunk_size);
    }
}

#[test]
fn test_recursive_properties_character() {
    let text = sample_document();
    let chunker = RecursiveChunker::new(Arc::new(CharacterTokenizer), 40).unwrap();
    let chunks = chunker.chunk(&text).unwrap();
    assert_well_formed(&text, &chunks, 40);
}

#[test]
fn test_markdown_rules_properties() {
    let text = sample_document();
    let chunker = RecursiveChunker::new(cl100k(), 64)
        .unwrap()
        .with_rules(RuleSet::markdown());
    let chunks = chunker.chunk(&text).unwrap();
    assert_well_formed(&text, &chunks, 64);
}

#[test]
fn test_empty_input() {
    let tokenizer = cl100k();
    assert!(RecursiveChunker::new(tokenizer.clone(), 32).unwrap().chunk("").unwrap().is_empty());
    assert!(SentenceChunker::new(tokenizer.clone(), 32).unwrap().chunk("").unwrap().is_empty());
    assert!(TokenChunker::new(tokenizer, 32).unwrap().chunk("").unwrap().is_empty());
}

#[test]
fn test_single_chunk_short_circuit() {
    let text = "Short enough to fit.";
    let chunks = RecursiveChunker::new(cl100k(), 512).unwrap().chunk(text).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, text);
    assert_eq!(chunks[0].start_index, 0);
    assert_eq!(chunks[0].end_index, text.chars().count());
    assert_eq!(chunks[0].level, 0);
}

#[test]
fn test_determinism() {
    let text = sample_document();
    let chunker = RecursiveChunker::new(cl100k(), 32).unwrap();
    assert_eq!(chunker.chunk(&text).unwrap(), chunker.chunk(&text).unwrap());
}

#[test]
fn test_scenario_terminal_only_rules() {
    let chunker = RecursiveChunker::new(Arc::new(CharacterTokenizer), 5)
        .unwrap()
        .with_rules(RuleSet::new(vec![RuleLevel::Token]).unwrap());
    let chunks = chunker.chunk("Hello world").unwrap();
    let spans: Vec<(&str, usize, usize, usize)> = chunks
        .iter()
        .map(|c| (c.text.as_str(), c.start_index, c.end_index, c.token_count))
        .collect();
    assert_eq!(
        spans,
        vec![("Hello", 0, 5, 5), (" worl", 5, 10, 5), ("d", 10, 11, 1)]
    );
}

#[test]
fn test_scenario_paragraph_break() {
    let text = "First paragraph.\n\nSecond paragraph.";
    let chunker = RecursiveChunker::new(Arc::new(CharacterTokenizer), 20)
        .unwrap()
        .with_min_characters_per_chunk(1)
        .unwrap();
    let chunks = chunker.chunk(text).unwrap();
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["First paragraph.\n\n", "Second paragraph."]);
    assert_eq!(chunks[1].start_index, 18);
}

#[test]
fn test_scenario_sentence_pairs() {
    let chunker = SentenceChunker::new(Arc::new(CharacterTokenizer), 6)
        .unwrap()
        .with_min_characters_per_sentence(1)
        .unwrap();
    let chunks = chunker.chunk("A. B. C. D. ").unwrap();
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["A. B. ", "C. D. "]);
}

#[test]
fn test_scenario_token_overlap_shift() {
    let tokenizer = cl100k();
    let text = "The quick brown fox jumps over the lazy dog while the cat sleeps \
                on the warm mat and the bird sings in the tall green tree";
    let chunks = TokenChunker::new(tokenizer.clone(), 10).unwrap().chunk(text).unwrap();
    assert!(chunks.len() >= 2);

    let refined = refine_overlap(chunks.clone(), 3, OverlapUnit::Token, tokenizer.as_ref()).unwrap();

    let prev_tokens = tokenizer.encode(&chunks[0].text).unwrap();
    let tail = tokenizer.decode(&prev_tokens[prev_tokens.len() - 3..]).unwrap();
    assert_eq!(refined[0], chunks[0]);
    assert_eq!(
        refined[1].start_index,
        chunks[1].start_index - tail.chars().count()
    );
    assert_eq!(refined[1].text, format!("{}{}", tail, chunks[1].text));
    assert_eq!(refined[1].end_index, chunks[1].end_index);
}

#[test]
fn test_overlap_stays_within_budget() {
    let text = sample_document();
    let chunker = RecursiveChunker::new(cl100k(), 64)
        .unwrap()
        .with_overlap(ChunkOverlap::Fraction(0.25))
        .unwrap();
    let chunks = chunker.chunk(&text).unwrap();
    assert!(chunks.len() > 1);
    let tokenizer = chunker.tokenizer();
    for chunk in &chunks {
        assert!(chunk.token_count <= 64);
        assert_eq!(chunk.token_count, tokenizer.count_tokens(&chunk.text).unwrap());
    }
    for pair in chunks.windows(2) {
        assert!(pair[1].start_index <= pair[0].end_index);
        assert!(pair[1].start_index >= pair[0].start_index);
    }
}

#[test]
fn test_token_chunker_overlap_covers_input() {
    let text = sample_document();
    let chunker = TokenChunker::new(cl100k(), 32)
        .unwrap()
        .with_overlap(ChunkOverlap::Tokens(8))
        .unwrap();
    let chunks = chunker.chunk(&text).unwrap();
    assert_eq!(chunks.last().map(|c| c.end_index), Some(text.chars().count()));
    for pair in chunks.windows(2) {
        assert!(pair[1].start_index < pair[0].end_index);
    }
}

#[test]
fn test_cjk_text_without_delimiters() {
    // No spaces or ASCII punctuation, so every chunk comes from terminal windows
    let text = "日本語のテキストは空白なしで長く続きます。".repeat(20);
    let chunks = RecursiveChunker::new(cl100k(), 7).unwrap().chunk(&text).unwrap();
    assert!(chunks.len() > 1);
    assert_well_formed(&text, &chunks, 7);
}

#[test]
fn test_emoji_text() {
    let text = "🦀🚀👍🏽 ".repeat(30);
    let chunks = RecursiveChunker::new(cl100k(), 5).unwrap().chunk(&text).unwrap();
    assert_well_formed(&text, &chunks, 5);
}

#[test]
fn test_token_chunker_cjk_overlap_offsets() {
    let text = "日本語のテキストは空白なしで長く続きます。".repeat(10);
    let chunker = TokenChunker::new(cl100k(), 9)
        .unwrap()
        .with_overlap(ChunkOverlap::Tokens(3))
        .unwrap();
    let chunks = chunker.chunk(&text).unwrap();
    assert!(chunks.len() > 1);
    assert_eq!(chunks.last().map(|c| c.end_index), Some(text.chars().count()));
    for chunk in &chunks {
        let expected: String = text
            .chars()
            .skip(chunk.start_index)
            .take(chunk.end_index - chunk.start_index)
            .collect();
        assert_eq!(chunk.text, expected);
        assert!(chunk.token_count <= 9);
    }
}

#[test]
fn test_cli_help() {
    let output = cargo_run(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("chunk"));
    assert!(stdout.contains("config"));
}

#[test]
fn test_cli_version() {
    let output = cargo_run(&["--version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("chunkwright"));
}

#[test]
fn test_chunk_help() {
    let output = cargo_run(&["chunk", "--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--strategy"));
    assert!(stdout.contains("--chunk-size"));
    assert!(stdout.contains("--tokenizer"));
    assert!(stdout.contains("--texts-only"));
}

#[test]
fn test_config_help() {
    let output = cargo_run(&["config", "--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("show"));
    assert!(stdout.contains("init"));
    assert!(stdout.contains("path"));
}

#[test]
fn test_chunk_file_to_jsonl() {
    let dir = std::env::temp_dir().join(format!("chunkwright-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let file = dir.join("notes.txt");
    let content = sample_document();
    std::fs::write(&file, &content).unwrap();

    let output = cargo_run(&[
        "--quiet",
        "chunk",
        file.to_str().unwrap(),
        "--strategy",
        "recursive",
        "--tokenizer",
        "character",
        "--chunk-size",
        "64",
        "--chunk-overlap",
        "0",
        "--rules",
        "default",
    ]);
    std::fs::remove_dir_all(&dir).ok();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut rebuilt = String::new();
    for (i, line) in stdout.lines().enumerate() {
        let record: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(record["chunk_index"], i);
        assert!(record["token_count"].as_u64().unwrap() <= 64);
        rebuilt.push_str(record["text"].as_str().unwrap());
    }
    assert_eq!(rebuilt, content);
}
