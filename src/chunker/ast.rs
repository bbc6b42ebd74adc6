//! AST-aware code chunking
//!
//! Packs the children of a syntax tree to the token budget instead of cutting
//! at arbitrary character positions. A child that is too large on its own is
//! descended into and packed apart from its siblings. Chunk text is sliced from the
//! source bytes, so whitespace and comments between nodes are kept.

use std::ops::Range;
use std::path::Path;

use tracing::debug;

use super::packer::group_ranges;
use super::splitter::token_windows;
use super::{validate_chunk_size, Chunk, Chunker};
use crate::error::{ChunkError, ConfigError, Result};
use crate::tokenizer::SharedTokenizer;

/// Source language of a code file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeLanguage {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    C,
    Cpp,
    Ruby,
    CSharp,
}

impl CodeLanguage {
    /// Get language from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext {
            "rs" => Some(Self::Rust),
            "py" => Some(Self::Python),
            "js" | "jsx" | "mjs" => Some(Self::JavaScript),
            "ts" | "tsx" => Some(Self::TypeScript),
            "go" => Some(Self::Go),
            "java" => Some(Self::Java),
            "c" | "h" => Some(Self::C),
            "cpp" | "cc" | "hpp" => Some(Self::Cpp),
            "rb" => Some(Self::Ruby),
            "cs" => Some(Self::CSharp),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Go => "go",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::Ruby => "ruby",
            Self::CSharp => "csharp",
        }
    }

    /// Whether a grammar is compiled in for this language
    pub fn has_grammar(&self) -> bool {
        cfg!(feature = "tree-sitter")
            && matches!(
                self,
                Self::Rust | Self::Python | Self::JavaScript | Self::TypeScript | Self::Go
            )
    }
}

impl std::str::FromStr for CodeLanguage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rust" => Ok(Self::Rust),
            "python" => Ok(Self::Python),
            "javascript" | "js" => Ok(Self::JavaScript),
            "typescript" | "ts" => Ok(Self::TypeScript),
            "go" => Ok(Self::Go),
            "java" => Ok(Self::Java),
            "c" => Ok(Self::C),
            "cpp" | "c++" => Ok(Self::Cpp),
            "ruby" => Ok(Self::Ruby),
            "csharp" | "c#" => Ok(Self::CSharp),
            _ => Err(ConfigError::UnsupportedLanguage(s.to_string())),
        }
    }
}

/// Owned syntax tree node: a kind, a byte range and ordered children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode {
    pub kind: String,
    pub start_byte: usize,
    pub end_byte: usize,
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    pub fn new(kind: impl Into<String>, start_byte: usize, end_byte: usize, children: Vec<SyntaxNode>) -> Self {
        Self {
            kind: kind.into(),
            start_byte,
            end_byte,
            children,
        }
    }

    pub fn leaf(kind: impl Into<String>, start_byte: usize, end_byte: usize) -> Self {
        Self::new(kind, start_byte, end_byte, Vec::new())
    }
}

/// Byte span of one packed group and the tree depth it was packed at
#[derive(Debug, Clone, PartialEq, Eq)]
struct Group {
    span: Range<usize>,
    depth: usize,
}

/// AST-aware code chunker
#[derive(Clone)]
pub struct CodeChunker {
    tokenizer: SharedTokenizer,
    chunk_size: usize,
    language: CodeLanguage,
}

impl CodeChunker {
    pub fn new(
        tokenizer: SharedTokenizer,
        chunk_size: usize,
        language: CodeLanguage,
    ) -> Result<Self, ConfigError> {
        validate_chunk_size(chunk_size)?;
        if !language.has_grammar() {
            return Err(ConfigError::UnsupportedLanguage(language.name().to_string()));
        }
        Ok(Self {
            tokenizer,
            chunk_size,
            language,
        })
    }

    pub fn language(&self) -> CodeLanguage {
        self.language
    }

    fn slice<'s>(&self, source: &'s str, span: Range<usize>) -> Result<&'s str> {
        source.get(span).ok_or_else(|| self.parse_error())
    }

    fn parse_error(&self) -> ChunkError {
        ChunkError::Parse {
            language: self.language.name().to_string(),
        }
    }

    /// Pack the children of `node`, which owns `span` of the source.
    ///
    /// Child `i` owns the bytes from the end of child `i - 1` up to its own
    /// end, and the last child runs to the end of `span`. A child over budget
    /// that has children of its own ends the current run of siblings and is
    /// packed on its own one level deeper.
    fn pack_node(
        &self,
        source: &str,
        node: &SyntaxNode,
        span: Range<usize>,
        depth: usize,
        groups: &mut Vec<Group>,
    ) -> Result<()> {
        if node.children.is_empty() {
            groups.push(Group { span, depth });
            return Ok(());
        }

        // Child i covers bounds[i]..bounds[i + 1]
        let mut bounds = Vec::with_capacity(node.children.len() + 1);
        bounds.push(span.start);
        for child in &node.children[..node.children.len() - 1] {
            let prev = bounds[bounds.len() - 1];
            bounds.push(child.end_byte.clamp(prev, span.end));
        }
        bounds.push(span.end);

        let texts = bounds
            .windows(2)
            .map(|b| self.slice(source, b[0]..b[1]))
            .collect::<Result<Vec<_>>>()?;
        let counts = self
            .tokenizer
            .count_tokens_batch(&texts)
            .map_err(ChunkError::tokenizer(depth))?;

        let flush = |run: Range<usize>, groups: &mut Vec<Group>| {
            for range in group_ranges(&counts[run.clone()], self.chunk_size, 0) {
                groups.push(Group {
                    span: bounds[run.start + range.start]..bounds[run.start + range.end],
                    depth,
                });
            }
        };

        let mut run_start = 0;
        for (i, child) in node.children.iter().enumerate() {
            if counts[i] > self.chunk_size && !child.children.is_empty() {
                flush(run_start..i, groups);
                self.pack_node(source, child, bounds[i]..bounds[i + 1], depth + 1, groups)?;
                run_start = i + 1;
            }
        }
        flush(run_start..node.children.len(), groups);

        Ok(())
    }

    /// Chunk `source` using an already-parsed tree.
    ///
    /// Comments and whitespace no node covers travel with the node that
    /// follows them, so the chunks reconstruct the source exactly.
    pub fn chunk_tree(&self, source: &str, root: &SyntaxNode) -> Result<Vec<Chunk>> {
        if source.is_empty() {
            return Ok(Vec::new());
        }

        let total = self
            .tokenizer
            .count_tokens(source)
            .map_err(ChunkError::tokenizer(0))?;
        if total <= self.chunk_size {
            return Ok(vec![Chunk::new(source.to_string(), 0, total, 0)]);
        }

        let mut groups = Vec::new();
        self.pack_node(source, root, 0..source.len(), 0, &mut groups)?;

        let texts = groups
            .iter()
            .map(|group| self.slice(source, group.span.clone()))
            .collect::<Result<Vec<_>>>()?;
        let exact = self
            .tokenizer
            .count_tokens_batch(&texts)
            .map_err(ChunkError::tokenizer(0))?;

        debug!("Packed {} source into {} groups", self.language.name(), groups.len());

        let mut chunks = Vec::with_capacity(texts.len());
        let mut cursor = 0;
        for ((text, token_count), group) in texts.into_iter().zip(exact).zip(&groups) {
            if text.is_empty() {
                continue;
            }
            if token_count <= self.chunk_size {
                chunks.push(Chunk::new(text.to_string(), cursor, token_count, group.depth));
            } else {
                // Oversized leaf
                let level = group.depth + 1;
                let windows = token_windows(self.tokenizer.as_ref(), text, self.chunk_size)
                    .map_err(ChunkError::tokenizer(level))?;
                let mut window_cursor = cursor;
                for window in windows {
                    let chunk = Chunk::new(window.text, window_cursor, window.token_count, level);
                    window_cursor = chunk.end_index;
                    chunks.push(chunk);
                }
            }
            cursor += text.chars().count();
        }

        Ok(chunks)
    }

    /// Parse `source` with the language's grammar
    pub fn parse(&self, source: &str) -> Result<SyntaxNode> {
        grammar::parse(source, self.language).ok_or_else(|| self.parse_error())
    }
}

impl Chunker for CodeChunker {
    fn chunk(&self, text: &str) -> Result<Vec<Chunk>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let root = self.parse(text)?;
        self.chunk_tree(text, &root)
    }
}

#[cfg(feature = "tree-sitter")]
mod grammar {
    use tree_sitter::{Language, Node, Parser};

    use super::{CodeLanguage, SyntaxNode};

    fn language(lang: CodeLanguage) -> Option<Language> {
        match lang {
            CodeLanguage::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            CodeLanguage::Python => Some(tree_sitter_python::LANGUAGE.into()),
            CodeLanguage::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            CodeLanguage::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            CodeLanguage::Go => Some(tree_sitter_go::LANGUAGE.into()),
            _ => None,
        }
    }

    fn convert(node: Node) -> SyntaxNode {
        let mut cursor = node.walk();
        let children = node.children(&mut cursor).map(convert).collect();
        SyntaxNode::new(node.kind(), node.start_byte(), node.end_byte(), children)
    }

    pub(super) fn parse(source: &str, lang: CodeLanguage) -> Option<SyntaxNode> {
        let mut parser = Parser::new();
        parser.set_language(&language(lang)?).ok()?;
        let tree = parser.parse(source, None)?;
        Some(convert(tree.root_node()))
    }
}

#[cfg(not(feature = "tree-sitter"))]
mod grammar {
    use super::{CodeLanguage, SyntaxNode};

    pub(super) fn parse(_source: &str, _lang: CodeLanguage) -> Option<SyntaxNode> {
        None
    }
}
