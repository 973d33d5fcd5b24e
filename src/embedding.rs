//! Text embeddings for semantic name matching.
//!
//! The normalizer only needs one capability, `embed(text) -> vector`, so the
//! provider sits behind the [`Embedder`] trait. The shipped adapter,
//! [`CommandEmbedder`], runs an external program per call: the text goes to
//! its stdin and a JSON array of floats is expected on stdout.
//!
//! ```text
//! $ echo -n "Tolkien" | embed-model
//! [0.0123, -0.0441, …]
//! ```
//!
//! Every failure is an [`EmbedError`]; callers degrade to fuzzy matching.

use std::io::{self, Write};
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Embedding command is empty")]
    NoCommand,
    #[error("Embedding command failed ({status}): {stderr}")]
    CommandFailed { status: String, stderr: String },
    #[error("Malformed embedding output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Embedding is empty")]
    Empty,
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },
    #[error("Embedding holds a non-finite component")]
    NonFinite,
    #[error("Embedding provider error: {0}")]
    Provider(String),
}

/// Turns text into a fixed-length vector.
pub trait Embedder: Send {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// Cosine similarity of two vectors of equal length.
///
/// Zero when either vector has zero norm. Vectors of different length are an
/// error, never truncated, and so is a score that is not finite (a NaN or
/// infinite component).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, EmbedError> {
    if a.len() != b.len() {
        return Err(EmbedError::Dimension {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let (dot, norm_a_sq, norm_b_sq) = a.iter().zip(b).fold(
        (0.0f32, 0.0f32, 0.0f32),
        |(dot, na, nb), (&x, &y)| (dot + x * y, na + x * x, nb + y * y),
    );

    if !(dot.is_finite() && norm_a_sq.is_finite() && norm_b_sq.is_finite()) {
        return Err(EmbedError::NonFinite);
    }
    if norm_a_sq == 0.0 || norm_b_sq == 0.0 {
        return Ok(0.0);
    }
    let score = dot / (norm_a_sq.sqrt() * norm_b_sq.sqrt());
    if !score.is_finite() {
        return Err(EmbedError::NonFinite);
    }
    Ok(score.clamp(-1.0, 1.0))
}

/// Embedder backed by an external program.
#[derive(Debug, Clone)]
pub struct CommandEmbedder {
    program: String,
    args: Vec<String>,
    dimension: Option<usize>,
}

impl CommandEmbedder {
    /// `argv[0]` is the program, the rest its arguments. When `dimension` is
    /// set, vectors of any other length are rejected.
    pub fn new(argv: &[String], dimension: Option<usize>) -> Result<Self, EmbedError> {
        let (program, args) = argv.split_first().ok_or(EmbedError::NoCommand)?;
        if program.trim().is_empty() {
            return Err(EmbedError::NoCommand);
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            dimension,
        })
    }
}

impl Embedder for CommandEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // A provider may answer without reading its input.
        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(text.as_bytes()) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(e.into()),
            }
        }
        let output = child.wait_with_output()?;

        if !output.status.success() {
            return Err(EmbedError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let vector: Vec<f32> = serde_json::from_slice(&output.stdout)?;
        if vector.is_empty() {
            return Err(EmbedError::Empty);
        }
        if let Some(expected) = self.dimension {
            if vector.len() != expected {
                return Err(EmbedError::Dimension {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        Ok(vector)
    }
}
