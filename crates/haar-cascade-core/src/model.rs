//! Cascade persistence.
//!
//! The native format is a versioned, line-structured text schema. Tokens are
//! separated by ASCII whitespace, one record per line; blank lines and lines
//! starting with `#` are ignored.
//!
//! ```text
//! model  := header stages
//! header := "haar-cascade" version                 (version = 1)
//! stages := "stages" count  stage{count}
//! stage  := "stage" weak_count decision_threshold  rule{weak_count}
//! rule   := "rule" wx wy ww wh  bx by bw bh  threshold polarity alpha
//! ```
//!
//! Rectangle fields and `threshold` are integers, `polarity` is `1` or `-1`,
//! `alpha` and `decision_threshold` are finite decimals. Floats are written
//! with Rust's shortest round-trip formatting, so a reload is bit-exact.
//!
//! The headerless layout written by older training tools (stage count, then
//! per stage the weak count, rules as `8 rect ints, threshold, polarity,
//! alpha`, and the stage threshold, with free whitespace) is accepted on load.
//!
//! Loading never returns a partially built cascade.

use crate::cascade::Cascade;
use crate::feature::{HaarFeature, Rect};
use crate::stage::{Polarity, Stage, WeakRule};
use std::fmt::Write as _;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

/// Magic token opening the versioned text format.
pub const MODEL_MAGIC: &str = "haar-cascade";

/// Version written by [`Cascade::to_text`].
pub const MODEL_VERSION: u32 = 1;

/// Caps speculative allocations driven by counts read from untrusted input.
const MAX_PREALLOC: usize = 1024;

/// Errors raised while loading or saving a cascade.
#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("unexpected end of model, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
    #[error("line {line}: unexpected data after the last stage")]
    TrailingData { line: usize },
    #[error("unsupported model version {0} (supported: {MODEL_VERSION})")]
    UnsupportedVersion(u32),
    #[error("stage {stage}: {reason}")]
    InvalidStage { stage: usize, reason: String },
    #[error("stage {stage}, rule {rule}: {reason}")]
    InvalidRule {
        stage: usize,
        rule: usize,
        reason: String,
    },
}

impl Cascade {
    /// Check every stage and rule for values a loaded model must not carry.
    pub fn validate(&self) -> Result<(), ModelError> {
        for (si, stage) in self.stages().iter().enumerate() {
            if !stage.threshold().is_finite() {
                return Err(ModelError::InvalidStage {
                    stage: si,
                    reason: format!("non-finite decision threshold {}", stage.threshold()),
                });
            }
            for (ri, rule) in stage.rules().iter().enumerate() {
                let invalid = |reason: String| ModelError::InvalidRule {
                    stage: si,
                    rule: ri,
                    reason,
                };
                rule.feature
                    .check_non_empty()
                    .map_err(|e| invalid(e.to_string()))?;
                if !rule.alpha.is_finite() {
                    return Err(invalid(format!("non-finite alpha {}", rule.alpha)));
                }
            }
        }
        Ok(())
    }

    /// Serialize into the versioned text format.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = writeln!(out, "{MODEL_MAGIC} {MODEL_VERSION}");
        let _ = writeln!(out, "stages {}", self.len());
        for stage in self.stages() {
            let _ = writeln!(out, "stage {} {}", stage.rules().len(), stage.threshold());
            for rule in stage.rules() {
                let (w, b) = (&rule.feature.white, &rule.feature.black);
                let _ = writeln!(
                    out,
                    "rule {} {} {} {} {} {} {} {} {} {} {}",
                    w.x,
                    w.y,
                    w.width,
                    w.height,
                    b.x,
                    b.y,
                    b.width,
                    b.height,
                    rule.threshold,
                    rule.polarity.sign(),
                    rule.alpha
                );
            }
        }
        out
    }

    /// Parse a model, auto-detecting the versioned or the legacy layout.
    pub fn from_text(text: &str) -> Result<Self, ModelError> {
        let first = text
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.starts_with('#'))
            .and_then(|l| l.split_ascii_whitespace().next());
        match first {
            Some(MODEL_MAGIC) => parse_versioned(text),
            Some(_) => Self::from_legacy_text(text),
            None => Err(ModelError::UnexpectedEnd { expected: "header" }),
        }
    }

    /// Parse the headerless whitespace layout.
    pub fn from_legacy_text(text: &str) -> Result<Self, ModelError> {
        let mut tokens = Tokens::new(text);
        let stage_count: usize = tokens.parse("stage count")?;
        let mut cascade = Cascade::new();
        for si in 0..stage_count {
            let weak_count: usize = tokens.parse("weak rule count")?;
            let mut rules = Vec::with_capacity(weak_count.min(MAX_PREALLOC));
            for ri in 0..weak_count {
                let mut rect_fields = [0usize; 8];
                for field in rect_fields.iter_mut() {
                    *field = tokens.parse("rectangle field")?;
                }
                let threshold: i64 = tokens.parse("rule threshold")?;
                let (line, sign) = tokens.parse_at::<i64>("polarity")?;
                let alpha: f64 = tokens.parse("alpha")?;
                let polarity = Polarity::from_sign(sign).ok_or_else(|| ModelError::Parse {
                    line,
                    reason: format!("polarity must be 1 or -1, got {sign}"),
                })?;
                rules.push(build_rule(si, ri, rect_fields, threshold, polarity, alpha)?);
            }
            let threshold: f64 = tokens.parse("stage threshold")?;
            cascade.push_stage(Stage::new(rules, threshold));
        }
        if let Some((line, _)) = tokens.next() {
            return Err(ModelError::TrailingData { line });
        }
        cascade.validate()?;
        Ok(cascade)
    }

    /// Write the versioned text format to any writer.
    pub fn save_text<W: Write>(&self, mut writer: W) -> Result<(), ModelError> {
        writer.write_all(self.to_text().as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Read a model (either layout) from any reader.
    pub fn load_text<R: Read>(mut reader: R) -> Result<Self, ModelError> {
        let mut raw = String::new();
        reader.read_to_string(&mut raw)?;
        Self::from_text(&raw)
    }

    pub fn write_text_file(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        fs::write(path, self.to_text())?;
        Ok(())
    }

    pub fn read_text_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let raw = fs::read_to_string(path)?;
        Self::from_text(&raw)
    }

    /// Load a JSON model from disk. The result is validated like text models.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let raw = fs::read_to_string(path)?;
        let cascade: Cascade = serde_json::from_str(&raw)?;
        cascade.validate()?;
        Ok(cascade)
    }

    /// Write this cascade to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

fn build_rule(
    stage: usize,
    rule: usize,
    f: [usize; 8],
    threshold: i64,
    polarity: Polarity,
    alpha: f64,
) -> Result<WeakRule, ModelError> {
    let invalid = |reason: String| ModelError::InvalidRule {
        stage,
        rule,
        reason,
    };
    let white = Rect::new(f[0], f[1], f[2], f[3]).map_err(|e| invalid(e.to_string()))?;
    let black = Rect::new(f[4], f[5], f[6], f[7]).map_err(|e| invalid(e.to_string()))?;
    Ok(WeakRule {
        feature: HaarFeature::new(white, black),
        threshold,
        polarity,
        alpha,
    })
}

fn parse_versioned(text: &str) -> Result<Cascade, ModelError> {
    let mut records = Records::new(text);

    let (line, header) = records.expect_record("header", MODEL_MAGIC, 2)?;
    let version: u32 = parse_field(line, header[1], "version")?;
    if version != MODEL_VERSION {
        return Err(ModelError::UnsupportedVersion(version));
    }

    let (line, fields) = records.expect_record("stage count record", "stages", 2)?;
    let stage_count: usize = parse_field(line, fields[1], "stage count")?;

    let mut cascade = Cascade::new();
    for si in 0..stage_count {
        let (line, fields) = records.expect_record("stage record", "stage", 3)?;
        let weak_count: usize = parse_field(line, fields[1], "weak rule count")?;
        let threshold: f64 = parse_field(line, fields[2], "stage threshold")?;

        let mut rules = Vec::with_capacity(weak_count.min(MAX_PREALLOC));
        for ri in 0..weak_count {
            let (line, fields) = records.expect_record("rule record", "rule", 12)?;
            let mut rect_fields = [0usize; 8];
            for (slot, tok) in rect_fields.iter_mut().zip(&fields[1..9]) {
                *slot = parse_field(line, tok, "rectangle field")?;
            }
            let threshold: i64 = parse_field(line, fields[9], "rule threshold")?;
            let sign: i64 = parse_field(line, fields[10], "polarity")?;
            let polarity = Polarity::from_sign(sign).ok_or_else(|| ModelError::Parse {
                line,
                reason: format!("polarity must be 1 or -1, got {sign}"),
            })?;
            let alpha: f64 = parse_field(line, fields[11], "alpha")?;
            rules.push(build_rule(si, ri, rect_fields, threshold, polarity, alpha)?);
        }
        cascade.push_stage(Stage::new(rules, threshold));
    }

    if let Some((line, _)) = records.next() {
        return Err(ModelError::TrailingData { line });
    }
    cascade.validate()?;
    Ok(cascade)
}

fn parse_field<T: FromStr>(line: usize, tok: &str, what: &str) -> Result<T, ModelError> {
    tok.parse().map_err(|_| ModelError::Parse {
        line,
        reason: format!("invalid {what} '{tok}'"),
    })
}

/// Non-empty, non-comment lines split into tokens, with 1-based line numbers.
struct Records<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl<'a> Records<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
        }
    }

    fn next(&mut self) -> Option<(usize, Vec<&'a str>)> {
        for (idx, raw) in self.lines.by_ref() {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return Some((idx + 1, trimmed.split_ascii_whitespace().collect()));
        }
        None
    }

    /// Next record, which must start with `keyword` and have exactly `len` tokens.
    fn expect_record(
        &mut self,
        expected: &'static str,
        keyword: &str,
        len: usize,
    ) -> Result<(usize, Vec<&'a str>), ModelError> {
        let (line, fields) = self.next().ok_or(ModelError::UnexpectedEnd { expected })?;
        if fields[0] != keyword {
            return Err(ModelError::Parse {
                line,
                reason: format!("expected '{keyword}' record, found '{}'", fields[0]),
            });
        }
        if fields.len() != len {
            return Err(ModelError::Parse {
                line,
                reason: format!(
                    "'{keyword}' record needs {} values, found {}",
                    len - 1,
                    fields.len() - 1
                ),
            });
        }
        Ok((line, fields))
    }
}

/// Flat whitespace token stream for the legacy layout.
struct Tokens<'a> {
    inner: Box<dyn Iterator<Item = (usize, &'a str)> + 'a>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        let inner = text
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim_start().starts_with('#'))
            .flat_map(|(idx, l)| l.split_ascii_whitespace().map(move |t| (idx + 1, t)));
        Self {
            inner: Box::new(inner),
        }
    }

    fn next(&mut self) -> Option<(usize, &'a str)> {
        self.inner.next()
    }

    fn parse_at<T: FromStr>(&mut self, what: &'static str) -> Result<(usize, T), ModelError> {
        let (line, tok) = self
            .next()
            .ok_or(ModelError::UnexpectedEnd { expected: what })?;
        Ok((line, parse_field(line, tok, what)?))
    }

    fn parse<T: FromStr>(&mut self, what: &'static str) -> Result<T, ModelError> {
        self.parse_at(what).map(|(_, v)| v)
    }
}
