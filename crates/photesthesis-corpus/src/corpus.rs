//! The persistent transcript store.
//!
//! A corpus maps test names to ordered sets of transcripts, at most one per
//! plan. The on-disk form is plain UTF-8 text: transcript blocks separated
//! by blank lines, each block a `#### transcript:` header followed by
//! `# comment`, `param:`, `track:`, and `check:` lines. The stored plan
//! hash is recomputed on load; a mismatch is a fatal parse error.

use crate::error::{CorpusError, CorpusParseError, CorpusResult};
use crate::plan::{Plan, TestName};
use crate::transcript::{Transcript, VarRecord};
use photesthesis_value::{Scanner, Symbol, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

#[derive(Debug)]
pub struct Corpus {
    path: Option<PathBuf>,
    save_on_drop: bool,
    dirty: bool,
    transcripts: BTreeMap<TestName, BTreeSet<Transcript>>,
}

impl Corpus {
    /// An unbacked corpus; nothing is saved on drop.
    pub fn in_memory() -> Corpus {
        Corpus {
            path: None,
            save_on_drop: false,
            dirty: false,
            transcripts: BTreeMap::new(),
        }
    }

    /// Open a file-backed corpus, loading it if the file exists. The corpus
    /// is rewritten on drop if it was modified.
    pub fn open(path: impl AsRef<Path>) -> CorpusResult<Corpus> {
        Corpus::open_with(path, true)
    }

    pub fn open_with(path: impl AsRef<Path>, save_on_drop: bool) -> CorpusResult<Corpus> {
        let path = path.as_ref().to_path_buf();
        let mut corpus = Corpus {
            path: Some(path.clone()),
            save_on_drop,
            dirty: false,
            transcripts: BTreeMap::new(),
        };
        if path.exists() {
            let text = fs::read_to_string(&path).map_err(|source| CorpusError::Io {
                path: path.clone(),
                source,
            })?;
            corpus.load_text(&text, &path)?;
            corpus.dirty = false;
        }
        Ok(corpus)
    }

    pub fn set_save_on_drop(&mut self, save_on_drop: bool) {
        self.save_on_drop = save_on_drop;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn test_names(&self) -> impl Iterator<Item = &TestName> {
        self.transcripts.keys()
    }

    pub fn has_transcripts(&self, test_name: &TestName) -> bool {
        self.transcripts
            .get(test_name)
            .is_some_and(|set| !set.is_empty())
    }

    pub fn transcript_count(&self, test_name: &TestName) -> usize {
        self.transcripts.get(test_name).map_or(0, |set| set.len())
    }

    pub fn transcripts(&self, test_name: &TestName) -> impl Iterator<Item = &Transcript> + '_ {
        self.transcripts
            .get(test_name)
            .into_iter()
            .flat_map(|set| set.iter())
    }

    pub fn contains_transcript(&self, ts: &Transcript) -> bool {
        self.transcripts
            .get(ts.test_name())
            .is_some_and(|set| set.contains(ts))
    }

    /// The stored transcript with the given plan, if any.
    pub fn find_by_plan(&self, plan: &Plan) -> Option<&Transcript> {
        self.transcripts
            .get(plan.test_name())?
            .iter()
            .find(|ts| ts.plan() == plan)
    }

    /// Add a transcript whose plan is not yet present for its test.
    pub fn add_transcript(&mut self, ts: Transcript) -> CorpusResult<()> {
        if self.find_by_plan(ts.plan()).is_some() {
            return Err(CorpusError::DuplicatePlan {
                test: ts.test_name().clone(),
                hash: ts.plan().hash_code(),
            });
        }
        self.transcripts
            .entry(ts.test_name().clone())
            .or_default()
            .insert(ts);
        self.mark_dirty();
        Ok(())
    }

    /// Replace the stored transcript that shares `ts`'s plan.
    pub fn update_transcript(&mut self, ts: Transcript) -> CorpusResult<()> {
        let old = self
            .find_by_plan(ts.plan())
            .cloned()
            .ok_or_else(|| CorpusError::NoSuchPlan {
                test: ts.test_name().clone(),
                hash: ts.plan().hash_code(),
            })?;
        self.replace_transcript(&old, ts)
    }

    /// Swap one stored transcript for another under the same test name.
    pub fn replace_transcript(&mut self, old: &Transcript, new: Transcript) -> CorpusResult<()> {
        let missing = || CorpusError::NoSuchPlan {
            test: old.test_name().clone(),
            hash: old.plan().hash_code(),
        };
        let set = self
            .transcripts
            .get_mut(old.test_name())
            .ok_or_else(missing)?;
        if !set.remove(old) {
            return Err(missing());
        }
        set.insert(new);
        self.mark_dirty();
        Ok(())
    }

    /// Serialize every transcript in file order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for set in self.transcripts.values() {
            for ts in set {
                let _ = write!(out, "{}", ts);
            }
        }
        out
    }

    /// Rewrite the backing file if the corpus is dirty.
    pub fn save(&mut self) -> CorpusResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }
        fs::write(path, self.render()).map_err(|source| CorpusError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "corpus saved");
        self.dirty = false;
        Ok(())
    }

    fn load_text(&mut self, text: &str, path: &Path) -> CorpusResult<()> {
        let mut parser = BlockParser::new(path);
        let mut line_no = 0;
        for line in text.lines() {
            line_no += 1;
            parser.line(self, line_no, line)?;
        }
        parser.finish(self, line_no + 1)
    }
}

impl PartialEq for Corpus {
    fn eq(&self, other: &Self) -> bool {
        self.transcripts == other.transcripts
    }
}

impl Eq for Corpus {}

impl Drop for Corpus {
    fn drop(&mut self) {
        if self.save_on_drop {
            if let Err(e) = self.save() {
                error!("failed to save corpus on drop: {}", e);
            }
        }
    }
}

/// Line-by-line reader for the corpus file format.
struct BlockParser {
    path: PathBuf,
    block: Option<OpenBlock>,
}

struct OpenBlock {
    stored_hash: u64,
    plan: Plan,
    records: Vec<VarRecord>,
}

enum LineKind {
    Comment(String),
    Param(Symbol, Value),
    Record(VarRecord),
}

fn parse_fail(path: &Path, line_no: usize, source: CorpusParseError) -> CorpusError {
    CorpusError::Parse {
        path: path.to_path_buf(),
        line: line_no,
        source,
    }
}

impl BlockParser {
    fn new(path: &Path) -> BlockParser {
        BlockParser {
            path: path.to_path_buf(),
            block: None,
        }
    }

    fn line(&mut self, corpus: &mut Corpus, line_no: usize, line: &str) -> CorpusResult<()> {
        let trimmed = line.trim_end();
        if trimmed.trim().is_empty() {
            return self.close_block(corpus, line_no);
        }
        if let Some(rest) = trimmed.strip_prefix("#### ") {
            // A header also closes any block that lacked a blank separator.
            self.close_block(corpus, line_no)?;
            self.block = Some(self.parse_header(line_no, trimmed, rest)?);
            return Ok(());
        }
        let kind = self.classify(line_no, trimmed)?;
        let Some(block) = self.block.as_mut() else {
            return Err(parse_fail(
                &self.path,
                line_no,
                CorpusParseError::MalformedLine {
                    line: trimmed.to_string(),
                },
            ));
        };
        match kind {
            LineKind::Comment(text) => {
                if !text.is_empty() {
                    block.plan.add_comment(text);
                }
            }
            LineKind::Param(name, value) => {
                if !block.records.is_empty() {
                    return Err(parse_fail(
                        &self.path,
                        line_no,
                        CorpusParseError::ParamAfterRecords {
                            line: trimmed.to_string(),
                        },
                    ));
                }
                if matches!(
                    block.plan.add_param(name, value),
                    Err(CorpusError::DuplicateParam { .. })
                ) {
                    return Err(parse_fail(
                        &self.path,
                        line_no,
                        CorpusParseError::MalformedLine {
                            line: trimmed.to_string(),
                        },
                    ));
                }
            }
            LineKind::Record(record) => block.records.push(record),
        }
        Ok(())
    }

    fn classify(&self, line_no: usize, trimmed: &str) -> CorpusResult<LineKind> {
        if let Some(comment) = trimmed.strip_prefix('#') {
            return Ok(LineKind::Comment(comment.trim().to_string()));
        }
        if let Some(rest) = trimmed.strip_prefix("param:") {
            let (name, value) = self.parse_binding(line_no, rest)?;
            return Ok(LineKind::Param(name, value));
        }
        for (prefix, tracked) in [("check:", false), ("track:", true)] {
            if let Some(rest) = trimmed.strip_prefix(prefix) {
                let (name, value) = self.parse_binding(line_no, rest)?;
                return Ok(LineKind::Record(VarRecord {
                    name,
                    value,
                    tracked,
                }));
            }
        }
        Err(parse_fail(
            &self.path,
            line_no,
            CorpusParseError::MalformedLine {
                line: trimmed.to_string(),
            },
        ))
    }

    /// `<name> 0x<hex>` after the `#### ` prefix.
    fn parse_header(&self, line_no: usize, line: &str, rest: &str) -> CorpusResult<OpenBlock> {
        let malformed = || {
            parse_fail(
                &self.path,
                line_no,
                CorpusParseError::MalformedHeader {
                    line: line.to_string(),
                },
            )
        };
        let rest = rest.strip_prefix("transcript:").ok_or_else(malformed)?;
        let mut words = rest.split_whitespace();
        let name = words.next().ok_or_else(malformed)?;
        let hash_word = words.next().ok_or_else(malformed)?;
        if words.next().is_some() {
            return Err(malformed());
        }
        let digits = hash_word.strip_prefix("0x").ok_or_else(malformed)?;
        let stored_hash = u64::from_str_radix(digits, 16).map_err(|_| malformed())?;
        let name =
            Symbol::new(name).map_err(|e| parse_fail(&self.path, line_no, e.into()))?;
        if name.is_empty() {
            return Err(malformed());
        }
        Ok(OpenBlock {
            stored_hash,
            plan: Plan::new(name),
            records: Vec::new(),
        })
    }

    /// `<name> = <value>` after a keyword prefix.
    fn parse_binding(&self, line_no: usize, rest: &str) -> CorpusResult<(Symbol, Value)> {
        let mut scanner = Scanner::new(rest);
        let wrap = |e: photesthesis_value::ValueParseError| parse_fail(&self.path, line_no, e.into());
        let name = scanner.parse_symbol().map_err(wrap)?;
        scanner.expect('=').map_err(wrap)?;
        let value = scanner.parse_value().map_err(wrap)?;
        scanner.finish().map_err(wrap)?;
        Ok((name, value))
    }

    fn close_block(&mut self, corpus: &mut Corpus, line_no: usize) -> CorpusResult<()> {
        let Some(block) = self.block.take() else {
            return Ok(());
        };
        let computed = block.plan.hash_code();
        if computed != block.stored_hash {
            return Err(parse_fail(
                &self.path,
                line_no,
                CorpusParseError::HashMismatch {
                    stored: block.stored_hash,
                    computed,
                },
            ));
        }
        let mut ts = Transcript::new(block.plan);
        for record in block.records {
            ts.push_record(record);
        }
        corpus.add_transcript(ts)
    }

    fn finish(&mut self, corpus: &mut Corpus, line_no: usize) -> CorpusResult<()> {
        self.close_block(corpus, line_no)
    }
}
