//! Delimiter detection from a bounded file prefix.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::config::PipelineConfig;

use super::decode_legacy;

/// Share of sampled lines that must agree on a candidate's per-line count.
const MIN_CONSISTENCY: f64 = 0.9;

/// Picks the field delimiter of a raw table file.
///
/// A candidate qualifies when its most common per-line count (outside double quotes) is non-zero
/// and at least 90% of the sampled lines share it. The most consistent candidate wins; ties go to
/// the earlier candidate. Anything else falls back to the default, so sniffing never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimiterSniffer {
    pub sample_bytes: usize,
    pub candidates: Vec<u8>,
    pub default: u8,
}

impl DelimiterSniffer {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            sample_bytes: config.sniff_sample_bytes,
            candidates: config.delimiter_candidate_bytes(),
            default: config.default_delimiter_byte(),
        }
    }

    /// Sniffs the file at `path`; unreadable files get the default delimiter.
    pub fn sniff_path(&self, path: &Path) -> u8 {
        match self.read_sample(path) {
            Ok((sample, truncated)) => self.sniff_sample(&sample, truncated),
            Err(err) => {
                debug!(
                    path = %path.display(),
                    error = %err,
                    "sniff sample unreadable, using default"
                );
                self.default
            }
        }
    }

    /// Sniffs an in-memory sample. `truncated` marks a sample cut at the byte limit, whose last
    /// line is incomplete.
    pub fn sniff_sample(&self, sample: &[u8], truncated: bool) -> u8 {
        self.detect(sample, truncated).unwrap_or(self.default)
    }

    fn read_sample(&self, path: &Path) -> std::io::Result<(Vec<u8>, bool)> {
        let limit = self.sample_bytes as u64;
        let mut buf = Vec::with_capacity(self.sample_bytes + 1);
        File::open(path)?.take(limit + 1).read_to_end(&mut buf)?;
        let truncated = buf.len() > self.sample_bytes;
        buf.truncate(self.sample_bytes);
        Ok((buf, truncated))
    }

    fn detect(&self, sample: &[u8], truncated: bool) -> Option<u8> {
        let text = decode_legacy(sample);
        let mut lines: Vec<&str> = text.split('\n').collect();
        if truncated && lines.len() > 1 {
            lines.pop();
        }
        let lines: Vec<&str> = lines
            .into_iter()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty())
            .collect();
        if lines.is_empty() {
            return None;
        }

        let mut best: Option<(u8, f64)> = None;
        for &candidate in &self.candidates {
            let counts: Vec<usize> = lines
                .iter()
                .map(|line| count_outside_quotes(line, candidate))
                .collect();
            let Some((modal, agreeing)) = modal_count(&counts) else {
                continue;
            };
            if modal == 0 {
                continue;
            }
            let consistency = agreeing as f64 / counts.len() as f64;
            if consistency < MIN_CONSISTENCY {
                continue;
            }
            if best.is_none_or(|(_, score)| consistency > score) {
                best = Some((candidate, consistency));
            }
        }
        best.map(|(delimiter, _)| delimiter)
    }
}

fn count_outside_quotes(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for b in line.bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
        } else if b == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

/// Most frequent value and its frequency; ties resolve to the larger count.
fn modal_count(counts: &[usize]) -> Option<(usize, usize)> {
    let mut freq: HashMap<usize, usize> = HashMap::new();
    for &c in counts {
        *freq.entry(c).or_default() += 1;
    }
    freq.into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)))
}

#[cfg(test)]
mod tests {
    use super::DelimiterSniffer;
    use std::fs;

    fn sniffer() -> DelimiterSniffer {
        DelimiterSniffer {
            sample_bytes: 1024,
            candidates: vec![b';', b',', b'\t', b'|'],
            default: b';',
        }
    }

    #[test]
    fn detects_semicolon_with_commas_inside_quotes() {
        let sample = b"\"01\";\"ACME, LTDA\";\"2\"\n\"02\";\"FOO, BAR, BAZ\";\"3\"\n";
        assert_eq!(sniffer().sniff_sample(sample, false), b';');
    }

    #[test]
    fn detects_pipe_and_tab() {
        assert_eq!(sniffer().sniff_sample(b"a|b|c\nd|e|f\n", false), b'|');
        assert_eq!(sniffer().sniff_sample(b"a\tb\nc\td\n", false), b'\t');
    }

    #[test]
    fn falls_back_to_default_without_a_consistent_candidate() {
        assert_eq!(sniffer().sniff_sample(b"", false), b';');
        assert_eq!(sniffer().sniff_sample(b"single column\nvalues only\n", false), b';');
        // Comma counts disagree on every line.
        assert_eq!(sniffer().sniff_sample(b"a,b\nc,d,e,f\ng\nh,i,j\n", false), b';');
    }

    #[test]
    fn ties_go_to_the_earlier_candidate() {
        // Both ';' and ',' appear once per line.
        assert_eq!(sniffer().sniff_sample(b"a;b,c\nd;e,f\n", false), b';');
        let comma_first = DelimiterSniffer {
            candidates: vec![b',', b';'],
            ..sniffer()
        };
        assert_eq!(comma_first.sniff_sample(b"a;b,c\nd;e,f\n", false), b',');
    }

    #[test]
    fn truncated_trailing_line_is_ignored() {
        // The cut-off last line would break comma consistency.
        let sample = b"a,b,c\nd,e,f\ng,h,i\nj,k";
        assert_eq!(sniffer().sniff_sample(sample, true), b',');
    }

    #[test]
    fn latin1_bytes_do_not_break_detection() {
        let sample = b"\"S\xc3O PAULO\";\"35\"\n\"BRAS\xcdLIA\";\"53\"\n";
        assert_eq!(sniffer().sniff_sample(sample, false), b';');
    }

    #[test]
    fn sniff_path_reads_only_the_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("F.K03200$Z.D50111.CNAECSV");
        let mut body = String::new();
        for i in 0..200 {
            body.push_str(&format!("\"{i:07}\"|\"descricao {i}\"\n"));
        }
        fs::write(&path, body).unwrap();

        let small = DelimiterSniffer {
            sample_bytes: 64,
            ..sniffer()
        };
        assert_eq!(small.sniff_path(&path), b'|');
        assert_eq!(sniffer().sniff_path(&dir.path().join("missing")), b';');
    }
}
