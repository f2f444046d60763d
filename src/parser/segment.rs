/// Any line containing this run closes a block, so Kindle's ten-`=` line and
/// shorter variants down to eight all split.
pub const SEPARATOR: &str = "========";
const BOM: char = '\u{feff}';

/// Lines of one clipping between two separator lines, already trimmed.
/// Blank lines are kept so that fields stay at fixed positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub lines: Vec<String>,
}

impl RawBlock {
    pub fn line(&self, idx: usize) -> Option<&str> {
        self.lines.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }
}

/// Split the export into raw blocks on the separator line.
pub fn segment_blocks(text: &str) -> Vec<RawBlock> {
    let mut blocks = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in text.split('\n') {
        if line.contains(SEPARATOR) {
            if !current.is_empty() {
                blocks.push(RawBlock {
                    lines: std::mem::take(&mut current),
                });
            }
            continue;
        }
        current.push(clean_line(line).to_string());
    }

    // Tail without a closing separator
    if !current.is_empty() {
        blocks.push(RawBlock { lines: current });
    }

    blocks
}

/// Trim surrounding whitespace (including a CR) and any leading BOM.
pub fn clean_line(line: &str) -> &str {
    line.trim().trim_start_matches(BOM).trim()
}
