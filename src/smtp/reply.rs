use std::fmt;

/// One complete server reply: the status code and its text. Multi-line
/// replies keep the code of their final line and the text of every line.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerReply {
    pub code: u16,
    pub text: String,
}

impl ServerReply {
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }
}

impl fmt::Display for ServerReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.text.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.text)
        }
    }
}

struct ReplyLine {
    code: u16,
    continued: bool,
    text: String,
}

fn parse_line(raw: &[u8]) -> Option<ReplyLine> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches(['\r', '\n']);
    let digits = line.get(..3)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let code = digits.parse::<u16>().ok().filter(|code| (100..600).contains(code))?;
    let continued = line.as_bytes().get(3) == Some(&b'-');
    let text = line.get(4..).unwrap_or_default().trim().to_string();
    Some(ReplyLine {
        code,
        continued,
        text,
    })
}

/// Accumulates raw chunks until a full reply is available.
///
/// A reply is complete once the buffered bytes reach a line feed on a line
/// that is not a `NNN-` continuation. Lines without a status code are
/// dropped.
#[derive(Debug, Default)]
pub struct ReplyBuffer {
    pending: Vec<u8>,
}

impl ReplyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Removes and returns the first complete reply, if any.
    pub fn next_reply(&mut self) -> Option<ServerReply> {
        let mut lines: Vec<ReplyLine> = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.pending[consumed..].iter().position(|b| *b == b'\n') {
            let start = consumed;
            consumed += offset + 1;
            match parse_line(&self.pending[start..consumed]) {
                Some(line) if line.continued => lines.push(line),
                Some(line) => {
                    lines.push(line);
                    self.pending.drain(..consumed);
                    return Some(assemble(lines));
                }
                None => {
                    tracing::warn!(
                        line = %String::from_utf8_lossy(&self.pending[start..consumed]).trim_end(),
                        "ignoring line without status code"
                    );
                    if lines.is_empty() {
                        self.pending.drain(..consumed);
                        consumed = 0;
                    }
                }
            }
        }
        None
    }
}

fn assemble(lines: Vec<ReplyLine>) -> ServerReply {
    let code = lines.last().map(|line| line.code).unwrap_or_default();
    let text = lines
        .into_iter()
        .map(|line| line.text)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    ServerReply { code, text }
}
