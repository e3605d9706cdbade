use std::fmt;

/// Steps of the probing dialogue. The dialogue only ever moves forward
/// through this list.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DialogueStage {
    Connect,
    Greet,
    Ehlo,
    Mail,
    Rcpt,
    RcptProbe,
    Quit,
    Closed,
}

impl DialogueStage {
    /// Name reported at the result boundary. The catch-all probe is a RCPT
    /// command on the wire and reports as such.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONN",
            Self::Greet => "GREET",
            Self::Ehlo => "EHLO",
            Self::Mail => "MAIL",
            Self::Rcpt | Self::RcptProbe => "RCPT",
            Self::Quit => "QUIT",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for DialogueStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
