use super::DialogueStage;

/// Per-stage reading of a reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Expected reply, move to the next command.
    Advance,
    /// Transient failure, deliverability unknown.
    SoftBounce,
    /// Permanent rejection.
    HardBounce,
    /// The recipient was accepted.
    Success,
}

/// Maps `code` to a [`Verdict`] for the given stage.
///
/// `None` means the code is not listed for that stage; the dialogue keeps
/// waiting for another reply. The catch-all probe uses the RCPT row.
pub fn classify(stage: DialogueStage, code: u16) -> Option<Verdict> {
    use DialogueStage::{Ehlo, Greet, Mail, Rcpt, RcptProbe};
    use Verdict::{Advance, HardBounce, SoftBounce, Success};

    let verdict = match (stage, code) {
        (Greet, 220) => Advance,
        (Greet, 421) => SoftBounce,

        (Ehlo, 250) => Advance,
        (Ehlo, 421) => SoftBounce,
        (Ehlo, 500 | 501 | 504) => HardBounce,

        (Mail, 250) => Advance,
        (Mail, 421 | 451 | 452) => SoftBounce,
        (Mail, 500 | 501 | 552) => HardBounce,

        (Rcpt | RcptProbe, 250 | 251) => Success,
        (Rcpt | RcptProbe, 421 | 450 | 451 | 452) => SoftBounce,
        (Rcpt | RcptProbe, 500 | 501 | 503 | 550 | 551 | 552 | 553) => HardBounce,

        _ => return None,
    };
    Some(verdict)
}
