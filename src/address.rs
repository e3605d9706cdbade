//! Syntax pre-flight for target addresses. Nothing here touches the network.

use std::fmt;

use thiserror::Error;

const MAX_ADDRESS_LEN: usize = 254;
const MAX_LOCAL_LEN: usize = 64;
const MAX_LABEL_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid email syntax: {}", .reasons.join("; "))]
pub struct AddressError {
    pub reasons: Vec<String>,
}

/// A syntactically valid address, domain already in ASCII form.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub local: String,
    pub domain: String,
}

impl Mailbox {
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let input = address.trim();
        let mut reasons = Vec::new();

        if input.len() > MAX_ADDRESS_LEN {
            reasons.push(format!("total length {} > {MAX_ADDRESS_LEN}", input.len()));
        }

        let Some((local, domain)) = input.rsplit_once('@') else {
            reasons.push("must contain exactly one '@'".to_string());
            return Err(AddressError { reasons });
        };

        if local.is_empty() || local.len() > MAX_LOCAL_LEN {
            reasons.push(format!(
                "local part length {} invalid (1..={MAX_LOCAL_LEN})",
                local.len()
            ));
        } else if !is_quoted(local) && local.contains('@') {
            reasons.push("must contain exactly one '@'".to_string());
        } else if !is_local_valid(local) {
            reasons.push("invalid local part".to_string());
        }

        let ascii_domain = check_domain(domain, &mut reasons);

        if reasons.is_empty() {
            Ok(Self {
                local: local.to_string(),
                domain: ascii_domain,
            })
        } else {
            Err(AddressError { reasons })
        }
    }

    /// Same local part at the same domain, used for the catch-all probe.
    pub fn sibling(&self, local: &str) -> String {
        format!("{local}@{}", self.domain)
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

pub fn is_well_formed(address: &str) -> bool {
    Mailbox::parse(address).is_ok()
}

fn is_quoted(local: &str) -> bool {
    local.len() >= 2 && local.starts_with('"') && local.ends_with('"')
}

fn is_local_valid(local: &str) -> bool {
    if is_quoted(local) {
        return !local[1..local.len() - 1].contains(['"', '\r', '\n']);
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    local.chars().all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-/=?^_`{|}~.".contains(c))
}

/// Returns the ASCII form of `domain`, pushing a reason for each defect.
fn check_domain(domain: &str, reasons: &mut Vec<String>) -> String {
    let ascii = match idna::domain_to_ascii(domain) {
        Ok(ascii) => ascii.to_ascii_lowercase(),
        Err(_) => {
            reasons.push("domain punycode conversion failed".to_string());
            return String::new();
        }
    };
    if ascii.is_empty() {
        reasons.push("domain is empty".to_string());
        return ascii;
    }
    if !ascii.contains('.') {
        reasons.push("domain must contain at least one dot".to_string());
    }
    for label in ascii.split('.') {
        if label.is_empty() {
            reasons.push("empty domain label".to_string());
        } else if label.len() > MAX_LABEL_LEN {
            reasons.push(format!(
                "domain label '{label}' length {} > {MAX_LABEL_LEN}",
                label.len()
            ));
        } else if label.starts_with('-') || label.ends_with('-') {
            reasons.push(format!("domain label '{label}' cannot start/end with '-'"));
        } else if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            reasons.push(format!("domain label '{label}' has invalid chars"));
        }
    }
    ascii
}
