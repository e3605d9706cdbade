use anyhow::{Context, Result, bail};
use mailprobe_lib::{Outcome, Validity};

use std::io::Write;

use crate::args::Cli;

pub fn write_reports(rows: &[Outcome], cli: &Cli) -> Result<()> {
    let report = render(rows, &cli.format)?;
    match &cli.out {
        Some(path) => write_all_atomically(path, report.as_bytes()),
        None => {
            print!("{report}");
            Ok(())
        }
    }
}

pub fn any_not_valid(rows: &[Outcome]) -> bool {
    rows.iter().any(|row| row.valid != Validity::Valid)
}

fn render(rows: &[Outcome], format: &str) -> Result<String> {
    match format {
        "human" => Ok(render_human(rows)),
        "json" => render_json(rows),
        "ndjson" => render_ndjson(rows),
        other => bail!("unknown --format '{other}', use: human|json|ndjson"),
    }
}

fn render_human(rows: &[Outcome]) -> String {
    let mut out = String::new();
    for row in rows {
        let tag = match row.valid {
            Validity::Valid => "[VALID]  ",
            Validity::Invalid => "[INVALID]",
            Validity::Unknown => "[UNKNOWN]",
        };
        out.push_str(&format!("{tag} {row}\n"));
    }
    out
}

#[cfg(feature = "with-serde")]
fn render_json(rows: &[Outcome]) -> Result<String> {
    let mut s = serde_json::to_string_pretty(rows)?;
    s.push('\n');
    Ok(s)
}

#[cfg(feature = "with-serde")]
fn render_ndjson(rows: &[Outcome]) -> Result<String> {
    let mut s = String::new();
    for row in rows {
        s.push_str(&serde_json::to_string(row)?);
        s.push('\n');
    }
    Ok(s)
}

#[cfg(not(feature = "with-serde"))]
fn render_json(_rows: &[Outcome]) -> Result<String> {
    bail!("format=json nécessite la feature 'with-serde'")
}

#[cfg(not(feature = "with-serde"))]
fn render_ndjson(_rows: &[Outcome]) -> Result<String> {
    bail!("format=ndjson nécessite la feature 'with-serde'")
}

fn write_all_atomically(path: &str, bytes: &[u8]) -> Result<()> {
    let tmp = format!("{path}.tmp");
    {
        let mut f = std::fs::File::create(&tmp).with_context(|| format!("create {tmp}"))?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path).with_context(|| format!("rename {tmp} -> {path}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use mailprobe_lib::Settled;

    fn skipped(address: &str) -> Outcome {
        Outcome::normalize(
            address,
            &Settled::Skipped {
                reason: "invalid email syntax: must contain exactly one '@'",
            },
        )
    }

    #[test]
    fn human_report_tags_each_row() {
        let report = render(&[skipped("nobody")], "human").expect("human");
        assert!(report.starts_with("[UNKNOWN] nobody valid=unknown"));
        assert!(report.ends_with('\n'));
        assert!(render(&[], "xml").is_err());
    }

    #[test]
    fn human_report_honours_out_file() {
        let name = format!("mailprobe-human-{}.txt", std::process::id());
        let path = std::env::temp_dir().join(name);
        let path_str = path.to_str().expect("utf-8 temp path");
        let args = ["mailprobe-cli", "--out", path_str, "--format", "human"];
        let cli = <Cli as Parser>::try_parse_from(args).expect("parse");

        let row = skipped("nobody");
        write_reports(std::slice::from_ref(&row), &cli).expect("written");

        let written = std::fs::read_to_string(&path).expect("report file");
        assert_eq!(written, format!("[UNKNOWN] {row}\n"));
        std::fs::remove_file(&path).ok();
    }
}
