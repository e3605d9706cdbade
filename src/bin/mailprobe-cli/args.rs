use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use mailprobe_lib::{CheckOptions, DnsServers, Exchanger};

#[derive(Parser)]
#[command(name = "mailprobe-cli", version)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Option<Commands>,

    /// lit des adresses depuis stdin (une par ligne)
    #[arg(long)]
    pub stdin: bool,

    /// écrit le rapport dans un fichier (au format choisi par --format)
    #[arg(long)]
    pub out: Option<String>,

    /// format: human|json|ndjson
    #[arg(long, default_value = "human", env = "MAILPROBE_FORMAT")]
    pub format: String,

    #[command(flatten)]
    pub probe: ProbeArgs,

    /// logs plus détaillés sur stderr (-v, -vv); RUST_LOG a priorité
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// teste une adresse
    Check { email: String },
}

#[derive(Args)]
pub struct ProbeArgs {
    /// port SMTP
    #[arg(long, default_value_t = 25, env = "MAILPROBE_PORT", global = true)]
    pub port: u16,

    /// enveloppe MAIL FROM (vide: postmaster@domaine)
    #[arg(long, default_value = "info@example.org", env = "MAILPROBE_SENDER", global = true)]
    pub sender: String,

    /// nom annoncé dans EHLO
    #[arg(long, default_value = "mail.example.org", env = "MAILPROBE_FQDN", global = true)]
    pub fqdn: String,

    /// timeout global (ms), 0 pour désactiver
    #[arg(
        long = "timeout-ms",
        default_value_t = 10_000,
        env = "MAILPROBE_TIMEOUT_MS",
        global = true
    )]
    pub timeout_ms: u64,

    /// interroge directement ce serveur SMTP (pas de résolution MX)
    #[arg(long = "smtp-host", env = "MAILPROBE_SMTP_HOST", global = true)]
    pub smtp_host: Option<String>,

    /// serveur DNS à utiliser, ip ou ip:port (répétable)
    #[arg(long = "dns", env = "MAILPROBE_DNS", value_delimiter = ',', global = true)]
    pub dns: Vec<String>,

    /// MX imposé au format PRIORITE:HOTE (répétable, pas de résolution MX)
    #[arg(long = "mx", global = true)]
    pub mx: Vec<String>,

    /// désactive la détection de domaine catch-all
    #[arg(long = "no-catch-all", global = true)]
    pub no_catch_all: bool,

    /// partie locale fixe pour la sonde catch-all (aléatoire sinon)
    #[arg(long = "probe-local", global = true)]
    pub probe_local: Option<String>,

    /// code RCPT supplémentaire considéré comme une acceptation
    #[arg(long = "accept-code", global = true)]
    pub accept_code: Option<u16>,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn clap_command() -> clap::Command {
        <Self as clap::CommandFactory>::command()
    }
}

impl ProbeArgs {
    pub fn to_options(&self) -> Result<CheckOptions> {
        let exchangers = if self.mx.is_empty() {
            None
        } else {
            Some(
                self.mx
                    .iter()
                    .map(|spec| parse_exchanger(spec))
                    .collect::<Result<Vec<_>>>()?,
            )
        };
        let dns = if self.dns.is_empty() {
            DnsServers::System
        } else {
            DnsServers::Custom(self.dns.clone())
        };

        Ok(CheckOptions {
            port: self.port,
            sender: self.sender.clone(),
            timeout_ms: self.timeout_ms,
            fqdn: self.fqdn.clone(),
            smtp_host: self.smtp_host.clone(),
            exchangers,
            dns,
            catch_all_probe: !self.no_catch_all,
            probe_local_part: self.probe_local.clone(),
            accept_code: self.accept_code,
        })
    }
}

pub fn parse_exchanger(spec: &str) -> Result<Exchanger> {
    let Some((priority, host)) = spec.split_once(':') else {
        bail!("invalid --mx '{spec}', expected PRIORITY:HOST");
    };
    let priority = priority
        .trim()
        .parse::<u16>()
        .with_context(|| format!("invalid MX priority in '{spec}'"))?;
    let host = host.trim();
    if host.is_empty() {
        bail!("invalid --mx '{spec}', host is empty");
    }
    Ok(Exchanger::new(priority, host))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mx_override() {
        let exchanger = parse_exchanger("10:mx1.example.com").expect("valid");
        assert_eq!(exchanger, Exchanger::new(10, "mx1.example.com"));
        assert!(parse_exchanger("mx1.example.com").is_err());
        assert!(parse_exchanger("ten:mx1.example.com").is_err());
        assert!(parse_exchanger("10:").is_err());
    }

    #[test]
    fn flags_map_to_options() {
        let cli = <Cli as Parser>::try_parse_from([
            "mailprobe-cli",
            "check",
            "user@example.com",
            "--no-catch-all",
            "--mx",
            "20:b.example.com",
            "--mx",
            "10:a.example.com",
            "--dns",
            "1.1.1.1,9.9.9.9:53",
        ])
        .expect("parse");
        let options = cli.probe.to_options().expect("options");
        assert!(!options.catch_all_probe);
        assert_eq!(options.exchangers.as_ref().map(Vec::len), Some(2));
        assert_eq!(
            options.dns,
            DnsServers::Custom(vec!["1.1.1.1".into(), "9.9.9.9:53".into()])
        );
    }
}
