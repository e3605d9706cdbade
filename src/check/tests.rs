use std::cell::Cell;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use trust_dns_resolver::error::ResolveError;

use super::{CheckOptions, check_with, target_host};
use crate::address::Mailbox;
use crate::error::CheckError;
use crate::mx::{
    DnsServers, Exchanger, ResolutionError, host_addrs_with, resolve_host, resolve_with,
    tests::StubResolver,
};
use crate::outcome::{CatchAll, Validity};
use crate::smtp::DialogueStage;

fn no_dns(_: &str, _: Option<Duration>) -> Result<Vec<Exchanger>, ResolutionError> {
    panic!("DNS must not be queried")
}

fn no_addrs(_: &str, _: Option<Duration>) -> Result<Vec<SocketAddr>, ResolutionError> {
    panic!("exchanger address must not be resolved")
}

fn no_mx(_: &str) -> Result<Vec<Exchanger>, CheckError> {
    panic!("DNS must not be queried")
}

fn mailbox() -> Mailbox {
    Mailbox::parse("user@example.com").expect("valid")
}

#[test]
fn invalid_syntax_short_circuits_without_network() {
    let outcome = check_with("invalid.mail.com", &CheckOptions::default(), no_dns, no_addrs)
        .expect("outcome");
    assert_eq!(outcome.valid, Validity::Unknown);
    assert_eq!(outcome.catch_all, CatchAll::Unknown);
    assert_eq!(outcome.last_stage, "conn");
    assert_eq!(outcome.last_code, None);
    assert_eq!(
        outcome.last_message.as_deref(),
        Some("invalid email syntax: must contain exactly one '@'")
    );
}

#[test]
fn line_break_in_sender_fails_before_network() {
    let options = CheckOptions {
        sender: "info@example.org\r\nDATA".to_string(),
        ..CheckOptions::default()
    };
    let err = check_with("user@example.com", &options, no_dns, no_addrs).expect_err("rejected");
    assert!(matches!(err, CheckError::InvalidOption { option: "sender" }));
}

#[test]
fn domain_without_mx_records_fails() {
    let stub = StubResolver::new(|domain| {
        assert_eq!(domain, "example.com");
        Ok(Vec::new())
    });
    let err = check_with(
        "user@example.com",
        &CheckOptions::default(),
        |domain, _| resolve_with(&stub, domain),
        no_addrs,
    )
    .expect_err("no exchangers");
    assert!(matches!(
        err,
        CheckError::Resolution(ResolutionError::NoMxRecords)
    ));
    assert_eq!(err.to_string(), "no MX records");
}

#[test]
fn lookup_failure_fails_with_resolution_error() {
    let stub = StubResolver::new(|_| Err(ResolveError::from("no connections available")));
    let err = check_with(
        "user@example.com",
        &CheckOptions::default(),
        |domain, _| resolve_with(&stub, domain),
        no_addrs,
    )
    .expect_err("lookup fails");
    assert_eq!(err.to_string(), "error while resolving MX");
}

#[test]
fn exchanger_address_lookup_shares_the_budget() {
    let mx_budget = Cell::new(None);
    let host_budget = Cell::new(None);
    let stub = StubResolver::new(|_| Ok(vec![Exchanger::new(10, "mx1.example.com")]))
        .with_hosts(|host| {
            assert_eq!(host, "mx1.example.com");
            Ok(Vec::new())
        });
    let err = check_with(
        "user@example.com",
        &CheckOptions::default(),
        |domain, timeout| {
            mx_budget.set(timeout);
            resolve_with(&stub, domain)
        },
        |host, timeout| {
            host_budget.set(timeout);
            host_addrs_with(&stub, host, 25)
        },
    )
    .expect_err("no address");
    assert_eq!(err.to_string(), "no address for exchanger host mx1.example.com");

    let configured = Duration::from_millis(10_000);
    let mx_budget = mx_budget.get().expect("bounded");
    let host_budget = host_budget.get().expect("bounded");
    assert!(mx_budget <= configured);
    assert!(host_budget <= mx_budget);
}

#[test]
fn slow_mx_lookup_consumes_the_budget() {
    let options = CheckOptions {
        timeout_ms: 20,
        ..CheckOptions::default()
    };
    let err = check_with(
        "user@example.com",
        &options,
        |_, _| {
            thread::sleep(Duration::from_millis(60));
            Ok(vec![Exchanger::new(10, "mx1.example.com")])
        },
        no_addrs,
    )
    .expect_err("budget spent");
    assert!(err.is_timeout());
    assert_eq!(err.stage(), DialogueStage::Connect);
}

#[test]
fn zero_timeout_leaves_lookups_unbounded() {
    let options = CheckOptions {
        timeout_ms: 0,
        ..CheckOptions::default()
    };
    let err = check_with(
        "user@example.com",
        &options,
        |_, timeout| {
            assert_eq!(timeout, None);
            Err(ResolutionError::NoMxRecords)
        },
        no_addrs,
    )
    .expect_err("no exchangers");
    assert_eq!(err.to_string(), "no MX records");
}

#[test]
fn host_override_skips_resolution() {
    let options = CheckOptions {
        smtp_host: Some("smtp.example.net".to_string()),
        exchangers: Some(vec![Exchanger::new(0, "ignored.example.net")]),
        ..CheckOptions::default()
    };
    let host = target_host(&mailbox(), &options, no_mx).expect("host");
    assert_eq!(host, "smtp.example.net");
}

#[test]
fn exchanger_override_uses_lowest_priority() {
    let options = CheckOptions {
        exchangers: Some(vec![
            Exchanger::new(20, "mx2.example.com"),
            Exchanger::new(5, "mx1.example.com"),
        ]),
        ..CheckOptions::default()
    };
    let host = target_host(&mailbox(), &options, no_mx).expect("host");
    assert_eq!(host, "mx1.example.com");
}

#[test]
fn resolved_exchangers_pick_first_host() {
    let stub = StubResolver::new(|_| {
        Ok(vec![
            Exchanger::new(30, "mx3.example.com"),
            Exchanger::new(10, "mx1.example.com"),
        ])
    });
    let host = target_host(&mailbox(), &CheckOptions::default(), |domain| {
        Ok(resolve_with(&stub, domain)?)
    })
    .expect("host");
    assert_eq!(host, "mx1.example.com");
}

fn spawn_mock_server(
    banner: &'static str,
    script: Vec<(&'static str, &'static str)>,
) -> (u16, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
    let port = listener.local_addr().expect("addr").port();
    let (ready_tx, ready_rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        ready_tx.send(()).ok();
        if let Ok((mut stream, _)) = listener.accept() {
            let _ = handle_session(&mut stream, banner, script);
        }
    });
    ready_rx.recv().expect("server ready");
    (port, handle)
}

fn handle_session(
    stream: &mut TcpStream,
    banner: &str,
    script: Vec<(&'static str, &'static str)>,
) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    if banner.is_empty() {
        // hold the connection open and say nothing
        thread::sleep(Duration::from_millis(500));
        return Ok(());
    }
    stream.write_all(banner.as_bytes())?;
    stream.flush()?;
    for (expected, response) in script {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        assert!(
            line.starts_with(expected),
            "expected command starting with '{expected}', got '{line}'"
        );
        stream.write_all(response.as_bytes())?;
        stream.flush()?;
    }
    Ok(())
}

fn loopback_addrs(
    port: u16,
) -> impl FnOnce(&str, Option<Duration>) -> Result<Vec<SocketAddr>, ResolutionError> {
    move |host, timeout| resolve_host(host, port, &DnsServers::System, timeout)
}

fn loopback_options(port: u16, catch_all_probe: bool) -> CheckOptions {
    CheckOptions {
        port,
        smtp_host: Some("127.0.0.1".to_string()),
        catch_all_probe,
        probe_local_part: Some("zz-probe".to_string()),
        timeout_ms: 2_000,
        ..CheckOptions::default()
    }
}

#[test]
#[ignore = "requires loopback TCP binding"]
fn accepted_mailbox_over_tcp() {
    let (port, handle) = spawn_mock_server(
        "220 mock.smtp.test ESMTP\r\n",
        vec![
            ("EHLO mail.example.org", "250-mock.example\r\n250 PIPELINING\r\n"),
            ("MAIL FROM:<info@example.org>", "250 2.1.0 Ok\r\n"),
            ("RCPT TO:<user@example.com>", "250 2.1.5 Ok\r\n"),
            ("QUIT", "221 2.0.0 Bye\r\n"),
        ],
    );
    let outcome = check_with(
        "user@example.com",
        &loopback_options(port, false),
        no_dns,
        loopback_addrs(port),
    )
    .expect("outcome");
    assert_eq!(outcome.valid, Validity::Valid);
    assert_eq!(outcome.catch_all, CatchAll::NotAttempted);
    assert_eq!(outcome.last_stage, "RCPT");
    assert_eq!(outcome.last_code, Some(250));
    handle.join().expect("server thread");
}

#[test]
#[ignore = "requires loopback TCP binding"]
fn rejected_mailbox_over_tcp() {
    let (port, handle) = spawn_mock_server(
        "220 mock.smtp.test ESMTP\r\n",
        vec![
            ("EHLO", "250 mock.example\r\n"),
            ("MAIL FROM:", "250 Ok\r\n"),
            (
                "RCPT TO:",
                "550 Action not taken: mailbox unavailable (not found)\r\n",
            ),
            ("QUIT", ""),
        ],
    );
    let outcome = check_with(
        "user@example.com",
        &loopback_options(port, false),
        no_dns,
        loopback_addrs(port),
    )
    .expect("outcome");
    assert_eq!(outcome.valid, Validity::Invalid);
    assert_eq!(outcome.last_code, Some(550));
    assert_eq!(
        outcome.last_message.as_deref(),
        Some("Action not taken: mailbox unavailable (not found)")
    );
    handle.join().expect("server thread");
}

#[test]
#[ignore = "requires loopback TCP binding"]
fn catch_all_domain_over_tcp() {
    let (port, handle) = spawn_mock_server(
        "220 mock.smtp.test ESMTP\r\n",
        vec![
            ("EHLO", "250 mock.example\r\n"),
            ("MAIL FROM:", "250 Ok\r\n"),
            ("RCPT TO:<user@example.com>", "250 Ok\r\n"),
            ("RCPT TO:<zz-probe@example.com>", "250 Ok\r\n"),
            ("QUIT", "221 Bye\r\n"),
        ],
    );
    let outcome = check_with(
        "user@example.com",
        &loopback_options(port, true),
        no_dns,
        loopback_addrs(port),
    )
    .expect("outcome");
    assert_eq!(outcome.valid, Validity::Unknown);
    assert_eq!(outcome.catch_all, CatchAll::Yes);
    handle.join().expect("server thread");
}

#[test]
#[ignore = "requires loopback TCP binding"]
fn silent_server_times_out_without_outcome() {
    let (port, handle) = spawn_mock_server("", Vec::new());
    let options = CheckOptions {
        timeout_ms: 200,
        ..loopback_options(port, false)
    };
    let err = check_with("user@example.com", &options, no_dns, loopback_addrs(port))
        .expect_err("timeout");
    assert!(err.is_timeout());
    assert_eq!(err.to_string(), "connection timed out");
    handle.join().expect("server thread");
}
