use std::fs::File;
use std::io::Read;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use crate::{
    CaptureBuffer, CaptureConfig, Exec, ExecError, capture_output, capture_output_with_input,
};

const NO_ARGS: &[&str] = &[];

fn numbers(count: u32) -> String {
    (1..=count).map(|i| format!("{}\n", i)).collect()
}

#[test]
fn capture_echo() {
    let out = capture_output("echo", &["hello"]).unwrap();
    assert_eq!(out.as_bytes(), b"hello\n");
    assert_eq!(out.as_bytes_with_nul(), b"hello\n\0");
}

#[test]
fn capture_empty_output() {
    let out = capture_output("true", NO_ARGS).unwrap();
    assert!(out.is_empty());
    assert_eq!(out.as_bytes_with_nul(), b"\0");
}

#[test]
fn stderr_is_not_captured() {
    let out = capture_output("sh", &["-c", "echo out; echo err >&2"]).unwrap();
    assert_eq!(out.to_string_lossy(), "out\n");
}

#[test]
fn capture_missing_program() {
    let result = capture_output("nosuchcommand", NO_ARGS);
    assert!(matches!(result, Err(ExecError::NotFound(_))));
}

#[test]
fn capture_large_output() {
    // well past the initial buffer, with every line distinct so that lost or
    // repeated segments show up
    let expected = numbers(200_000);
    assert!(expected.len() > 1024 * 1024);
    for _ in 0..3 {
        let out = capture_output("seq", &["1", "200000"]).unwrap();
        assert_eq!(out.len(), expected.len());
        assert!(out.as_bytes() == expected.as_bytes());
    }
}

#[test]
fn capture_with_tiny_buffer() {
    let config = CaptureConfig {
        initial_capacity: 16,
        growth_increment: 8,
        read_chunk: 5,
        low_water: 3,
        ..Default::default()
    };
    let capture = Exec::cmd("seq")
        .args(["1", "2000"])
        .config(config)
        .capture()
        .unwrap();
    assert_eq!(capture.stdout_str(), numbers(2000));
}

#[test]
fn capture_slow_writer() {
    let out = capture_output("sh", &["-c", "echo a; sleep 0.2; echo b; sleep 0.2; echo c"])
        .unwrap();
    assert_eq!(out.as_bytes(), b"a\nb\nc\n");
}

#[test]
fn capture_with_input_roundtrip() {
    let out = capture_output_with_input("hello world", "cat", NO_ARGS).unwrap();
    assert_eq!(out.as_bytes(), b"hello world");
}

#[test]
fn capture_with_large_input() {
    let input: Vec<u8> = (0..3_000_000u32).map(|i| (i % 251) as u8).collect();
    let out = capture_output_with_input(&input, "cat", NO_ARGS).unwrap();
    assert!(out.as_bytes() == &input[..]);
}

#[test]
fn capture_with_empty_input() {
    let out = capture_output_with_input("", "cat", NO_ARGS).unwrap();
    assert!(out.is_empty());
}

#[test]
fn capture_with_input_filters() {
    let out = capture_output_with_input("b\nc\na\n", "sort", NO_ARGS).unwrap();
    assert_eq!(out.as_bytes(), b"a\nb\nc\n");
}

#[test]
fn capture_reports_exit_status() {
    let capture = Exec::cmd("sh")
        .args(["-c", "echo out; exit 3"])
        .capture()
        .unwrap();
    assert_eq!(capture.stdout_str(), "out\n");
    assert_eq!(capture.exit_status.unwrap().code(), Some(3));
    assert!(!capture.success());

    let capture = Exec::cmd("true").capture().unwrap();
    assert!(capture.success());
}

#[test]
fn capture_with_input_reports_exit_status() {
    let capture = Exec::cmd("sh")
        .args(["-c", "cat; exit 4"])
        .capture_with_input("data")
        .unwrap();
    assert_eq!(capture.stdout_str(), "data");
    assert_eq!(capture.exit_status.unwrap().code(), Some(4));
}

#[test]
fn capture_stderr_to_file() {
    let tmpdir = TempDir::new().unwrap();
    let tmpname = tmpdir.path().join("errors");
    let errfile = File::create(&tmpname).unwrap();
    let out = Exec::cmd("sh")
        .args(["-c", "echo out; echo err >&2"])
        .stderr(&errfile)
        .capture_output()
        .unwrap();
    assert_eq!(out.as_bytes(), b"out\n");
    let mut errors = String::new();
    File::open(&tmpname)
        .unwrap()
        .read_to_string(&mut errors)
        .unwrap();
    assert_eq!(errors, "err\n");
}

#[test]
fn capture_stdin_from_file() {
    let tmpdir = TempDir::new().unwrap();
    let tmpname = tmpdir.path().join("input");
    std::fs::write(&tmpname, b"from file").unwrap();
    let infile = File::open(&tmpname).unwrap();
    let out = Exec::cmd("cat").stdin(&infile).capture_output().unwrap();
    assert_eq!(out.as_bytes(), b"from file");
}

#[test]
fn timeout_kills_runaway() {
    let start = Instant::now();
    let result = Exec::cmd("sh")
        .args(["-c", "while :; do :; done"])
        .timeout(Duration::from_millis(200))
        .capture();
    assert!(matches!(result, Err(ExecError::TimedOut)));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn timeout_with_closed_stdout() {
    let start = Instant::now();
    let result = Exec::cmd("sh")
        .args(["-c", "exec >&-; sleep 30"])
        .config(CaptureConfig::default().with_timeout(Duration::from_millis(200)))
        .capture();
    assert!(matches!(result, Err(ExecError::TimedOut)));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn timeout_not_hit() {
    let capture = Exec::cmd("echo")
        .arg("quick")
        .timeout(Duration::from_secs(30))
        .capture()
        .unwrap();
    assert_eq!(capture.stdout_str(), "quick\n");
}

#[test]
fn timeout_unbounded() {
    let capture = Exec::cmd("echo")
        .arg("forever")
        .timeout(Duration::MAX)
        .capture_with_input("ignored")
        .unwrap();
    assert_eq!(capture.stdout_str(), "forever\n");
    assert!(capture.success());

    let capture = Exec::cmd("echo")
        .arg("forever")
        .timeout(Duration::MAX)
        .capture()
        .unwrap();
    assert_eq!(capture.stdout_str(), "forever\n");
}

#[test]
fn buffer_growth() {
    let mut buf = CaptureBuffer::with_capacity(4).unwrap();
    assert!(buf.headroom() >= 3);
    buf.append(b"abc");
    let before = buf.headroom();
    buf.grow(10).unwrap();
    assert!(buf.headroom() >= before + 10);
    buf.append(b"def");
    assert_eq!(buf.as_bytes_with_nul(), b"abcdef\0");
    assert_eq!(&*buf, b"abcdef");
    assert_eq!(Vec::from(buf), b"abcdef".to_vec());
}
