use std::fs;
use std::io::Write;
use std::process::{Command, Output, Stdio};

const PERF: &str = "\
# overhead header from perf
10 main;parse;lex
20 main;parse
5 main;eval
1 main
";

fn cgprof(args: &[&str], stdin: Option<&str>) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_cgprof"))
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn cgprof");
    {
        let mut input = child.stdin.take().unwrap();
        // The child may exit before reading everything.
        let _ = input.write_all(stdin.unwrap_or("").as_bytes());
    }
    child.wait_with_output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn report_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("perf.txt");
    fs::write(&path, PERF).unwrap();

    let output = cgprof(&["folded", "--skip-header", path.to_str().unwrap()], None);
    assert!(output.status.success(), "{output:?}");
    let text = stdout(&output);
    assert!(text.contains("total time: 36"), "{text}");
    assert!(text.contains("main[0001]"));
    assert!(text.contains("lex[0003]: ???:0:0"));
}

#[test]
fn report_from_stdin() {
    let output = cgprof(&["folded", "--skip-header"], Some(PERF));
    assert!(output.status.success(), "{output:?}");
    assert!(stdout(&output).contains("Call Graph"));
}

#[test]
fn unskipped_header_is_a_parse_error() {
    // "# overhead ..." has a space, but "#" is not a count.
    let output = cgprof(&["folded"], Some(PERF));
    assert_eq!(output.status.code(), Some(1));
    let err = String::from_utf8_lossy(&output.stderr);
    assert!(err.contains("Unable to parse profile report at line 1"), "{err}");
}

#[test]
fn stops_at_next_perf_section() {
    let input = "7 a;b\n\n3 a\n";
    let output = cgprof(&["folded", "--format", "json"], Some(input));
    assert!(output.status.success(), "{output:?}");
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["total_time"], 7);
}

#[test]
fn json_output_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("profile.json");
    let output = cgprof(
        &[
            "folded",
            "--skip-header",
            "--format",
            "json",
            "-n",
            "2",
            "-o",
            out.to_str().unwrap(),
        ],
        Some(PERF),
    );
    assert!(output.status.success(), "{output:?}");
    assert!(output.stdout.is_empty());

    let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    let entries = doc["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["name"], "main");
    assert_eq!(entries[0]["time"], 36);
    assert_eq!(entries[1]["name"], "parse");
    assert_eq!(entries[1]["time"], 30);
}

#[test]
fn csv_output() {
    let output = cgprof(&["folded", "--skip-header", "-f", "csv"], Some(PERF));
    assert!(output.status.success(), "{output:?}");
    let text = stdout(&output);
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines[0], "count,time,self_time,time_pct,id,name,location");
    assert_eq!(lines.len(), 5);
    assert!(lines[1].starts_with("4,36,1,100.00,1,\"main\""), "{text}");
}

#[test]
fn invalid_threshold_is_an_argument_error() {
    let output = cgprof(&["folded", "-t", "101"], Some(PERF));
    assert_eq!(output.status.code(), Some(2));
    let err = String::from_utf8_lossy(&output.stderr);
    assert!(err.contains("Invalid arguments"), "{err}");
}

#[test]
fn missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.txt");
    let output = cgprof(&["folded", path.to_str().unwrap()], None);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn completions_are_generated() {
    let output = cgprof(&["completions", "bash"], None);
    assert!(output.status.success(), "{output:?}");
    assert!(stdout(&output).contains("cgprof"));
}
