#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&p).expect("create temp workspace");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_attendanced"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn sidecar");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let line = serde_json::json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", line).expect("write request");
    let mut buf = String::new();
    reader.read_line(&mut buf).expect("read response");
    serde_json::from_str(&buf).expect("parse response line")
}

/// Sends a request and unwraps the `result` payload, failing the test on an
/// error response.
pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let resp = request(stdin, reader, id, method, params);
    assert_eq!(
        resp.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} should succeed, got {}",
        method,
        resp
    );
    resp.get("result").cloned().expect("result payload")
}

/// Sends a request expecting failure; asserts the error code and returns the
/// error object.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
    expected_code: &str,
) -> serde_json::Value {
    let resp = request(stdin, reader, id, method, params);
    assert_eq!(
        resp.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} should fail, got {}",
        method,
        resp
    );
    let error = resp.get("error").cloned().expect("error payload");
    assert_eq!(
        error.get("code").and_then(|v| v.as_str()),
        Some(expected_code),
        "unexpected error code in {}",
        error
    );
    error
}

/// Common fixture: fresh workspace plus one class named `name`, returning the
/// class id.
pub fn select_workspace_and_create_class(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &std::path::Path,
    name: &str,
) -> String {
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        serde_json::json!({ "path": workspace.to_string_lossy() }),
    );
    let created = request_ok(
        stdin,
        reader,
        "cls",
        "classes.create",
        serde_json::json!({ "name": name }),
    );
    created
        .get("classId")
        .and_then(|v| v.as_str())
        .expect("classId")
        .to_string()
}
