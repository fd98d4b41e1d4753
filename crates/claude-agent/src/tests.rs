/// Parsing tests for the `--output-format json` document.
#[cfg(test)]
mod unit {
    use crate::{ClaudeAgentError, ClaudeOutput, Effort, QueryOptions};
    use serde_json::json;

    #[test]
    fn structured_output_wins() {
        let out = ClaudeOutput::parse(
            r#"{"is_error": false, "result": "{\"a\": 1}", "structured_output": {"b": 2}}"#,
        )
        .unwrap();
        let payload = out.payload().unwrap();
        assert_eq!(payload.get("b"), Some(&json!(2)));
        assert!(payload.get("a").is_none());
    }

    #[test]
    fn result_text_parsed_as_object() {
        let out = ClaudeOutput::parse(r#"{"result": " {\"summary\": \"s\"} "}"#).unwrap();
        assert_eq!(out.payload().unwrap().get("summary"), Some(&json!("s")));
    }

    #[test]
    fn non_object_result_is_no_payload() {
        let out = ClaudeOutput::parse(r#"{"result": "[1, 2]"}"#).unwrap();
        assert!(matches!(out.payload(), Err(ClaudeAgentError::NoPayload)));
        let out = ClaudeOutput::parse(r#"{"result": ""}"#).unwrap();
        assert!(matches!(out.payload(), Err(ClaudeAgentError::NoPayload)));
    }

    #[test]
    fn invalid_result_json_is_parse_error() {
        let out = ClaudeOutput::parse(r#"{"result": "not json"}"#).unwrap();
        assert!(matches!(out.payload(), Err(ClaudeAgentError::Parse { .. })));
    }

    #[test]
    fn is_error_is_reported() {
        let out = ClaudeOutput::parse(r#"{"is_error": true, "result": "rate limited"}"#).unwrap();
        let err = out.payload().unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }

    #[test]
    fn empty_and_garbage_stdout() {
        assert!(matches!(
            ClaudeOutput::parse("  \n"),
            Err(ClaudeAgentError::EmptyOutput)
        ));
        assert!(matches!(
            ClaudeOutput::parse("Error: not logged in"),
            Err(ClaudeAgentError::Parse { .. })
        ));
    }

    #[test]
    fn dominant_model_by_cost() {
        let out = ClaudeOutput::parse(
            r#"{"modelUsage": {
                "claude-haiku": {"costUSD": 0.01},
                "claude-opus": {"costUSD": 0.42, "inputTokens": 100},
                "broken": "n/a"
            }}"#,
        )
        .unwrap();
        assert_eq!(out.dominant_model(), Some("claude-opus"));
        assert_eq!(ClaudeOutput::default().dominant_model(), None);
    }

    #[test]
    fn args_order() {
        let opts = QueryOptions {
            command: vec!["python3".into(), "fake.py".into()],
            model: Some("opus".into()),
            effort: Some(Effort::Medium),
            json_schema: Some(json!({"type": "object"})),
            ..Default::default()
        };
        assert_eq!(
            opts.args("hello"),
            vec![
                "fake.py",
                "-p",
                "--output-format",
                "json",
                "--json-schema",
                r#"{"type":"object"}"#,
                "--model",
                "opus",
                "--effort",
                "medium",
                "--tools",
                "",
                "--no-session-persistence",
                "hello",
            ]
        );
    }

    #[test]
    fn effort_parses() {
        assert_eq!("high".parse::<Effort>().unwrap(), Effort::High);
        assert!("extreme".parse::<Effort>().is_err());
    }
}

/// End-to-end tests against shell scripts standing in for the `claude` binary.
#[cfg(all(test, unix))]
mod process {
    use crate::process::run_captured;
    use crate::{query, ClaudeAgentError, QueryOptions};
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn script(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    fn opts(command: String) -> QueryOptions {
        QueryOptions {
            command: vec![command],
            model: Some("opus".into()),
            timeout: Some(Duration::from_secs(10)),
            ..Default::default()
        }
    }

    #[test]
    fn successful_query() {
        let dir = TempDir::new().unwrap();
        let cmd = script(
            dir.path(),
            "claude",
            r#"printf '%s\n' "$@" > "$ARGS_OUT"
cat <<'EOF'
{"is_error": false, "structured_output": {"summary": "ok"}, "modelUsage": {"claude-opus-x": {"costUSD": 0.2}}}
EOF"#,
        );
        let args_out = dir.path().join("args.txt");
        let mut o = opts(cmd);
        o.env.insert("ARGS_OUT".into(), args_out.display().to_string());

        let response = query("the prompt", &o).unwrap();
        assert_eq!(response.payload["summary"], "ok");
        assert_eq!(response.model.as_deref(), Some("claude-opus-x"));

        let args = std::fs::read_to_string(&args_out).unwrap();
        assert!(args.starts_with("-p\n--output-format\njson\n"));
        assert!(args.trim_end().ends_with("the prompt"));
    }

    #[test]
    fn configured_model_when_no_usage() {
        let dir = TempDir::new().unwrap();
        let cmd = script(dir.path(), "claude", r#"echo '{"result": "{\"a\": 1}"}'"#);
        let response = query("p", &opts(cmd)).unwrap();
        assert_eq!(response.model.as_deref(), Some("opus"));
    }

    #[test]
    fn non_zero_exit() {
        let dir = TempDir::new().unwrap();
        let cmd = script(dir.path(), "claude", "echo boom >&2\nexit 3");
        match query("p", &opts(cmd)) {
            Err(ClaudeAgentError::Exit { code, stderr }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("expected Exit, got {other:?}"),
        }
    }

    #[test]
    fn timeout_kills() {
        let dir = TempDir::new().unwrap();
        let cmd = script(dir.path(), "claude", "exec sleep 5");
        let mut o = opts(cmd);
        o.timeout = Some(Duration::from_millis(200));
        assert!(matches!(query("p", &o), Err(ClaudeAgentError::Timeout(_))));
    }

    #[test]
    fn timeout_kills_the_whole_process_group() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("late");
        let mut cmd = std::process::Command::new("sh");
        cmd.arg("-c")
            .arg(format!("(sleep 1; touch '{}') & sleep 5", marker.display()));
        let captured = run_captured(&mut cmd, Some(Duration::from_millis(200))).unwrap();
        assert!(captured.is_none());
        std::thread::sleep(Duration::from_millis(1500));
        assert!(!marker.exists());
    }

    #[test]
    fn captured_output_without_timeout() {
        let mut cmd = std::process::Command::new("sh");
        cmd.arg("-c").arg("echo out; echo err >&2; exit 2");
        let captured = run_captured(&mut cmd, None).unwrap().unwrap();
        assert_eq!(captured.status.code(), Some(2));
        assert_eq!(captured.stdout, "out\n");
        assert_eq!(captured.stderr, "err\n");
    }

    #[test]
    fn missing_binary() {
        let o = opts("/definitely/not/here/claude".into());
        assert!(matches!(query("p", &o), Err(ClaudeAgentError::NotFound(_))));
    }
}
