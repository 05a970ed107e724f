//! `valk local`
//!
//! Serves the project on a local port. Every request is shaped into the same
//! proxy event the gateway sends the function, handed to the handler through
//! the configured runtime, and the handler's `{statusCode, headers, body}`
//! answer is relayed back to the caller.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{OriginalUri, Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use base64::{Engine as _, engine::general_purpose};
use colored::Colorize;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use valkyrie_core::{ProjectStore, Valkconfig};

/// In-process stand-in for the gateway in front of the function
struct LocalGateway {
    root: PathBuf,
    stage: String,
    api_id: String,
    resource_id: String,
    function_name: String,
    handler_file: String,
    handler_export: String,
    program: String,
    variables: BTreeMap<String, String>,
}

/// Shape of the handler's answer
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct HandlerResponse {
    status_code: Option<u16>,
    headers: BTreeMap<String, String>,
    body: Option<String>,
    is_base64_encoded: bool,
}

const NODE_SHIM: &str = r#"
let input = "";
process.stdin.on("data", (chunk) => { input += chunk; });
process.stdin.on("end", () => {
  const path = require("path");
  const event = JSON.parse(input);
  const target = require(path.resolve(process.env.VALK_HANDLER_FILE));
  const handler = target[process.env.VALK_HANDLER_EXPORT];
  if (typeof handler !== "function") {
    console.error("handler " + process.env.VALK_HANDLER_EXPORT + " is not a function");
    process.exit(1);
  }
  const done = (err, result) => {
    if (err) {
      console.error(err && err.stack ? err.stack : String(err));
      process.exit(1);
    }
    process.stdout.write(JSON.stringify(result || {}));
    process.exit(0);
  };
  try {
    const outcome = handler(event, { functionName: process.env.VALK_FUNCTION_NAME }, done);
    if (outcome && typeof outcome.then === "function") {
      outcome.then((result) => done(null, result), done);
    }
  } catch (err) {
    done(err);
  }
});
"#;

pub async fn handle(port: u16, env: Option<String>) -> anyhow::Result<()> {
    let store = ProjectStore::discover()?;
    let config = store.load().await?;
    let env = match env {
        Some(env) => {
            config.environment(&env)?;
            env
        }
        None => config
            .local_env
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no environment found in valkconfig.json"))?,
    };
    let record = config.environment(&env)?;

    let (handler_file, handler_export) = split_handler(&record.lambda.handler)?;
    let gateway = Arc::new(LocalGateway {
        root: store.root().to_path_buf(),
        stage: Valkconfig::stage_name(&env),
        api_id: record.api.id.clone().unwrap_or_else(|| "local".to_string()),
        resource_id: record
            .api
            .resource_id
            .clone()
            .unwrap_or_else(|| "local".to_string()),
        function_name: record
            .lambda
            .function_name
            .clone()
            .unwrap_or_else(|| config.function_name(&env)),
        handler_file,
        handler_export,
        program: runtime_program(&record.lambda.runtime)?.to_string(),
        variables: record.lambda.environment.variables.clone(),
    });

    let app = Router::new().fallback(relay).with_state(gateway);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    println!(
        "{} {} {}",
        "Local application listening on".green(),
        format!("http://localhost:{}/", port).cyan().underline(),
        format!("({})", env).dimmed()
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

async fn relay(
    State(gateway): State<Arc<LocalGateway>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match invoke(&gateway, &method, &uri, &query, &headers, &body).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %err, "Handler invocation failed");
            (StatusCode::BAD_GATEWAY, format!("handler failed: {}", err)).into_response()
        }
    }
}

async fn invoke(
    gateway: &LocalGateway,
    method: &Method,
    uri: &Uri,
    query: &BTreeMap<String, String>,
    headers: &HeaderMap,
    body: &[u8],
) -> anyhow::Result<Response> {
    let event = build_event(gateway, method, uri, query, headers, body);

    tracing::debug!("Running: {} -e <shim> ({} {})", gateway.program, method, uri.path());
    let mut child = tokio::process::Command::new(&gateway.program)
        .arg("-e")
        .arg(NODE_SHIM)
        .current_dir(&gateway.root)
        .env("VALK_HANDLER_FILE", &gateway.handler_file)
        .env("VALK_HANDLER_EXPORT", &gateway.handler_export)
        .env("VALK_FUNCTION_NAME", &gateway.function_name)
        .envs(&gateway.variables)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    if let Some(stdin) = child.stdin.as_mut() {
        stdin.write_all(event.to_string().as_bytes()).await?;
    }
    drop(child.stdin.take());

    let output = child.wait_with_output().await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!(
            "{} exited with {}: {}",
            gateway.program,
            output.status,
            stderr.trim()
        );
    }

    let answer: HandlerResponse = serde_json::from_slice(&output.stdout)?;
    render(answer)
}

/// Proxy event for one request, shaped like the gateway's `{proxy+}` events
fn build_event(
    gateway: &LocalGateway,
    method: &Method,
    uri: &Uri,
    query: &BTreeMap<String, String>,
    headers: &HeaderMap,
    body: &[u8],
) -> Value {
    let path = uri.path().to_string();
    let proxy = path.trim_start_matches('/').to_string();

    let header_map: BTreeMap<String, String> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).to_string(),
            )
        })
        .collect();
    let user_agent = header_map.get("user-agent").cloned().unwrap_or_default();

    let query_value = if query.is_empty() {
        Value::Null
    } else {
        json!(query)
    };
    let (body_value, is_base64) = if body.is_empty() {
        (Value::Null, false)
    } else {
        match std::str::from_utf8(body) {
            Ok(text) => (Value::String(text.to_string()), false),
            Err(_) => (Value::String(general_purpose::STANDARD.encode(body)), true),
        }
    };

    json!({
        "resource": "/{proxy+}",
        "path": path,
        "httpMethod": method.as_str(),
        "headers": header_map,
        "queryStringParameters": query_value,
        "pathParameters": { "proxy": proxy },
        "stageVariables": Value::Null,
        "requestContext": {
            "path": format!("/{}{}", gateway.stage, path),
            "accountId": "local",
            "resourceId": gateway.resource_id,
            "stage": gateway.stage,
            "requestId": format!("local-{}", chrono::Utc::now().timestamp_millis()),
            "identity": {
                "sourceIp": "127.0.0.1",
                "userAgent": user_agent,
            },
            "resourcePath": "/{proxy+}",
            "httpMethod": method.as_str(),
            "apiId": gateway.api_id,
        },
        "body": body_value,
        "isBase64Encoded": is_base64,
    })
}

fn render(answer: HandlerResponse) -> anyhow::Result<Response> {
    let status = StatusCode::from_u16(answer.status_code.unwrap_or(200))?;
    let mut headers = HeaderMap::new();
    for (name, value) in &answer.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }
    let body = match answer.body {
        None => Vec::new(),
        Some(text) if answer.is_base64_encoded => {
            general_purpose::STANDARD.decode(text.as_bytes())?
        }
        Some(text) => text.into_bytes(),
    };
    Ok((status, headers, body).into_response())
}

/// Split the `file.export` handler notation
fn split_handler(handler: &str) -> anyhow::Result<(String, String)> {
    match handler.rsplit_once('.') {
        Some((file, export)) if !file.is_empty() && !export.is_empty() => {
            Ok((file.to_string(), export.to_string()))
        }
        _ => anyhow::bail!("invalid Lambda handler: {} (expected file.export)", handler),
    }
}

fn runtime_program(runtime: &str) -> anyhow::Result<&'static str> {
    if runtime.starts_with("nodejs") {
        Ok("node")
    } else {
        anyhow::bail!(
            "local serving supports Node.js runtimes only (configured: {})",
            runtime
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> LocalGateway {
        LocalGateway {
            root: PathBuf::from("."),
            stage: "staging".to_string(),
            api_id: "api123".to_string(),
            resource_id: "res1".to_string(),
            function_name: "demo-staging".to_string(),
            handler_file: "index".to_string(),
            handler_export: "handler".to_string(),
            program: "node".to_string(),
            variables: BTreeMap::new(),
        }
    }

    #[test]
    fn test_event_shape() {
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", HeaderValue::from_static("test-agent"));
        let mut query = BTreeMap::new();
        query.insert("page".to_string(), "2".to_string());
        let uri: Uri = "/req/path?page=2".parse().unwrap();

        let event = build_event(&gateway(), &Method::GET, &uri, &query, &headers, b"");
        assert_eq!(event["resource"], "/{proxy+}");
        assert_eq!(event["path"], "/req/path");
        assert_eq!(event["httpMethod"], "GET");
        assert_eq!(event["pathParameters"]["proxy"], "req/path");
        assert_eq!(event["queryStringParameters"]["page"], "2");
        assert_eq!(event["headers"]["user-agent"], "test-agent");
        assert_eq!(event["requestContext"]["stage"], "staging");
        assert_eq!(event["requestContext"]["path"], "/staging/req/path");
        assert_eq!(event["requestContext"]["apiId"], "api123");
        assert_eq!(event["body"], Value::Null);
        assert_eq!(event["isBase64Encoded"], false);
    }

    #[test]
    fn test_empty_query_is_null() {
        let uri: Uri = "/".parse().unwrap();
        let event = build_event(
            &gateway(),
            &Method::POST,
            &uri,
            &BTreeMap::new(),
            &HeaderMap::new(),
            b"{\"a\":1}",
        );
        assert_eq!(event["queryStringParameters"], Value::Null);
        assert_eq!(event["body"], "{\"a\":1}");
        assert_eq!(event["pathParameters"]["proxy"], "");
    }

    #[test]
    fn test_binary_body_is_base64() {
        let uri: Uri = "/upload".parse().unwrap();
        let body = [0xffu8, 0xfe, 0x00, 0x01];
        let event = build_event(
            &gateway(),
            &Method::PUT,
            &uri,
            &BTreeMap::new(),
            &HeaderMap::new(),
            &body,
        );
        assert_eq!(event["isBase64Encoded"], true);
        let encoded = event["body"].as_str().unwrap();
        assert_eq!(general_purpose::STANDARD.decode(encoded).unwrap(), body);
    }

    #[test]
    fn test_split_handler() {
        assert_eq!(
            split_handler("index.handler").unwrap(),
            ("index".to_string(), "handler".to_string())
        );
        assert_eq!(
            split_handler("src/app.main").unwrap(),
            ("src/app".to_string(), "main".to_string())
        );
        assert!(split_handler("nodots").is_err());
        assert!(split_handler(".handler").is_err());
    }

    #[test]
    fn test_runtime_program() {
        assert_eq!(runtime_program("nodejs22.x").unwrap(), "node");
        assert!(runtime_program("python3.12").is_err());
    }
}
