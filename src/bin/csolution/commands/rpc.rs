//! `csolution rpc` - serve one JSON-RPC 2.0 request read from stdin, for IDE
//! integrations that want a long-lived process without shelling out per
//! query. Each invocation handles exactly one request and exits; a caller
//! wanting many requests restarts the process per request, the same way
//! `convert`/`list` are single-shot.

use std::io::Read;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use csolution::context_factory::enumerate_contexts;
use csolution::loader::yaml;
use csolution::ops::{run_solution, RunOptions};
use csolution::util::GlobalContext;

use crate::find_solution;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct RpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i32,
    message: String,
}

pub fn execute(gctx: &GlobalContext) -> Result<i32> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input).context("reading RPC request from stdin")?;
    let request: RpcRequest = serde_json::from_str(&input).context("parsing JSON-RPC request")?;
    let id = request.id.clone().unwrap_or(Value::Null);

    let response = match dispatch(&request, gctx) {
        Ok(result) => RpcResponse { jsonrpc: "2.0", id, result: Some(result), error: None },
        Err(err) => RpcResponse {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError { code: -32000, message: format!("{err:#}") }),
        },
    };

    println!("{}", serde_json::to_string(&response)?);
    Ok(if response.error.is_some() { 1 } else { 0 })
}

fn dispatch(request: &RpcRequest, gctx: &GlobalContext) -> Result<Value> {
    match request.method.as_str() {
        "listContexts" => {
            let path = solution_path_param(request, gctx)?;
            let solution = yaml::load_solution(&path)?;
            let names: Vec<String> = enumerate_contexts(&solution).iter().map(|c| c.name.to_string()).collect();
            Ok(serde_json::json!({ "contexts": names }))
        }
        "convert" => {
            let path = solution_path_param(request, gctx)?;
            let report = run_solution(&path, gctx, &RunOptions::default())?;
            let contexts: Vec<Value> = report
                .contexts
                .iter()
                .map(|c| serde_json::json!({ "name": c.name.to_string(), "components": c.components.len() }))
                .collect();
            Ok(serde_json::json!({
                "packs": report.pack_lock.packs.len(),
                "contexts": contexts,
                "errors": report.diagnostics.error_count(),
                "warnings": report.diagnostics.warning_count(),
            }))
        }
        other => anyhow::bail!("unknown RPC method '{other}'"),
    }
}

fn solution_path_param(request: &RpcRequest, gctx: &GlobalContext) -> Result<std::path::PathBuf> {
    let explicit = request
        .params
        .get("solution")
        .and_then(Value::as_str)
        .map(std::path::PathBuf::from);
    find_solution(explicit.as_deref(), gctx)
}
