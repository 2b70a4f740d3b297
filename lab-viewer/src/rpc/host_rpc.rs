use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};

use bevy::diagnostic::DiagnosticsStore;
use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::repository::Repositories;
use crate::engine::core::app_state::ViewerStatus;
use crate::engine::loading::asset_loader::AssetLoader;
use crate::engine::loading::load_tasks::{
    FocusItemEvent, PlacementWarningEvent, RetryEvent, SelectLabEvent, UnloadEvent,
};
use crate::engine::systems::fps_tracking::smoothed_fps;

/// JSON-RPC 2.0 request structure.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 notification structure for one-way communication.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: serde_json::Value,
}

/// JSON-RPC 2.0 error object.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// Resource managing bidirectional RPC communication with the embedding host.
/// Handles both request-response patterns and notification broadcasting.
#[derive(Resource, Default)]
pub struct HostRpcInterface {
    outgoing_notifications: Vec<RpcNotification>,
    outgoing_responses: Vec<RpcResponse>,
}

impl HostRpcInterface {
    /// Send notification to the host without expecting response.
    pub fn send_notification(&mut self, method: &str, params: serde_json::Value) {
        self.outgoing_notifications.push(RpcNotification {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        });
    }

    /// Queue response for transmission to the host.
    fn queue_response(&mut self, response: RpcResponse) {
        self.outgoing_responses.push(response);
    }

    pub fn pending_notifications(&self) -> &[RpcNotification] {
        &self.outgoing_notifications
    }

    pub fn pending_responses(&self) -> &[RpcResponse] {
        &self.outgoing_responses
    }
}

/// Plugin establishing the RPC layer. With `stdio` the host talks over
/// newline-delimited JSON on stdin/stdout; without it outgoing messages are discarded.
pub struct HostRpcPlugin {
    pub stdio: bool,
}

impl Plugin for HostRpcPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<HostRpcInterface>()
            .init_resource::<ViewerStatus>()
            .add_event::<IncomingRpcMessage>()
            .add_event::<SelectLabEvent>()
            .add_event::<FocusItemEvent>()
            .add_event::<RetryEvent>()
            .add_event::<UnloadEvent>()
            .add_event::<PlacementWarningEvent>()
            .add_systems(
                Update,
                (
                    process_incoming_messages,
                    handle_rpc_messages,
                    notify_viewer_status,
                    forward_placement_warnings,
                    send_outgoing_messages,
                )
                    .chain(),
            );

        if self.stdio {
            app.add_systems(Startup, setup_stdin_listener);
        }
    }
}

/// Thread-safe queue filled by the stdin reader thread.
#[derive(Resource)]
struct MessageQueue(Arc<Mutex<Vec<String>>>);

/// Marks that responses and notifications go to stdout.
#[derive(Resource)]
struct StdoutSink;

fn setup_stdin_listener(mut commands: Commands) {
    let message_queue: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let queue_clone = message_queue.clone();

    let spawned = std::thread::Builder::new()
        .name("rpc-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if !line.contains("jsonrpc") {
                    continue;
                }
                if let Ok(mut queue) = queue_clone.lock() {
                    queue.push(line);
                }
            }
        });

    match spawned {
        Ok(_) => {
            info!("RPC listening on stdin");
            commands.insert_resource(MessageQueue(message_queue));
            commands.insert_resource(StdoutSink);
        }
        Err(e) => error!("Failed to start RPC stdin reader: {e}"),
    }
}

/// Event representing an incoming RPC message from the host.
#[derive(Event)]
pub struct IncomingRpcMessage {
    pub content: String,
}

fn process_incoming_messages(
    message_queue: Option<Res<MessageQueue>>,
    mut message_events: EventWriter<IncomingRpcMessage>,
) {
    let Some(queue_res) = message_queue else {
        return;
    };

    let messages = if let Ok(mut queue) = queue_res.0.lock() {
        std::mem::take(&mut *queue)
    } else {
        Vec::new()
    };

    for message_str in messages {
        message_events.write(IncomingRpcMessage {
            content: message_str,
        });
    }
}

/// Viewer actions a request can trigger. The loader and repositories belong to
/// the app; requests that need them fail until they are installed.
#[derive(SystemParam)]
pub struct ViewerRequests<'w> {
    select: EventWriter<'w, SelectLabEvent>,
    focus: EventWriter<'w, FocusItemEvent>,
    retry: EventWriter<'w, RetryEvent>,
    unload: EventWriter<'w, UnloadEvent>,
    loader: Option<ResMut<'w, AssetLoader>>,
    repositories: Option<Res<'w, Repositories>>,
}

fn handle_rpc_messages(
    mut events: EventReader<IncomingRpcMessage>,
    diagnostics: Res<DiagnosticsStore>,
    status: Res<ViewerStatus>,
    mut rpc_interface: ResMut<HostRpcInterface>,
    mut requests: ViewerRequests,
) {
    for event in events.read() {
        match serde_json::from_str::<RpcRequest>(&event.content) {
            Ok(request) => {
                debug!("Processing RPC method: {}", request.method);
                if let Some(response) =
                    handle_rpc_request(&request, &diagnostics, &status, &mut requests)
                {
                    rpc_interface.queue_response(response);
                }
            }
            Err(parse_error) => {
                warn!("RPC parse error: {parse_error}");
                rpc_interface.queue_response(create_error_response(
                    serde_json::Value::Null,
                    -32700,
                    "Parse error",
                    Some(serde_json::json!({ "detail": parse_error.to_string() })),
                ));
            }
        }
    }
}

/// Handle individual RPC request. Requests without an id are executed but not answered.
fn handle_rpc_request(
    request: &RpcRequest,
    diagnostics: &DiagnosticsStore,
    status: &ViewerStatus,
    requests: &mut ViewerRequests,
) -> Option<RpcResponse> {
    let result = match request.method.as_str() {
        "select_lab" => handle_select_lab(&request.params, requests),
        "focus_item" => handle_focus_item(&request.params, requests),
        "retry" => {
            requests.retry.write(RetryEvent);
            Ok(serde_json::json!({ "success": true }))
        }
        "unload" => {
            requests.unload.write(UnloadEvent);
            Ok(serde_json::json!({ "success": true }))
        }
        "preload" => handle_preload(&request.params, requests),
        "list_labs" => handle_list_labs(requests),
        "get_status" => handle_get_status(status),
        "get_fps" => handle_get_fps(diagnostics),
        _ => {
            warn!("Unknown RPC method: {}", request.method);
            return Some(create_error_response(
                request.id.clone()?,
                -32601,
                "Method not found",
                Some(serde_json::json!({"method": request.method})),
            ));
        }
    };

    let id = request.id.clone()?;
    match result {
        Ok(result_value) => Some(RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(result_value),
            error: None,
            id: Some(id),
        }),
        Err(error) => Some(RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id: Some(id),
        }),
    }
}

fn handle_select_lab(
    params: &serde_json::Value,
    requests: &mut ViewerRequests,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct SelectLabParams {
        lab_id: String,
    }

    let params = serde_json::from_value::<SelectLabParams>(params.clone())
        .map_err(|_| RpcError::invalid_params("Expected 'lab_id' parameter"))?;
    if params.lab_id.trim().is_empty() {
        return Err(RpcError::invalid_params("'lab_id' must not be empty"));
    }

    info!("Lab selection requested: {}", params.lab_id);
    requests.select.write(SelectLabEvent {
        lab_id: params.lab_id.clone(),
    });

    Ok(serde_json::json!({
        "success": true,
        "lab_id": params.lab_id
    }))
}

fn handle_focus_item(
    params: &serde_json::Value,
    requests: &mut ViewerRequests,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct FocusItemParams {
        item_id: String,
    }

    let params = serde_json::from_value::<FocusItemParams>(params.clone())
        .map_err(|_| RpcError::invalid_params("Expected 'item_id' parameter"))?;

    requests.focus.write(FocusItemEvent {
        item_id: params.item_id.clone(),
    });

    Ok(serde_json::json!({
        "success": true,
        "item_id": params.item_id
    }))
}

fn handle_preload(
    params: &serde_json::Value,
    requests: &mut ViewerRequests,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct PreloadParams {
        model_path: String,
    }

    let params = serde_json::from_value::<PreloadParams>(params.clone())
        .map_err(|_| RpcError::invalid_params("Expected 'model_path' parameter"))?;

    let loader = requests
        .loader
        .as_deref_mut()
        .ok_or_else(|| RpcError::internal_error("Model loader not installed"))?;
    loader.preload(&params.model_path);
    Ok(serde_json::json!({ "success": true }))
}

fn handle_list_labs(requests: &ViewerRequests) -> Result<serde_json::Value, RpcError> {
    let repositories = requests
        .repositories
        .as_deref()
        .ok_or_else(|| RpcError::internal_error("Lab catalogue not loaded"))?;
    let labs = repositories.labs.list_labs();

    Ok(serde_json::json!({ "labs": labs }))
}

fn handle_get_status(status: &ViewerStatus) -> Result<serde_json::Value, RpcError> {
    serde_json::to_value(status).map_err(|e| RpcError::internal_error(&e.to_string()))
}

fn handle_get_fps(diagnostics: &DiagnosticsStore) -> Result<serde_json::Value, RpcError> {
    let fps = smoothed_fps(diagnostics).unwrap_or(0.0) as f32;

    Ok(serde_json::json!({
        "fps": fps
    }))
}

/// Create standardized error response with optional data payload.
fn create_error_response(
    id: serde_json::Value,
    code: i32,
    message: &str,
    data: Option<serde_json::Value>,
) -> RpcResponse {
    RpcResponse {
        jsonrpc: "2.0".to_string(),
        result: None,
        error: Some(RpcError {
            code,
            message: message.to_string(),
            data,
        }),
        id: Some(id),
    }
}

/// Push `viewer_status` whenever the published status changes.
fn notify_viewer_status(status: Res<ViewerStatus>, mut rpc_interface: ResMut<HostRpcInterface>) {
    if !status.is_changed() {
        return;
    }
    match serde_json::to_value(&*status) {
        Ok(params) => rpc_interface.send_notification("viewer_status", params),
        Err(e) => error!("Failed to serialize viewer status: {e}"),
    }
}

fn forward_placement_warnings(
    mut warnings: EventReader<PlacementWarningEvent>,
    mut rpc_interface: ResMut<HostRpcInterface>,
) {
    for PlacementWarningEvent(warning) in warnings.read() {
        rpc_interface.send_notification(
            "placement_warning",
            serde_json::json!({
                "item_id": warning.item_id,
                "reason": warning.defect.to_string()
            }),
        );
    }
}

/// Send queued notifications and responses to the host.
fn send_outgoing_messages(
    mut rpc_interface: ResMut<HostRpcInterface>,
    sink: Option<Res<StdoutSink>>,
) {
    if sink.is_none() {
        rpc_interface.outgoing_notifications.clear();
        rpc_interface.outgoing_responses.clear();
        return;
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    // Notifications first, then responses, to keep order stable.
    for notification in rpc_interface.outgoing_notifications.drain(..) {
        write_message(&mut out, &notification);
    }
    for response in rpc_interface.outgoing_responses.drain(..) {
        write_message(&mut out, &response);
    }
    if let Err(e) = out.flush() {
        error!("Failed to flush RPC output: {e}");
    }
}

fn write_message<T: Serialize>(out: &mut impl Write, message: &T) {
    match serde_json::to_string(message) {
        Ok(json) => {
            if let Err(e) = writeln!(out, "{json}") {
                error!("Failed to write RPC message: {e}");
            }
        }
        Err(e) => error!("Failed to serialize message: {e}"),
    }
}

/// Standard RPC error codes and constructors.
impl RpcError {
    pub fn invalid_params(message: &str) -> Self {
        Self {
            code: -32602,
            message: message.to_string(),
            data: None,
        }
    }

    pub fn internal_error(message: &str) -> Self {
        Self {
            code: -32603,
            message: message.to_string(),
            data: None,
        }
    }
}
