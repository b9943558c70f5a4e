//! MCP service
//!
//! [`ComputerUseServer`] exposes the tool registry over the Model Context
//! Protocol. Tool calls are converted into [`Request`]s and routed through
//! the shared [`Dispatcher`], so MCP clients get the same validation,
//! timeout, panic isolation and execution logging as the line transport.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use rmcp::{
    RoleServer, ServerHandler,
    model::{
        AnnotateAble, CallToolRequestParam, CallToolResult, Content, ErrorData as McpError,
        ListResourcesResult, ListToolsResult, PaginatedRequestParam,
        RawResource, ReadResourceRequestParam, ReadResourceResult, ResourceContents,
        ServerCapabilities, ServerInfo, Tool, ToolAnnotations,
    },
    service::RequestContext,
};
use serde_json::{Map, Value};

use crate::{
    dispatch::Dispatcher,
    model::{Outcome, Request, Response, ToolOutput},
    normalize::PNG_MIME_TYPE,
    registry::{SideEffect, ToolSpec},
};

/// URI of the server status resource
pub const STATUS_URI: &str = "info://status";

/// URI of the screen info resource
pub const SCREEN_INFO_URI: &str = "screen://info";

/// URI of the live screenshot resource (base64 PNG)
pub const SCREENSHOT_URI: &str = "screen://screenshot";

const INSTRUCTIONS: &str = "Desktop control server. Always call take_screenshot first to see \
                            the screen. Screenshots may be downscaled: multiply image \
                            coordinates by the scale_x/scale_y metadata to get the screen \
                            coordinates expected by the mouse tools. Take a new screenshot \
                            after each action to verify the result.";

/// Computer-use MCP server
#[derive(Debug, Clone)]
pub struct ComputerUseServer {
    dispatcher: Arc<Dispatcher>,
    next_request_id: Arc<AtomicU64>,
}

impl ComputerUseServer {
    /// Creates a server around `dispatcher`
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            next_request_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Shared dispatcher
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// MCP descriptors for every registered tool, in registration order
    pub fn tools(&self) -> Vec<Tool> {
        self.dispatcher
            .registry()
            .list()
            .iter()
            .map(|spec| tool_descriptor(spec))
            .collect()
    }

    /// Dispatches one tool call and converts the response
    pub async fn call(&self, name: &str, arguments: Option<Map<String, Value>>) -> CallToolResult {
        let request = Request {
            request_id: Value::from(self.next_request_id.fetch_add(1, Ordering::Relaxed)),
            tool_name: name.to_string(),
            arguments: arguments.unwrap_or_default(),
        };
        to_call_result(self.dispatcher.handle(request).await)
    }

    /// Body of the status resource
    pub fn status_text(&self) -> String {
        "running".to_string()
    }

    /// Body of the screen info resource
    ///
    /// # Errors
    ///
    /// Returns the failure detail as an MCP error if the screen cannot be
    /// queried.
    pub async fn screen_info(&self) -> Result<String, McpError> {
        let mut payload = self.dispatch_resource("get_screen_info").await?.to_payload();
        if let Value::Object(map) = &mut payload {
            map.remove("success");
        }
        Ok(payload.to_string())
    }

    /// Body of the screenshot resource: the normalized PNG, base64 encoded
    ///
    /// # Errors
    ///
    /// Returns the failure detail as an MCP error if the capture fails.
    pub async fn screenshot_base64(&self) -> Result<String, McpError> {
        match self.dispatch_resource("take_screenshot").await? {
            ToolOutput::Screenshot(shot) => Ok(STANDARD.encode(&shot.encoded_image)),
            ToolOutput::Json(_) => Err(McpError::internal_error(
                "take_screenshot returned no image",
                None,
            )),
        }
    }

    async fn dispatch_resource(&self, tool: &str) -> Result<ToolOutput, McpError> {
        let request = Request::new(
            Value::from(self.next_request_id.fetch_add(1, Ordering::Relaxed)),
            tool,
            Value::Object(Map::new()),
        );
        match self.dispatcher.handle(request).await.outcome {
            Outcome::Success(output) => Ok(output),
            Outcome::Failure(detail) => Err(McpError::internal_error(
                detail.message.clone(),
                serde_json::to_value(&detail).ok(),
            )),
        }
    }
}

fn tool_descriptor(spec: &ToolSpec) -> Tool {
    let mut tool = Tool::new(spec.name, spec.description, spec.input_schema());
    tool.annotations = Some(ToolAnnotations {
        read_only_hint: Some(spec.side_effect == SideEffect::ReadOnly),
        destructive_hint: Some(spec.side_effect == SideEffect::ProcessSpawn),
        ..Default::default()
    });
    tool
}

/// Converts a dispatcher response into an MCP tool result
///
/// Screenshots become an image block followed by a JSON metadata block.
/// Failures set `is_error` and carry the error detail as JSON text.
pub fn to_call_result(response: Response) -> CallToolResult {
    match response.outcome {
        Outcome::Success(ToolOutput::Screenshot(shot)) => {
            let metadata = serde_json::to_string(&shot.metadata()).unwrap_or_default();
            CallToolResult::success(vec![
                Content::image(STANDARD.encode(&shot.encoded_image), PNG_MIME_TYPE),
                Content::text(metadata),
            ])
        }
        Outcome::Success(ToolOutput::Json(payload)) => {
            CallToolResult::success(vec![Content::text(payload.to_string())])
        }
        Outcome::Failure(detail) => {
            let body = serde_json::to_string(&detail).unwrap_or_else(|_| detail.message.clone());
            CallToolResult::error(vec![Content::text(body)])
        }
    }
}

impl ServerHandler for ComputerUseServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            instructions: Some(INSTRUCTIONS.to_string()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.call(&request.name, request.arguments).await)
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let resources = vec![
            RawResource::new(STATUS_URI, "status").no_annotation(),
            RawResource::new(SCREEN_INFO_URI, "screen_info").no_annotation(),
            RawResource::new(SCREENSHOT_URI, "screenshot").no_annotation(),
        ];
        Ok(ListResourcesResult::with_all_items(resources))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let text = match request.uri.as_str() {
            STATUS_URI => self.status_text(),
            SCREEN_INFO_URI => self.screen_info().await?,
            SCREENSHOT_URI => self.screenshot_base64().await?,
            other => {
                return Err(McpError::resource_not_found(
                    format!("Unknown resource: {}", other),
                    None,
                ));
            }
        };
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, request.uri)],
        })
    }
}
