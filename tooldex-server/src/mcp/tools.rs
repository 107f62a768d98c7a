//! MCP tool definitions for tooldex
//!
//! Defines the tools exposed to the controlling agent.

use super::protocol::Tool;

/// Names of every tool the server answers to
pub const TOOL_NAMES: &[&str] = &[
    "tooldex_attach_pane",
    "tooldex_detach_pane",
    "tooldex_list_panes",
    "tooldex_read_pane",
    "tooldex_send_input",
    "tooldex_subscribe",
    "tooldex_fetch_updates",
    "tooldex_unsubscribe",
    "tooldex_replay",
    "tooldex_stats",
    "tooldex_sweep_idle",
];

pub fn is_known_tool(name: &str) -> bool {
    TOOL_NAMES.contains(&name)
}

fn pane_property() -> serde_json::Value {
    serde_json::json!({
        "type": "string",
        "description": "Attached pane name, or \"primary\" for the primary pane (default: primary)"
    })
}

/// Get all tool definitions for the tooldex MCP server
pub fn get_tool_definitions() -> Vec<Tool> {
    vec![
        Tool {
            name: "tooldex_attach_pane".into(),
            description: "Attach a tmux pane under a name so it can be read, driven and subscribed to".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Name to attach under (letters, digits, '_' and '-'; 'primary' is reserved)"
                    },
                    "target": {
                        "type": "string",
                        "description": "tmux target of the pane, e.g. '%3' or 'work:1.0'"
                    },
                    "primary": {
                        "type": "boolean",
                        "default": false,
                        "description": "Make this the primary pane"
                    }
                },
                "required": ["name", "target"]
            }),
        },
        Tool {
            name: "tooldex_detach_pane".into(),
            description: "Detach a pane and drop every subscription bound to it".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Pane name, or \"primary\""
                    }
                },
                "required": ["name"]
            }),
        },
        Tool {
            name: "tooldex_list_panes".into(),
            description: "List attached panes, most recently attached first".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
        Tool {
            name: "tooldex_read_pane".into(),
            description: "Capture the most recent lines of a pane".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "pane": pane_property(),
                    "lines": {
                        "type": "integer",
                        "description": "Number of lines to capture (default: 200)"
                    },
                    "markup": {
                        "type": "boolean",
                        "default": false,
                        "description": "Preserve color and attribute escape sequences"
                    }
                }
            }),
        },
        Tool {
            name: "tooldex_send_input".into(),
            description: "Type text into a pane, optionally pressing Enter. Output appears in-place; use a subscription to follow it.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "pane": pane_property(),
                    "text": {
                        "type": "string",
                        "description": "Literal text to type"
                    },
                    "submit": {
                        "type": "boolean",
                        "default": true,
                        "description": "Press Enter after the text"
                    }
                },
                "required": ["text"]
            }),
        },
        Tool {
            name: "tooldex_subscribe".into(),
            description: "Start following a pane's output. Returns a token for tooldex_fetch_updates.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "pane": pane_property(),
                    "markup": {
                        "type": "boolean",
                        "default": false,
                        "description": "Preserve color and attribute escape sequences"
                    },
                    "initial_lines": {
                        "type": "integer",
                        "default": 0,
                        "description": "Recent lines to return immediately as backfill"
                    }
                }
            }),
        },
        Tool {
            name: "tooldex_fetch_updates".into(),
            description: "Wait for new output on a subscription. Returns new lines, or timed_out=true if nothing changed within the timeout.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "token": {
                        "type": "string",
                        "description": "Subscription token"
                    },
                    "timeout_seconds": {
                        "type": "number",
                        "description": "How long to wait for changes (default: 1.0)"
                    },
                    "max_lines": {
                        "type": "integer",
                        "description": "Maximum lines per batch (default: 200)"
                    }
                },
                "required": ["token"]
            }),
        },
        Tool {
            name: "tooldex_unsubscribe".into(),
            description: "Close a subscription".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "token": {
                        "type": "string",
                        "description": "Subscription token"
                    }
                },
                "required": ["token"]
            }),
        },
        Tool {
            name: "tooldex_replay".into(),
            description: "Re-read lines a subscription already delivered, without polling the pane".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "token": {
                        "type": "string",
                        "description": "Subscription token"
                    },
                    "lines": {
                        "type": "integer",
                        "description": "Number of most recent buffered lines (default: 50)"
                    }
                },
                "required": ["token"]
            }),
        },
        Tool {
            name: "tooldex_stats".into(),
            description: "Report attached panes, subscriptions and buffered memory; idle subscriptions are swept when usage is high".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
        Tool {
            name: "tooldex_sweep_idle".into(),
            description: "Drop subscriptions that have not been used recently".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "max_age_seconds": {
                        "type": "integer",
                        "description": "Idle age beyond which subscriptions are dropped (default: configured idle timeout)"
                    }
                }
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definitions_match_names() {
        let tools = get_tool_definitions();
        assert_eq!(tools.len(), TOOL_NAMES.len());
        for tool in &tools {
            assert!(is_known_tool(&tool.name), "{} missing from TOOL_NAMES", tool.name);
            assert_eq!(tool.input_schema["type"], "object");
        }
    }

    #[test]
    fn test_required_fields() {
        let tools = get_tool_definitions();
        let fetch = tools
            .iter()
            .find(|t| t.name == "tooldex_fetch_updates")
            .unwrap();
        assert_eq!(fetch.input_schema["required"], serde_json::json!(["token"]));
    }
}
