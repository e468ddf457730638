//! Structured-output schemas for the four agent roles.
//!
//! Every runner constrains its LLM call with one of these; the provider
//! adapters encode them natively (tool use, function calling, or
//! response_format).

use serde_json::json;

use crate::domain::models::JsonSchema;

/// Planner: a thinking field plus an ordered list of todo/project actions.
pub fn planner_schema() -> JsonSchema {
    JsonSchema::new(
        "planner_actions",
        "Plan the team's next steps as a list of actions",
        json!({
            "type": "object",
            "properties": {
                "thinking": {
                    "type": "string",
                    "description": "Your reasoning about the current state and what to do next"
                },
                "actions": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "type": {
                                "type": "string",
                                "enum": [
                                    "create_todo",
                                    "update_todo",
                                    "delete_todo",
                                    "clear_all_todos",
                                    "update_project",
                                    "update_phase"
                                ]
                            },
                            "content": {
                                "type": "string",
                                "description": "Todo content; exact match target for update/delete"
                            },
                            "new_content": { "type": "string" },
                            "priority": { "type": "integer", "minimum": 1, "maximum": 10 },
                            "status": {
                                "type": "string",
                                "enum": ["pending", "in_progress", "completed", "cancelled"]
                            },
                            "title": { "type": "string" },
                            "description": { "type": "string" },
                            "phase": {
                                "type": "string",
                                "enum": ["ideation", "building", "demo", "completed"]
                            }
                        },
                        "required": ["type"]
                    }
                }
            },
            "required": ["thinking", "actions"]
        }),
    )
}

/// Builder: the complete HTML artifact.
pub fn builder_schema() -> JsonSchema {
    JsonSchema::new(
        "builder_artifact",
        "Produce the complete updated HTML artifact for the current task",
        json!({
            "type": "object",
            "properties": {
                "thinking": { "type": "string" },
                "results": {
                    "type": "object",
                    "properties": {
                        "artifact": {
                            "type": "string",
                            "description": "The full HTML document; empty if the task could not be completed"
                        }
                    },
                    "required": ["artifact"]
                }
            },
            "required": ["thinking", "results"]
        }),
    )
}

/// Communicator: one reply message with its routing.
pub fn communicator_schema() -> JsonSchema {
    JsonSchema::new(
        "communicator_reply",
        "Compose one reply to a visitor or a peer team",
        json!({
            "type": "object",
            "properties": {
                "thinking": { "type": "string" },
                "results": {
                    "type": "object",
                    "properties": {
                        "message": { "type": "string" },
                        "recipient": {
                            "type": "string",
                            "description": "Recipient name or stack id; informational"
                        },
                        "type": {
                            "type": "string",
                            "enum": ["direct", "broadcast"]
                        }
                    },
                    "required": ["message", "type"]
                }
            },
            "required": ["thinking", "results"]
        }),
    )
}

/// Reviewer: recommendations plus structured issues.
pub fn reviewer_schema() -> JsonSchema {
    JsonSchema::new(
        "reviewer_audit",
        "Review the latest artifact and report recommendations and issues",
        json!({
            "type": "object",
            "properties": {
                "thinking": { "type": "string" },
                "results": {
                    "type": "object",
                    "properties": {
                        "recommendations": {
                            "type": "array",
                            "items": { "type": "string" }
                        },
                        "issues": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "severity": {
                                        "type": "string",
                                        "enum": ["critical", "major", "minor"]
                                    },
                                    "description": { "type": "string" }
                                },
                                "required": ["severity", "description"]
                            }
                        }
                    },
                    "required": ["recommendations", "issues"]
                }
            },
            "required": ["thinking", "results"]
        }),
    )
}
