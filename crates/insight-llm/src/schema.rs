//! Helpers to build provider-native response schemas
//!
//! Gemini accepts an OpenAPI subset with upper-case type names.
//!
//! ```
//! use insight_llm::schema;
//! use serde_json::json;
//!
//! let schema = schema::object(
//!     json!({
//!         "signal": schema::string_enum("Overall signal", &["BUY", "SELL", "HOLD"]),
//!         "ma20": schema::string("20-day moving average"),
//!     }),
//!     &["signal", "ma20"],
//! );
//! assert_eq!(schema["type"], "OBJECT");
//! ```

use serde_json::{Value, json};

/// Object schema with properties and required keys
pub fn object(properties: Value, required: &[&str]) -> Value {
    let mut schema = json!({
        "type": "OBJECT",
        "properties": properties,
    });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}

/// String property schema
pub fn string(description: &str) -> Value {
    json!({
        "type": "STRING",
        "description": description,
    })
}

/// String property restricted to `values`
pub fn string_enum(description: &str, values: &[&str]) -> Value {
    json!({
        "type": "STRING",
        "enum": values,
        "description": description,
    })
}
