//! The RPC descriptor table: `method -> (request_type, response_type)`.
//!
//! Loaded once from a JSON document shaped like a protobuf.js reflection
//! dump: `{"nested": {"<package>": {"nested": {"<service>": {"methods":
//! {"<rpc>": {"requestType": "...", "responseType": "..."}}}}}}}`. This is
//! the same document the reference Python implementation calls `jsonProto`.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::CodecError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodTypes {
    pub request_type: String,
    pub response_type: String,
}

/// Splits a fully-qualified method name (`.lq.Lobby.oauth2Login`, or the
/// legacy `lq.Lobby/oauth2Login` slash form) into `(package, service, rpc)`.
pub fn split_method(method: &str) -> Result<(String, String, String), CodecError> {
    let trimmed = method.trim_start_matches('.');
    let (head, rpc) = if let Some((h, r)) = trimmed.rsplit_once('/') {
        (h, r)
    } else {
        trimmed
            .rsplit_once('.')
            .ok_or_else(|| CodecError::MalformedMethod(method.to_owned()))?
    };
    let (package, service) = head
        .rsplit_once('.')
        .ok_or_else(|| CodecError::MalformedMethod(method.to_owned()))?;
    Ok((package.to_owned(), service.to_owned(), rpc.to_owned()))
}

#[derive(Debug, Deserialize)]
struct RawMethod {
    #[serde(rename = "requestType")]
    request_type: String,
    #[serde(rename = "responseType")]
    response_type: String,
}

#[derive(Debug, Deserialize)]
struct RawService {
    methods: HashMap<String, RawMethod>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(default)]
    nested: HashMap<String, RawNode>,
    #[serde(default)]
    methods: Option<HashMap<String, RawMethod>>,
}

/// O(1) `method -> (request_type, response_type)` lookup table.
#[derive(Debug, Clone, Default)]
pub struct Descriptor {
    methods: HashMap<String, MethodTypes>,
}

impl Descriptor {
    pub fn empty() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// Parses a protobuf.js-style reflection JSON document into a flat
    /// `method -> types` table, keyed by the fully-qualified dotted name
    /// (e.g. `.lq.Lobby.oauth2Login`).
    pub fn from_reflection_json(doc: &str) -> Result<Self, CodecError> {
        let root: RawNode = serde_json::from_str(doc)
            .map_err(|e| CodecError::BuildFailure(format!("invalid descriptor json: {e}")))?;
        let mut methods = HashMap::new();
        walk(&root, String::new(), &mut methods);
        Ok(Self { methods })
    }

    pub fn insert(&mut self, method: impl Into<String>, types: MethodTypes) {
        self.methods.insert(method.into(), types);
    }

    pub fn lookup(&self, method: &str) -> Option<&MethodTypes> {
        self.methods.get(method)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

fn walk(node: &RawNode, prefix: String, out: &mut HashMap<String, MethodTypes>) {
    if let Some(methods) = &node.methods {
        for (rpc, m) in methods {
            out.insert(
                format!(".{prefix}.{rpc}"),
                MethodTypes {
                    request_type: m.request_type.clone(),
                    response_type: m.response_type.clone(),
                },
            );
        }
    }
    for (name, child) in &node.nested {
        let next_prefix = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        walk(child, next_prefix, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_dotted_method() {
        let (pkg, svc, rpc) = split_method(".lq.Lobby.oauth2Login").unwrap();
        assert_eq!(pkg, "lq");
        assert_eq!(svc, "Lobby");
        assert_eq!(rpc, "oauth2Login");
    }

    #[test]
    fn splits_legacy_slash_method() {
        let (pkg, svc, rpc) = split_method("lq.Lobby/oauth2Login").unwrap();
        assert_eq!(pkg, "lq");
        assert_eq!(svc, "Lobby");
        assert_eq!(rpc, "oauth2Login");
    }

    #[test]
    fn loads_nested_reflection_document() {
        let doc = r#"{
            "nested": {
                "lq": {
                    "nested": {
                        "Lobby": {
                            "methods": {
                                "oauth2Login": {
                                    "requestType": "ReqOauth2Login",
                                    "responseType": "ResOauth2Login"
                                }
                            }
                        }
                    }
                }
            }
        }"#;
        let d = Descriptor::from_reflection_json(doc).unwrap();
        let types = d.lookup(".lq.Lobby.oauth2Login").unwrap();
        assert_eq!(types.request_type, "ReqOauth2Login");
        assert_eq!(types.response_type, "ResOauth2Login");
    }
}
