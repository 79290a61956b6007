//! Static catalog of node kinds: palette order, labels, default configs and ports.

use serde_json::json;

use super::{ConfigMap, NodeKind};

/// Palette order shown in the component library.
const PALETTE: [NodeKind; 4] = [
    NodeKind::Input,
    NodeKind::LLMEngine,
    NodeKind::KnowledgeBase,
    NodeKind::Output,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// A named, directional attachment point on a node kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Port {
    pub name: &'static str,
    pub direction: PortDirection,
}

impl Port {
    const fn input(name: &'static str) -> Self {
        Self {
            name,
            direction: PortDirection::Input,
        }
    }

    const fn output(name: &'static str) -> Self {
        Self {
            name,
            direction: PortDirection::Output,
        }
    }
}

/// Ordered input and output ports of a kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ports {
    pub inputs: &'static [Port],
    pub outputs: &'static [Port],
}

impl Ports {
    pub fn input(&self, name: &str) -> Option<&Port> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&Port> {
        self.outputs.iter().find(|p| p.name == name)
    }
}

const INPUT_PORTS: Ports = Ports {
    inputs: &[],
    outputs: &[Port::output("query")],
};

const KNOWLEDGE_BASE_PORTS: Ports = Ports {
    inputs: &[Port::input("query")],
    outputs: &[Port::output("context")],
};

const LLM_ENGINE_PORTS: Ports = Ports {
    inputs: &[Port::input("context")],
    outputs: &[Port::output("output")],
};

const OUTPUT_PORTS: Ports = Ports {
    inputs: &[Port::input("output")],
    outputs: &[],
};

/// Supported kinds in stable palette order.
pub fn list_kinds() -> &'static [NodeKind] {
    &PALETTE
}

pub fn label(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Input => "Input",
        NodeKind::KnowledgeBase => "Knowledge Base",
        NodeKind::LLMEngine => "LLM (OpenAI)",
        NodeKind::Output => "Output",
    }
}

pub fn ports(kind: NodeKind) -> Ports {
    match kind {
        NodeKind::Input => INPUT_PORTS,
        NodeKind::KnowledgeBase => KNOWLEDGE_BASE_PORTS,
        NodeKind::LLMEngine => LLM_ENGINE_PORTS,
        NodeKind::Output => OUTPUT_PORTS,
    }
}

/// UI-facing default configuration. Returns a fresh map on every call.
///
/// The key set is the node's config template: the graph never stores keys
/// outside it.
pub fn default_config(kind: NodeKind) -> ConfigMap {
    let value = match kind {
        NodeKind::Input => json!({ "query": "" }),
        NodeKind::KnowledgeBase => json!({
            "file_name": "",
            "embedding_model": "text-embedding-3-large",
            "api_key": "",
            "embedding_provider": "openai",
            "collection_name": "documents",
            "n_results": 5,
        }),
        NodeKind::LLMEngine => json!({
            "model": "GPT 4o Mini",
            "api_key": "",
            "prompt": "",
            "temperature": 0.75,
            "web_search": false,
            "serp_api_key": "",
            "max_tokens": 1000,
            "provider": "openai",
        }),
        NodeKind::Output => json!({ "output_text": "" }),
    };
    match value {
        serde_json::Value::Object(map) => map,
        _ => ConfigMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_order_is_stable() {
        assert_eq!(
            list_kinds(),
            &[
                NodeKind::Input,
                NodeKind::LLMEngine,
                NodeKind::KnowledgeBase,
                NodeKind::Output
            ]
        );
    }

    #[test]
    fn default_config_is_fresh_each_call() {
        let mut a = default_config(NodeKind::Input);
        a.insert("query".into(), json!("changed"));
        let b = default_config(NodeKind::Input);
        assert_eq!(b.get("query"), Some(&json!("")));
    }

    #[test]
    fn llm_engine_ports() {
        let p = ports(NodeKind::LLMEngine);
        assert_eq!(p.inputs.len(), 1);
        assert_eq!(p.inputs[0].name, "context");
        assert_eq!(p.outputs[0].name, "output");
        assert!(p.input("context").is_some());
        assert!(p.output("context").is_none());
    }

    #[test]
    fn input_and_output_are_terminal() {
        assert!(ports(NodeKind::Input).inputs.is_empty());
        assert!(ports(NodeKind::Output).outputs.is_empty());
    }

    #[test]
    fn labels() {
        assert_eq!(label(NodeKind::LLMEngine), "LLM (OpenAI)");
        assert_eq!(label(NodeKind::KnowledgeBase), "Knowledge Base");
    }
}
