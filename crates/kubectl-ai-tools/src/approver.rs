//! Read/write approval gate (spec §4.2, §8 invariant 5): batches of calls
//! latch to `Write` if any member modifies a resource, so the agent asks
//! permission once per batch rather than once per call.

use crate::analyzer::ToolCallAnalysis;
use kubectl_ai_core::OperationKind;

pub struct OperationApprover;

impl OperationApprover {
    /// Classify a single analyzed call.
    pub fn classify(analysis: &ToolCallAnalysis) -> OperationKind {
        OperationKind::classify(analysis.modifies_resource)
    }

    /// Classify a batch: `Write` if any call in the batch modifies a
    /// resource, `Read` only if every call in the batch is read-only.
    pub fn classify_batch(analyses: &[ToolCallAnalysis]) -> OperationKind {
        analyses
            .iter()
            .map(Self::classify)
            .fold(OperationKind::Read, OperationKind::merge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolRegistry;
    use crate::stub::{EchoTool, WriteTool};
    use crate::analyzer::ToolCallAnalyzer;
    use kubectl_ai_core::FunctionCall;
    use serde_json::Map;
    use std::sync::Arc;

    fn call(name: &str) -> FunctionCall {
        FunctionCall {
            id: "1".to_string(),
            name: name.to_string(),
            arguments: Map::new(),
        }
    }

    #[test]
    fn batch_latches_to_write_if_any_member_writes() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool::default());
        reg.register(WriteTool::default());
        let analyzer = ToolCallAnalyzer::new(Arc::new(reg));

        let analyses = analyzer
            .analyze_all(&[call("echo"), call("write")])
            .unwrap();
        assert_eq!(
            OperationApprover::classify_batch(&analyses),
            OperationKind::Write
        );
    }

    #[test]
    fn batch_of_reads_only_stays_read() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool::default());
        let analyzer = ToolCallAnalyzer::new(Arc::new(reg));

        let analyses = analyzer.analyze_all(&[call("echo"), call("echo")]).unwrap();
        assert_eq!(
            OperationApprover::classify_batch(&analyses),
            OperationKind::Read
        );
    }
}
