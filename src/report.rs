use serde_json::json;
use serde_sarif::sarif::{
    Invocation, Location, LogicalLocation, Message, Result as SarifResult, Run, SCHEMA_URL, Sarif,
    Tool, ToolComponent,
};

use crate::engine::ModeledCall;
use crate::ir::InstructionKind;

pub const TOOL_NAME: &str = "annoscope";

/// SARIF result describing how one `getAnnotation` call was modeled.
pub fn modeled_call_result(call: &ModeledCall) -> SarifResult {
    let caller = &call.caller;
    let location = method_location(caller.owner.name(), &caller.name, &caller.descriptor);
    SarifResult::builder()
        .message(result_message(describe(call)))
        .locations(vec![location])
        .build()
}

fn describe(call: &ModeledCall) -> String {
    let prefix = format!(
        "getAnnotation at offset {} on {} for {}",
        call.offset, call.subject, call.annotation
    );
    let mut allocated = None;
    let mut writes = Vec::new();
    for inst in &call.ir.instructions {
        match &inst.kind {
            InstructionKind::New { site, .. } => allocated = Some(&site.declared_type),
            InstructionKind::PutField { value, field, .. } => {
                let rendered = call
                    .ir
                    .constant(*value)
                    .map(|constant| constant.to_string())
                    .unwrap_or_default();
                writes.push(format!("{}=\"{rendered}\"", field.name));
            }
            InstructionKind::Return { .. } => {}
        }
    }
    match allocated {
        Some(class) if writes.is_empty() => format!("{prefix}: modeled as new {class}"),
        Some(class) => format!(
            "{prefix}: modeled as new {class} with {}",
            writes.join(", ")
        ),
        None => format!("{prefix}: no matching annotation, modeled as an empty body"),
    }
}

pub fn method_location(class_name: &str, method_name: &str, descriptor: &str) -> Location {
    let logical = LogicalLocation::builder()
        .name(format!("{class_name}.{method_name}{descriptor}"))
        .kind("function")
        .build();
    Location::builder().logical_locations(vec![logical]).build()
}

pub fn result_message(text: impl Into<String>) -> Message {
    Message::builder().text(text.into()).build()
}

pub fn build_invocation(arguments: Vec<String>) -> Invocation {
    let command_line = arguments.join(" ");

    Invocation::builder()
        .execution_successful(true)
        .arguments(arguments)
        .command_line(command_line)
        .build()
}

pub fn build_sarif(results: Vec<SarifResult>, invocation: Invocation) -> Sarif {
    let driver = ToolComponent::builder().name(TOOL_NAME).build();
    let tool = Tool {
        driver,
        extensions: None,
        properties: None,
    };
    let run = Run::builder()
        .tool(tool)
        .invocations(vec![invocation])
        .results(results)
        .build();

    Sarif::builder()
        .schema(SCHEMA_URL)
        .runs(vec![run])
        .version(json!("2.1.0"))
        .build()
}
