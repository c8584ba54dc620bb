//! Built-in tool catalogue
//!
//! Tools are listed in the order clients see them in `tools/list`.

use crate::error::Result;
use crate::handlers::{demo_ops, document_ops, file_ops};
use crate::registry::ToolRegistry;
use crate::tool::{ParamType, ParameterSpec, ToolDescriptor, ToolHandler};

/// Every built-in tool, in catalogue order
pub fn builtin_tools() -> Vec<ToolDescriptor> {
    vec![
        tool_echo(),
        tool_current_time(),
        tool_count_words(),
        tool_calculate(),
        tool_get_active_document_text(),
        tool_set_active_document_text(),
        tool_get_open_documents(),
        tool_get_solution_info(),
        tool_open_document(),
        tool_get_project_items(),
        tool_get_file_content(),
        tool_write_file_content(),
    ]
}

/// Registry holding the built-in tools
pub fn builtin_registry() -> Result<ToolRegistry> {
    ToolRegistry::from_descriptors(builtin_tools())
}

fn tool_echo() -> ToolDescriptor {
    ToolDescriptor::new(
        "Echo",
        "Echoes back the provided message",
        ToolHandler::pure(demo_ops::handle_echo),
    )
    .param(ParameterSpec::required(
        "message",
        ParamType::String,
        "The message to echo",
    ))
}

fn tool_current_time() -> ToolDescriptor {
    ToolDescriptor::new(
        "GetCurrentTime",
        "Returns the current date and time",
        ToolHandler::pure(demo_ops::handle_current_time),
    )
}

fn tool_count_words() -> ToolDescriptor {
    ToolDescriptor::new(
        "CountWords",
        "Counts the number of words in a text",
        ToolHandler::pure(demo_ops::handle_count_words),
    )
    .param(ParameterSpec::required(
        "text",
        ParamType::String,
        "The text to analyze",
    ))
}

fn tool_calculate() -> ToolDescriptor {
    ToolDescriptor::new(
        "Calculate",
        "Performs a basic calculation",
        ToolHandler::pure(demo_ops::handle_calculate),
    )
    .param(ParameterSpec::required(
        "operation",
        ParamType::String,
        "The operation to perform (add, subtract, multiply, divide)",
    ))
    .param(ParameterSpec::required("a", ParamType::Number, "The first number"))
    .param(ParameterSpec::required("b", ParamType::Number, "The second number"))
}

fn tool_get_active_document_text() -> ToolDescriptor {
    ToolDescriptor::new(
        "GetActiveDocumentText",
        "Gets the text of the currently active document in the editor",
        ToolHandler::host(document_ops::handle_get_active_text),
    )
}

fn tool_set_active_document_text() -> ToolDescriptor {
    ToolDescriptor::new(
        "SetActiveDocumentText",
        "Sets the text of the currently active document in the editor",
        ToolHandler::host(document_ops::handle_set_active_text),
    )
    .param(ParameterSpec::required(
        "text",
        ParamType::String,
        "The new text content",
    ))
}

fn tool_get_open_documents() -> ToolDescriptor {
    ToolDescriptor::new(
        "GetOpenDocuments",
        "Gets a list of all open documents in the editor",
        ToolHandler::host(document_ops::handle_open_documents),
    )
}

fn tool_get_solution_info() -> ToolDescriptor {
    ToolDescriptor::new(
        "GetSolutionInfo",
        "Gets information about the current solution",
        ToolHandler::host(document_ops::handle_solution_info),
    )
}

fn tool_open_document() -> ToolDescriptor {
    ToolDescriptor::new(
        "OpenDocument",
        "Opens a document by path",
        ToolHandler::host(document_ops::handle_open_document),
    )
    .param(ParameterSpec::required(
        "path",
        ParamType::String,
        "The path to the document",
    ))
}

fn tool_get_project_items() -> ToolDescriptor {
    ToolDescriptor::new(
        "GetProjectItems",
        "Gets a list of all project items in the solution",
        ToolHandler::host(document_ops::handle_project_items),
    )
}

fn tool_get_file_content() -> ToolDescriptor {
    ToolDescriptor::new(
        "GetFileContent",
        "Gets the content of a file by path",
        ToolHandler::backend(file_ops::handle_get_file_content),
    )
    .param(ParameterSpec::required(
        "path",
        ParamType::String,
        "The path to the file",
    ))
}

fn tool_write_file_content() -> ToolDescriptor {
    ToolDescriptor::new(
        "WriteFileContent",
        "Writes content to a file by path",
        ToolHandler::backend(file_ops::handle_write_file_content),
    )
    .param(ParameterSpec::required(
        "path",
        ParamType::String,
        "The path to the file",
    ))
    .param(ParameterSpec::required(
        "content",
        ParamType::String,
        "The content to write",
    ))
}
