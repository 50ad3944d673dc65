// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Structural Source Validator
//!
//! Confirms that submitted Python source has the shape of a gradio agent
//! without executing any of it:
//!
//! 1. the `gradio` module is imported (`import gradio [as gr]`,
//!    `import gradio.x`, or `from gradio[.x] import ...`), and
//! 2. somewhere in the module an `Interface(...)` constructor is called,
//!    either as a bare name or as an attribute (`gr.Interface(...)`).
//!
//! The source is parsed into a Python AST with `rustpython-parser`. A syntax
//! error is a failed verdict, never an error returned to the caller.

use rustpython_ast::Visitor;
use rustpython_parser::{ast, Parse};
use serde::{Deserialize, Serialize};

/// Module every agent must import.
pub const FRAMEWORK_MODULE: &str = "gradio";
/// Constructor every agent must call.
pub const INTERFACE_CONSTRUCTOR: &str = "Interface";
/// Entry point the generated wrapper calls.
pub const ENTRY_POINT: &str = "predict";

/// Outcome of a structural inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceVerdict {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Whether a function named `predict` is defined. Informational only.
    pub defines_entry_point: bool,
}

impl SourceVerdict {
    fn rejected(reason: impl Into<String>, defines_entry_point: bool) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
            defines_entry_point,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SourceValidator;

impl SourceValidator {
    pub fn new() -> Self {
        Self
    }

    /// `true` when the source imports gradio and calls `Interface(...)`.
    pub fn validate(&self, source: &str) -> bool {
        self.inspect(source).valid
    }

    pub fn inspect(&self, source: &str) -> SourceVerdict {
        let suite = match ast::Suite::parse(source, "<agent>") {
            Ok(suite) => suite,
            Err(e) => return SourceVerdict::rejected(format!("Source is not valid Python: {}", e), false),
        };

        let mut scan = StructureScan::default();
        for stmt in suite {
            scan.visit_stmt(stmt);
        }

        match (scan.imports_framework, scan.calls_interface) {
            (true, true) => SourceVerdict {
                valid: true,
                reason: None,
                defines_entry_point: scan.defines_entry_point,
            },
            (false, _) => SourceVerdict::rejected(
                format!("Source must import the '{}' module", FRAMEWORK_MODULE),
                scan.defines_entry_point,
            ),
            (true, false) => SourceVerdict::rejected(
                format!("Source must construct a {}.{}(...)", FRAMEWORK_MODULE, INTERFACE_CONSTRUCTOR),
                scan.defines_entry_point,
            ),
        }
    }
}

fn is_framework_module(name: &str) -> bool {
    name == FRAMEWORK_MODULE
        || name
            .strip_prefix(FRAMEWORK_MODULE)
            .is_some_and(|rest| rest.starts_with('.'))
}

#[derive(Default)]
struct StructureScan {
    imports_framework: bool,
    calls_interface: bool,
    defines_entry_point: bool,
}

impl Visitor for StructureScan {
    fn visit_stmt_import(&mut self, node: ast::StmtImport) {
        if node.names.iter().any(|alias| is_framework_module(alias.name.as_str())) {
            self.imports_framework = true;
        }
        self.generic_visit_stmt_import(node);
    }

    fn visit_stmt_import_from(&mut self, node: ast::StmtImportFrom) {
        if node.module.as_ref().is_some_and(|module| is_framework_module(module.as_str())) {
            self.imports_framework = true;
        }
        self.generic_visit_stmt_import_from(node);
    }

    fn visit_stmt_function_def(&mut self, node: ast::StmtFunctionDef) {
        if node.name.as_str() == ENTRY_POINT {
            self.defines_entry_point = true;
        }
        self.generic_visit_stmt_function_def(node);
    }

    fn visit_stmt_async_function_def(&mut self, node: ast::StmtAsyncFunctionDef) {
        if node.name.as_str() == ENTRY_POINT {
            self.defines_entry_point = true;
        }
        self.generic_visit_stmt_async_function_def(node);
    }

    fn visit_expr_call(&mut self, node: ast::ExprCall) {
        let constructs_interface = match node.func.as_ref() {
            ast::Expr::Name(name) => name.id.as_str() == INTERFACE_CONSTRUCTOR,
            ast::Expr::Attribute(attribute) => attribute.attr.as_str() == INTERFACE_CONSTRUCTOR,
            _ => false,
        };
        if constructs_interface {
            self.calls_interface = true;
        }
        self.generic_visit_expr_call(node);
    }
}
