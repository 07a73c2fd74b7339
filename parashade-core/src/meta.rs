//! Hex dump and metadata JSON for `--emit`.

use serde::Serialize;

use crate::compiler::CompilationArtifact;
use crate::locals::{Local, Warning};

#[derive(Debug, Serialize)]
pub struct Metadata {
    pub module: String,
    pub functions: Vec<FunctionMeta>,
    pub warnings: Vec<WarningMeta>,
}

#[derive(Debug, Serialize)]
pub struct FunctionMeta {
    pub name: String,
    pub locals: Vec<LocalMeta>,
}

#[derive(Debug, Serialize)]
pub struct LocalMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: &'static str,
    pub index: u16,
    pub line: u32,
    pub explicit: bool,
}

#[derive(Debug, Serialize)]
pub struct WarningMeta {
    pub code: &'static str,
    pub line: u32,
    pub msg: String,
}

/// Describe the compiled module. Locals appear in slot order; warnings keep
/// their recorded order (implicit-type notes, then folds and hints).
pub fn metadata(module_name: &str, locals: &[Local], warnings: &[Warning]) -> Metadata {
    Metadata {
        module: module_name.to_string(),
        functions: vec![FunctionMeta {
            name: "main".to_string(),
            locals: locals
                .iter()
                .map(|local| LocalMeta {
                    name: local.name.clone(),
                    ty: local.ty.as_str(),
                    index: local.index,
                    line: local.decl_line,
                    explicit: local.explicit,
                })
                .collect(),
        }],
        warnings: warnings
            .iter()
            .map(|warning| WarningMeta {
                code: warning.code,
                line: warning.line,
                msg: warning.message.clone(),
            })
            .collect(),
    }
}

pub fn metadata_json(module_name: &str, locals: &[Local], warnings: &[Warning]) -> String {
    serde_json::to_string_pretty(&metadata(module_name, locals, warnings))
        .expect("metadata is valid JSON")
}

/// 16 bytes per line, zero-padded lowercase hex, space-separated.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (row, chunk) in bytes.chunks(16).enumerate() {
        if row > 0 {
            out.push('\n');
        }
        for (col, byte) in chunk.iter().enumerate() {
            if col > 0 {
                out.push(' ');
            }
            out.push_str(&format!("{byte:02x}"));
        }
    }
    out
}

/// The full `--emit` report: banner, hex dump, blank line, metadata JSON.
pub fn emit_report(artifact: &CompilationArtifact) -> String {
    let mut out = String::new();
    out.push_str(&format!("; PARASHADE HEX IR ({} bytes)\n", artifact.bytes.len()));
    out.push_str(&hex_dump(&artifact.bytes));
    out.push_str("\n\n; METADATA\n");
    out.push_str(&metadata_json(
        &artifact.module_name,
        &artifact.locals,
        &artifact.warnings,
    ));
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;

    #[test]
    fn hex_dump_wraps_at_sixteen_bytes() {
        let bytes: Vec<u8> = (0u8..20).collect();
        let dump = hex_dump(&bytes);
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f"
        );
        assert_eq!(lines[1], "10 11 12 13");
    }

    #[test]
    fn metadata_lists_locals_in_index_order() {
        let artifact = compile(
            "module Demo :\nscope main range app :\nlet int x = 1\nlet y = 2\nreturn y\nend",
        )
        .expect("compile should succeed");
        let json = metadata_json(&artifact.module_name, &artifact.locals, &artifact.warnings);
        let value: serde_json::Value = serde_json::from_str(&json).expect("well-formed JSON");

        assert_eq!(value["module"], "Demo");
        let locals = value["functions"][0]["locals"]
            .as_array()
            .expect("locals array");
        assert_eq!(locals.len(), 2);
        for (index, local) in locals.iter().enumerate() {
            assert_eq!(local["index"], index as u64);
        }
        assert_eq!(locals[0]["name"], "x");
        assert_eq!(locals[0]["type"], "int");
        assert_eq!(locals[0]["explicit"], true);
        assert_eq!(locals[1]["name"], "y");
        assert_eq!(locals[1]["explicit"], false);
    }

    #[test]
    fn metadata_keeps_warning_order() {
        let artifact = compile(
            "module d :\nscope main range app :\nlet y = max(1, 2)\nreturn y\nend",
        )
        .expect("compile should succeed");
        let json = metadata_json(&artifact.module_name, &artifact.locals, &artifact.warnings);
        let value: serde_json::Value = serde_json::from_str(&json).expect("well-formed JSON");

        let warnings = value["warnings"].as_array().expect("warnings array");
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0]["code"], "W001");
        assert_eq!(warnings[1]["code"], "W100");
        assert_eq!(warnings[1]["msg"], "fold:max");
    }

    #[test]
    fn emit_report_has_banner_and_metadata_sections() {
        let artifact = compile("module d :\nscope main range app :\nreturn 0x2A\nend")
            .expect("compile should succeed");
        let report = emit_report(&artifact);
        assert!(report.starts_with("; PARASHADE HEX IR (10 bytes)\n"));
        assert!(report.contains("01 2a 00 00 00 00 00 00 00 21"));
        assert!(report.contains("\n\n; METADATA\n"));
        assert!(report.trim_end().ends_with('}'));
    }
}
