//! Root chunk: immutable compiled bytecode shared by every processor of a script
//!
//! A chunk is a flat instruction array plus a function table mapping each
//! function index to its entry point. Function #0 is the main body.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::LoadError;
use crate::instruction::Instruction;

/// Compiled metadata for one function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionProto {
    pub name: String,
    pub entry_point: usize,
    #[serde(default)]
    pub params: usize,
    #[serde(default)]
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub functions: Vec<FunctionProto>,
    pub code: Vec<Instruction>,
}

impl Chunk {
    /// Parse and validate a JSON chunk
    pub fn from_json(source: &str) -> Result<Self, LoadError> {
        let chunk: Chunk = serde_json::from_str(source)?;
        chunk.validate()?;
        Ok(chunk)
    }

    /// Check entry points, jump targets and function references
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.functions.is_empty() {
            return Err(LoadError::Empty);
        }

        let len = self.code.len();

        for function in &self.functions {
            if function.entry_point >= len {
                return Err(LoadError::EntryPointOutOfRange {
                    name: function.name.clone(),
                    entry_point: function.entry_point,
                    len,
                });
            }
        }

        for (at, instruction) in self.code.iter().enumerate() {
            if let Some(target) = instruction.jump_target() {
                if target >= len {
                    return Err(LoadError::JumpOutOfRange { at, target, len });
                }
            }
            if let Instruction::Closure { function, .. } = instruction {
                if *function >= self.functions.len() {
                    return Err(LoadError::UndefinedFunction {
                        at,
                        function: *function,
                    });
                }
            }
        }

        Ok(())
    }

    pub fn function(&self, index: usize) -> Option<&FunctionProto> {
        self.functions.get(index)
    }

    pub fn instruction(&self, ip: usize) -> Option<&Instruction> {
        self.code.get(ip)
    }

    /// Hex SHA-256 of the chunk's canonical JSON form
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(self).unwrap_or_default());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_valid_chunk() {
        let chunk = Chunk::from_json(
            r#"{
                "functions": [{ "name": "main", "entry_point": 0 }],
                "code": [
                    { "t": "Literal", "v": { "t": "Num", "v": 1 } },
                    { "t": "Ret", "count": 1 }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(chunk.functions[0].params, 0);
        assert!(!chunk.functions[0].variadic);
        assert_eq!(chunk.code.len(), 2);
    }

    #[test]
    fn test_rejects_empty_function_table() {
        let err = Chunk::from_json(r#"{ "functions": [], "code": [] }"#).unwrap_err();
        assert!(matches!(err, LoadError::Empty));
    }

    #[test]
    fn test_rejects_entry_point_out_of_range() {
        let err = Chunk::from_json(
            r#"{
                "functions": [{ "name": "main", "entry_point": 3 }],
                "code": [{ "t": "Ret", "count": 0 }]
            }"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LoadError::EntryPointOutOfRange { entry_point: 3, len: 1, .. }
        ));
    }

    #[test]
    fn test_rejects_bad_jump_and_closure() {
        let err = Chunk::from_json(
            r#"{
                "functions": [{ "name": "main", "entry_point": 0 }],
                "code": [{ "t": "Jump", "target": 9 }]
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::JumpOutOfRange { at: 0, target: 9, .. }));

        let err = Chunk::from_json(
            r#"{
                "functions": [{ "name": "main", "entry_point": 0 }],
                "code": [{ "t": "Closure", "function": 4, "captures": [] }]
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::UndefinedFunction { at: 0, function: 4 }));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = Chunk::from_json("{ not json").unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let source = r#"{
            "functions": [{ "name": "main", "entry_point": 0 }],
            "code": [{ "t": "Ret", "count": 0 }]
        }"#;
        let a = Chunk::from_json(source).unwrap();
        let b = Chunk::from_json(source).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }
}
