//! Dynamically resolved GL entry points.
//!
//! Core GL 1.1 is all most platforms export statically; everything newer
//! (buffers, framebuffers, shaders) has to be looked up through the driver
//! once a context is current. [`ExtensionFunctions::resolve`] does this once
//! per native context and keeps the addresses in a name-keyed table.

use std::collections::HashMap;

use crate::render::backend::{NativeContext, ProcAddress};

/// Entry points looked up for every native context.
pub const GL_FUNCTION_NAMES: &[&str] = &[
    "glActiveTexture",
    "glBindBuffer",
    "glBufferData",
    "glBufferSubData",
    "glDeleteBuffers",
    "glGenBuffers",
    "glBindFramebuffer",
    "glBindRenderbuffer",
    "glCheckFramebufferStatus",
    "glDeleteFramebuffers",
    "glDeleteRenderbuffers",
    "glFramebufferRenderbuffer",
    "glFramebufferTexture2D",
    "glGenFramebuffers",
    "glGenRenderbuffers",
    "glRenderbufferStorage",
    "glAttachShader",
    "glCompileShader",
    "glCreateProgram",
    "glCreateShader",
    "glDeleteProgram",
    "glDeleteShader",
    "glGetAttribLocation",
    "glGetProgramInfoLog",
    "glGetProgramiv",
    "glGetShaderInfoLog",
    "glGetShaderiv",
    "glGetUniformLocation",
    "glLinkProgram",
    "glShaderSource",
    "glUniform1f",
    "glUniform1i",
    "glUniform2f",
    "glUniform4f",
    "glUseProgram",
    "glDisableVertexAttribArray",
    "glEnableVertexAttribArray",
    "glVertexAttribPointer",
];

/// Minimum set needed to compile and use a program.
pub const SHADER_FUNCTION_NAMES: &[&str] = &[
    "glAttachShader",
    "glCompileShader",
    "glCreateProgram",
    "glCreateShader",
    "glGetUniformLocation",
    "glLinkProgram",
    "glShaderSource",
    "glUseProgram",
];

// Older drivers only export the vendor-suffixed variant.
const SUFFIXES: &[&str] = &["", "ARB", "EXT"];

#[derive(Debug, Clone, Default)]
pub struct ExtensionFunctions {
    entries: HashMap<&'static str, ProcAddress>,
}

impl ExtensionFunctions {
    /// Resolves every name in [`GL_FUNCTION_NAMES`]. The context must be
    /// current on the calling thread.
    pub fn resolve(native: &dyn NativeContext) -> Self {
        let mut entries = HashMap::new();

        for &name in GL_FUNCTION_NAMES {
            let found = SUFFIXES
                .iter()
                .find_map(|suffix| native.get_proc_address(&format!("{name}{suffix}")));

            match found {
                Some(addr) => {
                    entries.insert(name, addr);
                }
                None => log::debug!("GL entry point {} not available", name),
            }
        }

        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<ProcAddress> {
        self.entries.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when every entry in [`SHADER_FUNCTION_NAMES`] resolved.
    pub fn has_shader_functions(&self) -> bool {
        SHADER_FUNCTION_NAMES.iter().all(|name| self.entries.contains_key(name))
    }
}
