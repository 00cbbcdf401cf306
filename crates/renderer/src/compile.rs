//! Fixed GLSL units and the naga helpers that check and reflect them.
//!
//! The program is linked from three units: [`VERTEX_SHADER_GLSL`],
//! [`BASE_FRAGMENT_GLSL`] (declarations, then `main` after a splice point), and
//! a user fragment that defines `vec3 render(vec3 rayPos, vec3 rayDir, float time)`.
//! Linking splices the user unit between the base unit's header and footer.
//! Host values live in one std140 uniform block whose members carry a leading
//! underscore; the names shader authors use are macros over the block instance.

use wgpu::naga::front::glsl::{Frontend, Options};
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};
use wgpu::naga::{AddressSpace, Module, ShaderStage, TypeInner};

use crate::types::UniformName;

/// Bind group slot of the `SdfParams` block.
pub const PARAMS_GROUP: u32 = 0;
pub const PARAMS_BINDING: u32 = 0;

macro_rules! sdf_params_block {
    () => {
        r"layout(std140, set = 0, binding = 0) uniform SdfParams {
    vec3 _iCamPos;
    float _iTime;
    vec3 _iCamDir;
    float _pad0;
    vec3 _iCamU;
    float _pad1;
    vec3 _iCamV;
    float _pad2;
} sdf;
"
    };
}

/// Builds the ray direction for each corner from the aspect-scaled UV.
pub const VERTEX_SHADER_GLSL: &str = concat!(
    r"#version 450
layout(location = 0) in vec2 aPosition;
layout(location = 1) in vec2 aUV;
layout(location = 0) out vec3 vRayDir;

",
    sdf_params_block!(),
    r"
void main() {
    gl_Position = vec4(aPosition, 0.0, 1.0);
    vRayDir = aUV.x * sdf._iCamU + aUV.y * sdf._iCamV + sdf._iCamDir;
}
"
);

macro_rules! fragment_header {
    () => {
        concat!(
            r"#version 450
layout(location = 0) in vec3 vRayDir;
layout(location = 0) out vec4 fColor;

",
            sdf_params_block!(),
            r"
#define iCamPos sdf._iCamPos
#define iCamDir sdf._iCamDir
#define iCamU sdf._iCamU
#define iCamV sdf._iCamV
#define iTime sdf._iTime
"
        )
    };
}

macro_rules! fragment_footer {
    () => {
        r"
void main() {
    fColor = vec4(render(iCamPos, normalize(vRayDir), iTime), 1.0);
}
"
    };
}

macro_rules! render_splice {
    () => {
        "// @render\n"
    };
}

/// Marks where the user unit is spliced into the base unit.
pub const RENDER_SPLICE: &str = render_splice!();

/// The base fragment unit: shared declarations, the splice point, then the
/// entry point that calls `render`.
pub const BASE_FRAGMENT_GLSL: &str =
    concat!(fragment_header!(), render_splice!(), fragment_footer!());

/// Header of [`BASE_FRAGMENT_GLSL`]; user units are checked against it.
const FRAGMENT_HEADER_GLSL: &str = fragment_header!();

/// Stand-in `render` used to check a base unit on its own.
const STUB_RENDER: &str = "vec3 render(vec3 rayPos, vec3 rayDir, float time) { return rayDir; }\n";

/// Stand-in entry point used to check a user unit before it is linked. It
/// never calls `render`, so a missing definition only fails the link.
const STANDALONE_MAIN: &str = "\nvoid main() { fColor = vec4(0.0); }\n";

/// Scene shown when no shader file is given.
pub const DEFAULT_SCENE: &str = include_str!("../shaders/default.frag");

/// Prepares a user fragment for splicing after the base unit.
///
/// The first `#version` directive is dropped (the base unit supplies one) and
/// so are `uniform` declarations of host-provided names, which would otherwise
/// collide with the block macros.
pub fn sanitize_user_fragment(source: &str) -> String {
    let mut sanitized = String::with_capacity(source.len());
    let mut skipped_version = false;
    for line in source.lines() {
        let trimmed = line.trim_start();
        if !skipped_version && trimmed.starts_with("#version") {
            skipped_version = true;
            // keep line numbers aligned with the file
            sanitized.push('\n');
            continue;
        }
        let host_uniform = trimmed.starts_with("uniform ")
            && UniformName::ALL
                .iter()
                .any(|name| declares_identifier(trimmed, name.glsl_name()));
        if host_uniform {
            sanitized.push('\n');
            continue;
        }
        sanitized.push_str(line);
        sanitized.push('\n');
    }
    sanitized
}

fn declares_identifier(line: &str, identifier: &str) -> bool {
    line.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .any(|token| token == identifier)
}

/// Splits a base unit at [`RENDER_SPLICE`] into header and footer.
pub fn split_base(source: &str) -> Result<(&str, &str), String> {
    source
        .split_once(RENDER_SPLICE)
        .ok_or_else(|| format!("base unit has no `{}` splice point", RENDER_SPLICE.trim()))
}

/// Splices user units between `header` and `footer`. Each user unit restarts
/// line numbering so diagnostics point into the user's file.
pub fn assemble_fragment(header: &str, users: &[&str], footer: &str) -> String {
    let mut assembled = String::from(header);
    for user in users {
        if !assembled.ends_with('\n') {
            assembled.push('\n');
        }
        assembled.push_str("#line 1\n");
        assembled.push_str(user);
    }
    if !assembled.ends_with('\n') {
        assembled.push('\n');
    }
    assembled.push_str(footer);
    assembled
}

/// Checks a base unit with a stand-in `render`, returning its header and
/// footer.
pub fn check_base(source: &str) -> Result<(String, String), String> {
    let (header, footer) = split_base(source)?;
    check_glsl(
        ShaderStage::Fragment,
        &assemble_fragment(header, &[STUB_RENDER], footer),
    )?;
    Ok((header.to_string(), footer.to_string()))
}

/// Checks a sanitized user unit against the shared declarations. Whether it
/// defines `render` is only decided when it is linked.
pub fn check_user_fragment(source: &str) -> Result<(), String> {
    check_glsl(
        ShaderStage::Fragment,
        &assemble_fragment(FRAGMENT_HEADER_GLSL, &[source], STANDALONE_MAIN),
    )
    .map(|_| ())
}

/// Builds the complete fragment module. A user unit without a usable `render`
/// fails here, since the footer calls it.
pub fn link_fragment(header: &str, users: &[&str], footer: &str) -> Result<Module, String> {
    check_glsl(
        ShaderStage::Fragment,
        &assemble_fragment(header, users, footer),
    )
}

/// Parses GLSL into a naga module. Errors are rendered against `source`.
pub fn parse_glsl(stage: ShaderStage, source: &str) -> Result<Module, String> {
    Frontend::default()
        .parse(&Options::from(stage), source)
        .map_err(|err| err.emit_to_string(source))
}

pub fn validate(module: &Module, source: &str) -> Result<(), String> {
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(module)
        .map(|_| ())
        .map_err(|err| err.emit_to_string(source))
}

/// Parse and validate in one step.
pub fn check_glsl(stage: ShaderStage, source: &str) -> Result<Module, String> {
    let module = parse_glsl(stage, source)?;
    validate(&module, source)?;
    Ok(module)
}

/// Byte offset of a host uniform inside the `SdfParams` block of `module`,
/// or `None` when the module has no such member.
pub fn uniform_offset(module: &Module, name: UniformName) -> Option<u32> {
    let member_name = name.block_member();
    module
        .global_variables
        .iter()
        .filter(|(_, global)| global.space == AddressSpace::Uniform)
        .filter(|(_, global)| {
            global
                .binding
                .as_ref()
                .is_some_and(|b| b.group == PARAMS_GROUP && b.binding == PARAMS_BINDING)
        })
        .find_map(|(_, global)| match &module.types[global.ty].inner {
            TypeInner::Struct { members, .. } => members
                .iter()
                .find(|member| member.name.as_deref() == Some(member_name))
                .map(|member| member.offset),
            _ => None,
        })
}
