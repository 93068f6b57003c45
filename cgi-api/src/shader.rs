use crate::headless::CgiShaderHeadless;
use crate::{
    CgiComplexSetHandle, CgiDescriptorSetDef, CgiResult, CgiShaderStageFlags, CgiTexture,
};

/// A shader source compiled once per branch, together with its descriptor-set layouts and root
/// signature.
///
/// Setup order: create the shader, declare every set with `create_descriptor_set`, then call
/// `create_pipeline_layout`. Per frame, uniforms are staged with `write_uniform` between
/// `begin_bind_descriptors` and `end_bind_descriptors` and bound with
/// `CgiCommandBuffer::cmd_bind_descriptors`.
#[derive(Clone, Debug)]
pub enum CgiShader {
    Headless(CgiShaderHeadless),
}

impl CgiShader {
    pub fn source_name(&self) -> &str {
        match self {
            CgiShader::Headless(inner) => inner.source_name(),
        }
    }

    pub fn has_branch(
        &self,
        branch_name: &str,
    ) -> bool {
        match self {
            CgiShader::Headless(inner) => inner.has_branch(branch_name),
        }
    }

    pub fn compiled_code(
        &self,
        branch_name: &str,
        stage: CgiShaderStageFlags,
    ) -> Option<&str> {
        match self {
            CgiShader::Headless(inner) => inner.compiled_code(branch_name, stage),
        }
    }

    pub fn create_descriptor_set(
        &self,
        set_def: &CgiDescriptorSetDef,
    ) -> CgiResult<()> {
        match self {
            CgiShader::Headless(inner) => inner.create_descriptor_set(set_def),
        }
    }

    pub fn create_pipeline_layout(&self) -> CgiResult<()> {
        match self {
            CgiShader::Headless(inner) => inner.create_pipeline_layout(),
        }
    }

    pub fn begin_bind_descriptors(&self) {
        match self {
            CgiShader::Headless(inner) => inner.begin_bind_descriptors(),
        }
    }

    pub fn end_bind_descriptors(&self) {
        match self {
            CgiShader::Headless(inner) => inner.end_bind_descriptors(),
        }
    }

    pub fn write_uniform<T: bytemuck::Pod>(
        &self,
        set_number: u32,
        data: &T,
    ) -> CgiResult<()> {
        match self {
            CgiShader::Headless(inner) => inner.write_uniform(set_number, data),
        }
    }

    /// Allocate a complex set with one texture per slot of the set. The handle stays valid until
    /// `free_descriptor_set`.
    pub fn bind_descriptor_set_textures(
        &self,
        set_number: u32,
        textures: &[&CgiTexture],
        first_mips: Option<&[u32]>,
    ) -> CgiResult<CgiComplexSetHandle> {
        match self {
            CgiShader::Headless(inner) => {
                let textures: Vec<_> = textures
                    .iter()
                    .map(|texture| match texture {
                        CgiTexture::Headless(texture) => texture,
                    })
                    .collect();
                inner.bind_descriptor_set_textures(set_number, &textures, first_mips)
            }
        }
    }

    pub fn free_descriptor_set(
        &self,
        complex_set: CgiComplexSetHandle,
    ) {
        match self {
            CgiShader::Headless(inner) => inner.free_descriptor_set(complex_set),
        }
    }

    pub fn headless_shader(&self) -> Option<&CgiShaderHeadless> {
        match self {
            CgiShader::Headless(inner) => Some(inner),
        }
    }
}
